//! Stage 5: build the rule tree from postfix tokens.

use crate::domain::compiler::token::{Token, TokenKind};
use crate::domain::error::CompileError;
use crate::domain::indicator::Indicator;
use crate::domain::registry::{Operand, Registry};
use crate::domain::rule::Rule;

fn missing_operand(token: &Token) -> CompileError {
    CompileError::MalformedExpression {
        reason: format!(
            "'{}' at position {} is missing an operand",
            token.kind, token.position
        ),
    }
}

pub fn emit(postfix: &[Token], registry: &Registry) -> Result<Rule, CompileError> {
    let mut values: Vec<Operand> = Vec::new();
    let mut rules: Vec<Rule> = Vec::new();

    for token in postfix {
        match &token.kind {
            TokenKind::Numeric(value) => values.push(Operand::Scalar(*value)),
            TokenKind::Variable { name, argc } => {
                let split = values
                    .len()
                    .checked_sub(*argc)
                    .ok_or_else(|| missing_operand(token))?;
                let args = values.split_off(split);
                let indicator = registry.build(name, args)?;
                values.push(Operand::Indicator(indicator));
            }
            TokenKind::Prefix => {
                let negated = match values.pop().ok_or_else(|| missing_operand(token))? {
                    Operand::Scalar(value) => Operand::Scalar(-value),
                    Operand::Indicator(inner) => {
                        Operand::Indicator(Indicator::Negate(Box::new(inner)))
                    }
                };
                values.push(negated);
            }
            TokenKind::Modifier(op) => {
                let (lhs, rhs) = pop_pair(&mut values).ok_or_else(|| missing_operand(token))?;
                values.push(registry.arithmetic(*op, lhs, rhs));
            }
            TokenKind::Comparator(op) => {
                let (lhs, rhs) = pop_pair(&mut values).ok_or_else(|| missing_operand(token))?;
                rules.push(registry.comparison(*op, lhs, rhs));
            }
            TokenKind::Logical(op) => {
                let (lhs, rhs) = pop_pair(&mut rules).ok_or_else(|| missing_operand(token))?;
                rules.push(Rule::combine(*op, lhs, rhs));
            }
            TokenKind::ClauseOpen | TokenKind::ClauseClose | TokenKind::Separator => {
                return Err(CompileError::MalformedExpression {
                    reason: format!("unexpected '{}' at position {}", token.kind, token.position),
                });
            }
        }
    }

    if !values.is_empty() {
        return Err(CompileError::MalformedExpression {
            reason: format!("{} value(s) not used by any comparison", values.len()),
        });
    }
    match (rules.pop(), rules.is_empty()) {
        (Some(rule), true) => Ok(rule),
        (None, _) => Err(CompileError::MalformedExpression {
            reason: "expression has no comparison".to_string(),
        }),
        (Some(_), false) => Err(CompileError::MalformedExpression {
            reason: "comparisons must be joined with && or ||".to_string(),
        }),
    }
}

fn pop_pair<T>(stack: &mut Vec<T>) -> Option<(T, T)> {
    if stack.len() < 2 {
        return None;
    }
    let rhs = stack.pop()?;
    let lhs = stack.pop()?;
    Some((lhs, rhs))
}
