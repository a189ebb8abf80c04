//! Stage 4: shunting-yard conversion to postfix order.

use crate::domain::compiler::token::{Token, TokenKind};
use crate::domain::error::CompileError;
use crate::domain::indicator::ArithmeticOp;

fn precedence(kind: &TokenKind) -> u8 {
    match kind {
        TokenKind::Variable { .. } => 8,
        TokenKind::Prefix => 7,
        TokenKind::Modifier(ArithmeticOp::Mul | ArithmeticOp::Div | ArithmeticOp::Pow) => 6,
        TokenKind::Modifier(_) => 5,
        TokenKind::Comparator(_) => 4,
        TokenKind::Logical(_) => 3,
        _ => 2,
    }
}

fn right_associative(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Prefix | TokenKind::Modifier(ArithmeticOp::Pow)
    )
}

/// Reorder infix tokens (with arities set) into postfix.
///
/// A variable directly followed by a clause is held on the operator stack
/// and emitted when that clause closes; bare variables go straight to the
/// output. Separators only flush the current argument.
pub fn to_postfix(tokens: Vec<Token>) -> Result<Vec<Token>, CompileError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::Numeric(_) => output.push(token),
            TokenKind::Variable { .. } => {
                let is_call = iter
                    .peek()
                    .is_some_and(|next| next.kind == TokenKind::ClauseOpen);
                if is_call {
                    stack.push(token);
                } else {
                    output.push(token);
                }
            }
            TokenKind::Prefix => stack.push(token),
            TokenKind::Modifier(_) | TokenKind::Comparator(_) | TokenKind::Logical(_) => {
                let incoming = precedence(&token.kind);
                while let Some(top) = stack.last() {
                    if top.kind == TokenKind::ClauseOpen {
                        break;
                    }
                    let top_prec = precedence(&top.kind);
                    let pops = top_prec > incoming
                        || (top_prec == incoming && !right_associative(&token.kind));
                    if !pops {
                        break;
                    }
                    if let Some(op) = stack.pop() {
                        output.push(op);
                    }
                }
                stack.push(token);
            }
            TokenKind::ClauseOpen => stack.push(token),
            TokenKind::Separator => {
                flush_to_open(&mut stack, &mut output, token.position)?;
            }
            TokenKind::ClauseClose => {
                flush_to_open(&mut stack, &mut output, token.position)?;
                stack.pop();
                if matches!(stack.last(), Some(t) if matches!(t.kind, TokenKind::Variable { .. })) {
                    if let Some(call) = stack.pop() {
                        output.push(call);
                    }
                }
            }
        }
    }

    while let Some(token) = stack.pop() {
        if token.kind == TokenKind::ClauseOpen {
            return Err(CompileError::MismatchedParens {
                position: token.position,
            });
        }
        output.push(token);
    }
    Ok(output)
}

/// Pop operators to the output until a clause opener is on top (left in place).
fn flush_to_open(
    stack: &mut Vec<Token>,
    output: &mut Vec<Token>,
    position: usize,
) -> Result<(), CompileError> {
    loop {
        match stack.last() {
            Some(top) if top.kind == TokenKind::ClauseOpen => return Ok(()),
            Some(_) => {
                if let Some(op) = stack.pop() {
                    output.push(op);
                }
            }
            None => return Err(CompileError::MismatchedParens { position }),
        }
    }
}
