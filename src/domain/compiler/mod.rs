//! Strategy expression compiler.
//!
//! `compile` turns an infix expression such as
//! `macd(12,26) > 0 && rsi(14) < 70` into a [`Rule`] tree in five stages:
//!
//! 1. [`token::tokenize`]: split into tokens, resolving names against the registry
//! 2. [`clause::elide_redundant`]: drop clause pairs that do not group anything
//! 3. [`clause::infer_arity`]: count the arguments of each function call
//! 4. [`postfix::to_postfix`]: shunting-yard reordering
//! 5. [`emit::emit`]: evaluate the postfix list into indicators and rules
//!
//! Compilation either returns a rule or a typed [`CompileError`]; it never
//! touches analyser or broker state.

pub mod clause;
pub mod emit;
pub mod postfix;
pub mod token;

use tracing::trace;

use crate::domain::error::CompileError;
use crate::domain::registry::Registry;
use crate::domain::rule::Rule;

pub fn compile(expression: &str, registry: &Registry) -> Result<Rule, CompileError> {
    let tokens = token::tokenize(expression, registry)?;
    if tokens.is_empty() {
        return Err(CompileError::MalformedExpression {
            reason: "empty expression".to_string(),
        });
    }
    let mut tokens = clause::elide_redundant(tokens)?;
    clause::infer_arity(&mut tokens)?;
    let postfix = postfix::to_postfix(tokens)?;
    let rule = emit::emit(&postfix, registry)?;
    trace!(expression, rule = %rule, "compiled expression");
    Ok(rule)
}
