//! Stages 2 and 3: clause matching, redundant-clause elision and argument
//! counting.

use crate::domain::compiler::token::{Token, TokenKind};
use crate::domain::error::CompileError;

/// For every token index, the index of its matching clause token (opener to
/// closer and closer to opener); `None` for non-clause tokens.
pub fn pair_map(tokens: &[Token]) -> Result<Vec<Option<usize>>, CompileError> {
    let mut pairs = vec![None; tokens.len()];
    let mut open = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::ClauseOpen => open.push(i),
            TokenKind::ClauseClose => {
                let opener = open.pop().ok_or(CompileError::MismatchedParens {
                    position: token.position,
                })?;
                pairs[opener] = Some(i);
                pairs[i] = Some(opener);
            }
            _ => {}
        }
    }
    if let Some(&opener) = open.last() {
        return Err(CompileError::MismatchedParens {
            position: tokens[opener].position,
        });
    }
    Ok(pairs)
}

fn has_top_level_logical(tokens: &[Token]) -> bool {
    let mut depth = 0usize;
    for token in tokens {
        match token.kind {
            TokenKind::ClauseOpen => depth += 1,
            TokenKind::ClauseClose => depth = depth.saturating_sub(1),
            TokenKind::Logical(_) if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// A clause is redundant when it sits between comparison/logical boundaries
/// (or the ends of the input) and removing it cannot regroup a logical
/// operator.
fn is_redundant(tokens: &[Token], opener: usize, closer: usize) -> bool {
    let opens_clean = opener == 0 || tokens[opener - 1].kind.is_boundary();
    let closes_clean = closer + 1 == tokens.len() || tokens[closer + 1].kind.is_boundary();
    if !opens_clean || !closes_clean {
        return false;
    }
    let spans_all = opener == 0 && closer + 1 == tokens.len();
    spans_all || !has_top_level_logical(&tokens[opener + 1..closer])
}

/// Remove redundant clause pairs until none remain.
pub fn elide_redundant(mut tokens: Vec<Token>) -> Result<Vec<Token>, CompileError> {
    loop {
        let pairs = pair_map(&tokens)?;
        let found = tokens.iter().enumerate().find_map(|(i, token)| {
            if token.kind != TokenKind::ClauseOpen {
                return None;
            }
            let closer = pairs[i]?;
            is_redundant(&tokens, i, closer).then_some((i, closer))
        });
        let Some((opener, closer)) = found else {
            return Ok(tokens);
        };
        tokens.remove(closer);
        tokens.remove(opener);
    }
}

/// Set `argc` on every variable: the number of top-level comma-separated
/// arguments in the clause that directly follows it, zero otherwise.
pub fn infer_arity(tokens: &mut [Token]) -> Result<(), CompileError> {
    let pairs = pair_map(tokens)?;
    for i in 0..tokens.len() {
        if !matches!(tokens[i].kind, TokenKind::Variable { .. }) {
            continue;
        }
        let count = match tokens.get(i + 1) {
            Some(next) if next.kind == TokenKind::ClauseOpen => {
                let closer = pairs[i + 1].ok_or(CompileError::MismatchedParens {
                    position: next.position,
                })?;
                count_arguments(&tokens[i + 2..closer])
            }
            _ => 0,
        };
        if let TokenKind::Variable { argc, .. } = &mut tokens[i].kind {
            *argc = count;
        }
    }
    Ok(())
}

fn count_arguments(inner: &[Token]) -> usize {
    if inner.is_empty() {
        return 0;
    }
    let mut depth = 0usize;
    let mut separators = 0;
    for token in inner {
        match token.kind {
            TokenKind::ClauseOpen => depth += 1,
            TokenKind::ClauseClose => depth = depth.saturating_sub(1),
            TokenKind::Separator if depth == 0 => separators += 1,
            _ => {}
        }
    }
    separators + 1
}
