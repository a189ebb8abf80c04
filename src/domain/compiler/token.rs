//! Stage 1: split an expression into tokens.
//!
//! Positions are character offsets into the input so error carets line up
//! under non-ASCII operators such as `≤` and `×`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::error::CompileError;
use crate::domain::indicator::ArithmeticOp;
use crate::domain::registry::Registry;
use crate::domain::rule::{Comparator, Logical};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Numeric(Decimal),
    /// Function name (lowercased) and its argument count, filled in by
    /// [`super::clause::infer_arity`].
    Variable { name: String, argc: usize },
    Prefix,
    Modifier(ArithmeticOp),
    Comparator(Comparator),
    Logical(Logical),
    ClauseOpen,
    ClauseClose,
    Separator,
}

impl TokenKind {
    /// Comparator or logical operator: the tokens that may border a
    /// redundant clause.
    pub fn is_boundary(&self) -> bool {
        matches!(self, TokenKind::Comparator(_) | TokenKind::Logical(_))
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Prefix
                | TokenKind::Modifier(_)
                | TokenKind::Comparator(_)
                | TokenKind::Logical(_)
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Numeric(value) => write!(f, "{}", value),
            TokenKind::Variable { name, .. } => write!(f, "{}", name),
            TokenKind::Prefix => write!(f, "-"),
            TokenKind::Modifier(op) => write!(f, "{}", op),
            TokenKind::Comparator(op) => write!(f, "{}", op),
            TokenKind::Logical(op) => write!(f, "{}", op.symbol()),
            TokenKind::ClauseOpen => write!(f, "("),
            TokenKind::ClauseClose => write!(f, ")"),
            TokenKind::Separator => write!(f, ","),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    registry: &'a Registry,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &str, registry: &'a Registry) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            registry,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn push(&mut self, kind: TokenKind, position: usize) {
        self.tokens.push(Token { kind, position });
    }

    /// Consume `len` characters forming `symbol` and resolve it as an operator.
    fn operator(&mut self, symbol: &str, len: usize) -> Result<(), CompileError> {
        let start = self.pos;
        self.pos += len;
        let kind = if let Some(op) = self.registry.modifier(symbol) {
            TokenKind::Modifier(op)
        } else if let Some(op) = self.registry.comparator(symbol) {
            TokenKind::Comparator(op)
        } else if let Some(op) = self.registry.logical(symbol) {
            TokenKind::Logical(op)
        } else {
            return Err(CompileError::Parse {
                message: format!("unsupported operator '{}'", symbol),
                position: start,
            });
        };
        self.push(kind, start);
        Ok(())
    }

    /// `-` is unary at the start of input and after an operator, `(` or `,`.
    fn minus_is_prefix(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(token) => {
                token.kind.is_operator()
                    || matches!(token.kind, TokenKind::ClauseOpen | TokenKind::Separator)
            }
        }
    }

    fn number(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let invalid = || CompileError::Parse {
            message: format!("invalid number '{}'", text),
            position: start,
        };
        if text == "." {
            return Err(invalid());
        }
        let normalized = if text.starts_with('.') {
            format!("0{}", text)
        } else {
            text.clone()
        };
        let value = Decimal::from_str(&normalized).map_err(|_| invalid())?;
        self.push(TokenKind::Numeric(value), start);
        Ok(())
    }

    fn identifier(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect::<String>().to_lowercase();
        if self.registry.function(&name).is_none() {
            return Err(CompileError::UnknownFunction {
                name,
                position: start,
            });
        }
        self.push(TokenKind::Variable { name, argc: 0 }, start);
        Ok(())
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        while let Some(ch) = self.peek() {
            let start = self.pos;
            match ch {
                c if c.is_whitespace() => {
                    self.advance();
                }
                c if c.is_ascii_digit() || c == '.' => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.identifier()?,
                '(' => {
                    self.advance();
                    self.push(TokenKind::ClauseOpen, start);
                }
                ')' => {
                    self.advance();
                    self.push(TokenKind::ClauseClose, start);
                }
                ',' => {
                    self.advance();
                    self.push(TokenKind::Separator, start);
                }
                '-' => {
                    if self.minus_is_prefix() {
                        self.advance();
                        self.push(TokenKind::Prefix, start);
                    } else {
                        self.operator("-", 1)?;
                    }
                }
                '*' if self.peek_next() == Some('*') => self.operator("**", 2)?,
                '<' | '>' | '=' if self.peek_next() == Some('=') => {
                    let symbol: String = [ch, '='].iter().collect();
                    self.operator(&symbol, 2)?;
                }
                '&' | '|' => {
                    if self.peek_next() != Some(ch) {
                        return Err(CompileError::Parse {
                            message: format!("expected '{}{}'", ch, ch),
                            position: start,
                        });
                    }
                    let symbol: String = [ch, ch].iter().collect();
                    self.operator(&symbol, 2)?;
                }
                '+' | '*' | '/' | '×' | '÷' | '<' | '>' | '=' | '≤' | '≥' => {
                    self.operator(ch.encode_utf8(&mut [0; 4]), 1)?;
                }
                other => {
                    return Err(CompileError::Parse {
                        message: format!("unexpected character '{}'", other),
                        position: start,
                    });
                }
            }
        }
        Ok(self.tokens)
    }
}

pub fn tokenize(input: &str, registry: &Registry) -> Result<Vec<Token>, CompileError> {
    Lexer::new(input, registry).run()
}
