//! User strategies, their compiled form, and the alerts they raise.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::compiler::compile;
use crate::domain::error::CompileError;
use crate::domain::registry::Registry;
use crate::domain::rule::Rule;

pub const BUY: u8 = 0;
pub const SELL: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn code(self) -> u8 {
        match self {
            Side::Buy => BUY,
            Side::Sell => SELL,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Side::Buy),
            1 => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "0" => Ok(Side::Buy),
            "sell" | "1" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}', expected buy or sell", other)),
        }
    }
}

/// A strategy as stored: the expression is compiled when it is attached
/// to an analyser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub user_id: String,
    pub symbol: String,
    pub expression: String,
    pub side: Side,
    /// Keep firing after the first alert.
    pub repeat: bool,
}

impl Strategy {
    pub fn new(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        expression: impl Into<String>,
        side: Side,
        repeat: bool,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            symbol: symbol.into(),
            expression: expression.into(),
            side,
            repeat,
        }
    }

    pub fn compile(
        &self,
        registry: &Registry,
        callback: AlertCallback,
    ) -> Result<CompiledStrategy, CompileError> {
        let rule = compile(&self.expression, registry)?;
        Ok(CompiledStrategy {
            user_id: self.user_id.clone(),
            side: self.side,
            rule,
            repeat: self.repeat,
            callback,
        })
    }
}

/// Payload delivered to the alert callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub at: DateTime<Utc>,
    /// Last close of the series.
    pub price: Decimal,
    pub symbol: String,
    pub side: Side,
    pub user_id: String,
    pub repeat: bool,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.at.to_rfc3339(),
            self.symbol,
            self.side,
            self.price.normalize(),
            self.user_id,
            if self.repeat { "repeat" } else { "once" }
        )
    }
}

pub type AlertCallback = Arc<dyn Fn(&Alert) + Send + Sync>;

pub struct CompiledStrategy {
    pub user_id: String,
    pub side: Side,
    pub rule: Rule,
    pub repeat: bool,
    pub callback: AlertCallback,
}

impl fmt::Debug for CompiledStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledStrategy")
            .field("user_id", &self.user_id)
            .field("side", &self.side)
            .field("rule", &self.rule)
            .field("repeat", &self.repeat)
            .finish_non_exhaustive()
    }
}
