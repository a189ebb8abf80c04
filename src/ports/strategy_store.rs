//! Strategy persistence port.
//!
//! Rows are keyed by `(user_id, symbol, side)`; an upsert with an existing
//! key replaces the expression and repeat flag.

use crate::domain::error::EngineError;
use crate::domain::strategy::{Side, Strategy};

pub trait StrategyStore: Send + Sync {
    fn upsert(&self, strategy: &Strategy) -> Result<(), EngineError>;

    /// Returns whether a row was removed.
    fn delete(&self, user_id: &str, symbol: &str, side: Side) -> Result<bool, EngineError>;

    fn select_all(&self) -> Result<Vec<Strategy>, EngineError>;

    fn select_by_symbol(&self, symbol: &str) -> Result<Vec<Strategy>, EngineError>;
}
