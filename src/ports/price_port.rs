//! Historical price source port.

use crate::domain::candle::PriceTick;
use crate::domain::error::EngineError;

pub trait PriceHistoryPort {
    /// Daily ticks for `symbol` with `timestamp >= from`, oldest first.
    fn fetch_history(&self, symbol: &str, from: i64) -> Result<Vec<PriceTick>, EngineError>;
}
