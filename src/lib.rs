//! samalert — price alert engine for user trading strategies.
//!
//! Strategies are boolean expressions over indicators of a daily candle
//! series. Domain logic lives in [`domain`], the per-symbol broker and feeder
//! tasks in [`engine`], port traits in [`ports`], and concrete
//! implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod ports;
