//! Port traits: the engine's view of configuration, strategy storage and
//! price history.

pub mod config_port;
pub mod price_port;
pub mod strategy_store;
