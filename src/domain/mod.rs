//! Core domain types and logic.

pub mod analyser;
pub mod candle;
pub mod compiler;
pub mod error;
pub mod indicator;
pub mod registry;
pub mod rule;
pub mod rule_eval;
pub mod series;
pub mod settings;
pub mod strategy;
