//! Runtime side of the engine: the symbol broker and its price feeders.

pub mod broker;
pub mod feeder;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::analyser::Analyser;

/// An analyser shared between the broker and its feeder task.
pub type SharedAnalyser = Arc<Mutex<Analyser>>;

/// Lock an analyser, recovering the guard if a previous holder panicked.
pub fn lock(analyser: &SharedAnalyser) -> MutexGuard<'_, Analyser> {
    analyser.lock().unwrap_or_else(PoisonError::into_inner)
}
