//! In-process strategy store.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::error::EngineError;
use crate::domain::strategy::{Side, Strategy};
use crate::ports::strategy_store::StrategyStore;

type Key = (String, String, Side);

#[derive(Default)]
pub struct MemoryStrategyStore {
    rows: Mutex<BTreeMap<Key, Strategy>>,
}

impl MemoryStrategyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StrategyStore for MemoryStrategyStore {
    fn upsert(&self, strategy: &Strategy) -> Result<(), EngineError> {
        let key = (
            strategy.symbol.clone(),
            strategy.user_id.clone(),
            strategy.side,
        );
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, strategy.clone());
        Ok(())
    }

    fn delete(&self, user_id: &str, symbol: &str, side: Side) -> Result<bool, EngineError> {
        let key = (symbol.to_string(), user_id.to_string(), side);
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some())
    }

    fn select_all(&self) -> Result<Vec<Strategy>, EngineError> {
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    fn select_by_symbol(&self, symbol: &str) -> Result<Vec<Strategy>, EngineError> {
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.symbol == symbol)
            .cloned()
            .collect())
    }
}
