//! Symbol broker.
//!
//! The broker owns at most one analyser per symbol. Each added strategy
//! retains its symbol's analyser and each deleted strategy releases it; the
//! last release stops the analyser's feeder and evicts it. The broker is
//! meant to be driven from a single owner task; feeders run on their own
//! tasks and share the analyser through a mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::analyser::Analyser;
use crate::domain::candle::PriceTick;
use crate::domain::error::EngineError;
use crate::domain::registry::Registry;
use crate::domain::settings::EngineSettings;
use crate::domain::strategy::{Alert, AlertCallback, CompiledStrategy, Side, Strategy};
use crate::engine::feeder::spawn_feeder;
use crate::engine::{lock, SharedAnalyser};
use crate::ports::price_port::PriceHistoryPort;
use crate::ports::strategy_store::StrategyStore;

/// Explicit strategy reference count for one analyser.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefCount(usize);

impl RefCount {
    pub fn get(self) -> usize {
        self.0
    }

    pub fn retain(&mut self) -> usize {
        self.0 += 1;
        self.0
    }

    /// Returns the remaining count, or `None` when already at zero.
    pub fn release(&mut self) -> Option<usize> {
        debug_assert!(self.0 > 0, "reference count released below zero");
        self.0 = self.0.checked_sub(1)?;
        Some(self.0)
    }
}

struct AnalyserHandle {
    analyser: SharedAnalyser,
    refs: RefCount,
    stop: watch::Sender<bool>,
    feeder: Option<JoinHandle<()>>,
}

impl AnalyserHandle {
    fn signal_stop(&self) {
        // no receivers just means no feeder is running
        let _ = self.stop.send(true);
    }
}

pub struct Broker {
    settings: EngineSettings,
    registry: &'static Registry,
    store: Arc<dyn StrategyStore>,
    analysers: HashMap<String, AnalyserHandle>,
}

impl Broker {
    pub fn new(settings: EngineSettings, store: Arc<dyn StrategyStore>) -> Self {
        Self::with_registry(settings, store, Registry::global())
    }

    pub fn with_registry(
        settings: EngineSettings,
        store: Arc<dyn StrategyStore>,
        registry: &'static Registry,
    ) -> Self {
        Self {
            settings,
            registry,
            store,
            analysers: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.analysers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analysers.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.analysers.contains_key(symbol)
    }

    pub fn ref_count(&self, symbol: &str) -> Option<usize> {
        self.analysers.get(symbol).map(|h| h.refs.get())
    }

    pub fn analyser(&self, symbol: &str) -> Option<SharedAnalyser> {
        self.analysers.get(symbol).map(|h| Arc::clone(&h.analyser))
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.analysers.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Compile, persist and attach a strategy.
    ///
    /// Returns `true` when the symbol's analyser had no strategies before, in
    /// which case the caller should start a price feed for it. Nothing is
    /// changed when compilation, the symbol check or persistence fails.
    pub fn add_strategy(
        &mut self,
        strategy: &Strategy,
        callback: AlertCallback,
    ) -> Result<bool, EngineError> {
        let compiled = self.prepare(strategy, callback)?;
        self.store.upsert(strategy)?;
        Ok(self.attach(&strategy.symbol, compiled))
    }

    /// Reattach every persisted strategy. Rows that no longer compile or name
    /// an unknown symbol are skipped with a warning. Returns the number
    /// attached.
    pub fn restore(&mut self, callback: AlertCallback) -> Result<usize, EngineError> {
        let mut restored = 0;
        for strategy in self.store.select_all()? {
            match self.prepare(&strategy, Arc::clone(&callback)) {
                Ok(compiled) => {
                    self.attach(&strategy.symbol, compiled);
                    restored += 1;
                }
                Err(e) => {
                    warn!(
                        symbol = %strategy.symbol,
                        user_id = %strategy.user_id,
                        error = %e,
                        "skipping stored strategy"
                    );
                }
            }
        }
        info!(restored, "strategies restored");
        Ok(restored)
    }

    fn prepare(
        &self,
        strategy: &Strategy,
        callback: AlertCallback,
    ) -> Result<CompiledStrategy, EngineError> {
        let compiled = strategy.compile(self.registry, callback)?;
        if !self.settings.knows_symbol(&strategy.symbol) {
            return Err(EngineError::UnknownSymbol {
                symbol: strategy.symbol.clone(),
            });
        }
        Ok(compiled)
    }

    fn attach(&mut self, symbol: &str, compiled: CompiledStrategy) -> bool {
        let timezone = self.settings.timezone;
        let handle = self.analysers.entry(symbol.to_string()).or_insert_with(|| {
            info!(symbol = %symbol, "analyser created");
            AnalyserHandle {
                analyser: Arc::new(Mutex::new(Analyser::new(symbol, timezone))),
                refs: RefCount::default(),
                stop: watch::channel(false).0,
                feeder: None,
            }
        });

        let user_id = compiled.user_id.clone();
        let side = compiled.side;
        let outcome = lock(&handle.analyser).append_compiled(compiled);
        if !outcome.replaced {
            handle.refs.retain();
        }
        debug!(
            symbol = %symbol,
            user_id = %user_id,
            %side,
            refs = handle.refs.get(),
            "strategy attached"
        );
        outcome.first
    }

    /// Detach and unpersist a strategy. Returns whether it was attached;
    /// deleting an absent strategy is a no-op.
    pub fn delete_strategy(
        &mut self,
        user_id: &str,
        symbol: &str,
        side: Side,
    ) -> Result<bool, EngineError> {
        self.store.delete(user_id, symbol, side)?;

        let Some(handle) = self.analysers.get_mut(symbol) else {
            return Ok(false);
        };
        if !lock(&handle.analyser).delete_strategy(user_id, side) {
            return Ok(false);
        }

        let remaining = handle
            .refs
            .release()
            .ok_or_else(|| EngineError::OverRelease {
                symbol: symbol.to_string(),
            })?;
        debug!(symbol = %symbol, user_id = %user_id, %side, refs = remaining, "strategy detached");

        if remaining == 0 {
            if let Some(handle) = self.analysers.remove(symbol) {
                handle.signal_stop();
                info!(symbol = %symbol, "analyser evicted");
            }
        }
        Ok(true)
    }

    /// Attach a live tick stream to a symbol's analyser and spawn its feeder.
    ///
    /// Must be called inside a tokio runtime. Returns `false` when the symbol
    /// has no analyser or already has a running feeder.
    pub fn feed_price(&mut self, symbol: &str, ticks: mpsc::Receiver<PriceTick>) -> bool {
        let Some(handle) = self.analysers.get_mut(symbol) else {
            return false;
        };
        if handle.feeder.as_ref().is_some_and(|f| !f.is_finished()) {
            return false;
        }
        let stop = handle.stop.subscribe();
        handle.feeder = Some(spawn_feeder(Arc::clone(&handle.analyser), ticks, stop));
        true
    }

    /// Create a bounded tick channel for `symbol` and feed it.
    pub fn subscribe(&mut self, symbol: &str) -> Option<mpsc::Sender<PriceTick>> {
        let (tx, rx) = mpsc::channel(self.settings.feed_buffer);
        self.feed_price(symbol, rx).then_some(tx)
    }

    /// Evaluate every analyser now.
    pub fn tick(&self) -> Vec<Alert> {
        self.tick_at(Utc::now())
    }

    pub fn tick_at(&self, now: DateTime<Utc>) -> Vec<Alert> {
        self.analysers
            .values()
            .flat_map(|h| lock(&h.analyser).evaluate(now))
            .collect()
    }

    /// Route a historical tick; ticks for unknown symbols are dropped.
    pub fn update_past_price(&self, tick: &PriceTick) -> bool {
        match self.analysers.get(&tick.symbol) {
            Some(handle) => lock(&handle.analyser).append_past_price(tick),
            None => false,
        }
    }

    /// Load the history a symbol's analyser is missing. Returns the number
    /// of candles appended.
    pub fn bootstrap_history(
        &self,
        symbol: &str,
        source: &dyn PriceHistoryPort,
    ) -> Result<usize, EngineError> {
        let Some(handle) = self.analysers.get(symbol) else {
            return Ok(0);
        };
        let from = lock(&handle.analyser).need_price_from(Utc::now());
        let ticks = source.fetch_history(symbol, from)?;
        let appended = ticks
            .iter()
            .filter(|tick| tick.symbol == symbol && self.update_past_price(tick))
            .count();
        info!(symbol = %symbol, fetched = ticks.len(), appended, "history loaded");
        Ok(appended)
    }

    /// Stop every feeder and drop all analysers.
    pub fn shutdown(&mut self) {
        for (symbol, handle) in self.analysers.drain() {
            handle.signal_stop();
            debug!(symbol = %symbol, "analyser stopped");
        }
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
