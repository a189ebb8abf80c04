//! Per-symbol analyser: one candle series plus the strategies watching it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, error};

use crate::domain::candle::{Candle, PriceTick, DAY_SECONDS};
use crate::domain::error::CompileError;
use crate::domain::registry::Registry;
use crate::domain::rule_eval;
use crate::domain::series::{TimeSeries, MAX_CANDLES};
use crate::domain::strategy::{Alert, AlertCallback, CompiledStrategy, Side, Strategy};

/// Result of attaching a compiled strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// The analyser had no strategies before this one.
    pub first: bool,
    /// An existing strategy for the same (user, side) was overwritten.
    pub replaced: bool,
}

#[derive(Debug)]
pub struct Analyser {
    symbol: String,
    timezone: Tz,
    series: TimeSeries,
    strategies: HashMap<String, HashMap<Side, CompiledStrategy>>,
    watching: bool,
}

impl Analyser {
    pub fn new(symbol: impl Into<String>, timezone: Tz) -> Self {
        Self {
            symbol: symbol.into(),
            timezone,
            series: TimeSeries::new(),
            strategies: HashMap::new(),
            watching: false,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.values().map(HashMap::len).sum()
    }

    pub fn has_strategy(&self, user_id: &str, side: Side) -> bool {
        self.strategies
            .get(user_id)
            .is_some_and(|sides| sides.contains_key(&side))
    }

    /// Compile and attach; returns whether this is the analyser's first strategy.
    pub fn append_strategy(
        &mut self,
        strategy: &Strategy,
        callback: AlertCallback,
        registry: &Registry,
    ) -> Result<bool, CompileError> {
        let compiled = strategy.compile(registry, callback)?;
        Ok(self.append_compiled(compiled).first)
    }

    pub fn append_compiled(&mut self, compiled: CompiledStrategy) -> AppendOutcome {
        let first = self.strategies.is_empty();
        let user_id = compiled.user_id.clone();
        let side = compiled.side;
        let replaced = self
            .strategies
            .entry(user_id.clone())
            .or_default()
            .insert(side, compiled)
            .is_some();
        if replaced {
            debug!(symbol = %self.symbol, user_id = %user_id, %side, "strategy overwritten");
        }
        AppendOutcome { first, replaced }
    }

    /// Remove a strategy; returns whether one was present.
    pub fn delete_strategy(&mut self, user_id: &str, side: Side) -> bool {
        let Some(sides) = self.strategies.get_mut(user_id) else {
            return false;
        };
        let removed = sides.remove(&side).is_some();
        if sides.is_empty() {
            self.strategies.remove(user_id);
        }
        removed
    }

    /// Evaluate every strategy at the last candle and fire callbacks.
    ///
    /// A panicking callback is logged and does not stop the others.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let Some(index) = self.series.last_index() else {
            return Vec::new();
        };
        let price = self.series.close(index);
        let mut alerts = Vec::new();

        for (user_id, sides) in &self.strategies {
            for (side, strategy) in sides {
                if !rule_eval::evaluate(&strategy.rule, &self.series, index) {
                    continue;
                }
                let alert = Alert {
                    at: now,
                    price,
                    symbol: self.symbol.clone(),
                    side: *side,
                    user_id: user_id.clone(),
                    repeat: strategy.repeat,
                };
                let callback = &strategy.callback;
                if catch_unwind(AssertUnwindSafe(|| callback(&alert))).is_err() {
                    error!(
                        symbol = %self.symbol,
                        user_id = %user_id,
                        side = %side,
                        "alert callback panicked"
                    );
                }
                alerts.push(alert);
            }
        }
        alerts
    }

    /// Insert a historical candle; stale ticks are ignored.
    pub fn append_past_price(&mut self, tick: &PriceTick) -> bool {
        self.series.append(Candle::from_tick(tick))
    }

    /// Apply a live tick to the current candle.
    pub fn watch_price(&mut self, tick: &PriceTick) {
        self.series.update_last(tick.close, tick.timestamp);
        self.watching = true;
    }

    /// Open today's candle at the last close (or zero on an empty series).
    ///
    /// Returns `false` when a candle for today already exists.
    pub fn prepare_watching(&mut self, now: DateTime<Utc>) -> bool {
        let start = self.day_start(now);
        if self.series.last().is_some_and(|c| c.start >= start) {
            return false;
        }
        let price = self
            .series
            .last()
            .map(|c| c.close)
            .unwrap_or_default();
        debug!(symbol = %self.symbol, start, "opening candle for today");
        self.series.append(Candle::flat(start, DAY_SECONDS, price))
    }

    /// Earliest timestamp the history bootstrap should request.
    pub fn need_price_from(&self, now: DateTime<Utc>) -> i64 {
        self.series
            .need_price_from()
            .unwrap_or_else(|| now.timestamp() - DAY_SECONDS * MAX_CANDLES as i64)
    }

    /// Midnight of `now`'s local date in the analyser's timezone.
    fn day_start(&self, now: DateTime<Utc>) -> i64 {
        let local_date = now.with_timezone(&self.timezone).date_naive();
        local_date
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| self.timezone.from_local_datetime(&midnight).earliest())
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|| now.timestamp() - now.timestamp().rem_euclid(DAY_SECONDS))
    }
}
