//! Per-symbol price feeder task.
//!
//! The feeder owns the receiving end of a bounded tick channel and a stop
//! receiver. A tick on a new local day opens that day's candle; every tick
//! then updates the last candle. The loop ends when the stop signal fires, its sender is dropped, or
//! the tick channel closes.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::candle::PriceTick;
use crate::engine::{lock, SharedAnalyser};

pub fn spawn_feeder(
    analyser: SharedAnalyser,
    ticks: mpsc::Receiver<PriceTick>,
    stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_feeder(analyser, ticks, stop))
}

pub async fn run_feeder(
    analyser: SharedAnalyser,
    mut ticks: mpsc::Receiver<PriceTick>,
    mut stop: watch::Receiver<bool>,
) {
    let symbol = lock(&analyser).symbol().to_string();
    info!(symbol = %symbol, "feeder started");

    while !*stop.borrow() {
        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() {
                    debug!(symbol = %symbol, "stop sender dropped");
                    break;
                }
            }

            tick = ticks.recv() => {
                let Some(tick) = tick else {
                    debug!(symbol = %symbol, "tick channel closed");
                    break;
                };
                let now = DateTime::from_timestamp(tick.timestamp, 0).unwrap_or_else(Utc::now);
                let mut guard = lock(&analyser);
                if guard.prepare_watching(now) {
                    debug!(symbol = %symbol, timestamp = tick.timestamp, "new trading day");
                }
                guard.watch_price(&tick);
            }
        }
    }

    info!(symbol = %symbol, "feeder stopped");
}
