#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use samalert::domain::candle::{Candle, PriceTick, DAY_SECONDS};
use samalert::domain::series::TimeSeries;
use samalert::domain::strategy::{Alert, AlertCallback};

/// Close price of the synthetic series at `i`: `100 + 5 sin(i / 8)`.
pub fn sine_close(i: usize) -> Decimal {
    let x = 100.0 + 5.0 * (i as f64 / 8.0).sin();
    Decimal::try_from(x).unwrap().round_dp(6)
}

/// Daily candles following [`sine_close`], starting at the epoch.
pub fn sine_candles(len: usize) -> Vec<Candle> {
    (0..len)
        .map(|i| {
            let close = sine_close(i);
            let open = if i == 0 { close } else { sine_close(i - 1) };
            Candle::new(
                i as i64 * DAY_SECONDS,
                DAY_SECONDS,
                open,
                close,
                open.max(close) + Decimal::ONE,
                open.min(close) - Decimal::ONE,
                Decimal::from(1000 + (i % 7) * 100),
            )
        })
        .collect()
}

pub fn sine_series(len: usize) -> TimeSeries {
    let mut series = TimeSeries::new();
    for candle in sine_candles(len) {
        series.append(candle);
    }
    series
}

pub fn tick(symbol: &str, timestamp: i64, close: Decimal) -> PriceTick {
    PriceTick {
        symbol: symbol.to_string(),
        timestamp,
        open: close,
        close,
        high: close,
        low: close,
        volume: Decimal::from(100),
    }
}

pub fn noop_callback() -> AlertCallback {
    Arc::new(|_: &Alert| {})
}

/// Callback that counts invocations.
pub fn counting_callback() -> (AlertCallback, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let callback: AlertCallback = Arc::new(move |_: &Alert| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (callback, count)
}

/// Callback that records every alert it receives.
pub fn recording_callback() -> (AlertCallback, Arc<Mutex<Vec<Alert>>>) {
    let alerts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&alerts);
    let callback: AlertCallback = Arc::new(move |alert: &Alert| {
        sink.lock().unwrap().push(alert.clone());
    });
    (callback, alerts)
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
