//! MACD (Moving Average Convergence Divergence) on close prices.
//!
//! MACD Line = EMA(short) - EMA(long)
//! Histogram = MACD Line - EMA(signal) of MACD Line
//!
//! All averages are advanced together in one pass over the series.

use rust_decimal::Decimal;

use crate::domain::indicator::ema::Ema;
use crate::domain::series::TimeSeries;

pub fn macd_at(series: &TimeSeries, short: usize, long: usize, index: usize) -> Decimal {
    if index >= series.len() {
        return Decimal::ZERO;
    }

    let mut fast = Ema::new(short);
    let mut slow = Ema::new(long);
    let mut line = Decimal::ZERO;
    for j in 0..=index {
        let close = series.close(j);
        line = fast.push(close).saturating_sub(slow.push(close));
    }
    line
}

pub fn macd_histogram_at(
    series: &TimeSeries,
    short: usize,
    long: usize,
    signal: usize,
    index: usize,
) -> Decimal {
    if index >= series.len() {
        return Decimal::ZERO;
    }

    let mut fast = Ema::new(short);
    let mut slow = Ema::new(long);
    let mut signal_ema = Ema::new(signal);
    let mut line = Decimal::ZERO;
    let mut signal_line = Decimal::ZERO;
    for j in 0..=index {
        let close = series.close(j);
        line = fast.push(close).saturating_sub(slow.push(close));
        signal_line = signal_ema.push(line);
    }
    line.saturating_sub(signal_line)
}
