//! Streaming exponential moving average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n values, then
//! EMA[i] = EMA[i-1] + k * (X[i] - EMA[i-1]).
//! During warmup the value is the mean of the inputs seen so far, so the
//! curve is continuous into the seed.

use rust_decimal::Decimal;

use crate::domain::series::TimeSeries;

#[derive(Debug, Clone)]
pub struct Ema {
    window: usize,
    k: Decimal,
    seen: usize,
    sum: Decimal,
    value: Decimal,
}

impl Ema {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            k: Decimal::TWO / Decimal::from(window.saturating_add(1)),
            seen: 0,
            sum: Decimal::ZERO,
            value: Decimal::ZERO,
        }
    }

    /// Feed the next input and return the updated average.
    pub fn push(&mut self, x: Decimal) -> Decimal {
        self.seen += 1;
        if self.seen <= self.window {
            self.sum = self.sum.saturating_add(x);
            self.value = self.sum / Decimal::from(self.seen);
        } else {
            self.value = self
                .value
                .saturating_add(x.saturating_sub(self.value).saturating_mul(self.k));
        }
        self.value
    }

    pub fn value(&self) -> Decimal {
        self.value
    }
}

/// EMA of close prices at `index`.
pub fn ema_of_close(series: &TimeSeries, window: usize, index: usize) -> Decimal {
    let mut ema = Ema::new(window);
    for j in 0..=index.min(series.len().saturating_sub(1)) {
        ema.push(series.close(j));
    }
    ema.value()
}
