//! OHLCV candle and the raw price tuple it is built from.

use rust_decimal::Decimal;

/// Length of a daily candle in seconds.
pub const DAY_SECONDS: i64 = 86_400;

/// One price observation as delivered by a feed or a history source.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub symbol: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    /// Period start, unix seconds.
    pub start: i64,
    /// Period end, unix seconds.
    pub end: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn new(
        start: i64,
        duration: i64,
        open: Decimal,
        close: Decimal,
        high: Decimal,
        low: Decimal,
        volume: Decimal,
    ) -> Self {
        let mut candle = Self {
            start,
            end: start.saturating_add(duration),
            open,
            close,
            high,
            low,
            volume,
        };
        candle.normalize();
        candle
    }

    /// A daily candle covering the tick's timestamp.
    pub fn from_tick(tick: &PriceTick) -> Self {
        Self::new(
            tick.timestamp,
            DAY_SECONDS,
            tick.open,
            tick.close,
            tick.high,
            tick.low,
            tick.volume,
        )
    }

    /// A zero-volume candle pinned at `price`.
    pub fn flat(start: i64, duration: i64, price: Decimal) -> Self {
        Self::new(start, duration, price, price, price, price, Decimal::ZERO)
    }

    pub fn duration(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> Decimal {
        self.high
            .saturating_add(self.low)
            .saturating_add(self.close)
            / Decimal::from(3)
    }

    /// Widen high/low to cover open and close, clamp volume at zero.
    fn normalize(&mut self) {
        self.high = self.high.max(self.open).max(self.close);
        self.low = self.low.min(self.open).min(self.close);
        if self.volume.is_sign_negative() {
            self.volume = Decimal::ZERO;
        }
    }

    /// Move the close to `price`, keeping the high/low envelope valid.
    pub(crate) fn set_close(&mut self, price: Decimal) {
        self.close = price;
        self.normalize();
    }
}
