//! Bounded candle series.
//!
//! Candles are kept in strictly increasing `start` order. The series holds at
//! most [`MAX_CANDLES`] entries; appending past the cap drops the oldest, so
//! indices are always logical (`0..len`) rather than absolute.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::domain::candle::{Candle, DAY_SECONDS};

pub const MAX_CANDLES: usize = 10_001;

#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    candles: VecDeque<Candle>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// `None` on an empty series.
    pub fn last_index(&self) -> Option<usize> {
        self.candles.len().checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Close price at `index`, zero past the end.
    pub fn close(&self, index: usize) -> Decimal {
        self.candles
            .get(index)
            .map(|c| c.close)
            .unwrap_or(Decimal::ZERO)
    }

    /// Push a newer candle or overwrite the last one with the same start.
    ///
    /// Returns `true` only when the series grew by a new period. Candles that
    /// start before the current last candle are ignored.
    pub fn append(&mut self, candle: Candle) -> bool {
        match self.candles.back_mut() {
            Some(last) if candle.start < last.start => false,
            Some(last) if candle.start == last.start => {
                *last = candle;
                false
            }
            _ => {
                self.candles.push_back(candle);
                while self.candles.len() > MAX_CANDLES {
                    self.candles.pop_front();
                }
                true
            }
        }
    }

    /// Apply a live price to the last candle.
    pub fn update_last(&mut self, close: Decimal, end: i64) {
        if let Some(last) = self.candles.back_mut() {
            last.set_close(close);
            last.end = end.max(last.start);
        }
    }

    /// Earliest timestamp worth fetching to fill the series behind its last candle.
    pub fn need_price_from(&self) -> Option<i64> {
        self.last()
            .map(|c| c.start.saturating_sub(DAY_SECONDS * MAX_CANDLES as i64))
    }
}
