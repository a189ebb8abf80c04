//! RSI (Relative Strength Index) on close prices.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100. With no price change yet (index 0): 50.

use rust_decimal::Decimal;

use crate::domain::series::TimeSeries;

pub fn rsi_at(series: &TimeSeries, window: usize, index: usize) -> Decimal {
    if index >= series.len() {
        return Decimal::ZERO;
    }
    if index == 0 || window == 0 {
        return Decimal::from(50);
    }

    let period = Decimal::from(window);
    let mut avg_gain = Decimal::ZERO;
    let mut avg_loss = Decimal::ZERO;

    for j in 1..=index {
        let change = series.close(j).saturating_sub(series.close(j - 1));
        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);

        if j <= window {
            let n = Decimal::from(j);
            avg_gain = wilder(avg_gain, gain, n);
            avg_loss = wilder(avg_loss, loss, n);
        } else {
            avg_gain = wilder(avg_gain, gain, period);
            avg_loss = wilder(avg_loss, loss, period);
        }
    }

    if avg_loss.is_zero() {
        return Decimal::ONE_HUNDRED;
    }
    match avg_gain.checked_div(avg_loss) {
        Some(ratio) => {
            Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / Decimal::ONE.saturating_add(ratio)
        }
        None => Decimal::ONE_HUNDRED,
    }
}

/// (prev * (n-1) + current) / n
fn wilder(prev: Decimal, current: Decimal, n: Decimal) -> Decimal {
    prev.saturating_mul(n - Decimal::ONE).saturating_add(current) / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{Candle, DAY_SECONDS};
    use rust_decimal_macros::dec;

    fn make_series(prices: &[Decimal]) -> TimeSeries {
        let mut series = TimeSeries::new();
        for (i, &p) in prices.iter().enumerate() {
            series.append(Candle::flat(i as i64 * DAY_SECONDS, DAY_SECONDS, p));
        }
        series
    }

    #[test]
    fn rsi_first_index_is_neutral() {
        let series = make_series(&[dec!(100)]);
        assert_eq!(rsi_at(&series, 14, 0), dec!(50));
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let prices: Vec<Decimal> = (0..15).map(|i| Decimal::from(100 + i)).collect();
        let series = make_series(&prices);
        assert_eq!(rsi_at(&series, 14, 14), dec!(100));
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let prices: Vec<Decimal> = (0..15).map(|i| Decimal::from(100 - i)).collect();
        let series = make_series(&prices);
        assert_eq!(rsi_at(&series, 14, 14), Decimal::ZERO);
    }

    #[test]
    fn rsi_simple_mean_seed() {
        // changes: +2, -1 -> avg_gain = 1, avg_loss = 0.5, rs = 2, rsi = 66.66...
        let series = make_series(&[dec!(10), dec!(12), dec!(11)]);
        let rsi = rsi_at(&series, 2, 2);
        let expected = dec!(100) - dec!(100) / dec!(3);
        assert!((rsi - expected).abs() < dec!(0.0000001));
    }

    #[test]
    fn rsi_wilder_smoothing_after_seed() {
        // seed over 2 changes: gain 1, loss 0.5; third change -3:
        // gain = (1*1 + 0)/2 = 0.5, loss = (0.5*1 + 3)/2 = 1.75
        let series = make_series(&[dec!(10), dec!(12), dec!(11), dec!(8)]);
        let rsi = rsi_at(&series, 2, 3);
        let expected = dec!(100) - dec!(100) / (dec!(1) + dec!(0.5) / dec!(1.75));
        assert!((rsi - expected).abs() < dec!(0.0000001));
    }

    #[test]
    fn rsi_in_range() {
        let prices: Vec<Decimal> = (1..=40)
            .map(|i| Decimal::from(100 + (i % 7) * 2 - 6))
            .collect();
        let series = make_series(&prices);
        for i in 0..series.len() {
            let rsi = rsi_at(&series, 14, i);
            assert!(rsi >= Decimal::ZERO && rsi <= dec!(100), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_past_end_is_zero() {
        let series = make_series(&[dec!(1), dec!(2)]);
        assert_eq!(rsi_at(&series, 14, 5), Decimal::ZERO);
    }

    #[test]
    fn extreme_prices_do_not_overflow() {
        let series = make_series(&[Decimal::MIN, Decimal::MAX, Decimal::MIN, Decimal::MAX]);
        for i in 0..4 {
            let value = rsi_at(&series, 2, i);
            assert!(value >= Decimal::ZERO && value <= dec!(100), "{value}");
        }
    }
}
