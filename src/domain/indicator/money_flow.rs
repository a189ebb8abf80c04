//! Money flow index.
//!
//! Typical price T = (high + low + close) / 3 over the last `window + 1`
//! candles. Raw flow T * volume goes into the positive bucket when T rose
//! against the previous candle and into the negative bucket when it fell.
//! MFI = 100 * positive / (positive + negative); 100 until `window + 1`
//! candles precede the index, and 100 whenever the negative bucket is empty.

use rust_decimal::Decimal;

use crate::domain::series::TimeSeries;

pub fn money_flow_at(series: &TimeSeries, window: usize, index: usize) -> Decimal {
    if index >= series.len() {
        return Decimal::ZERO;
    }
    if index < window.saturating_add(1) {
        return Decimal::ONE_HUNDRED;
    }

    let mut positive = Decimal::ZERO;
    let mut negative = Decimal::ZERO;
    let mut prev_typical = match series.get(index - window) {
        Some(c) => c.typical_price(),
        None => return Decimal::ONE_HUNDRED,
    };

    for candle in series.iter().skip(index - window + 1).take(window) {
        let typical = candle.typical_price();
        let flow = typical.saturating_mul(candle.volume);
        if typical > prev_typical {
            positive = positive.saturating_add(flow);
        } else if typical < prev_typical {
            negative = negative.saturating_add(flow);
        }
        prev_typical = typical;
    }

    if negative.is_zero() {
        return Decimal::ONE_HUNDRED;
    }
    Decimal::ONE_HUNDRED
        .saturating_mul(positive)
        .checked_div(positive.saturating_add(negative))
        .unwrap_or(Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{Candle, DAY_SECONDS};
    use rust_decimal_macros::dec;

    fn make_series(bars: &[(Decimal, Decimal)]) -> TimeSeries {
        let mut series = TimeSeries::new();
        for (i, &(close, volume)) in bars.iter().enumerate() {
            series.append(Candle::new(
                i as i64 * DAY_SECONDS,
                DAY_SECONDS,
                close,
                close,
                close,
                close,
                volume,
            ));
        }
        series
    }

    #[test]
    fn warmup_is_one_hundred() {
        let series = make_series(&[(dec!(10), dec!(1)), (dec!(9), dec!(1)), (dec!(8), dec!(1))]);
        assert_eq!(money_flow_at(&series, 2, 0), dec!(100));
        assert_eq!(money_flow_at(&series, 2, 1), dec!(100));
        assert_eq!(money_flow_at(&series, 2, 2), dec!(100));
    }

    #[test]
    fn no_negative_flow_is_one_hundred() {
        let series = make_series(&[
            (dec!(10), dec!(1)),
            (dec!(11), dec!(1)),
            (dec!(12), dec!(1)),
            (dec!(13), dec!(1)),
        ]);
        assert_eq!(money_flow_at(&series, 2, 3), dec!(100));
    }

    #[test]
    fn mixed_flow() {
        // window 2 at index 3: steps 1->2 (+12*2), 2->3 (-11*4)
        let series = make_series(&[
            (dec!(10), dec!(1)),
            (dec!(10), dec!(1)),
            (dec!(12), dec!(2)),
            (dec!(11), dec!(4)),
        ]);
        let positive = dec!(24);
        let negative = dec!(44);
        let expected = dec!(100) * positive / (positive + negative);
        assert_eq!(money_flow_at(&series, 2, 3), expected);
    }

    #[test]
    fn all_negative_is_zero() {
        let series = make_series(&[
            (dec!(13), dec!(1)),
            (dec!(12), dec!(1)),
            (dec!(11), dec!(1)),
            (dec!(10), dec!(1)),
        ]);
        assert_eq!(money_flow_at(&series, 2, 3), Decimal::ZERO);
    }

    #[test]
    fn huge_window_is_warmup() {
        let series = make_series(&[(dec!(10), dec!(1)), (dec!(9), dec!(1))]);
        assert_eq!(money_flow_at(&series, usize::MAX, 1), dec!(100));
    }
}
