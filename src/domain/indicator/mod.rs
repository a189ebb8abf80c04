//! Indicator algebra.
//!
//! An `Indicator` maps `(series, index)` to a `Decimal`. Indicators are a
//! closed tree: leaves read the candle series, inner nodes combine or
//! transform their children. Evaluation is pure; every call recomputes from
//! the series it is given.

pub mod ema;
pub mod extrema;
pub mod macd;
pub mod money_flow;
pub mod rsi;

use std::fmt;

use rust_decimal::{Decimal, MathematicalOps};

use crate::domain::series::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Plus,
    Minus,
    Mul,
    Div,
    Pow,
}

impl ArithmeticOp {
    /// Saturating on overflow; division by zero and undefined powers are zero.
    pub fn apply(self, lhs: Decimal, rhs: Decimal) -> Decimal {
        match self {
            ArithmeticOp::Plus => lhs.saturating_add(rhs),
            ArithmeticOp::Minus => lhs.saturating_sub(rhs),
            ArithmeticOp::Mul => lhs.saturating_mul(rhs),
            ArithmeticOp::Div => lhs.checked_div(rhs).unwrap_or(Decimal::ZERO),
            ArithmeticOp::Pow => lhs.checked_powd(rhs).unwrap_or(Decimal::ZERO),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Pow => "**",
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Indicator {
    Constant(Decimal),
    ClosePrice,
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Indicator>,
        rhs: Box<Indicator>,
    },
    Negate(Box<Indicator>),
    Macd {
        short: usize,
        long: usize,
    },
    MacdHistogram {
        short: usize,
        long: usize,
        signal: usize,
    },
    Rsi(usize),
    MoneyFlow(usize),
    /// base(i) - base(i - lag)
    Increase {
        base: Box<Indicator>,
        lag: usize,
    },
    Extrema {
        base: Box<Indicator>,
        lag: usize,
        samples: usize,
    },
    Zero {
        base: Box<Indicator>,
        lag: usize,
        samples: usize,
    },
}

impl Indicator {
    pub fn arithmetic(op: ArithmeticOp, lhs: Indicator, rhs: Indicator) -> Self {
        Indicator::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn calculate(&self, series: &TimeSeries, index: usize) -> Decimal {
        match self {
            Indicator::Constant(value) => *value,
            Indicator::ClosePrice => series.close(index),
            Indicator::Arithmetic { op, lhs, rhs } => {
                op.apply(lhs.calculate(series, index), rhs.calculate(series, index))
            }
            Indicator::Negate(inner) => -inner.calculate(series, index),
            Indicator::Macd { short, long } => macd::macd_at(series, *short, *long, index),
            Indicator::MacdHistogram {
                short,
                long,
                signal,
            } => macd::macd_histogram_at(series, *short, *long, *signal, index),
            Indicator::Rsi(window) => rsi::rsi_at(series, *window, index),
            Indicator::MoneyFlow(window) => money_flow::money_flow_at(series, *window, index),
            Indicator::Increase { base, lag } => match index.checked_sub(*lag) {
                Some(prev) => base
                    .calculate(series, index)
                    .saturating_sub(base.calculate(series, prev)),
                None => Decimal::ZERO,
            },
            Indicator::Extrema { base, lag, samples } => {
                extrema::local_extrema_at(base, series, index, *lag, *samples)
            }
            Indicator::Zero { base, lag, samples } => {
                extrema::zero_crossing_at(base, series, index, *lag, *samples)
            }
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Constant(value) => write!(f, "{}", value.normalize()),
            Indicator::ClosePrice => write!(f, "close"),
            Indicator::Arithmetic { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Indicator::Negate(inner) => write!(f, "-{}", inner),
            Indicator::Macd { short, long } => write!(f, "macd({},{})", short, long),
            Indicator::MacdHistogram {
                short,
                long,
                signal,
            } => write!(f, "macdhist({},{},{})", short, long, signal),
            Indicator::Rsi(window) => write!(f, "rsi({})", window),
            Indicator::MoneyFlow(window) => write!(f, "moneyflow({})", window),
            Indicator::Increase { base, lag } => write!(f, "increase({},{})", base, lag),
            Indicator::Extrema { base, lag, samples } => {
                write!(f, "extrema({},{},{})", base, lag, samples)
            }
            Indicator::Zero { base, lag, samples } => {
                write!(f, "zero({},{},{})", base, lag, samples)
            }
        }
    }
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
    fn constant_ignores_series() {
        let series = TimeSeries::new();
        assert_eq!(Indicator::Constant(dec!(3.5)).calculate(&series, 10), dec!(3.5));
    }

    #[test]
    fn close_reads_series() {
        let series = make_series(&[dec!(1), dec!(2), dec!(3)]);
        assert_eq!(Indicator::ClosePrice.calculate(&series, 1), dec!(2));
        assert_eq!(Indicator::ClosePrice.calculate(&series, 7), Decimal::ZERO);
    }

    #[test]
    fn arithmetic_ops() {
        let series = make_series(&[dec!(10)]);
        let close = || Indicator::ClosePrice;
        let two = || Indicator::Constant(dec!(2));
        let cases = [
            (ArithmeticOp::Plus, dec!(12)),
            (ArithmeticOp::Minus, dec!(8)),
            (ArithmeticOp::Mul, dec!(20)),
            (ArithmeticOp::Div, dec!(5)),
            (ArithmeticOp::Pow, dec!(100)),
        ];
        for (op, expected) in cases {
            let value = Indicator::arithmetic(op, close(), two()).calculate(&series, 0);
            assert_eq!(value, expected, "{}", op);
        }
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(ArithmeticOp::Div.apply(dec!(7), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn overflow_saturates() {
        assert_eq!(ArithmeticOp::Plus.apply(Decimal::MAX, dec!(1)), Decimal::MAX);
        assert_eq!(ArithmeticOp::Mul.apply(Decimal::MAX, dec!(-2)), Decimal::MIN);
    }

    #[test]
    fn negate_flips_sign() {
        let series = make_series(&[dec!(4)]);
        let neg = Indicator::Negate(Box::new(Indicator::ClosePrice));
        assert_eq!(neg.calculate(&series, 0), dec!(-4));
    }

    #[test]
    fn increase_is_lagged_difference() {
        let series = make_series(&[dec!(10), dec!(13), dec!(11), dec!(20)]);
        let inc = Indicator::Increase {
            base: Box::new(Indicator::ClosePrice),
            lag: 2,
        };
        assert_eq!(inc.calculate(&series, 0), Decimal::ZERO);
        assert_eq!(inc.calculate(&series, 1), Decimal::ZERO);
        assert_eq!(inc.calculate(&series, 2), dec!(1));
        assert_eq!(inc.calculate(&series, 3), dec!(7));
    }

    #[test]
    fn display_is_readable() {
        let ind = Indicator::arithmetic(
            ArithmeticOp::Minus,
            Indicator::Rsi(14),
            Indicator::Constant(dec!(30.0)),
        );
        assert_eq!(ind.to_string(), "(rsi(14) - 30)");
        let inc = Indicator::Increase {
            base: Box::new(Indicator::ClosePrice),
            lag: 3,
        };
        assert_eq!(inc.to_string(), "increase(close,3)");
    }
}
