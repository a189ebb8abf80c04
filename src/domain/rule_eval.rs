//! Rule evaluation.
//!
//! # Evaluation Semantics
//!
//! - Comparisons evaluate both indicators at the same index and compare the
//!   difference `d = lhs - rhs` against `EPSILON`:
//!   - `==`: `|d| < EPSILON`
//!   - `<` / `>`: `d` has the wanted sign and `|d| >= EPSILON`
//!   - `<=` / `>=`: `d` has the wanted sign or `|d| < EPSILON`
//! - `&&` / `||` evaluate both sides.
//! - An index past the end of the series is never true.

use rust_decimal::Decimal;

use crate::domain::rule::{Comparator, Rule};
use crate::domain::series::TimeSeries;

/// 1e-9
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

pub fn evaluate(rule: &Rule, series: &TimeSeries, index: usize) -> bool {
    if index >= series.len() {
        return false;
    }
    eval_at(rule, series, index)
}

fn eval_at(rule: &Rule, series: &TimeSeries, index: usize) -> bool {
    match rule {
        Rule::Compare { op, lhs, rhs } => {
            let diff = lhs
                .calculate(series, index)
                .saturating_sub(rhs.calculate(series, index));
            compare(*op, diff)
        }
        Rule::And(lhs, rhs) => {
            let left = eval_at(lhs, series, index);
            let right = eval_at(rhs, series, index);
            left && right
        }
        Rule::Or(lhs, rhs) => {
            let left = eval_at(lhs, series, index);
            let right = eval_at(rhs, series, index);
            left || right
        }
    }
}

/// Compare a difference `lhs - rhs` against zero with tolerance.
pub fn compare(op: Comparator, diff: Decimal) -> bool {
    let equal = diff.abs() < EPSILON;
    match op {
        Comparator::Eq => equal,
        Comparator::Lt => diff <= -EPSILON,
        Comparator::Gt => diff >= EPSILON,
        Comparator::Le => diff.is_sign_negative() || equal,
        Comparator::Ge => diff.is_sign_positive() || equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{Candle, DAY_SECONDS};
    use crate::domain::compiler::compile;
    use crate::domain::indicator::Indicator;
    use crate::domain::registry::Registry;
    use crate::domain::rule::Logical;
    use rust_decimal_macros::dec;

    fn make_series(prices: &[Decimal]) -> TimeSeries {
        let mut series = TimeSeries::new();
        for (i, &p) in prices.iter().enumerate() {
            series.append(Candle::flat(i as i64 * DAY_SECONDS, DAY_SECONDS, p));
        }
        series
    }

    fn close_vs(op: Comparator, level: Decimal) -> Rule {
        Rule::compare(op, Indicator::ClosePrice, Indicator::Constant(level))
    }

    #[test]
    fn epsilon_is_one_nano() {
        assert_eq!(EPSILON, dec!(0.000000001));
    }

    #[test]
    fn strict_comparisons() {
        let series = make_series(&[dec!(100)]);
        assert!(evaluate(&close_vs(Comparator::Gt, dec!(99)), &series, 0));
        assert!(!evaluate(&close_vs(Comparator::Gt, dec!(100)), &series, 0));
        assert!(evaluate(&close_vs(Comparator::Lt, dec!(101)), &series, 0));
        assert!(!evaluate(&close_vs(Comparator::Lt, dec!(100)), &series, 0));
    }

    #[test]
    fn within_epsilon_is_equal_not_ordered() {
        let series = make_series(&[dec!(100.0000000001)]);
        assert!(evaluate(&close_vs(Comparator::Eq, dec!(100)), &series, 0));
        assert!(!evaluate(&close_vs(Comparator::Gt, dec!(100)), &series, 0));
        assert!(evaluate(&close_vs(Comparator::Ge, dec!(100)), &series, 0));
        assert!(evaluate(&close_vs(Comparator::Le, dec!(100)), &series, 0));
    }

    #[test]
    fn non_strict_comparisons() {
        let series = make_series(&[dec!(100)]);
        assert!(evaluate(&close_vs(Comparator::Le, dec!(100)), &series, 0));
        assert!(evaluate(&close_vs(Comparator::Ge, dec!(100)), &series, 0));
        assert!(evaluate(&close_vs(Comparator::Le, dec!(200)), &series, 0));
        assert!(!evaluate(&close_vs(Comparator::Ge, dec!(200)), &series, 0));
    }

    #[test]
    fn and_or() {
        let series = make_series(&[dec!(100)]);
        let yes = || close_vs(Comparator::Gt, dec!(50));
        let no = || close_vs(Comparator::Lt, dec!(50));
        assert!(evaluate(&Rule::combine(Logical::And, yes(), yes()), &series, 0));
        assert!(!evaluate(&Rule::combine(Logical::And, yes(), no()), &series, 0));
        assert!(evaluate(&Rule::combine(Logical::Or, no(), yes()), &series, 0));
        assert!(!evaluate(&Rule::combine(Logical::Or, no(), no()), &series, 0));
    }

    #[test]
    fn past_end_is_false() {
        let series = make_series(&[dec!(100)]);
        assert!(!evaluate(&close_vs(Comparator::Lt, dec!(1000)), &series, 1));
        assert!(!evaluate(&close_vs(Comparator::Lt, dec!(1000)), &TimeSeries::new(), 0));
    }

    #[test]
    fn compare_zero_difference() {
        for op in [Comparator::Eq, Comparator::Le, Comparator::Ge] {
            assert!(compare(op, Decimal::ZERO), "{}", op);
        }
        for op in [Comparator::Lt, Comparator::Gt] {
            assert!(!compare(op, Decimal::ZERO), "{}", op);
        }
    }

    #[test]
    fn epsilon_boundary() {
        let half = EPSILON / Decimal::TWO;
        assert!(!compare(Comparator::Eq, EPSILON));
        assert!(compare(Comparator::Eq, half));
        assert!(compare(Comparator::Gt, EPSILON));
        assert!(!compare(Comparator::Gt, half));
        assert!(compare(Comparator::Lt, -EPSILON));
        assert!(!compare(Comparator::Lt, -half));
    }

    #[test]
    fn epsilon_boundary_through_compiled_rule() {
        let registry = Registry::standard();
        let eq = compile("close == 100", &registry).unwrap();
        let gt = compile("close > 100", &registry).unwrap();

        let at_epsilon = make_series(&[dec!(100.000000001)]);
        assert!(!evaluate(&eq, &at_epsilon, 0));
        assert!(evaluate(&gt, &at_epsilon, 0));

        let at_half = make_series(&[dec!(100.0000000005)]);
        assert!(evaluate(&eq, &at_half, 0));
        assert!(!evaluate(&gt, &at_half, 0));
    }
}
