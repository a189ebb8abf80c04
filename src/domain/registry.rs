//! Name → constructor tables used by the expression compiler.
//!
//! Function names are matched case-insensitively. Each factory receives the
//! already-evaluated arguments and validates their kind and domain; arity is
//! checked by [`Registry::build`] before the factory runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::error::CompileError;
use crate::domain::indicator::{ArithmeticOp, Indicator};
use crate::domain::rule::{Comparator, Logical, Rule};
use crate::domain::series::MAX_CANDLES;

/// A compile-time value: either a bare number or an indicator tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(Decimal),
    Indicator(Indicator),
}

impl Operand {
    /// Scalars become constant indicators.
    pub fn into_indicator(self) -> Indicator {
        match self {
            Operand::Scalar(value) => Indicator::Constant(value),
            Operand::Indicator(indicator) => indicator,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Scalar(value) => write!(f, "{}", value.normalize()),
            Operand::Indicator(indicator) => write!(f, "{}", indicator),
        }
    }
}

pub type IndicatorFactory =
    Box<dyn Fn(&str, Vec<Operand>) -> Result<Indicator, CompileError> + Send + Sync>;

pub struct FunctionEntry {
    pub arity: usize,
    factory: IndicatorFactory,
}

pub struct Registry {
    functions: HashMap<String, FunctionEntry>,
    modifiers: HashMap<&'static str, ArithmeticOp>,
    comparators: HashMap<&'static str, Comparator>,
    logicals: HashMap<&'static str, Logical>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
            modifiers: HashMap::new(),
            comparators: HashMap::new(),
            logicals: HashMap::new(),
        }
    }

    /// The built-in indicator and rule tables.
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        registry.register_function(&["close", "price", "closeprice"], 0, |_, _| {
            Ok(Indicator::ClosePrice)
        });

        registry.register_function(&["rsi"], 1, |name, args| {
            let mut args = args.into_iter();
            let window = whole(name, 1, args.next(), 1)?;
            Ok(Indicator::Rsi(window))
        });

        registry.register_function(&["macd"], 2, |name, args| {
            let mut args = args.into_iter();
            let short = whole(name, 1, args.next(), 1)?;
            let long = whole(name, 2, args.next(), 1)?;
            Ok(Indicator::Macd { short, long })
        });

        registry.register_function(&["macdhist", "macdoscillator"], 3, |name, args| {
            let mut args = args.into_iter();
            let short = whole(name, 1, args.next(), 1)?;
            let long = whole(name, 2, args.next(), 1)?;
            let signal = whole(name, 3, args.next(), 1)?;
            Ok(Indicator::MacdHistogram {
                short,
                long,
                signal,
            })
        });

        registry.register_function(&["moneyflow", "mflow", "moneyflowindex"], 1, |name, args| {
            let mut args = args.into_iter();
            let window = whole(name, 1, args.next(), 1)?;
            Ok(Indicator::MoneyFlow(window))
        });

        registry.register_function(&["increase"], 2, |name, args| {
            let mut args = args.into_iter();
            let base = indicator(name, 1, args.next())?;
            let lag = whole(name, 2, args.next(), 1)?;
            Ok(Indicator::Increase {
                base: Box::new(base),
                lag,
            })
        });

        registry.register_function(&["extrema"], 3, |name, args| {
            let mut args = args.into_iter();
            let base = indicator(name, 1, args.next())?;
            let lag = whole(name, 2, args.next(), 1)?;
            let samples = whole(name, 3, args.next(), 4)?;
            Ok(Indicator::Extrema {
                base: Box::new(base),
                lag,
                samples,
            })
        });

        registry.register_function(&["zero", "iszero"], 3, |name, args| {
            let mut args = args.into_iter();
            let base = indicator(name, 1, args.next())?;
            let lag = whole(name, 2, args.next(), 1)?;
            let samples = whole(name, 3, args.next(), 4)?;
            Ok(Indicator::Zero {
                base: Box::new(base),
                lag,
                samples,
            })
        });

        for (symbol, op) in [
            ("+", ArithmeticOp::Plus),
            ("-", ArithmeticOp::Minus),
            ("*", ArithmeticOp::Mul),
            ("×", ArithmeticOp::Mul),
            ("/", ArithmeticOp::Div),
            ("÷", ArithmeticOp::Div),
            ("**", ArithmeticOp::Pow),
        ] {
            registry.modifiers.insert(symbol, op);
        }

        for (symbol, op) in [
            ("<", Comparator::Lt),
            ("<=", Comparator::Le),
            ("≤", Comparator::Le),
            (">", Comparator::Gt),
            (">=", Comparator::Ge),
            ("≥", Comparator::Ge),
            ("=", Comparator::Eq),
            ("==", Comparator::Eq),
        ] {
            registry.comparators.insert(symbol, op);
        }

        registry.logicals.insert("&&", Logical::And);
        registry.logicals.insert("||", Logical::Or);

        registry
    }

    /// Shared standard registry, built on first use.
    pub fn global() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(Registry::standard)
    }

    /// Register an indicator factory under one or more names.
    pub fn register_function<F>(&mut self, names: &[&str], arity: usize, factory: F)
    where
        F: Fn(&str, Vec<Operand>) -> Result<Indicator, CompileError> + Send + Sync + Clone + 'static,
    {
        for name in names {
            let key = name.to_lowercase();
            if self.functions.contains_key(&key) {
                debug!(name = %key, "replacing registered function");
            }
            self.functions.insert(
                key,
                FunctionEntry {
                    arity,
                    factory: Box::new(factory.clone()),
                },
            );
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn modifier(&self, symbol: &str) -> Option<ArithmeticOp> {
        self.modifiers.get(symbol).copied()
    }

    pub fn comparator(&self, symbol: &str) -> Option<Comparator> {
        self.comparators.get(symbol).copied()
    }

    pub fn logical(&self, symbol: &str) -> Option<Logical> {
        self.logicals.get(symbol).copied()
    }

    /// Check arity and construct the named indicator.
    pub fn build(&self, name: &str, args: Vec<Operand>) -> Result<Indicator, CompileError> {
        let entry = self
            .function(name)
            .ok_or_else(|| CompileError::UnknownFunction {
                name: name.to_string(),
                position: 0,
            })?;
        if args.len() != entry.arity {
            return Err(CompileError::BadArity {
                name: name.to_string(),
                expected: entry.arity,
                found: args.len(),
            });
        }
        (entry.factory)(name, args)
    }

    /// Arithmetic node; scalar-only operands fold to a scalar.
    pub fn arithmetic(&self, op: ArithmeticOp, lhs: Operand, rhs: Operand) -> Operand {
        match (lhs, rhs) {
            (Operand::Scalar(a), Operand::Scalar(b)) => Operand::Scalar(op.apply(a, b)),
            (lhs, rhs) => Operand::Indicator(Indicator::arithmetic(
                op,
                lhs.into_indicator(),
                rhs.into_indicator(),
            )),
        }
    }

    pub fn comparison(&self, op: Comparator, lhs: Operand, rhs: Operand) -> Rule {
        Rule::compare(op, lhs.into_indicator(), rhs.into_indicator())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Whole number in `min..=MAX_CANDLES` at 1-based argument `index`.
fn whole(
    name: &str,
    index: usize,
    arg: Option<Operand>,
    min: usize,
) -> Result<usize, CompileError> {
    let value = match arg {
        Some(Operand::Scalar(value)) => value,
        _ => {
            return Err(CompileError::BadType {
                name: name.to_string(),
                index,
                expected: "a number",
            });
        }
    };
    if !value.fract().is_zero() {
        return Err(CompileError::BadDomain {
            name: name.to_string(),
            reason: format!("argument {} must be a whole number, got {}", index, value),
        });
    }
    match value.to_usize() {
        Some(n) if (min..=MAX_CANDLES).contains(&n) => Ok(n),
        _ => Err(CompileError::BadDomain {
            name: name.to_string(),
            reason: format!(
                "argument {} must be between {} and {}, got {}",
                index,
                min,
                MAX_CANDLES,
                value.normalize()
            ),
        }),
    }
}

fn indicator(name: &str, index: usize, arg: Option<Operand>) -> Result<Indicator, CompileError> {
    match arg {
        Some(Operand::Indicator(indicator)) => Ok(indicator),
        _ => Err(CompileError::BadType {
            name: name.to_string(),
            index,
            expected: "an indicator",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn scalar(v: Decimal) -> Operand {
        Operand::Scalar(v)
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = Registry::standard();
        assert!(registry.function("RSI").is_some());
        assert!(registry.function("ClosePrice").is_some());
        assert!(registry.function("sma").is_none());
    }

    #[test]
    fn aliases_build_same_indicator() {
        let registry = Registry::standard();
        for name in ["moneyflow", "mflow", "moneyflowindex"] {
            let built = registry.build(name, vec![scalar(dec!(14))]).unwrap();
            assert_eq!(built, Indicator::MoneyFlow(14));
        }
        for name in ["close", "price", "closeprice"] {
            assert_eq!(registry.build(name, vec![]).unwrap(), Indicator::ClosePrice);
        }
    }

    #[test]
    fn wrong_arity() {
        let registry = Registry::standard();
        let err = registry.build("macd", vec![scalar(dec!(12))]).unwrap_err();
        assert_eq!(
            err,
            CompileError::BadArity {
                name: "macd".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn indicator_where_number_expected() {
        let registry = Registry::standard();
        let err = registry
            .build("rsi", vec![Operand::Indicator(Indicator::ClosePrice)])
            .unwrap_err();
        assert!(matches!(err, CompileError::BadType { index: 1, .. }));
    }

    #[test]
    fn number_where_indicator_expected() {
        let registry = Registry::standard();
        let err = registry
            .build("increase", vec![scalar(dec!(5)), scalar(dec!(1))])
            .unwrap_err();
        assert!(matches!(err, CompileError::BadType { index: 1, .. }));
    }

    #[test]
    fn out_of_domain() {
        let registry = Registry::standard();
        let close = || Operand::Indicator(Indicator::ClosePrice);
        assert!(matches!(
            registry.build("rsi", vec![scalar(dec!(0))]),
            Err(CompileError::BadDomain { .. })
        ));
        assert!(matches!(
            registry.build("rsi", vec![scalar(dec!(14.5))]),
            Err(CompileError::BadDomain { .. })
        ));
        assert!(matches!(
            registry.build("extrema", vec![close(), scalar(dec!(1)), scalar(dec!(3))]),
            Err(CompileError::BadDomain { .. })
        ));
        assert!(matches!(
            registry.build("increase", vec![close(), scalar(dec!(-1))]),
            Err(CompileError::BadDomain { .. })
        ));
    }

    #[test]
    fn windows_above_series_cap_rejected() {
        let registry = Registry::standard();
        let huge = || scalar(Decimal::from(u64::MAX));
        assert!(matches!(
            registry.build("macd", vec![huge(), scalar(dec!(26))]),
            Err(CompileError::BadDomain { .. })
        ));
        assert!(matches!(
            registry.build("macdhist", vec![scalar(dec!(12)), scalar(dec!(26)), huge()]),
            Err(CompileError::BadDomain { .. })
        ));
        assert!(matches!(
            registry.build("moneyflow", vec![scalar(Decimal::from(MAX_CANDLES + 1))]),
            Err(CompileError::BadDomain { .. })
        ));
        assert_eq!(
            registry
                .build("rsi", vec![scalar(Decimal::from(MAX_CANDLES))])
                .unwrap(),
            Indicator::Rsi(MAX_CANDLES)
        );
    }

    #[test]
    fn extrema_and_zero_build() {
        let registry = Registry::standard();
        let close = || Operand::Indicator(Indicator::ClosePrice);
        let built = registry
            .build("iszero", vec![close(), scalar(dec!(2)), scalar(dec!(5))])
            .unwrap();
        assert_eq!(
            built,
            Indicator::Zero {
                base: Box::new(Indicator::ClosePrice),
                lag: 2,
                samples: 5
            }
        );
    }

    #[test]
    fn operator_tables() {
        let registry = Registry::standard();
        assert_eq!(registry.modifier("×"), Some(ArithmeticOp::Mul));
        assert_eq!(registry.modifier("**"), Some(ArithmeticOp::Pow));
        assert_eq!(registry.comparator("≥"), Some(Comparator::Ge));
        assert_eq!(registry.comparator("="), Some(Comparator::Eq));
        assert_eq!(registry.logical("||"), Some(Logical::Or));
        assert_eq!(registry.logical("|"), None);
    }

    #[test]
    fn scalar_arithmetic_folds() {
        let registry = Registry::standard();
        let folded = registry.arithmetic(ArithmeticOp::Plus, scalar(dec!(1)), scalar(dec!(2)));
        assert_eq!(folded, scalar(dec!(3)));
        let lifted = registry.arithmetic(
            ArithmeticOp::Plus,
            Operand::Indicator(Indicator::ClosePrice),
            scalar(dec!(2)),
        );
        assert!(matches!(lifted, Operand::Indicator(Indicator::Arithmetic { .. })));
    }

    #[test]
    fn global_is_shared() {
        assert!(std::ptr::eq(Registry::global(), Registry::global()));
    }
}
