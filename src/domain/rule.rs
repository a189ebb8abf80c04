//! Rule AST.
//!
//! - `Comparator`: how two indicator values are compared
//! - `Logical`: how two rules are combined
//! - `Rule`: comparison leaves joined by `&&` / `||`

use std::fmt;

use crate::domain::indicator::Indicator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logical {
    And,
    Or,
}

impl Logical {
    pub fn symbol(self) -> &'static str {
        match self {
            Logical::And => "&&",
            Logical::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Compare {
        op: Comparator,
        lhs: Indicator,
        rhs: Indicator,
    },
    And(Box<Rule>, Box<Rule>),
    Or(Box<Rule>, Box<Rule>),
}

impl Rule {
    pub fn compare(op: Comparator, lhs: Indicator, rhs: Indicator) -> Self {
        Rule::Compare { op, lhs, rhs }
    }

    pub fn combine(op: Logical, lhs: Rule, rhs: Rule) -> Self {
        match op {
            Logical::And => Rule::And(Box::new(lhs), Box::new(rhs)),
            Logical::Or => Rule::Or(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Number of comparison leaves.
    pub fn leaves(&self) -> usize {
        match self {
            Rule::Compare { .. } => 1,
            Rule::And(lhs, rhs) | Rule::Or(lhs, rhs) => lhs.leaves() + rhs.leaves(),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Compare { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Rule::And(lhs, rhs) => write!(f, "({} && {})", lhs, rhs),
            Rule::Or(lhs, rhs) => write!(f, "({} || {})", lhs, rhs),
        }
    }
}
