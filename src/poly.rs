pub mod division;
pub mod evaluate;
pub mod gcd;
pub mod geobucket;
pub mod monomial;
pub mod polynomial;
pub mod qpoly;
pub mod resultant;
pub mod univariate;

use std::sync::Arc;

use smartstring::{LazyCompact, SmartString};

use crate::config::Config;
use crate::error::PolynomialError;

pub const INLINED_EXPONENTS: usize = 6;

/// A total order on monomials.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum MonomialOrder {
    /// Lexicographic in the variables, `x1 > x2 > ...`.
    #[default]
    Lex,
    /// Total degree first, ties broken lexicographically.
    DegLex,
    /// Total degree first, ties broken by the smallest exponent of the last
    /// variable that differs.
    DegRevLex,
}

impl MonomialOrder {
    /// Returns `true` if the order compares the total degree first.
    #[inline]
    pub fn is_graded(&self) -> bool {
        !matches!(self, MonomialOrder::Lex)
    }
}

/// The shared environment of a family of polynomials: the names of the
/// variables, the monomial order and the resource limits.
///
/// Polynomials can only be combined when their contexts are equal.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PolynomialContext {
    pub variables: Vec<SmartString<LazyCompact>>,
    pub order: MonomialOrder,
    pub config: Config,
}

impl PolynomialContext {
    /// Create a context with the given variable names.
    pub fn new(variables: &[&str], order: MonomialOrder) -> Arc<PolynomialContext> {
        Arc::new(PolynomialContext {
            variables: variables.iter().map(|x| (*x).into()).collect(),
            order,
            config: Config::default(),
        })
    }

    /// Create a context with `n` variables named `x1, ..., xn`.
    pub fn with_nvars(n: usize, order: MonomialOrder) -> Arc<PolynomialContext> {
        Arc::new(PolynomialContext {
            variables: (1..=n).map(|i| format!("x{}", i).into()).collect(),
            order,
            config: Config::default(),
        })
    }

    /// Create a context with custom resource limits.
    pub fn with_config(
        variables: &[&str],
        order: MonomialOrder,
        config: Config,
    ) -> Arc<PolynomialContext> {
        Arc::new(PolynomialContext {
            variables: variables.iter().map(|x| (*x).into()).collect(),
            order,
            config,
        })
    }

    #[inline]
    pub fn nvars(&self) -> usize {
        self.variables.len()
    }

    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|x| x == name)
    }

    /// Check that two contexts describe the same polynomial ring.
    #[inline]
    pub fn check_compatible(
        a: &Arc<PolynomialContext>,
        b: &Arc<PolynomialContext>,
    ) -> Result<(), PolynomialError> {
        if Arc::ptr_eq(a, b) || a == b {
            Ok(())
        } else {
            Err(PolynomialError::ContextMismatch)
        }
    }
}
