//! Resource limits for polynomial operations.
//!
//! Powers, evaluations and compositions can produce results that are far too
//! large to represent. Before doing the real work, these operations estimate
//! the size of the result and refuse with
//! [PolynomialError::Infeasible](crate::error::PolynomialError::Infeasible)
//! if the estimate exceeds [Config::max_result_bits].
//!
//! The defaults can be overridden through the environment:
//! - `QPOLY_MAX_RESULT_BITS`
//! - `QPOLY_MAX_EXPONENT_BITS`
//! - `QPOLY_PARALLEL_MIN_TERMS`

use std::env;

use tracing::warn;

/// Default bound on the estimated size of a single result, in bits.
pub const DEFAULT_MAX_RESULT_BITS: u64 = 1 << 28;
/// Default bound on the packed width of a single exponent field.
pub const DEFAULT_MAX_EXPONENT_BITS: usize = 1024;
/// Products with fewer terms than this are never multiplied in parallel.
pub const DEFAULT_PARALLEL_MIN_TERMS: usize = 1 << 12;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Config {
    /// Largest estimated result size, in bits, that powers and evaluations
    /// will attempt.
    pub max_result_bits: u64,
    /// Widest exponent field the monomial packing may use.
    pub max_exponent_bits: usize,
    /// Minimal length of the shorter operand before [mul_parallel](crate::poly::polynomial::MultivariatePolynomial::mul_parallel)
    /// splits the work.
    pub parallel_min_terms: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_result_bits: DEFAULT_MAX_RESULT_BITS,
            max_exponent_bits: DEFAULT_MAX_EXPONENT_BITS,
            parallel_min_terms: DEFAULT_PARALLEL_MIN_TERMS,
        }
    }
}

impl Config {
    /// Create a configuration from the defaults, overridden by the
    /// `QPOLY_*` environment variables that are set.
    pub fn from_env() -> Config {
        let mut c = Config::default();

        if let Some(v) = read_var("QPOLY_MAX_RESULT_BITS") {
            c.max_result_bits = v;
        }
        if let Some(v) = read_var("QPOLY_MAX_EXPONENT_BITS") {
            c.max_exponent_bits = (v as usize).max(64);
        }
        if let Some(v) = read_var("QPOLY_PARALLEL_MIN_TERMS") {
            c.parallel_min_terms = v as usize;
        }

        c
    }

    pub fn with_max_result_bits(mut self, bits: u64) -> Self {
        self.max_result_bits = bits;
        self
    }

    pub fn with_max_exponent_bits(mut self, bits: usize) -> Self {
        self.max_exponent_bits = bits.max(64);
        self
    }

    pub fn with_parallel_min_terms(mut self, terms: usize) -> Self {
        self.parallel_min_terms = terms;
        self
    }
}

fn read_var(name: &str) -> Option<u64> {
    let v = env::var(name).ok()?;
    match v.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {}={}: not a non-negative integer", name, v);
            None
        }
    }
}
