use thiserror::Error;

/// Errors produced by polynomial operations.
///
/// Operations that may legitimately fail on valid input (powers and
/// evaluations that would be too large, inexact division) report it through
/// this type. Contract violations such as a zero divisor are also reported
/// here, before any work is done on the operands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolynomialError {
    #[error("division by the zero polynomial")]
    DivisionByZero,
    #[error("domain error: {0}")]
    Domain(String),
    #[error("exponents need {required} bits, more than the maximum of {max}")]
    ExponentOverflow { required: usize, max: usize },
    #[error("result would need about {estimate} bits, more than the limit of {limit}")]
    Infeasible { estimate: u64, limit: u64 },
    #[error("polynomial is not canonical: {0}")]
    InvariantViolation(String),
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("polynomials are defined over different contexts")]
    ContextMismatch,
}

impl PolynomialError {
    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        PolynomialError::Domain(msg.into())
    }
}
