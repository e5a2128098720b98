//! Exact multivariate polynomials with rational coefficients.
//!
//! A [QPolynomial](poly::qpoly::QPolynomial) is stored as a rational content
//! times a primitive integer polynomial with a positive leading
//! coefficient, so that all arithmetic on the terms happens over the
//! integers. The integer polynomials pack their exponent vectors into
//! machine words and multiply with a heap merge.
//!
//! For example:
//!
//! ```
//! use qpoly::poly::{qpoly::QPolynomial, MonomialOrder, PolynomialContext};
//!
//! let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::DegRevLex);
//! let a = QPolynomial::parse("1/2*x^2 - 1/2*y^2", ctx.clone()).unwrap();
//! let b = QPolynomial::parse("x + y", ctx).unwrap();
//! let q = a.divides(&b).unwrap().unwrap();
//! assert_eq!(q.to_string(), "1/2*x-1/2*y");
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod poly;
pub mod printer;
pub mod rings;
pub mod utils;
