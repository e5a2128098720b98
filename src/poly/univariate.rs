use std::sync::Arc;

use rug::Integer;

use super::geobucket::QGeobucket;
use super::qpoly::QPolynomial;
use super::PolynomialContext;
use crate::error::PolynomialError;

/// A polynomial written as a polynomial in a single variable `var`, with
/// coefficients that are polynomials in the other variables.
///
/// The terms are sorted by strictly decreasing exponent and no coefficient
/// is zero.
#[derive(Clone, Debug, PartialEq)]
pub struct UnivariateView {
    pub var: usize,
    pub terms: Vec<(Integer, QPolynomial)>,
    pub context: Arc<PolynomialContext>,
}

impl UnivariateView {
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    #[inline]
    pub fn nterms(&self) -> usize {
        self.terms.len()
    }

    /// The degree in `var`. The zero polynomial has degree 0.
    pub fn degree(&self) -> Integer {
        self.terms
            .first()
            .map(|(e, _)| e.clone())
            .unwrap_or_default()
    }

    pub fn lcoeff(&self) -> Option<&QPolynomial> {
        self.terms.first().map(|(_, c)| c)
    }

    /// The coefficient of `var^e`, if it is non-zero.
    pub fn coefficient(&self, e: &Integer) -> Option<&QPolynomial> {
        self.terms
            .binary_search_by(|(x, _)| e.cmp(x))
            .ok()
            .map(|i| &self.terms[i].1)
    }

    /// Write out all coefficients, where index `i` holds the coefficient
    /// of `var^i`.
    pub fn to_dense(&self) -> Result<Vec<QPolynomial>, PolynomialError> {
        let Some((d, lc)) = self.terms.first() else {
            return Ok(vec![]);
        };

        let d = d
            .to_usize()
            .ok_or_else(|| PolynomialError::domain(format!("degree {} is too large", d)))?;

        let mut dense = vec![lc.zero(); d + 1];
        for (e, c) in &self.terms {
            // exponents are bounded by the degree
            if let Some(e) = e.to_usize() {
                dense[e] = c.clone();
            }
        }
        Ok(dense)
    }

    /// Build a view from dense coefficients, where index `i` holds the
    /// coefficient of `var^i`.
    pub fn from_dense(
        var: usize,
        dense: Vec<QPolynomial>,
        context: Arc<PolynomialContext>,
    ) -> UnivariateView {
        let terms = dense
            .into_iter()
            .enumerate()
            .rev()
            .filter(|(_, c)| !c.is_zero())
            .map(|(e, c)| (Integer::from(e), c))
            .collect();

        UnivariateView {
            var,
            terms,
            context,
        }
    }

    /// Convert back to a multivariate polynomial.
    pub fn to_polynomial(&self) -> Result<QPolynomial, PolynomialError> {
        QPolynomial::from_univariate(self)
    }
}

impl QPolynomial {
    /// Write the polynomial as a polynomial in `var` with coefficients in
    /// the other variables.
    pub fn to_univariate(&self, var: usize) -> UnivariateView {
        let terms = self
            .zpoly
            .to_univariate_polynomial_list(var)
            .into_iter()
            .map(|(p, e)| (e, QPolynomial::from_parts(self.content.clone(), p)))
            .collect();

        UnivariateView {
            var,
            terms,
            context: self.zpoly.context.clone(),
        }
    }

    /// Rebuild a polynomial from its univariate view. The coefficients must
    /// not contain the variable of the view.
    pub fn from_univariate(view: &UnivariateView) -> Result<QPolynomial, PolynomialError> {
        let mut acc = QGeobucket::new(view.context.clone());
        for (e, c) in &view.terms {
            acc.add(&c.mul_var_power(view.var, e)?);
        }
        Ok(acc.empty())
    }
}

#[cfg(test)]
mod test {
    use rug::{Integer, Rational};

    use crate::poly::qpoly::QPolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};

    #[test]
    fn split_and_join() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let f = QPolynomial::from_terms(
            ctx,
            vec![
                (Rational::from((2, 3)), vec![2, 1]),
                (Rational::from(4), vec![2, 0]),
                (Rational::from((-1, 5)), vec![0, 3]),
            ],
        )
        .unwrap();

        let u = f.to_univariate(0);
        assert_eq!(u.nterms(), 2);
        assert_eq!(u.degree(), 2);
        for (_, c) in &u.terms {
            c.check_canonical().unwrap();
            assert_eq!(c.degree(0), 0);
        }
        assert!(u.coefficient(&Integer::from(1)).is_none());
        assert_eq!(u.to_polynomial().unwrap(), f);

        let dense = u.to_dense().unwrap();
        assert_eq!(dense.len(), 3);
        assert!(dense[1].is_zero());
        let v = super::UnivariateView::from_dense(0, dense, f.context().clone());
        assert_eq!(v, u);
    }
}
