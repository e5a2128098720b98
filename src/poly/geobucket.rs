//! An accumulator for long chains of additions.
//!
//! Adding many small polynomials to a large one costs a merge over the
//! large polynomial every time. A geobucket keeps polynomials of similar
//! size in the same slot: slot `i` holds a polynomial with at most about
//! `4^i` terms. A polynomial is added to the slot that matches its size,
//! and a slot that grows too large is carried into the next one.

use std::sync::Arc;

use rug::{Integer, Rational};
use tracing::trace;

use super::qpoly::QPolynomial;
use super::PolynomialContext;
use crate::error::PolynomialError;
use crate::utils::clog4;

const MAX_SLOTS: usize = 32;

/// A geobucket of rational polynomials.
#[derive(Clone, Debug)]
pub struct QGeobucket {
    polys: Vec<QPolynomial>,
    context: Arc<PolynomialContext>,
}

impl QGeobucket {
    pub fn new(context: Arc<PolynomialContext>) -> QGeobucket {
        QGeobucket {
            polys: vec![],
            context,
        }
    }

    /// Create a geobucket holding `p`.
    pub fn from_polynomial(p: QPolynomial) -> QGeobucket {
        let mut b = QGeobucket::new(p.context().clone());
        b.set(p);
        b
    }

    /// The number of slots in use.
    #[inline]
    pub fn nslots(&self) -> usize {
        self.polys.len()
    }

    #[inline]
    fn slot_for(nterms: usize) -> usize {
        clog4(nterms).min(MAX_SLOTS - 1)
    }

    fn zero(&self) -> QPolynomial {
        QPolynomial::new(self.context.clone())
    }

    /// Make sure slot `i` exists.
    fn fit_slots(&mut self, i: usize) {
        while self.polys.len() <= i {
            let z = self.zero();
            self.polys.push(z);
        }
    }

    /// Replace the contents by `p`.
    pub fn set(&mut self, p: QPolynomial) {
        PolynomialContext::check_compatible(&self.context, p.context())
            .unwrap_or_else(|e| panic!("{}", e));

        self.polys.clear();
        if p.is_zero() {
            return;
        }

        let i = Self::slot_for(p.nterms());
        self.fit_slots(i);
        self.polys[i] = p;
    }

    /// Carry slots that outgrew their size upwards, starting at slot `i`.
    fn fix(&mut self, mut i: usize) {
        while i + 1 < MAX_SLOTS && Self::slot_for(self.polys[i].nterms()) > i {
            trace!(
                "Carrying slot {} with {} terms",
                i,
                self.polys[i].nterms()
            );

            self.fit_slots(i + 1);
            let z = self.zero();
            let p = std::mem::replace(&mut self.polys[i], z);
            self.polys[i + 1] = &self.polys[i + 1] + &p;
            i += 1;
        }
    }

    fn add_slot(&mut self, p: &QPolynomial, negate: bool) {
        if p.is_zero() {
            return;
        }

        let i = Self::slot_for(p.nterms());
        self.fit_slots(i);
        self.polys[i] = if negate {
            &self.polys[i] - p
        } else {
            &self.polys[i] + p
        };
        self.fix(i);
    }

    /// Add `p`.
    pub fn add(&mut self, p: &QPolynomial) {
        self.add_slot(p, false);
    }

    /// Subtract `p`.
    pub fn sub(&mut self, p: &QPolynomial) {
        self.add_slot(p, true);
    }

    /// Add the constant `c`.
    pub fn add_rational(&mut self, c: &Rational) {
        if *c == 0 {
            return;
        }
        let p = self.zero().constant(c.clone());
        self.add(&p);
    }

    /// Sum all slots into a single polynomial and leave the geobucket empty.
    pub fn empty(&mut self) -> QPolynomial {
        let mut res = self.zero();
        for p in self.polys.drain(..) {
            if !p.is_zero() {
                res = &res + &p;
            }
        }
        res
    }

    /// Add the contents of `other` slot by slot.
    pub fn add_inplace(&mut self, other: QGeobucket) {
        self.merge_slots(other, false);
    }

    /// Subtract the contents of `other` slot by slot.
    pub fn sub_inplace(&mut self, other: QGeobucket) {
        self.merge_slots(other, true);
    }

    fn merge_slots(&mut self, other: QGeobucket, negate: bool) {
        PolynomialContext::check_compatible(&self.context, &other.context)
            .unwrap_or_else(|e| panic!("{}", e));

        self.fit_slots(other.polys.len().saturating_sub(1));
        for (i, p) in other.polys.into_iter().enumerate() {
            if p.is_zero() {
                continue;
            }
            self.polys[i] = if negate {
                &self.polys[i] - &p
            } else {
                &self.polys[i] + &p
            };
        }

        for i in 0..self.polys.len() {
            self.fix(i);
        }
    }

    /// Negate every slot.
    pub fn neg_inplace(&mut self) {
        for p in &mut self.polys {
            let z = QPolynomial::new(self.context.clone());
            *p = -std::mem::replace(p, z);
        }
    }

    /// Multiply every slot by `c`.
    pub fn mul_rational_inplace(&mut self, c: &Rational) {
        if *c == 0 {
            self.polys.clear();
            return;
        }

        for p in &mut self.polys {
            *p = p.mul_rational(c);
        }
    }

    /// Multiply by the contents of `other`.
    pub fn mul_inplace(&mut self, mut other: QGeobucket) -> Result<(), PolynomialError> {
        let b = other.empty();
        let a = self.empty();
        self.set(a.try_mul(&b)?);
        Ok(())
    }

    /// Raise the contents to the power `k`.
    pub fn pow_inplace(&mut self, k: u64) -> Result<(), PolynomialError> {
        let a = self.empty();
        self.set(a.pow(k)?);
        Ok(())
    }

    /// Raise the contents to an arbitrary-precision power `k`.
    pub fn pow_integer_inplace(&mut self, k: &Integer) -> Result<(), PolynomialError> {
        let a = self.empty();
        self.set(a.pow_integer(k)?);
        Ok(())
    }

    /// Divide by the contents of `other` if the division is exact. On
    /// failure the geobucket is left empty and `false` is returned.
    pub fn divides_inplace(&mut self, mut other: QGeobucket) -> Result<bool, PolynomialError> {
        let b = other.empty();
        if b.is_zero() {
            return Err(PolynomialError::DivisionByZero);
        }

        let a = self.empty();
        match a.divides(&b)? {
            Some(q) => {
                self.set(q);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod test {
    use rug::Rational;

    use super::QGeobucket;
    use crate::poly::qpoly::QPolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};

    #[test]
    fn cancellation() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let x = QPolynomial::new(ctx.clone()).variable(0);

        let mut b = QGeobucket::new(ctx);
        b.add(&x);
        b.add(&x.pow(2).unwrap());
        b.sub(&x);
        assert_eq!(b.empty(), x.pow(2).unwrap());
        assert_eq!(b.nslots(), 0);
    }

    #[test]
    fn carries() {
        let ctx = PolynomialContext::new(&["x"], MonomialOrder::Lex);
        let x = QPolynomial::new(ctx.clone()).variable(0);

        let mut b = QGeobucket::new(ctx.clone());
        let mut direct = x.zero();
        for i in 0..40u64 {
            let t = &x.pow(i).unwrap() * &Rational::from((1, i + 1));
            b.add(&t);
            direct = &direct + &t;
        }
        assert!(b.nslots() >= 3);
        assert_eq!(b.empty(), direct);
    }

    #[test]
    fn slot_wise() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::DegLex);
        let x = QPolynomial::new(ctx.clone()).variable(0);
        let y = x.variable(1);

        let mut a = QGeobucket::from_polynomial(&x + &y);
        let b = QGeobucket::from_polynomial(&x - &y);
        a.sub_inplace(b.clone());
        a.neg_inplace();
        a.mul_rational_inplace(&Rational::from((1, 2)));
        assert_eq!(a.clone().empty(), -y.clone());

        a.mul_inplace(b.clone()).unwrap();
        assert_eq!(a.clone().empty(), &(-y.clone()) * &(&x - &y));

        assert!(a.divides_inplace(b.clone()).unwrap());
        assert_eq!(a.clone().empty(), -y.clone());

        a.add_inplace(QGeobucket::from_polynomial(x.clone()));
        a.pow_inplace(2).unwrap();
        assert_eq!(a.clone().empty(), (&x - &y).pow(2).unwrap());

        let mut c = QGeobucket::from_polynomial(x.clone());
        assert!(!c.divides_inplace(QGeobucket::from_polynomial(y.clone())).unwrap());
        assert!(c.empty().is_zero());
    }
}
