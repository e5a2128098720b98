//! Substituting values for variables.
//!
//! Powers of the substituted values are computed once by iterated squaring
//! and memoised per exponent, so that a value is never raised to the same
//! power twice in a single evaluation.

use std::cmp::Ordering;

use ahash::HashMap;
use rug::Integer;
use smallvec::{smallvec, SmallVec};
use tracing::trace;

use super::monomial::INLINED_WORDS;
use super::polynomial::MultivariatePolynomial;
use crate::error::PolynomialError;
use crate::rings::integer::IntegerRing;
use crate::rings::Ring;

/// Lazily computed powers `base^e`.
pub struct PowerCache<R: Ring> {
    ring: R,
    base: R::Element,
    /// `base^(2^i)`
    squares: Vec<R::Element>,
    cache: HashMap<u64, R::Element>,
}

impl<R: Ring> PowerCache<R> {
    pub fn new(ring: &R, base: R::Element) -> PowerCache<R> {
        PowerCache {
            ring: ring.clone(),
            squares: vec![base.clone()],
            base,
            cache: HashMap::default(),
        }
    }

    #[inline]
    pub fn base(&self) -> &R::Element {
        &self.base
    }

    /// Compute `base^e`.
    pub fn get(&mut self, e: u64) -> R::Element {
        match e {
            0 => return self.ring.one(),
            1 => return self.base.clone(),
            _ => {}
        }

        if let Some(r) = self.cache.get(&e) {
            return r.clone();
        }

        let nbits = (64 - e.leading_zeros()) as usize;
        while self.squares.len() < nbits {
            let last = &self.squares[self.squares.len() - 1];
            let sq = self.ring.mul(last, last);
            self.squares.push(sq);
        }

        let mut res: Option<R::Element> = None;
        for (i, sq) in self.squares.iter().enumerate().take(nbits) {
            if (e >> i) & 1 == 1 {
                res = Some(match res {
                    Some(r) => self.ring.mul(&r, sq),
                    None => sq.clone(),
                });
            }
        }

        let res = res.unwrap_or_else(|| self.ring.one());
        self.cache.insert(e, res.clone());
        res
    }

    /// Compute `base^e` for an arbitrary-precision exponent. Exponents that
    /// do not fit in a `u64` are only supported for the bases 0, 1 and -1.
    pub fn get_integer(&mut self, e: &Integer) -> Result<R::Element, PolynomialError> {
        if let Some(e) = e.to_u64() {
            return Ok(self.get(e));
        }

        if e.cmp0() == Ordering::Less {
            return Err(PolynomialError::domain(format!("negative exponent {}", e)));
        }

        if R::is_zero(&self.base) || self.ring.is_one(&self.base) {
            return Ok(self.base.clone());
        }

        if self.base == self.ring.neg(&self.ring.one()) {
            return Ok(if e.is_even() {
                self.ring.one()
            } else {
                self.base.clone()
            });
        }

        Err(PolynomialError::domain(format!(
            "cannot raise {} to the power {}",
            self.base, e
        )))
    }
}

impl<R: Ring> MultivariatePolynomial<R> {
    /// Replace the variable `var` by the value `v`.
    pub fn replace(&self, var: usize, v: &R::Element) -> Result<Self, PolynomialError> {
        assert!(var < self.nvars(), "Variable index {} out of range", var);

        let mut cache = PowerCache::new(&self.ring, v.clone());
        let mut res = self.zero_with_capacity(self.nterms());
        let mut iso: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];
        let mut rest: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];

        for t in self {
            self.codec.isolate(t.exponents, var, &mut iso);
            self.codec.sub(t.exponents, &iso, &mut rest);
            let p = cache.get_integer(&self.codec.exponent_integer(t.exponents, var))?;
            res.coefficients.push(self.ring.mul(t.coefficient, &p));
            res.exponents.extend_from_slice(&rest);
        }

        res.sort_terms();
        Ok(res)
    }

    /// Evaluate the polynomial at `values`, one per variable.
    pub fn replace_all(&self, values: &[R::Element]) -> Result<R::Element, PolynomialError> {
        assert_eq!(values.len(), self.nvars(), "Wrong number of values");

        let mut caches: Vec<_> = values
            .iter()
            .map(|v| PowerCache::new(&self.ring, v.clone()))
            .collect();

        let mut res = self.ring.zero();
        for t in self {
            let mut c = t.coefficient.clone();
            for (v, cache) in caches.iter_mut().enumerate() {
                let e = self.codec.exponent_integer(t.exponents, v);
                if e != 0 {
                    self.ring.mul_assign(&mut c, &cache.get_integer(&e)?);
                }
            }
            self.ring.add_assign(&mut res, &c);
        }

        Ok(res)
    }
}

impl MultivariatePolynomial<IntegerRing> {
    /// Replace `var` by the fraction `num / den`, with `den > 0`, without
    /// leaving the integers. Returns `(p, d)` such that the substitution
    /// equals `p / den^d`, where `d` is the degree of `var`.
    pub fn replace_fraction(
        &self,
        var: usize,
        num: &Integer,
        den: &Integer,
    ) -> Result<(Self, Integer), PolynomialError> {
        assert!(var < self.nvars(), "Variable index {} out of range", var);

        let d = self.degree(var);
        let mut num_cache = PowerCache::new(&self.ring, num.clone());
        let mut den_cache = PowerCache::new(&self.ring, den.clone());

        trace!("Substituting {}/{} for variable {} of degree {}", num, den, var, d);

        let mut res = self.zero_with_capacity(self.nterms());
        let mut iso: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];
        let mut rest: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];

        for t in self {
            self.codec.isolate(t.exponents, var, &mut iso);
            self.codec.sub(t.exponents, &iso, &mut rest);

            // c * num^e * den^(d - e)
            let e = self.codec.exponent_integer(t.exponents, var);
            let mut c = t.coefficient.clone();
            c *= num_cache.get_integer(&e)?;
            c *= den_cache.get_integer(&Integer::from(&d - &e))?;

            if c != 0 {
                res.coefficients.push(c);
                res.exponents.extend_from_slice(&rest);
            }
        }

        res.sort_terms();
        Ok((res, d))
    }

    /// Evaluate at the fractions `values[i] = (num, den)`, with `den > 0`.
    /// Returns `(n, d)` such that the value is `n / d`.
    pub fn evaluate_fractions(
        &self,
        values: &[(Integer, Integer)],
    ) -> Result<(Integer, Integer), PolynomialError> {
        assert_eq!(values.len(), self.nvars(), "Wrong number of values");

        let degrees: Vec<Integer> = (0..self.nvars()).map(|v| self.degree(v)).collect();
        let mut num_caches: Vec<_> = values
            .iter()
            .map(|(n, _)| PowerCache::new(&self.ring, n.clone()))
            .collect();
        let mut den_caches: Vec<_> = values
            .iter()
            .map(|(_, d)| PowerCache::new(&self.ring, d.clone()))
            .collect();

        let mut num = Integer::new();
        for t in self {
            let mut c = t.coefficient.clone();
            for v in 0..self.nvars() {
                let e = self.codec.exponent_integer(t.exponents, v);
                c *= num_caches[v].get_integer(&e)?;
                c *= den_caches[v].get_integer(&Integer::from(&degrees[v] - &e))?;
            }
            num += c;
        }

        let mut den = Integer::from(1);
        for (cache, d) in den_caches.iter_mut().zip(&degrees) {
            den *= cache.get_integer(d)?;
        }

        Ok((num, den))
    }
}

#[cfg(test)]
mod test {
    use rug::{Integer, Rational};

    use super::PowerCache;
    use crate::poly::polynomial::MultivariatePolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};
    use crate::rings::integer::IntegerRing;
    use crate::rings::rational::RationalField;

    #[test]
    fn powers() {
        let mut c = PowerCache::new(&IntegerRing::new(), Integer::from(3));
        assert_eq!(c.get(0), 1);
        assert_eq!(c.get(5), 243);
        assert_eq!(c.get(13), 1594323);
        assert!(c.get_integer(&(Integer::from(1) << 70)).is_err());

        let mut m = PowerCache::new(&IntegerRing::new(), Integer::from(-1));
        assert_eq!(m.get_integer(&(Integer::from(1) << 70)).unwrap(), 1);
        assert_eq!(m.get_integer(&((Integer::from(1) << 70) + 1)).unwrap(), -1);
    }

    #[test]
    fn rational_evaluation() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let field = RationalField::new();
        let p = MultivariatePolynomial::from_terms(
            &field,
            ctx,
            vec![
                (Rational::from((1, 2)), vec![2, 1]),
                (Rational::from(1), vec![0, 0]),
            ],
        )
        .unwrap();

        let v = p
            .replace_all(&[Rational::from(2), Rational::from((1, 3))])
            .unwrap();
        assert_eq!(v, Rational::from((5, 3)));

        let q = p.replace(0, &Rational::from(2)).unwrap();
        assert_eq!(q.nterms(), 2);
        assert_eq!(q.degree(0), 0);
        assert_eq!(q.lcoeff(), 2);
    }

    #[test]
    fn fractions() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::DegRevLex);
        let p = MultivariatePolynomial::from_terms(
            &IntegerRing::new(),
            ctx,
            vec![
                (Integer::from(1), vec![2, 1]),
                (Integer::from(3), vec![1, 0]),
                (Integer::from(1), vec![0, 0]),
            ],
        )
        .unwrap();

        // x -> 1/2: y/4 + 3/2 + 1 = (y + 10) / 4
        let (q, d) = p
            .replace_fraction(0, &Integer::from(1), &Integer::from(2))
            .unwrap();
        assert_eq!(d, 2);
        assert_eq!(q.nterms(), 2);
        assert_eq!(q.lcoeff(), 1);
        assert_eq!(q.get_constant(), 10);

        // x -> 1/2, y -> 2/3: 1/6 + 3/2 + 1 = 8/3
        let (n, d) = p
            .evaluate_fractions(&[
                (Integer::from(1), Integer::from(2)),
                (Integer::from(2), Integer::from(3)),
            ])
            .unwrap();
        assert_eq!(Rational::from((n, d)), Rational::from((8, 3)));
    }
}
