//! Quasi-division of integer polynomials.
//!
//! Dividing `a` by `b` over the integers does not always have a solution,
//! since the leading coefficient of `b` need not divide the coefficients
//! that appear. Instead we compute a positive scale `s` and polynomials
//! `q` and `r` with `s * a = b * q + r`, where no term of `r` is divisible
//! by the leading monomial of `b`. The scale is only grown when a
//! coefficient is not divisible, so that `s = 1` for every division that
//! also works over the integers.
//!
//! The product terms `q[i] * b[j]` that still have to be subtracted are kept
//! in a heap, which lets us produce the terms of the dividend minus the
//! partial products in decreasing order without ever storing the
//! intermediate polynomial.

use std::borrow::Cow;
use std::collections::{BTreeMap, BinaryHeap};

use rug::Integer;
use smallvec::{smallvec, SmallVec};
use tracing::debug;

use super::monomial::{MonomialKey, INLINED_WORDS};
use super::polynomial::MultivariatePolynomial;
use crate::error::PolynomialError;
use crate::rings::integer::IntegerRing;
use crate::rings::Ring;

type IntegerPolynomial = MultivariatePolynomial<IntegerRing>;

/// What a division should compute.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DivisionMode {
    /// Stop as soon as it is clear that the division is not exact over the
    /// integers.
    Exact,
    /// Compute the quotients and the remainder.
    Remainder,
    /// Compute the quotients only.
    QuotientOnly,
}

/// The result `scale * a = Σ divisors[k] * quotients[k] + remainder` of a
/// quasi-division.
#[derive(Clone, Debug)]
pub struct QuasiDivision {
    pub scale: Integer,
    pub quotients: Vec<IntegerPolynomial>,
    pub remainder: IntegerPolynomial,
}

enum Outcome {
    Done(QuasiDivision),
    Inexact,
    Overflow,
}

impl MultivariatePolynomial<IntegerRing> {
    /// Compute `(s, q, r)` such that `s * self = div * q + r`, with `s > 0`
    /// as small as the algorithm allows.
    pub fn quasi_divrem(
        &self,
        div: &Self,
    ) -> Result<(Integer, Self, Self), PolynomialError> {
        let QuasiDivision {
            scale,
            mut quotients,
            remainder,
        } = self.divide_complete(std::slice::from_ref(div), DivisionMode::Remainder)?;
        Ok((scale, quotients.swap_remove(0), remainder))
    }

    /// Compute `(s, q)` such that `s * self - div * q` has no terms that
    /// are divisible by the leading monomial of `div`.
    pub fn quasi_div(&self, div: &Self) -> Result<(Integer, Self), PolynomialError> {
        let QuasiDivision {
            scale,
            mut quotients,
            ..
        } = self.divide_complete(std::slice::from_ref(div), DivisionMode::QuotientOnly)?;
        Ok((scale, quotients.swap_remove(0)))
    }

    /// Divide by `div` if the quotient has integer coefficients and there
    /// is no remainder.
    pub fn divides(&self, div: &Self) -> Result<Option<Self>, PolynomialError> {
        if div.is_zero() {
            return Err(PolynomialError::DivisionByZero);
        }
        self.check_context(div)?;

        if self.is_zero() {
            return Ok(Some(self.zero()));
        }

        if !self.may_divide(div) {
            return Ok(None);
        }

        Ok(self
            .divide(std::slice::from_ref(div), DivisionMode::Exact)?
            .map(|mut r| r.quotients.swap_remove(0)))
    }

    /// Divide by a sequence of polynomials. A term is divided by the first
    /// divisor whose leading monomial divides it and is moved to the
    /// remainder if there is none.
    pub fn quasi_divrem_ideal(&self, divs: &[Self]) -> Result<QuasiDivision, PolynomialError> {
        self.divide_complete(divs, DivisionMode::Remainder)
    }

    /// Divide in a mode that never gives up on an inexact division.
    fn divide_complete(
        &self,
        divs: &[Self],
        mode: DivisionMode,
    ) -> Result<QuasiDivision, PolynomialError> {
        self.divide(divs, mode)?.ok_or_else(|| {
            PolynomialError::InvariantViolation(format!(
                "{:?} division stopped without a result",
                mode
            ))
        })
    }

    /// Cheap necessary conditions for an exact division.
    fn may_divide(&self, div: &Self) -> bool {
        if self.nterms() == 1 && div.nterms() > 1 {
            return false;
        }

        for v in 0..self.nvars() {
            if self.degree(v) < div.degree(v) {
                return false;
            }
        }

        let bits = self.codec.bits().max(div.codec.bits());
        let (a, b) = (self.widened(bits), div.widened(bits));

        // the leading and trailing terms of a product are the products of the
        // leading and trailing terms of the factors
        let (la, lb) = (a.exponents(0), b.exponents(0));
        let (ta, tb) = (a.exponents(a.nterms() - 1), b.exponents(b.nterms() - 1));
        a.codec.divides(la, lb)
            && a.codec.divides(ta, tb)
            && a.coefficients[0].is_divisible(&b.coefficients[0])
            && a.coefficients[a.nterms() - 1].is_divisible(&b.coefficients[b.nterms() - 1])
    }

    /// Divide with all operands at a common exponent width, widening and
    /// restarting whenever an intermediate product overflows.
    fn divide(
        &self,
        divisors: &[Self],
        mode: DivisionMode,
    ) -> Result<Option<QuasiDivision>, PolynomialError> {
        if divisors.is_empty() {
            return Err(PolynomialError::domain("no divisors"));
        }
        if divisors.iter().any(|d| d.is_zero()) {
            return Err(PolynomialError::DivisionByZero);
        }
        for d in divisors {
            self.check_context(d)?;
        }

        if self.is_zero() {
            return Ok(Some(QuasiDivision {
                scale: Integer::from(1),
                quotients: divisors.iter().map(|_| self.zero()).collect(),
                remainder: self.zero(),
            }));
        }

        let max_bits = self.context.config.max_exponent_bits.max(64);
        let mut bits = divisors
            .iter()
            .map(|d| d.codec.bits())
            .fold(self.codec.bits(), usize::max);

        loop {
            let a = self.widened(bits);
            let b: Vec<Cow<Self>> = divisors.iter().map(|d| d.widened(bits)).collect();
            let refs: Vec<&Self> = b.iter().map(|d| d.as_ref()).collect();

            match a.heap_division(&refs, mode) {
                Outcome::Done(r) => return Ok(Some(r)),
                Outcome::Inexact => return Ok(None),
                Outcome::Overflow => {
                    let next = bits * 2;
                    if next > max_bits {
                        return Err(PolynomialError::ExponentOverflow {
                            required: next,
                            max: max_bits,
                        });
                    }
                    debug!(
                        "Exponent overflow during division at {} bits, retrying with {}",
                        bits, next
                    );
                    bits = next;
                }
            }
        }
    }

    /// The division kernel. All operands must share the same packing.
    fn heap_division(&self, divisors: &[&Self], mode: DivisionMode) -> Outcome {
        let codec = &self.codec;
        let words = codec.words();

        let mut scale = Integer::from(1);
        let mut quotients: Vec<Self> = divisors.iter().map(|_| self.zero()).collect();
        let mut remainder = self.zero();

        // the heap contains unique monomials, each chained to the
        // (divisor, quotient term, divisor term) triples that produce it
        let mut cache: BTreeMap<MonomialKey, Vec<(usize, usize, usize)>> = BTreeMap::new();
        let mut q_cache: Vec<Vec<(usize, usize, usize)>> = vec![];
        let mut h: BinaryHeap<MonomialKey> = BinaryHeap::new();

        let mut m: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; words];
        let mut prod: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; words];
        let mut q_exp: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; words];

        let smallest_lead = divisors
            .iter()
            .map(|d| codec.key(d.exponents(0)))
            .min()
            .unwrap_or_default();

        macro_rules! push_product {
            ($k:expr, $i:expr, $j:expr) => {
                codec.add(
                    quotients[$k].exponents($i),
                    divisors[$k].exponents($j),
                    &mut prod,
                );
                if codec.overflows(&prod) {
                    return Outcome::Overflow;
                }
                let key = codec.key(&prod);
                if let Some(e) = cache.get_mut(&key) {
                    e.push(($k, $i, $j));
                } else {
                    h.push(key.clone());
                    let mut qq = q_cache.pop().unwrap_or_default();
                    qq.push(($k, $i, $j));
                    cache.insert(key, qq);
                }
            };
        }

        let mut next = 0;
        loop {
            let dividend_key = (next < self.nterms()).then(|| codec.key(self.exponents(next)));
            let cur = match (&dividend_key, h.peek()) {
                (None, None) => break,
                (Some(d), None) => d.clone(),
                (None, Some(t)) => t.clone(),
                (Some(d), Some(t)) => {
                    if d >= t {
                        d.clone()
                    } else {
                        t.clone()
                    }
                }
            };

            // no divisor can produce another quotient term
            if mode == DivisionMode::QuotientOnly && cur < smallest_lead {
                break;
            }

            let mut c = Integer::new();
            if dividend_key.as_ref() == Some(&cur) {
                c = Integer::from(&scale * &self.coefficients[next]);
                next += 1;
            }

            if h.peek() == Some(&cur) {
                h.pop();
                if let Some(mut chain) = cache.remove(&cur) {
                    for &(k, i, j) in &chain {
                        self.ring.sub_mul_assign(
                            &mut c,
                            &quotients[k].coefficients[i],
                            &divisors[k].coefficients[j],
                        );
                    }

                    for (k, i, j) in chain.drain(..) {
                        if j + 1 < divisors[k].nterms() {
                            push_product!(k, i, j + 1);
                        }
                    }
                    q_cache.push(chain);
                }
            }

            if IntegerRing::is_zero(&c) {
                continue;
            }

            codec.from_key(&cur, &mut m);

            let mut divided = false;
            for (k, d) in divisors.iter().enumerate() {
                if !codec.sub(&m, d.exponents(0), &mut q_exp) {
                    continue;
                }

                let lc = &d.coefficients[0];
                if !c.is_divisible(lc) {
                    if mode == DivisionMode::Exact {
                        return Outcome::Inexact;
                    }

                    let g = Integer::from(c.gcd_ref(lc));
                    let f = Integer::from(lc.abs_ref()).div_exact(&g);
                    scale *= &f;
                    c *= &f;
                    for q in &mut quotients {
                        for x in &mut q.coefficients {
                            *x *= &f;
                        }
                    }
                    for x in &mut remainder.coefficients {
                        *x *= &f;
                    }
                }

                let i = quotients[k].nterms();
                quotients[k]
                    .coefficients
                    .push(Integer::from(c.div_exact_ref(lc)));
                quotients[k].exponents.extend_from_slice(&q_exp);

                if d.nterms() > 1 {
                    push_product!(k, i, 1);
                }

                divided = true;
                break;
            }

            if !divided {
                match mode {
                    DivisionMode::Exact => return Outcome::Inexact,
                    DivisionMode::Remainder => {
                        remainder.coefficients.push(c);
                        remainder.exponents.extend_from_slice(&m);
                    }
                    DivisionMode::QuotientOnly => {}
                }
            }
        }

        Outcome::Done(QuasiDivision {
            scale,
            quotients,
            remainder,
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rug::Integer;

    use crate::error::PolynomialError;
    use crate::poly::polynomial::MultivariatePolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};
    use crate::rings::integer::IntegerRing;

    fn poly(
        ctx: &Arc<PolynomialContext>,
        terms: &[(i64, [u64; 2])],
    ) -> MultivariatePolynomial<IntegerRing> {
        MultivariatePolynomial::from_terms(
            &IntegerRing::new(),
            ctx.clone(),
            terms
                .iter()
                .map(|(c, e)| (Integer::from(*c), e.to_vec()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn exact() {
        let c = PolynomialContext::new(&["x", "y"], MonomialOrder::DegRevLex);
        let a = poly(&c, &[(1, [2, 0]), (-1, [0, 2])]);
        let b = poly(&c, &[(1, [1, 0]), (1, [0, 1])]);
        let q = a.divides(&b).unwrap().unwrap();
        assert_eq!(q, poly(&c, &[(1, [1, 0]), (-1, [0, 1])]));

        let b2 = poly(&c, &[(2, [1, 0]), (2, [0, 1])]);
        assert!(a.divides(&b2).unwrap().is_none());
        assert!(b.divides(&a).unwrap().is_none());
        assert_eq!(a.divides(&a.zero()), Err(PolynomialError::DivisionByZero));
    }

    #[test]
    fn scaled() {
        let c = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let a = poly(&c, &[(1, [2, 0]), (1, [0, 0])]);
        let b = poly(&c, &[(2, [1, 0]), (1, [0, 0])]);
        let (s, q, r) = a.quasi_divrem(&b).unwrap();
        assert_eq!(s, 4);
        assert_eq!(q, poly(&c, &[(2, [1, 0]), (-1, [0, 0])]));
        assert_eq!(r, poly(&c, &[(5, [0, 0])]));

        let lhs = a.clone().mul_coeff(s.clone());
        assert_eq!(lhs, &(&b * &q) + &r);

        let (s2, q2) = a.quasi_div(&b).unwrap();
        assert_eq!((s2, q2), (s, q));
    }

    #[test]
    fn widens_on_overflow() {
        let c = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let a = poly(&c, &[(1, [2, 0])]);
        let b = poly(&c, &[(1, [1, 0]), (1, [0, 100])]);
        assert_eq!(a.codec.bits(), 8);
        let (s, q, r) = a.quasi_divrem(&b).unwrap();
        assert_eq!(s, 1);
        assert_eq!(q, poly(&c, &[(1, [1, 0]), (-1, [0, 100])]));
        assert_eq!(r, poly(&c, &[(1, [0, 200])]));
        assert!(r.codec.bits() >= 16);
    }

    #[test]
    fn ideal() {
        let c = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let f = poly(&c, &[(1, [2, 1]), (1, [1, 2]), (1, [0, 2])]);
        let f1 = poly(&c, &[(1, [1, 1]), (-1, [0, 0])]);
        let f2 = poly(&c, &[(1, [0, 2]), (-1, [0, 0])]);
        let d = f.quasi_divrem_ideal(&[f1, f2]).unwrap();
        assert_eq!(d.scale, 1);
        assert_eq!(d.quotients[0], poly(&c, &[(1, [1, 0]), (1, [0, 1])]));
        assert_eq!(d.quotients[1], poly(&c, &[(1, [0, 0])]));
        assert_eq!(
            d.remainder,
            poly(&c, &[(1, [1, 0]), (1, [0, 1]), (1, [0, 0])])
        );
    }

    #[test]
    fn scaled_ideal() {
        let c = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let f = poly(&c, &[(1, [2, 1]), (5, [1, 0]), (1, [0, 2]), (-7, [0, 0])]);
        let divs = [
            poly(&c, &[(2, [1, 0]), (1, [0, 0])]),
            poly(&c, &[(3, [0, 1]), (-1, [0, 0])]),
        ];
        let d = f.quasi_divrem_ideal(&divs).unwrap();
        assert!(d.scale > 1);

        let mut rhs = d.remainder.clone();
        for (q, g) in d.quotients.iter().zip(&divs) {
            rhs = &rhs + &(q * g);
        }
        assert_eq!(f.clone().mul_coeff(d.scale.clone()), rhs);

        // every remainder term is a constant, the only monomial not
        // divisible by x or y
        assert!(d.remainder.nterms() <= 1);
        assert!(d.remainder.is_constant());
    }
}
