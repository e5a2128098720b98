//! Multivariate polynomials with rational coefficients.
//!
//! A [QPolynomial] is stored as a rational *content* times a primitive
//! integer polynomial with a positive leading coefficient. Keeping the
//! rational part out of the terms means that most of the work happens on
//! integers, and that scaling a polynomial by a rational touches a single
//! number.
//!
//! Every public operation returns a polynomial in canonical form:
//! - the integer polynomial is empty if and only if the content is zero;
//! - otherwise its coefficients have gcd 1 and its leading coefficient is
//!   positive.

use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use ahash::HashMap;
use rug::{Integer, Rational};
use smallvec::{smallvec, SmallVec};
use tracing::debug;

use super::geobucket::QGeobucket;
use super::monomial::{MonomialCodec, INLINED_WORDS};
use super::polynomial::MultivariatePolynomial;
use super::{PolynomialContext, INLINED_EXPONENTS};
use crate::error::PolynomialError;
use crate::rings::integer::{bit_length, IntegerRing};
use crate::rings::rational::{
    gcd_cofactors, height, is_trivial_base, pow_checked, pow_integer_checked,
};
use crate::utils;

/// A multivariate polynomial with rational coefficients, stored as
/// `content * zpoly`.
#[derive(Clone, Debug)]
pub struct QPolynomial {
    pub(crate) content: Rational,
    pub(crate) zpoly: MultivariatePolynomial<IntegerRing>,
}

impl QPolynomial {
    /// Create the zero polynomial in `context`.
    pub fn new(context: Arc<PolynomialContext>) -> QPolynomial {
        QPolynomial {
            content: Rational::new(),
            zpoly: MultivariatePolynomial::new(&IntegerRing::new(), None, context),
        }
    }

    /// Create a polynomial from a content and an integer polynomial that
    /// need not be canonical.
    pub fn from_parts(content: Rational, zpoly: MultivariatePolynomial<IntegerRing>) -> QPolynomial {
        let mut p = QPolynomial { content, zpoly };
        p.reduce();
        p
    }

    pub fn from_integer_polynomial(zpoly: MultivariatePolynomial<IntegerRing>) -> QPolynomial {
        Self::from_parts(Rational::from(1), zpoly)
    }

    /// Build a polynomial from terms in any order, reducing once at the end.
    pub fn from_terms(
        context: Arc<PolynomialContext>,
        terms: Vec<(Rational, Vec<u64>)>,
    ) -> Result<QPolynomial, PolynomialError> {
        let mut den = Integer::from(1);
        for (c, _) in &terms {
            den.lcm_mut(c.denom());
        }

        let int_terms = terms
            .into_iter()
            .map(|(c, e)| {
                let (n, d) = c.into_numer_denom();
                (n * Integer::from(den.div_exact_ref(&d)), e)
            })
            .collect();

        let zpoly = MultivariatePolynomial::from_terms(&IntegerRing::new(), context, int_terms)?;
        Ok(Self::from_parts(Rational::from((1, den)), zpoly))
    }

    #[inline]
    pub fn zero(&self) -> QPolynomial {
        QPolynomial {
            content: Rational::new(),
            zpoly: self.zpoly.zero(),
        }
    }

    /// Create a constant polynomial in the same context.
    pub fn constant(&self, c: Rational) -> QPolynomial {
        if c == 0 {
            return self.zero();
        }

        QPolynomial {
            content: c,
            zpoly: self.zpoly.one(),
        }
    }

    #[inline]
    pub fn one(&self) -> QPolynomial {
        self.constant(Rational::from(1))
    }

    /// Create the polynomial `var`.
    pub fn variable(&self, var: usize) -> QPolynomial {
        QPolynomial {
            content: Rational::from(1),
            zpoly: self.zpoly.variable(var),
        }
    }

    /// The rational content.
    #[inline]
    pub fn content(&self) -> &Rational {
        &self.content
    }

    /// The primitive integer part.
    #[inline]
    pub fn zpoly(&self) -> &MultivariatePolynomial<IntegerRing> {
        &self.zpoly
    }

    #[inline]
    pub fn context(&self) -> &Arc<PolynomialContext> {
        &self.zpoly.context
    }

    /// Split into content and integer part.
    pub fn into_parts(self) -> (Rational, MultivariatePolynomial<IntegerRing>) {
        (self.content, self.zpoly)
    }

    #[inline]
    pub fn nterms(&self) -> usize {
        self.zpoly.nterms()
    }

    #[inline]
    pub fn nvars(&self) -> usize {
        self.zpoly.nvars()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.zpoly.is_zero()
    }

    #[inline]
    pub fn is_one(&self) -> bool {
        self.content == 1 && self.zpoly.is_one()
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.zpoly.is_constant()
    }

    /// The coefficient of the monomial 1.
    pub fn get_constant(&self) -> Rational {
        Rational::from(&self.content * &self.zpoly.get_constant())
    }

    /// The coefficient of the leading term, or zero.
    pub fn lcoeff(&self) -> Rational {
        Rational::from(&self.content * &self.zpoly.lcoeff())
    }

    /// The coefficient of the `index`-th term.
    pub fn coefficient(&self, index: usize) -> Result<Rational, PolynomialError> {
        self.zpoly
            .coefficients
            .get(index)
            .map(|c| Rational::from(&self.content * c))
            .ok_or_else(|| {
                PolynomialError::domain(format!(
                    "term index {} out of range for {} terms",
                    index,
                    self.nterms()
                ))
            })
    }

    /// The exponents of the `index`-th term.
    pub fn term_exponents(
        &self,
        index: usize,
    ) -> Result<SmallVec<[Integer; INLINED_EXPONENTS]>, PolynomialError> {
        if index >= self.nterms() {
            return Err(PolynomialError::domain(format!(
                "term index {} out of range for {} terms",
                index,
                self.nterms()
            )));
        }
        Ok(self.zpoly.exponent_vector(index))
    }

    /// The coefficient of the monomial with the given exponents.
    pub fn coefficient_at(&self, exponents: &[u64]) -> Result<Rational, PolynomialError> {
        if exponents.len() != self.nvars() {
            return Err(PolynomialError::domain(format!(
                "expected {} exponents, got {}",
                self.nvars(),
                exponents.len()
            )));
        }

        let bits = MonomialCodec::bits_required(
            self.context().order,
            exponents,
            self.context().config.max_exponent_bits,
        )?;
        if bits > self.zpoly.codec.bits() {
            return Ok(Rational::new());
        }

        let mut packed: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.zpoly.codec.words()];
        self.zpoly.codec.pack(exponents, &mut packed);
        Ok(self.coefficient_packed(&packed))
    }

    fn coefficient_packed(&self, packed: &[u64]) -> Rational {
        let codec = &self.zpoly.codec;
        let mut l = 0;
        let mut r = self.nterms();
        while l < r {
            let m = (l + r) / 2;
            match codec.cmp(self.zpoly.exponents(m), packed) {
                Ordering::Greater => l = m + 1,
                Ordering::Less => r = m,
                Ordering::Equal => {
                    return Rational::from(&self.content * &self.zpoly.coefficients[m]);
                }
            }
        }
        Rational::new()
    }

    /// The coefficient of the monomial `monomial`, which must be a single
    /// term with coefficient 1.
    pub fn coefficient_of(&self, monomial: &QPolynomial) -> Result<Rational, PolynomialError> {
        self.zpoly.check_context(&monomial.zpoly)?;

        if monomial.nterms() != 1 || monomial.content != 1 {
            return Err(PolynomialError::domain(format!(
                "{} is not a monomial",
                monomial
            )));
        }

        let bits = self.zpoly.codec.bits();
        if monomial.zpoly.codec.bits() > bits {
            let wide = self.zpoly.widened(monomial.zpoly.codec.bits());
            let p = QPolynomial {
                content: self.content.clone(),
                zpoly: wide.into_owned(),
            };
            return Ok(p.coefficient_packed(monomial.zpoly.exponents(0)));
        }

        let m = monomial.zpoly.widened(bits);
        Ok(self.coefficient_packed(m.exponents(0)))
    }

    /// The degree in `var`. The zero polynomial has degree 0.
    #[inline]
    pub fn degree(&self, var: usize) -> Integer {
        self.zpoly.degree(var)
    }

    /// The total degree. The zero polynomial has degree 0.
    #[inline]
    pub fn total_degree(&self) -> Integer {
        self.zpoly.total_degree()
    }

    /// Restore the canonical form: move the content of the integer
    /// coefficients into the rational content and make the leading
    /// coefficient positive.
    pub fn reduce(&mut self) {
        if self.zpoly.is_zero() {
            self.content = Rational::new();
            return;
        }

        if self.content == 0 {
            self.zpoly.clear();
            return;
        }

        let mut g = self.zpoly.content().abs();
        if self.zpoly.coefficients[0].cmp0() == Ordering::Less {
            g = -g;
        }

        if g == 1 {
            return;
        }

        if g == -1 {
            self.negate_zpoly();
            return;
        }

        for c in &mut self.zpoly.coefficients {
            c.div_exact_mut(&g);
        }
        self.content *= Rational::from(g);
    }

    /// Like [reduce](Self::reduce), but when the polynomial has
    /// `bound` terms it is known to be primitive and only the sign of the
    /// leading coefficient is fixed.
    pub fn reduce_easy(&mut self, bound: usize) {
        if self.nterms() == bound && bound > 0 {
            if self.zpoly.coefficients[0].cmp0() == Ordering::Less {
                self.negate_zpoly();
            }
        } else {
            self.reduce();
        }
    }

    fn negate_zpoly(&mut self) {
        for c in &mut self.zpoly.coefficients {
            *c = -std::mem::take(c);
        }
        self.content = -std::mem::take(&mut self.content);
    }

    /// Check that the polynomial is in canonical form.
    pub fn check_canonical(&self) -> Result<(), PolynomialError> {
        if (self.content == 0) != self.zpoly.is_zero() {
            return Err(PolynomialError::InvariantViolation(format!(
                "content {} with {} terms",
                self.content,
                self.nterms()
            )));
        }

        self.zpoly
            .validate()
            .map_err(PolynomialError::InvariantViolation)?;

        if self.zpoly.is_zero() {
            return Ok(());
        }

        if self.zpoly.coefficients[0].cmp0() != Ordering::Greater {
            return Err(PolynomialError::InvariantViolation(
                "leading coefficient is not positive".to_owned(),
            ));
        }

        let g = self.zpoly.content();
        if g != 1 {
            return Err(PolynomialError::InvariantViolation(format!(
                "coefficients have common factor {}",
                g
            )));
        }

        Ok(())
    }

    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.check_canonical().is_ok()
    }

    /// Compute `self + sign * other` by scaling with the cofactors of the
    /// gcd of the contents, so that no denominators are multiplied out.
    fn add_scaled(&self, other: &QPolynomial, negate: bool) -> QPolynomial {
        if other.is_zero() {
            self.zpoly.assert_context(&other.zpoly);
            return self.clone();
        }
        if self.is_zero() {
            self.zpoly.assert_context(&other.zpoly);
            return if negate { -other.clone() } else { other.clone() };
        }

        let (g, t1, mut t2) = gcd_cofactors(&self.content, &other.content);
        if negate {
            t2 = -t2;
        }

        let mut res = QPolynomial {
            content: g,
            zpoly: self.zpoly.scalar_fmma(&t1, &other.zpoly, &t2),
        };
        res.reduce_easy(self.nterms() + other.nterms());
        res
    }

    /// Add `c * x^packed`, with `packed` encoded by the codec of `zpoly`.
    fn add_term_packed(&mut self, c: &Rational, packed: &[u64]) {
        if *c == 0 {
            return;
        }

        if self.is_zero() {
            self.zpoly.append_monomial_packed(Integer::from(1), packed);
            self.content = c.clone();
            return;
        }

        let t = Rational::from(c / &self.content);
        let (num, den) = t.into_numer_denom();
        if den != 1 {
            // make room for the denominator of the new term
            let z = self.zpoly.zero();
            let zpoly = std::mem::replace(&mut self.zpoly, z);
            self.zpoly = zpoly.mul_coeff(den.clone());
            self.content /= Rational::from(den);
        }

        let n = self.nterms();
        self.zpoly.append_monomial_packed(num, packed);

        if self.nterms() > n {
            self.reduce_easy(self.nterms());
        } else {
            self.reduce();
        }
    }

    /// Add the term `c * x^exponents`, keeping the polynomial canonical.
    pub fn push_term(&mut self, c: &Rational, exponents: &[u64]) -> Result<(), PolynomialError> {
        if exponents.len() != self.nvars() {
            return Err(PolynomialError::domain(format!(
                "expected {} exponents, got {}",
                self.nvars(),
                exponents.len()
            )));
        }

        let bits = MonomialCodec::bits_required(
            self.context().order,
            exponents,
            self.context().config.max_exponent_bits,
        )?;
        self.zpoly.widen(bits);

        let mut packed: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.zpoly.codec.words()];
        self.zpoly.codec.pack(exponents, &mut packed);
        self.add_term_packed(c, &packed);
        Ok(())
    }

    /// Compute `self + c`.
    pub fn add_rational(&self, c: &Rational) -> QPolynomial {
        let mut res = self.clone();
        let one: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.zpoly.codec.words()];
        res.add_term_packed(c, &one);
        res
    }

    /// Compute `self - c`.
    pub fn sub_rational(&self, c: &Rational) -> QPolynomial {
        self.add_rational(&Rational::from(-c))
    }

    /// Multiply two polynomials. The product of primitive polynomials is
    /// primitive, so the result needs no reduction.
    pub fn try_mul(&self, other: &QPolynomial) -> Result<QPolynomial, PolynomialError> {
        let zpoly = self.zpoly.try_mul(&other.zpoly)?;
        if zpoly.is_zero() {
            return Ok(QPolynomial {
                content: Rational::new(),
                zpoly,
            });
        }

        Ok(QPolynomial {
            content: Rational::from(&self.content * &other.content),
            zpoly,
        })
    }

    /// Multiply on a thread pool with `threads` threads.
    pub fn mul_parallel(
        &self,
        other: &QPolynomial,
        threads: usize,
    ) -> Result<QPolynomial, PolynomialError> {
        let zpoly = self.zpoly.mul_parallel(&other.zpoly, threads)?;
        if zpoly.is_zero() {
            return Ok(QPolynomial {
                content: Rational::new(),
                zpoly,
            });
        }

        Ok(QPolynomial {
            content: Rational::from(&self.content * &other.content),
            zpoly,
        })
    }

    /// Compute `self * c`. Only the content changes.
    pub fn mul_rational(&self, c: &Rational) -> QPolynomial {
        if *c == 0 || self.is_zero() {
            return self.zero();
        }

        QPolynomial {
            content: Rational::from(&self.content * c),
            zpoly: self.zpoly.clone(),
        }
    }

    /// Compute `self / c`. Only the content changes.
    pub fn div_rational(&self, c: &Rational) -> Result<QPolynomial, PolynomialError> {
        if *c == 0 {
            return Err(PolynomialError::DivisionByZero);
        }

        Ok(QPolynomial {
            content: Rational::from(&self.content / c),
            zpoly: self.zpoly.clone(),
        })
    }

    /// Multiply by `var^e`.
    pub fn mul_var_power(&self, var: usize, e: &Integer) -> Result<QPolynomial, PolynomialError> {
        Ok(QPolynomial {
            content: self.content.clone(),
            zpoly: self.zpoly.mul_var_power(var, e)?,
        })
    }

    /// The number of bits of the largest integer coefficient.
    fn coefficient_bits(&self) -> u64 {
        self.zpoly
            .coefficients
            .iter()
            .map(bit_length)
            .max()
            .unwrap_or(0)
    }

    /// An upper bound on the growth in bits of the coefficients per factor
    /// of a power.
    fn power_growth(&self) -> u64 {
        let content = if is_trivial_base(&self.content) {
            0
        } else {
            height(&self.content)
        };

        if self.nterms() > 1 {
            content + self.coefficient_bits() + utils::bit_length_u128(self.nterms() as u128) as u64
        } else {
            content
        }
    }

    fn check_feasible(&self, estimate: u64) -> Result<(), PolynomialError> {
        let limit = self.context().config.max_result_bits;
        if estimate > limit {
            debug!("Refusing operation with estimated size {} > {} bits", estimate, limit);
            Err(PolynomialError::Infeasible { estimate, limit })
        } else {
            Ok(())
        }
    }

    /// Raise the single term of the integer part to the power `e` by
    /// scaling its exponents.
    fn monomial_pow(&self, e: &Integer) -> Result<MultivariatePolynomial<IntegerRing>, PolynomialError> {
        let exponents: SmallVec<[Integer; INLINED_EXPONENTS]> = self
            .zpoly
            .exponent_vector(0)
            .into_iter()
            .map(|x| x * e)
            .collect();

        let bits = MonomialCodec::bits_required_integers(
            self.context().order,
            &exponents,
            self.context().config.max_exponent_bits,
        )?
        .max(self.zpoly.codec.bits());

        let mut res = self.zpoly.zero();
        res.codec = res.codec.with_bits(bits);
        res.exponents.resize(res.codec.words(), 0);
        res.codec.pack_integers(&exponents, &mut res.exponents);
        res.coefficients.push(Integer::from(1));
        Ok(res)
    }

    /// Compute `self^k`.
    pub fn pow(&self, k: u64) -> Result<QPolynomial, PolynomialError> {
        if k == 0 {
            return Ok(self.one());
        }
        if self.is_zero() || k == 1 {
            return Ok(self.clone());
        }

        self.check_feasible(self.power_growth().saturating_mul(k))?;

        let limit = self.context().config.max_result_bits;
        let content = pow_checked(&self.content, k, limit)?;
        let zpoly = if self.nterms() == 1 {
            self.monomial_pow(&Integer::from(k))?
        } else {
            self.zpoly.pow(k)?
        };

        Ok(QPolynomial { content, zpoly })
    }

    /// Compute `self^k` for a non-negative arbitrary-precision `k`.
    pub fn pow_integer(&self, k: &Integer) -> Result<QPolynomial, PolynomialError> {
        if k.cmp0() == Ordering::Less {
            return Err(PolynomialError::domain(format!("negative exponent {}", k)));
        }

        if let Some(k) = k.to_u64() {
            return self.pow(k);
        }

        if self.is_zero() {
            return Ok(self.clone());
        }

        let limit = self.context().config.max_result_bits;
        if self.nterms() == 1 {
            let content = pow_integer_checked(&self.content, k, limit)?;
            return Ok(QPolynomial {
                content,
                zpoly: self.monomial_pow(k)?,
            });
        }

        Err(PolynomialError::Infeasible {
            estimate: u64::MAX,
            limit,
        })
    }

    /// Compute `self^k` for a signed `k`. Negative powers are only defined
    /// for non-zero constants.
    pub fn pow_i64(&self, k: i64) -> Result<QPolynomial, PolynomialError> {
        if k >= 0 {
            return self.pow(k as u64);
        }

        if self.is_zero() {
            return Err(PolynomialError::DivisionByZero);
        }

        if !self.is_constant() {
            return Err(PolynomialError::domain(format!(
                "cannot raise the non-constant {} to the negative power {}",
                self, k
            )));
        }

        let limit = self.context().config.max_result_bits;
        let c = pow_checked(&self.get_constant().recip(), k.unsigned_abs(), limit)?;
        Ok(self.constant(c))
    }

    /// Compute the quotient of the division by `div`, dropping the
    /// remainder.
    pub fn div(&self, div: &QPolynomial) -> Result<QPolynomial, PolynomialError> {
        if div.is_zero() {
            return Err(PolynomialError::DivisionByZero);
        }
        self.zpoly.check_context(&div.zpoly)?;

        if self.is_zero() {
            return Ok(self.zero());
        }

        let (s, q) = self.zpoly.quasi_div(&div.zpoly)?;
        let content = Rational::from(&self.content / &div.content) / Rational::from(s);
        Ok(QPolynomial::from_parts(content, q))
    }

    /// Divide by `div` if the division is exact.
    pub fn divides(&self, div: &QPolynomial) -> Result<Option<QPolynomial>, PolynomialError> {
        if div.is_zero() {
            return Err(PolynomialError::DivisionByZero);
        }
        self.zpoly.check_context(&div.zpoly)?;

        if self.is_zero() {
            return Ok(Some(self.zero()));
        }

        // the primitive parts divide over the integers iff they divide over the rationals
        Ok(self.zpoly.divides(&div.zpoly)?.map(|q| {
            QPolynomial::from_parts(Rational::from(&self.content / &div.content), q)
        }))
    }

    /// Compute `(q, r)` with `self = div * q + r`, such that no term of `r`
    /// is divisible by the leading monomial of `div`.
    pub fn divrem(
        &self,
        div: &QPolynomial,
    ) -> Result<(QPolynomial, QPolynomial), PolynomialError> {
        if div.is_zero() {
            return Err(PolynomialError::DivisionByZero);
        }
        self.zpoly.check_context(&div.zpoly)?;

        if self.is_zero() {
            return Ok((self.zero(), self.zero()));
        }

        let (s, q, r) = self.zpoly.quasi_divrem(&div.zpoly)?;
        let rc = Rational::from(&self.content / &Rational::from(s));
        let qc = Rational::from(&rc / &div.content);
        Ok((QPolynomial::from_parts(qc, q), QPolynomial::from_parts(rc, r)))
    }

    /// Divide by a sequence of polynomials, see
    /// [quasi_divrem_ideal](MultivariatePolynomial::quasi_divrem_ideal).
    pub fn divrem_ideal(
        &self,
        divs: &[QPolynomial],
    ) -> Result<(Vec<QPolynomial>, QPolynomial), PolynomialError> {
        if divs.iter().any(|d| d.is_zero()) {
            return Err(PolynomialError::DivisionByZero);
        }
        for d in divs {
            self.zpoly.check_context(&d.zpoly)?;
        }

        let zdivs: Vec<_> = divs.iter().map(|d| d.zpoly.clone()).collect();
        let d = self.zpoly.quasi_divrem_ideal(&zdivs)?;

        let rc = Rational::from(&self.content / &Rational::from(d.scale));
        let quotients = d
            .quotients
            .into_iter()
            .zip(divs)
            .map(|(q, b)| QPolynomial::from_parts(Rational::from(&rc / &b.content), q))
            .collect();

        Ok((quotients, QPolynomial::from_parts(rc, d.remainder)))
    }

    /// Compute the monic greatest common divisor. The gcd of two zero
    /// polynomials is zero.
    pub fn gcd(&self, other: &QPolynomial) -> Result<QPolynomial, PolynomialError> {
        self.zpoly.check_context(&other.zpoly)?;

        let g = self.zpoly.gcd(&other.zpoly)?.make_primitive();
        if g.is_zero() {
            return Ok(self.zero());
        }

        let lc = g.lcoeff();
        Ok(QPolynomial {
            content: Rational::from((1, lc)),
            zpoly: g,
        })
    }

    /// Take the derivative with respect to `var`.
    pub fn derivative(&self, var: usize) -> Result<QPolynomial, PolynomialError> {
        Ok(QPolynomial::from_parts(
            self.content.clone(),
            self.zpoly.derivative(var)?,
        ))
    }

    /// Integrate with respect to `var`, with integration constant zero.
    pub fn integral(&self, var: usize) -> Result<QPolynomial, PolynomialError> {
        let (s, p) = self.zpoly.integral(var)?;
        Ok(QPolynomial::from_parts(
            Rational::from(&self.content / &Rational::from(s)),
            p,
        ))
    }

    /// Replace `var` by the value `v`.
    pub fn evaluate_one(&self, var: usize, v: &Rational) -> Result<QPolynomial, PolynomialError> {
        if self.is_zero() {
            return Ok(self.clone());
        }

        let d = self.degree(var);
        if !is_trivial_base(v) {
            let estimate = d
                .to_u64()
                .map(|d| d.saturating_mul(height(v)))
                .unwrap_or(u64::MAX)
                .saturating_add(self.coefficient_bits());
            self.check_feasible(estimate)?;
        }

        let (p, d) = self.zpoly.replace_fraction(var, v.numer(), v.denom())?;
        let scale = pow_integer_checked(
            &Rational::from(v.denom()),
            &d,
            self.context().config.max_result_bits,
        )?;
        Ok(QPolynomial::from_parts(
            Rational::from(&self.content / &scale),
            p,
        ))
    }

    /// Evaluate at `values`, one per variable.
    pub fn evaluate_all(&self, values: &[Rational]) -> Result<Rational, PolynomialError> {
        if values.len() != self.nvars() {
            return Err(PolynomialError::domain(format!(
                "expected {} values, got {}",
                self.nvars(),
                values.len()
            )));
        }

        if self.is_zero() {
            return Ok(Rational::new());
        }

        let mut estimate = self.coefficient_bits();
        for (var, v) in values.iter().enumerate() {
            if !is_trivial_base(v) {
                let d = self
                    .degree(var)
                    .to_u64()
                    .map(|d| d.saturating_mul(height(v)))
                    .unwrap_or(u64::MAX);
                estimate = estimate.saturating_add(d);
            }
        }
        self.check_feasible(estimate)?;

        let fractions: Vec<(Integer, Integer)> = values
            .iter()
            .map(|v| (v.numer().clone(), v.denom().clone()))
            .collect();
        let (n, d) = self.zpoly.evaluate_fractions(&fractions)?;
        Ok(Rational::from((n, d)) * &self.content)
    }

    /// Substitute `values[i]` for the `i`-th variable. The result lives in
    /// the context of the values.
    pub fn compose(&self, values: &[QPolynomial]) -> Result<QPolynomial, PolynomialError> {
        if values.len() != self.nvars() {
            return Err(PolynomialError::domain(format!(
                "expected {} polynomials, got {}",
                self.nvars(),
                values.len()
            )));
        }

        let context = values
            .first()
            .map(|v| v.context().clone())
            .unwrap_or_else(|| self.context().clone());
        for v in values {
            PolynomialContext::check_compatible(&context, v.context())?;
        }

        let mut estimate = self.coefficient_bits();
        for (var, v) in values.iter().enumerate() {
            let d = self.degree(var).to_u64().unwrap_or(u64::MAX);
            estimate = estimate.saturating_add(d.saturating_mul(v.power_growth()));
        }
        if !values.iter().all(|v| v.nterms() <= 1 && is_trivial_base(&v.content)) {
            self.check_feasible(estimate)?;
        }

        let mut powers: Vec<HashMap<Integer, QPolynomial>> =
            values.iter().map(|_| HashMap::default()).collect();

        let unit = QPolynomial::new(context.clone()).one();
        let mut acc = QGeobucket::new(context);
        for t in &self.zpoly {
            let mut term = unit.mul_rational(&Rational::from(t.coefficient.clone()));
            for (var, v) in values.iter().enumerate() {
                let e = self.zpoly.codec.exponent_integer(t.exponents, var);
                if e == 0 {
                    continue;
                }

                let p = match powers[var].get(&e) {
                    Some(p) => p.clone(),
                    None => {
                        let p = v.pow_integer(&e)?;
                        powers[var].insert(e, p.clone());
                        p
                    }
                };
                term = term.try_mul(&p)?;
            }
            acc.add(&term);
        }

        Ok(acc.empty().mul_rational(&self.content))
    }
}

impl PartialEq for QPolynomial {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content && self.zpoly == other.zpoly
    }
}

impl Eq for QPolynomial {}

impl PartialOrd for QPolynomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QPolynomial {
    /// A total order: first by the number of terms, then term by term by
    /// monomial and by coefficient.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.nterms().cmp(&other.nterms()) {
            Ordering::Equal => {}
            o => return o,
        }

        let bits = self.zpoly.codec.bits().max(other.zpoly.codec.bits());
        let (a, b) = (self.zpoly.widened(bits), other.zpoly.widened(bits));
        for i in 0..a.nterms() {
            match a.codec.cmp(a.exponents(i), b.exponents(i)) {
                Ordering::Equal => {}
                o => return o,
            }

            let ca = Rational::from(&self.content * &a.coefficients[i]);
            let cb = Rational::from(&other.content * &b.coefficients[i]);
            match ca.cmp(&cb) {
                Ordering::Equal => {}
                o => return o,
            }
        }

        Ordering::Equal
    }
}

impl<'a, 'b> Add<&'a QPolynomial> for &'b QPolynomial {
    type Output = QPolynomial;

    fn add(self, other: &'a QPolynomial) -> QPolynomial {
        self.add_scaled(other, false)
    }
}

impl Add for QPolynomial {
    type Output = QPolynomial;

    fn add(self, other: QPolynomial) -> QPolynomial {
        self.add_scaled(&other, false)
    }
}

impl<'a, 'b> Sub<&'a QPolynomial> for &'b QPolynomial {
    type Output = QPolynomial;

    fn sub(self, other: &'a QPolynomial) -> QPolynomial {
        self.add_scaled(other, true)
    }
}

impl Sub for QPolynomial {
    type Output = QPolynomial;

    fn sub(self, other: QPolynomial) -> QPolynomial {
        self.add_scaled(&other, true)
    }
}

impl<'a, 'b> Mul<&'a QPolynomial> for &'b QPolynomial {
    type Output = QPolynomial;

    /// Multiply two polynomials. Panics when the exponents of the product
    /// cannot be packed.
    fn mul(self, other: &'a QPolynomial) -> QPolynomial {
        self.try_mul(other)
            .unwrap_or_else(|e| panic!("Cannot multiply polynomials: {}", e))
    }
}

impl Mul for QPolynomial {
    type Output = QPolynomial;

    fn mul(self, other: QPolynomial) -> QPolynomial {
        &self * &other
    }
}

impl Neg for QPolynomial {
    type Output = QPolynomial;

    fn neg(mut self) -> QPolynomial {
        self.content = -std::mem::take(&mut self.content);
        self
    }
}

impl<'a> Neg for &'a QPolynomial {
    type Output = QPolynomial;

    fn neg(self) -> QPolynomial {
        -self.clone()
    }
}

impl<'a, 'b> Add<&'a Rational> for &'b QPolynomial {
    type Output = QPolynomial;

    fn add(self, other: &'a Rational) -> QPolynomial {
        self.add_rational(other)
    }
}

impl<'a, 'b> Sub<&'a Rational> for &'b QPolynomial {
    type Output = QPolynomial;

    fn sub(self, other: &'a Rational) -> QPolynomial {
        self.sub_rational(other)
    }
}

impl<'a, 'b> Mul<&'a Rational> for &'b QPolynomial {
    type Output = QPolynomial;

    fn mul(self, other: &'a Rational) -> QPolynomial {
        self.mul_rational(other)
    }
}

impl<'a, 'b> Div<&'a Rational> for &'b QPolynomial {
    type Output = QPolynomial;

    /// Divide by a rational number. Panics on division by zero.
    fn div(self, other: &'a Rational) -> QPolynomial {
        self.div_rational(other)
            .unwrap_or_else(|e| panic!("Cannot divide polynomial: {}", e))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rug::{Integer, Rational};

    use super::QPolynomial;
    use crate::config::Config;
    use crate::error::PolynomialError;
    use crate::poly::{MonomialOrder, PolynomialContext};

    fn ctx() -> Arc<PolynomialContext> {
        PolynomialContext::new(&["x", "y"], MonomialOrder::Lex)
    }

    fn q(n: i64, d: i64) -> Rational {
        Rational::from((n, d))
    }

    fn poly(ctx: &Arc<PolynomialContext>, terms: &[((i64, i64), [u64; 2])]) -> QPolynomial {
        QPolynomial::from_terms(
            ctx.clone(),
            terms
                .iter()
                .map(|((n, d), e)| (q(*n, *d), e.to_vec()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn canonical_form() {
        let c = ctx();
        let f = poly(&c, &[((-4, 3), [1, 0]), ((2, 1), [0, 1])]);
        f.check_canonical().unwrap();
        assert_eq!(*f.content(), q(-2, 3));
        assert_eq!(f.zpoly().coefficients, vec![Integer::from(2), Integer::from(-3)]);

        let z = poly(&c, &[((1, 2), [1, 0]), ((-1, 2), [1, 0])]);
        assert!(z.is_zero());
        assert_eq!(*z.content(), 0);
    }

    #[test]
    fn single_negative_term() {
        let c = ctx();
        let f = poly(&c, &[((-1, 5), [0, 3])]);
        f.check_canonical().unwrap();
        assert_eq!(*f.content(), q(-1, 5));
        assert_eq!(f.zpoly().coefficients, vec![Integer::from(1)]);
        assert_eq!(f, -&poly(&c, &[((1, 5), [0, 3])]));

        let m = poly(&c, &[((-4, 1), [0, 0])]);
        m.check_canonical().unwrap();
        assert_eq!(m, -&poly(&c, &[((4, 1), [0, 0])]));
        assert_eq!(m, m.constant(q(-4, 1)));
    }

    #[test]
    fn cancelling_sum() {
        let c = ctx();
        let f = poly(&c, &[((2, 3), [2, 1]), ((1, 1), [0, 0])]);
        let g = poly(&c, &[((-1, 3), [2, 1]), ((5, 1), [0, 0])]);
        let s = &f + &g;
        s.check_canonical().unwrap();
        assert_eq!(s, poly(&c, &[((1, 3), [2, 1]), ((6, 1), [0, 0])]));

        let h = &poly(&c, &[((2, 3), [2, 1]), ((1, 1), [0, 0])])
            + &poly(&c, &[((-2, 3), [2, 1]), ((1, 1), [0, 0])]);
        assert_eq!(h, h.constant(q(2, 1)));
        assert_eq!(*h.content(), 2);
    }

    #[test]
    fn push_term_rescales() {
        let c = ctx();
        let mut f = QPolynomial::new(c.clone());
        f.push_term(&q(1, 2), &[1, 0]).unwrap();
        f.push_term(&q(1, 3), &[0, 1]).unwrap();
        f.check_canonical().unwrap();
        assert_eq!(*f.content(), q(1, 6));

        f.push_term(&q(-1, 3), &[0, 1]).unwrap();
        f.check_canonical().unwrap();
        assert_eq!(f, poly(&c, &[((1, 2), [1, 0])]));

        f.push_term(&q(-1, 2), &[1, 0]).unwrap();
        assert!(f.is_zero());
        f.check_canonical().unwrap();
    }

    #[test]
    fn scalar_ops_touch_content() {
        let c = ctx();
        let f = poly(&c, &[((6, 1), [1, 1])]);
        let g = &f * &q(4, 1);
        assert_eq!(*g.content(), 24);
        assert_eq!(g.zpoly(), f.zpoly());
        assert_eq!(g.zpoly().coefficients, vec![Integer::from(1)]);

        assert_eq!(&g / &q(4, 1), f);
        assert!((&f * &q(0, 1)).is_zero());
        assert_eq!(f.div_rational(&q(0, 1)), Err(PolynomialError::DivisionByZero));
    }

    #[test]
    fn division() {
        let c = ctx();
        let x = QPolynomial::new(c.clone()).variable(0);
        let y = x.variable(1);
        let g = &x.one() + &(&x + &y);
        let f = g.pow(3).unwrap();
        assert_eq!(f.divides(&g).unwrap(), Some(g.pow(2).unwrap()));

        let a = (&x.one() + &x).pow(2).unwrap();
        let b = &x.one() + &y;
        assert_eq!(a.divides(&b).unwrap(), None);

        // x^2 + 1 = (1/2 x - 1/4) (2x + 1) + 5/4
        let a = &x.pow(2).unwrap() + &q(1, 1);
        let b = &(&x * &q(2, 1)) + &q(1, 1);
        let (qq, r) = a.divrem(&b).unwrap();
        assert_eq!(qq, &(&x * &q(1, 2)) - &x.constant(q(1, 4)));
        assert_eq!(r, x.constant(q(5, 4)));
        assert_eq!(a.div(&b).unwrap(), qq);

        let zero = x.zero();
        assert!(zero.div(&x).unwrap().is_zero());
        assert_eq!(zero.div(&zero), Err(PolynomialError::DivisionByZero));
        assert_eq!(
            a.divrem_ideal(&[b.clone(), zero]),
            Err(PolynomialError::DivisionByZero)
        );
    }

    #[test]
    fn powers() {
        let c = ctx();
        let x = QPolynomial::new(c.clone()).variable(0);
        let f = &(&x * &q(2, 3)) + &q(1, 1);
        let f3 = f.pow(3).unwrap();
        assert_eq!(f3, &(&f * &f) * &f);

        let big = Integer::from(1) << 80;
        let m = x.pow_integer(&big).unwrap();
        assert_eq!(m.degree(0), big);
        assert!(matches!(
            f.pow_integer(&big),
            Err(PolynomialError::Infeasible { .. })
        ));

        assert_eq!(x.constant(q(2, 3)).pow_i64(-2).unwrap(), x.constant(q(9, 4)));
        assert!(matches!(x.pow_i64(-1), Err(PolynomialError::Domain(_))));
    }

    #[test]
    fn feasibility_limit() {
        let c = PolynomialContext::with_config(
            &["x"],
            MonomialOrder::Lex,
            Config::default().with_max_result_bits(1000),
        );
        let x = QPolynomial::new(c).variable(0);
        let f = &x + &q(1, 3);
        assert!(f.pow(100).is_ok());
        assert!(matches!(
            f.pow(1000),
            Err(PolynomialError::Infeasible { .. })
        ));
        assert!(x.evaluate_one(0, &q(1, 3)).is_ok());
    }

    #[test]
    fn evaluation() {
        let c = ctx();
        let f = poly(&c, &[((1, 1), [2, 1]), ((1, 1), [0, 0])]);
        assert_eq!(f.evaluate_all(&[q(2, 1), q(3, 1)]).unwrap(), 13);

        let g = f.evaluate_one(0, &q(2, 1)).unwrap();
        assert_eq!(g, poly(&c, &[((4, 1), [0, 1]), ((1, 1), [0, 0])]));
        assert_eq!(g.evaluate_all(&[q(0, 1), q(3, 1)]).unwrap(), 13);

        let h = f.evaluate_one(1, &q(-1, 2)).unwrap();
        h.check_canonical().unwrap();
        assert_eq!(h, poly(&c, &[((-1, 2), [2, 0]), ((1, 1), [0, 0])]));
    }

    #[test]
    fn calculus() {
        let c = ctx();
        let f = poly(&c, &[((3, 2), [2, 1]), ((1, 1), [0, 1]), ((7, 1), [0, 0])]);
        let d = f.derivative(0).unwrap();
        assert_eq!(d, poly(&c, &[((3, 1), [1, 1])]));

        let i = f.integral(0).unwrap();
        i.check_canonical().unwrap();
        assert_eq!(
            i,
            poly(&c, &[((1, 2), [3, 1]), ((1, 1), [1, 1]), ((7, 1), [1, 0])])
        );
        assert_eq!(i.derivative(0).unwrap(), f);
    }

    #[test]
    fn derivative_of_huge_exponent() {
        let c = ctx();
        let e = Integer::from(1) << 70;
        let y = poly(&c, &[((3, 2), [0, 1])]);
        let f = y.mul_var_power(0, &e).unwrap();

        let d = f.derivative(0).unwrap();
        d.check_canonical().unwrap();
        let expected = poly(&c, &[((3, 2), [0, 1])])
            .mul_rational(&Rational::from(&e))
            .mul_var_power(0, &Integer::from(&e - 1))
            .unwrap();
        assert_eq!(d, expected);
    }

    #[test]
    fn composition() {
        let c = ctx();
        let f = poly(&c, &[((1, 1), [2, 0]), ((1, 2), [0, 1])]);
        let x = f.variable(0);
        let y = f.variable(1);
        // x -> x + y, y -> 2x
        let g = f.compose(&[&x + &y, &x * &q(2, 1)]).unwrap();
        assert_eq!(g, &(&x + &y).pow(2).unwrap() + &x);
    }

    #[test]
    fn coefficients() {
        let c = ctx();
        let f = poly(&c, &[((2, 3), [2, 1]), ((5, 1), [0, 0])]);
        assert_eq!(f.coefficient(0).unwrap(), q(2, 3));
        assert!(matches!(f.coefficient(2), Err(PolynomialError::Domain(_))));
        assert_eq!(f.coefficient_at(&[2, 1]).unwrap(), q(2, 3));
        assert_eq!(f.coefficient_at(&[300, 1]).unwrap(), 0);

        let m = poly(&c, &[((1, 1), [2, 1])]);
        assert_eq!(f.coefficient_of(&m).unwrap(), q(2, 3));
        assert!(f.coefficient_of(&f).is_err());
        assert_eq!(f.get_constant(), 5);
    }

    #[test]
    fn gcd_is_monic() {
        let c = ctx();
        let x = QPolynomial::new(c.clone()).variable(0);
        let y = x.variable(1);
        let g = &(&x * &q(3, 1)) + &y;
        let a = &g * &(&x - &y);
        let b = &(&g * &(&x + &q(2, 1))) * &q(1, 7);
        let r = a.gcd(&b).unwrap();
        assert_eq!(r, &g * &q(1, 3));
        assert_eq!(r.lcoeff(), 1);
    }
}
