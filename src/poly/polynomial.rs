use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

use ahash::HashMap;
use rayon::prelude::*;
use rug::Integer;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace, warn};

use super::monomial::{MonomialCodec, MonomialKey, INLINED_WORDS};
use super::{PolynomialContext, INLINED_EXPONENTS};
use crate::error::PolynomialError;
use crate::rings::integer::IntegerRing;
use crate::rings::{EuclideanDomain, Ring};

/// A sparse multivariate polynomial with coefficients in the ring `R` and
/// packed exponents.
#[derive(Clone)]
pub struct MultivariatePolynomial<R: Ring> {
    // Data format: the i-th monomial is stored as coefficients[i] and
    // exponents[i * words .. (i + 1) * words], packed by `codec`. Terms are
    // sorted from the largest to the smallest monomial and no coefficient is zero.
    pub coefficients: Vec<R::Element>,
    pub exponents: Vec<u64>,
    pub codec: MonomialCodec,
    pub ring: R,
    pub context: Arc<PolynomialContext>,
}

/// View object for a term in a multivariate polynomial.
#[derive(Copy, Clone, Debug)]
pub struct MonomialView<'a, R: 'a + Ring> {
    pub coefficient: &'a R::Element,
    pub exponents: &'a [u64],
}

/// Iterator over terms in a multivariate polynomial.
pub struct MonomialViewIterator<'a, R: Ring> {
    poly: &'a MultivariatePolynomial<R>,
    index: usize,
}

impl<'a, R: Ring> Iterator for MonomialViewIterator<'a, R> {
    type Item = MonomialView<'a, R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index == self.poly.nterms() {
            None
        } else {
            let view = MonomialView {
                coefficient: &self.poly.coefficients[self.index],
                exponents: self.poly.exponents(self.index),
            };
            self.index += 1;
            Some(view)
        }
    }
}

impl<'a, R: Ring> IntoIterator for &'a MultivariatePolynomial<R> {
    type Item = MonomialView<'a, R>;
    type IntoIter = MonomialViewIterator<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            poly: self,
            index: 0,
        }
    }
}

impl<R: Ring> MultivariatePolynomial<R> {
    /// Constructs a zero polynomial. Instead of using this constructor,
    /// prefer to create new polynomials from existing ones, so that the
    /// context and ring are inherited.
    pub fn new(ring: &R, cap: Option<usize>, context: Arc<PolynomialContext>) -> Self {
        let codec = MonomialCodec::new(context.nvars(), context.order, 8);
        Self {
            coefficients: Vec::with_capacity(cap.unwrap_or(0)),
            exponents: Vec::with_capacity(cap.unwrap_or(0) * codec.words()),
            codec,
            ring: ring.clone(),
            context,
        }
    }

    /// Constructs a zero polynomial, inheriting the ring, context and
    /// packing from `self`.
    #[inline]
    pub fn zero(&self) -> Self {
        self.zero_with_capacity(0)
    }

    #[inline]
    pub fn zero_with_capacity(&self, cap: usize) -> Self {
        Self {
            coefficients: Vec::with_capacity(cap),
            exponents: Vec::with_capacity(cap * self.codec.words()),
            codec: self.codec.clone(),
            ring: self.ring.clone(),
            context: self.context.clone(),
        }
    }

    /// Constructs a constant polynomial, inheriting the ring and context.
    pub fn constant(&self, coeff: R::Element) -> Self {
        let mut res = self.zero();
        if !R::is_zero(&coeff) {
            res.coefficients.push(coeff);
            res.exponents.resize(self.codec.words(), 0);
        }
        res
    }

    #[inline]
    pub fn one(&self) -> Self {
        self.constant(self.ring.one())
    }

    /// Constructs the polynomial `var`.
    pub fn variable(&self, var: usize) -> Self {
        assert!(var < self.nvars(), "Variable index {} out of range", var);
        let mut res = self.zero();
        res.coefficients.push(self.ring.one());
        res.exponents.resize(self.codec.words(), 0);
        self.codec
            .var_power(var, &Integer::from(1), &mut res.exponents);
        res
    }

    /// Constructs a polynomial with a single term.
    pub fn monomial(&self, coeff: R::Element, exponents: &[u64]) -> Result<Self, PolynomialError> {
        let mut res = self.zero();
        res.append_monomial(coeff, exponents)?;
        Ok(res)
    }

    /// Build a polynomial from terms in any order. Equal monomials are
    /// combined and zero terms are dropped.
    pub fn from_terms(
        ring: &R,
        context: Arc<PolynomialContext>,
        terms: Vec<(R::Element, Vec<u64>)>,
    ) -> Result<Self, PolynomialError> {
        let mut res = Self::new(ring, Some(terms.len()), context);
        let max_bits = res.context.config.max_exponent_bits;

        let mut bits = res.codec.bits();
        for (_, e) in &terms {
            if e.len() != res.nvars() {
                return Err(PolynomialError::domain(format!(
                    "expected {} exponents, got {}",
                    res.nvars(),
                    e.len()
                )));
            }
            bits = bits.max(MonomialCodec::bits_required(
                res.context.order,
                e,
                max_bits,
            )?);
        }
        res.codec = res.codec.with_bits(bits);

        let words = res.codec.words();
        for (c, e) in terms {
            if R::is_zero(&c) {
                continue;
            }
            res.coefficients.push(c);
            let len = res.exponents.len();
            res.exponents.resize(len + words, 0);
            res.codec.pack(&e, &mut res.exponents[len..]);
        }

        res.sort_terms();
        Ok(res)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.coefficients.is_empty()
    }

    #[inline]
    pub fn is_one(&self) -> bool {
        self.nterms() == 1
            && self.ring.is_one(&self.coefficients[0])
            && self.codec.is_one(self.exponents(0))
    }

    #[inline]
    pub fn nterms(&self) -> usize {
        self.coefficients.len()
    }

    #[inline]
    pub fn nvars(&self) -> usize {
        self.codec.nvars()
    }

    /// Returns `true` if the polynomial is zero or a non-zero constant.
    #[inline]
    pub fn is_constant(&self) -> bool {
        match self.nterms() {
            0 => true,
            1 => self.codec.is_one(self.exponents(0)),
            _ => false,
        }
    }

    /// Get the constant term of the polynomial.
    pub fn get_constant(&self) -> R::Element {
        match self.coefficients.last() {
            Some(c) if self.codec.is_one(self.exponents(self.nterms() - 1)) => c.clone(),
            _ => self.ring.zero(),
        }
    }

    /// Get the leading coefficient.
    pub fn lcoeff(&self) -> R::Element {
        match self.coefficients.first() {
            Some(c) => c.clone(),
            None => self.ring.zero(),
        }
    }

    /// The packed exponents of the `index`-th term.
    #[inline]
    pub fn exponents(&self, index: usize) -> &[u64] {
        let w = self.codec.words();
        &self.exponents[index * w..(index + 1) * w]
    }

    #[inline]
    pub fn exponents_iter(&self) -> std::slice::Chunks<u64> {
        self.exponents.chunks(self.codec.words())
    }

    /// The unpacked exponents of the `index`-th term.
    pub fn exponent_vector(&self, index: usize) -> SmallVec<[Integer; INLINED_EXPONENTS]> {
        self.codec.unpack_integers(self.exponents(index))
    }

    /// The unpacked exponents of the `index`-th term, if they all fit in a `u64`.
    pub fn exponent_vector_u64(&self, index: usize) -> Option<SmallVec<[u64; INLINED_EXPONENTS]>> {
        let mut e = smallvec![0; self.nvars()];
        if self.codec.unpack(self.exponents(index), &mut e) {
            Some(e)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.coefficients.clear();
        self.exponents.clear();
    }

    /// Get the degree of the variable `var`. The zero polynomial has degree 0.
    /// This operation is O(n).
    pub fn degree(&self, var: usize) -> Integer {
        if !self.codec.is_multiword() {
            let mut max = 0;
            for e in self.exponents_iter() {
                if let Some(d) = self.codec.exponent(e, var) {
                    max = max.max(d);
                }
            }
            return Integer::from(max);
        }

        let mut max = Integer::new();
        for e in self.exponents_iter() {
            let d = self.codec.exponent_integer(e, var);
            if d > max {
                max = d;
            }
        }
        max
    }

    /// The degree of `var`, as a `u64`.
    pub fn degree_u64(&self, var: usize) -> Result<u64, PolynomialError> {
        self.degree(var)
            .to_u64()
            .ok_or_else(|| PolynomialError::domain("degree does not fit in 64 bits"))
    }

    /// Get the total degree. The zero polynomial has degree 0.
    pub fn total_degree(&self) -> Integer {
        let mut max = Integer::new();
        for e in self.exponents_iter() {
            let d = self.codec.total_degree(e);
            if d > max {
                max = d;
            }
        }
        max
    }

    /// The number of value bits of the widest exponent field in use.
    pub fn max_field_bits(&self) -> usize {
        let mut acc: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];
        for e in self.exponents_iter() {
            for (a, x) in acc.iter_mut().zip(e) {
                *a |= x;
            }
        }
        self.codec.field_bits(&acc)
    }

    /// Check if the polynomial is sorted, has no zero coefficients and no
    /// overflowing exponents.
    pub fn validate(&self) -> Result<(), String> {
        if self.exponents.len() != self.nterms() * self.codec.words() {
            return Err(format!(
                "{} exponent words for {} terms",
                self.exponents.len(),
                self.nterms()
            ));
        }

        if self.codec.nvars() != self.context.nvars() {
            return Err("packing does not match the number of variables".to_owned());
        }

        for (i, t) in self.into_iter().enumerate() {
            if R::is_zero(t.coefficient) {
                return Err(format!("zero coefficient in term {}", i));
            }
            if self.codec.overflows(t.exponents) {
                return Err(format!("overflowing exponent in term {}", i));
            }
        }

        for i in 1..self.nterms() {
            match self.codec.cmp(self.exponents(i - 1), self.exponents(i)) {
                Ordering::Greater => {}
                Ordering::Equal => return Err(format!("equal monomials at {}", i)),
                Ordering::Less => return Err(format!("wrong monomial ordering at {}", i)),
            }
        }

        Ok(())
    }

    /// Panic if the polynomial is not consistent, see [validate](Self::validate).
    pub fn check_consistency(&self) {
        if let Err(e) = self.validate() {
            panic!("Inconsistent polynomial: {}", e);
        }
    }

    /// Widen the exponent packing to `bits`, or return an error when asked
    /// to narrow it.
    pub fn repack(&mut self, bits: usize) -> Result<(), PolynomialError> {
        let (codec, exponents) = self.codec.repack(&self.exponents, bits)?;
        self.codec = codec;
        self.exponents = exponents;
        Ok(())
    }

    /// Widen the exponent packing to at least `bits`.
    pub(crate) fn widen(&mut self, bits: usize) {
        if bits <= self.codec.bits() {
            return;
        }

        trace!("Repacking {} terms: {} -> {} bits", self.nterms(), self.codec.bits(), bits);
        let target = self.codec.with_bits(bits);
        let mut exponents = vec![0; self.nterms() * target.words()];
        for (src, dst) in self
            .exponents
            .chunks(self.codec.words())
            .zip(exponents.chunks_mut(target.words()))
        {
            self.codec.repack_into(&target, src, dst);
        }
        self.codec = target;
        self.exponents = exponents;
    }

    pub(crate) fn widened(&self, bits: usize) -> Cow<Self> {
        if bits <= self.codec.bits() {
            Cow::Borrowed(self)
        } else {
            let mut c = self.clone();
            c.widen(bits);
            Cow::Owned(c)
        }
    }

    /// Give both polynomials the same exponent packing.
    pub fn unify_codec(&mut self, other: &mut Self) {
        let bits = self.codec.bits().max(other.codec.bits());
        self.widen(bits);
        other.widen(bits);
    }

    pub(crate) fn check_context(&self, other: &Self) -> Result<(), PolynomialError> {
        PolynomialContext::check_compatible(&self.context, &other.context)
    }

    #[inline]
    pub(crate) fn assert_context(&self, other: &Self) {
        if self.check_context(other).is_err() {
            panic!("Polynomials have different contexts");
        }
    }

    /// Appends a monomial to the polynomial, merging it with an existing
    /// term with the same exponents.
    pub fn append_monomial(
        &mut self,
        coefficient: R::Element,
        exponents: &[u64],
    ) -> Result<(), PolynomialError> {
        if exponents.len() != self.nvars() {
            panic!(
                "nvars mismatched: got {}, expected {}",
                exponents.len(),
                self.nvars()
            );
        }

        let bits = MonomialCodec::bits_required(
            self.context.order,
            exponents,
            self.context.config.max_exponent_bits,
        )?;
        self.widen(bits);

        let mut packed: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];
        self.codec.pack(exponents, &mut packed);
        self.append_monomial_packed(coefficient, &packed);
        Ok(())
    }

    /// Appends a monomial packed with the codec of the polynomial.
    pub fn append_monomial_packed(&mut self, coefficient: R::Element, packed: &[u64]) {
        if R::is_zero(&coefficient) {
            return;
        }

        let words = self.codec.words();

        // should we append to the back?
        if self.nterms() == 0
            || self
                .codec
                .cmp(self.exponents(self.nterms() - 1), packed)
                .is_gt()
        {
            self.coefficients.push(coefficient);
            self.exponents.extend_from_slice(packed);
            return;
        }

        // binary search for the first term that is not larger
        let mut l = 0;
        let mut r = self.nterms();
        while l < r {
            let m = (l + r) / 2;
            match self.codec.cmp(self.exponents(m), packed) {
                Ordering::Greater => l = m + 1,
                Ordering::Less => r = m,
                Ordering::Equal => {
                    self.ring
                        .add_assign(&mut self.coefficients[m], &coefficient);
                    if R::is_zero(&self.coefficients[m]) {
                        self.coefficients.remove(m);
                        self.exponents.drain(m * words..(m + 1) * words);
                    }
                    return;
                }
            }
        }

        self.coefficients.insert(l, coefficient);
        self.exponents
            .splice(l * words..l * words, packed.iter().cloned());
    }

    /// Sort the terms from large to small and combine equal monomials.
    pub fn sort_terms(&mut self) {
        let words = self.codec.words();
        let mut index: Vec<usize> = (0..self.nterms()).collect();
        index.sort_by(|a, b| self.codec.cmp(self.exponents(*b), self.exponents(*a)));

        let mut coefficients: Vec<Option<R::Element>> =
            std::mem::take(&mut self.coefficients).into_iter().map(Some).collect();
        let exponents = std::mem::take(&mut self.exponents);

        for i in index {
            let Some(c) = coefficients[i].take() else {
                continue;
            };
            let e = &exponents[i * words..(i + 1) * words];

            let n = self.nterms();
            if n > 0 && self.exponents(n - 1) == e {
                self.ring.add_assign(&mut self.coefficients[n - 1], &c);
            } else {
                if n > 0 && R::is_zero(&self.coefficients[n - 1]) {
                    self.coefficients.pop();
                    self.exponents.truncate((n - 1) * words);
                }
                self.coefficients.push(c);
                self.exponents.extend_from_slice(e);
            }
        }

        if self.coefficients.last().map(|c| R::is_zero(c)).unwrap_or(false) {
            self.coefficients.pop();
            self.exponents.truncate(self.nterms() * words);
        }
    }

    /// Merge two sorted polynomials, mapping the coefficients of the left and
    /// right operand with `left` and `right`.
    fn merge<F1, F2>(&self, other: &Self, left: F1, right: F2) -> Self
    where
        F1: Fn(&R::Element) -> R::Element,
        F2: Fn(&R::Element) -> R::Element,
    {
        if self.codec != other.codec {
            let bits = self.codec.bits().max(other.codec.bits());
            return self
                .widened(bits)
                .merge(&other.widened(bits), left, right);
        }

        let mut res = self.zero_with_capacity(self.nterms() + other.nterms());

        macro_rules! insert_monomial {
            ($coeff:expr, $exp:expr) => {
                let c = $coeff;
                if !R::is_zero(&c) {
                    res.coefficients.push(c);
                    res.exponents.extend_from_slice($exp);
                }
            };
        }

        let mut i = 0;
        let mut j = 0;
        while i < self.nterms() && j < other.nterms() {
            match self.codec.cmp(self.exponents(i), other.exponents(j)) {
                Ordering::Greater => {
                    insert_monomial!(left(&self.coefficients[i]), self.exponents(i));
                    i += 1;
                }
                Ordering::Less => {
                    insert_monomial!(right(&other.coefficients[j]), other.exponents(j));
                    j += 1;
                }
                Ordering::Equal => {
                    let mut c = left(&self.coefficients[i]);
                    self.ring.add_assign(&mut c, &right(&other.coefficients[j]));
                    insert_monomial!(c, self.exponents(i));
                    i += 1;
                    j += 1;
                }
            }
        }

        while i < self.nterms() {
            insert_monomial!(left(&self.coefficients[i]), self.exponents(i));
            i += 1;
        }

        while j < other.nterms() {
            insert_monomial!(right(&other.coefficients[j]), other.exponents(j));
            j += 1;
        }

        res
    }

    /// Compute `a * self + b * other` in a single merge.
    pub fn scalar_fmma(&self, a: &R::Element, other: &Self, b: &R::Element) -> Self {
        self.assert_context(other);
        self.merge(
            other,
            |c| self.ring.mul(c, a),
            |c| self.ring.mul(c, b),
        )
    }

    /// Multiply every coefficient with `other`.
    pub fn mul_coeff(mut self, other: R::Element) -> Self {
        if R::is_zero(&other) {
            self.clear();
            return self;
        }

        for c in &mut self.coefficients {
            self.ring.mul_assign(c, &other);
        }

        if self.coefficients.iter().any(|c| R::is_zero(c)) {
            // zero divisors
            let words = self.codec.words();
            for i in (0..self.nterms()).rev() {
                if R::is_zero(&self.coefficients[i]) {
                    self.coefficients.remove(i);
                    self.exponents.drain(i * words..(i + 1) * words);
                }
            }
        }

        self
    }

    /// Multiply by the monomial `coefficient * x^exponents`, where the
    /// exponents are packed by `codec`.
    pub fn mul_monomial(
        &self,
        coefficient: &R::Element,
        codec: &MonomialCodec,
        exponents: &[u64],
    ) -> Result<Self, PolynomialError> {
        let fb = self.max_field_bits().max(codec.field_bits(exponents)) + 1;
        let bits = MonomialCodec::bits_for_field_bits(fb, self.context.config.max_exponent_bits)?
            .max(self.codec.bits())
            .max(codec.bits());

        let mut res = self.clone();
        res.widen(bits);
        let mut m: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; res.codec.words()];
        codec.repack_into(&res.codec, exponents, &mut m);

        for e in res.exponents.chunks_mut(res.codec.words()) {
            res.codec.add_assign(e, &m);
        }

        Ok(res.mul_coeff(coefficient.clone()))
    }

    /// The field width needed to hold every product of a term of `self`
    /// and a term of `other`.
    pub(crate) fn product_bits(&self, other: &Self) -> Result<usize, PolynomialError> {
        let fb = self.max_field_bits().max(other.max_field_bits()) + 1;
        Ok(
            MonomialCodec::bits_for_field_bits(fb, self.context.config.max_exponent_bits)?
                .max(self.codec.bits())
                .max(other.codec.bits()),
        )
    }

    /// Multiply two polynomials, reporting exponents that can no longer be
    /// packed.
    pub fn try_mul(&self, rhs: &Self) -> Result<Self, PolynomialError> {
        self.check_context(rhs)?;

        if self.is_zero() || rhs.is_zero() {
            return Ok(self.zero());
        }

        let bits = self.product_bits(rhs)?;
        let a = self.widened(bits);
        let b = rhs.widened(bits);
        Ok(a.heap_mul(&b))
    }

    /// Multiply using Johnson's heap algorithm. Both polynomials must use
    /// the same packing, wide enough to hold the product.
    ///
    /// The heap contains unique monomials; all index pairs with the same
    /// product monomial are chained behind a single heap entry.
    fn heap_mul(&self, rhs: &Self) -> Self {
        // the rows of the product table are the terms of the shortest polynomial,
        // so that the heap stays small
        if self.nterms() > rhs.nterms() {
            return rhs.heap_mul(self);
        }

        let codec = &self.codec;
        let words = codec.words();
        let mut res = self.zero_with_capacity(rhs.nterms());

        let mut cache: BTreeMap<MonomialKey, Vec<(usize, usize)>> = BTreeMap::new();
        let mut q_cache: Vec<Vec<(usize, usize)>> = vec![];
        let mut h: BinaryHeap<MonomialKey> = BinaryHeap::with_capacity(self.nterms());

        // hind[i] = 2(j+1) if (i, j) is in the heap, and 2j+1 if (i, j-1)
        // has been processed and (i, j) is not scheduled yet
        let mut hind = vec![1usize; self.nterms()];

        let mut m: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; words];

        macro_rules! push_product {
            ($i:expr, $j:expr) => {
                codec.add(self.exponents($i), rhs.exponents($j), &mut m);
                let key = codec.key(&m);
                if let Some(e) = cache.get_mut(&key) {
                    e.push(($i, $j));
                } else {
                    h.push(key.clone()); // only add when new
                    let mut qq = q_cache.pop().unwrap_or_default();
                    qq.push(($i, $j));
                    cache.insert(key, qq);
                }
            };
        }

        push_product!(0, 0);
        hind[0] = 2;

        while let Some(cur_mon) = h.pop() {
            let Some(mut q) = cache.remove(&cur_mon) else {
                continue;
            };

            let mut coefficient = self.ring.zero();
            for &(i, j) in &q {
                hind[i] |= 1;
                self.ring
                    .add_mul_assign(&mut coefficient, &self.coefficients[i], &rhs.coefficients[j]);
            }

            for (i, j) in q.drain(..) {
                // should we go down?
                if i + 1 < self.nterms() && hind[i + 1] == 2 * j + 1 {
                    push_product!(i + 1, j);
                    hind[i + 1] = 2 * (j + 1);
                }

                // should we go right?
                if j + 1 < rhs.nterms()
                    && hind[i] & 1 == 1
                    && (i == 0 || hind[i - 1] >= 2 * (j + 2) + 1)
                {
                    push_product!(i, j + 1);
                    hind[i] = 2 * (j + 2);
                }
            }

            q_cache.push(q);

            if !R::is_zero(&coefficient) {
                res.coefficients.push(coefficient);
                let len = res.exponents.len();
                res.exponents.resize(len + words, 0);
                codec.from_key(&cur_mon, &mut res.exponents[len..]);
            }
        }

        res
    }

    /// Multiply on a thread pool of `threads` threads. The shortest operand
    /// is split into chunks whose products with the other operand are
    /// computed in parallel and then merged. The result is identical to
    /// that of [try_mul](Self::try_mul).
    pub fn mul_parallel(&self, rhs: &Self, threads: usize) -> Result<Self, PolynomialError> {
        self.check_context(rhs)?;

        let (short, long) = if self.nterms() <= rhs.nterms() {
            (self, rhs)
        } else {
            (rhs, self)
        };

        if threads < 2
            || short.nterms() < 2
            || short.nterms() < self.context.config.parallel_min_terms
        {
            return self.try_mul(rhs);
        }

        let bits = self.product_bits(rhs)?;
        let a = short.widened(bits);
        let b = long.widened(bits);

        let words = a.codec.words();
        let chunk_size = (a.nterms() + threads - 1) / threads;
        let chunks: Vec<Self> = a
            .coefficients
            .chunks(chunk_size)
            .zip(a.exponents.chunks(chunk_size * words))
            .map(|(c, e)| {
                let mut p = a.zero_with_capacity(c.len());
                p.coefficients.extend_from_slice(c);
                p.exponents.extend_from_slice(e);
                p
            })
            .collect();

        debug!(
            "Multiplying {}x{} terms in {} chunks",
            a.nterms(),
            b.nterms(),
            chunks.len()
        );

        let products: Vec<Self> = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
        {
            Ok(pool) => pool.install(|| chunks.par_iter().map(|c| c.heap_mul(&b)).collect()),
            Err(e) => {
                warn!("Could not create thread pool, multiplying sequentially: {}", e);
                chunks.iter().map(|c| c.heap_mul(&b)).collect()
            }
        };

        let mut res = b.zero();
        for p in &products {
            res = &res + p;
        }
        Ok(res)
    }

    /// Compute `self^pow` by repeated squaring.
    pub fn pow(&self, mut pow: u64) -> Result<Self, PolynomialError> {
        if pow == 0 {
            return Ok(self.one());
        }

        if self.is_constant() {
            return Ok(self.constant(self.ring.pow(&self.lcoeff(), pow)));
        }

        let mut x = self.clone();
        let mut y = self.one();
        while pow != 1 {
            if pow % 2 == 1 {
                y = y.try_mul(&x)?;
                pow -= 1;
            }

            x = x.try_mul(&x)?;
            pow /= 2;
        }

        x.try_mul(&y)
    }

    /// Take the derivative of the polynomial w.r.t the variable `var`.
    pub fn derivative(&self, var: usize) -> Result<Self, PolynomialError> {
        assert!(var < self.nvars(), "Variable index {} out of range", var);

        let mut res = self.zero_with_capacity(self.nterms());
        let mut unit: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];
        self.codec.var_power(var, &Integer::from(1), &mut unit);
        let mut e: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.codec.words()];

        for t in self {
            if !self.codec.sub(t.exponents, &unit, &mut e) {
                continue;
            }

            let pow = self.codec.exponent_integer(t.exponents, var);
            let c = self
                .ring
                .mul(t.coefficient, &self.ring.element_from_integer(&pow));
            if !R::is_zero(&c) {
                res.coefficients.push(c);
                res.exponents.extend_from_slice(&e);
            }
        }

        Ok(res)
    }

    /// Split the polynomial into coefficients of powers of `var`. The
    /// coefficients do not contain `var` and the output is sorted from the
    /// highest to the lowest power.
    pub fn to_univariate_polynomial_list(&self, var: usize) -> Vec<(Self, Integer)> {
        assert!(var < self.nvars(), "Variable index {} out of range", var);

        let words = self.codec.words();
        let mut groups: Vec<(SmallVec<[u64; INLINED_WORDS]>, Self)> = vec![];
        let mut index: HashMap<SmallVec<[u64; INLINED_WORDS]>, usize> = HashMap::default();

        let mut iso: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; words];
        let mut rest: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; words];
        for t in self {
            self.codec.isolate(t.exponents, var, &mut iso);
            self.codec.sub(t.exponents, &iso, &mut rest);

            // stripping a variable preserves the order within a group
            let g = *index.entry(iso.clone()).or_insert_with(|| {
                groups.push((iso.clone(), self.zero()));
                groups.len() - 1
            });
            let p = &mut groups[g].1;
            p.coefficients.push(t.coefficient.clone());
            p.exponents.extend_from_slice(&rest);
        }

        groups.sort_by(|a, b| self.codec.cmp(&b.0, &a.0));
        groups
            .into_iter()
            .map(|(e, p)| (p, self.codec.exponent_integer(&e, var)))
            .collect()
    }

    /// Multiply by `var^e`.
    pub fn mul_var_power(&self, var: usize, e: &Integer) -> Result<Self, PolynomialError> {
        let fb = (e.significant_bits() as usize).max(1);
        let bits = MonomialCodec::bits_for_field_bits(fb, self.context.config.max_exponent_bits)?
            .max(self.codec.bits());
        let codec = self.codec.with_bits(bits);
        let mut m: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; codec.words()];
        codec.var_power(var, e, &mut m);
        self.mul_monomial(&self.ring.one(), &codec, &m)
    }
}

impl<R: EuclideanDomain> MultivariatePolynomial<R> {
    /// Get the content from the coefficients.
    pub fn content(&self) -> R::Element {
        let Some(first) = self.coefficients.first() else {
            return self.ring.zero();
        };

        let mut c = first.clone();
        for cc in self.coefficients.iter().skip(1) {
            // early return if possible (not possible for rationals)
            if R::one_is_gcd_unit() && self.ring.is_one(&c) {
                break;
            }

            c = self.ring.gcd(&c, cc);
        }
        c
    }

    /// Divide every coefficient with `other`, which must divide all of them.
    pub fn div_coeff(mut self, other: &R::Element) -> Self {
        for c in &mut self.coefficients {
            let (quot, rem) = self.ring.quot_rem(c, other);
            debug_assert!(R::is_zero(&rem));
            *c = quot;
        }
        self
    }

    /// Make the polynomial primitive by removing the content.
    pub fn make_primitive(self) -> Self {
        let c = self.content();
        if R::is_zero(&c) {
            return self;
        }
        self.div_coeff(&c)
    }
}

impl MultivariatePolynomial<IntegerRing> {
    /// Integrate with respect to `var`. Returns `(s, p)` such that the
    /// integral is `p / s`.
    pub fn integral(&self, var: usize) -> Result<(Integer, Self), PolynomialError> {
        assert!(var < self.nvars(), "Variable index {} out of range", var);

        let mut scale = Integer::from(1);
        for e in self.exponents_iter() {
            scale.lcm_mut(&(self.codec.exponent_integer(e, var) + 1u32));
        }

        // the exponents grow by at most one bit
        let fb = self.max_field_bits() + 1;
        let bits = MonomialCodec::bits_for_field_bits(fb, self.context.config.max_exponent_bits)?
            .max(self.codec.bits());
        let mut res = self.widened(bits).into_owned();

        let words = res.codec.words();
        let mut unit: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; words];
        res.codec.var_power(var, &Integer::from(1), &mut unit);

        for (c, e) in res
            .coefficients
            .iter_mut()
            .zip(res.exponents.chunks_mut(words))
        {
            let d = res.codec.exponent_integer(e, var) + 1u32;
            *c *= Integer::from(scale.div_exact_ref(&d));
            res.codec.add_assign(e, &unit);
        }

        Ok((scale, res))
    }
}

impl<R: Ring> Debug for MultivariatePolynomial<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_zero() {
            return write!(f, "[]");
        }
        let mut first = true;
        write!(f, "[ ")?;
        for t in self {
            if first {
                first = false;
            } else {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{{ {:?}, {:?} }}",
                t.coefficient,
                self.codec.unpack_integers(t.exponents).as_slice()
            )?;
        }
        write!(f, " ]")
    }
}

impl<R: Ring> PartialEq for MultivariatePolynomial<R> {
    fn eq(&self, other: &Self) -> bool {
        if self.nterms() != other.nterms() || self.check_context(other).is_err() {
            return false;
        }

        if self.codec == other.codec {
            return self.coefficients == other.coefficients && self.exponents == other.exponents;
        }

        let bits = self.codec.bits().max(other.codec.bits());
        let (a, b) = (self.widened(bits), other.widened(bits));
        a.coefficients == b.coefficients && a.exponents == b.exponents
    }
}

impl<'a, 'b, R: Ring> Add<&'a MultivariatePolynomial<R>> for &'b MultivariatePolynomial<R> {
    type Output = MultivariatePolynomial<R>;

    fn add(self, other: &'a MultivariatePolynomial<R>) -> Self::Output {
        self.assert_context(other);

        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }

        self.merge(other, |c| c.clone(), |c| c.clone())
    }
}

impl<R: Ring> Add for MultivariatePolynomial<R> {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        if self.is_zero() {
            self.assert_context(&other);
            return other;
        }
        if other.is_zero() {
            self.assert_context(&other);
            return self;
        }
        &self + &other
    }
}

impl<'a, 'b, R: Ring> Sub<&'a MultivariatePolynomial<R>> for &'b MultivariatePolynomial<R> {
    type Output = MultivariatePolynomial<R>;

    fn sub(self, other: &'a MultivariatePolynomial<R>) -> Self::Output {
        self.assert_context(other);
        self.merge(other, |c| c.clone(), |c| self.ring.neg(c))
    }
}

impl<R: Ring> Sub for MultivariatePolynomial<R> {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        &self - &other
    }
}

impl<R: Ring> Neg for MultivariatePolynomial<R> {
    type Output = Self;

    fn neg(mut self) -> Self::Output {
        for c in &mut self.coefficients {
            *c = self.ring.neg(c);
        }
        self
    }
}

impl<'a, 'b, R: Ring> Mul<&'a MultivariatePolynomial<R>> for &'b MultivariatePolynomial<R> {
    type Output = MultivariatePolynomial<R>;

    /// Multiply two polynomials. Panics when the product cannot be packed.
    fn mul(self, rhs: &'a MultivariatePolynomial<R>) -> Self::Output {
        self.try_mul(rhs)
            .unwrap_or_else(|e| panic!("Cannot multiply polynomials: {}", e))
    }
}

impl<'a, R: Ring> Mul<&'a MultivariatePolynomial<R>> for MultivariatePolynomial<R> {
    type Output = MultivariatePolynomial<R>;

    fn mul(self, rhs: &'a MultivariatePolynomial<R>) -> Self::Output {
        (&self) * rhs
    }
}
