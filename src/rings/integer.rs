use std::cmp::Ordering;
use std::fmt::Display;

use rug::{ops::Pow, Complete, Integer};

use super::{EuclideanDomain, Ring};

/// The ring of integers, with elements stored as arbitrary-precision
/// [rug::Integer]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct IntegerRing;

impl IntegerRing {
    pub fn new() -> IntegerRing {
        IntegerRing
    }
}

impl Display for IntegerRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Z")
    }
}

/// Raise `b` to the power `e` by repeated squaring. Exponents that fit in
/// a `u32` are delegated to GMP.
pub fn integer_pow(b: &Integer, e: u64) -> Integer {
    if let Ok(e) = u32::try_from(e) {
        return b.pow(e).complete();
    }

    // only the bases 0 and ±1 can reach this point in practice
    if *b == 0 || *b == 1 {
        return b.clone();
    }
    if *b == -1 {
        return if e % 2 == 0 {
            Integer::from(1)
        } else {
            b.clone()
        };
    }

    let mut x = b.clone();
    let mut y = Integer::from(1);
    let mut e = e;
    while e != 1 {
        if e % 2 == 1 {
            y *= &x;
            e -= 1;
        }
        x.square_mut();
        e /= 2;
    }
    x * y
}

/// Return the bit length of the absolute value of `n`.
#[inline]
pub fn bit_length(n: &Integer) -> u64 {
    n.significant_bits() as u64
}

impl Ring for IntegerRing {
    type Element = Integer;

    #[inline]
    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        (a + b).complete()
    }

    #[inline]
    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        (a - b).complete()
    }

    #[inline]
    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        (a * b).complete()
    }

    #[inline]
    fn add_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a += b;
    }

    #[inline]
    fn sub_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a -= b;
    }

    #[inline]
    fn mul_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a *= b;
    }

    #[inline]
    fn add_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a += b * c;
    }

    #[inline]
    fn sub_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a -= b * c;
    }

    #[inline]
    fn neg(&self, a: &Self::Element) -> Self::Element {
        (-a).complete()
    }

    #[inline]
    fn zero(&self) -> Self::Element {
        Integer::new()
    }

    #[inline]
    fn one(&self) -> Self::Element {
        Integer::from(1)
    }

    #[inline]
    fn nth(&self, n: u64) -> Self::Element {
        Integer::from(n)
    }

    #[inline]
    fn element_from_integer(&self, n: &Integer) -> Self::Element {
        n.clone()
    }

    fn pow(&self, b: &Self::Element, e: u64) -> Self::Element {
        integer_pow(b, e)
    }

    #[inline]
    fn is_zero(a: &Self::Element) -> bool {
        a.cmp0() == Ordering::Equal
    }

    #[inline]
    fn is_one(&self, a: &Self::Element) -> bool {
        *a == 1
    }

    #[inline]
    fn one_is_gcd_unit() -> bool {
        true
    }
}

impl EuclideanDomain for IntegerRing {
    fn rem(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.quot_rem(a, b).1
    }

    /// Euclidean division, with a non-negative remainder.
    fn quot_rem(&self, a: &Self::Element, b: &Self::Element) -> (Self::Element, Self::Element) {
        <(Integer, Integer)>::from(a.div_rem_euc_ref(b))
    }

    /// The non-negative greatest common divisor.
    fn gcd(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a.gcd_ref(b).complete()
    }
}
