use std::cmp::Ordering;
use std::fmt::Display;

use rug::{Complete, Integer, Rational};
use tracing::debug;

use super::{integer::integer_pow, EuclideanDomain, Field, Ring};
use crate::error::PolynomialError;

/// The field of rational numbers, with elements stored as canonical
/// [rug::Rational]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct RationalField;

impl RationalField {
    pub fn new() -> RationalField {
        RationalField
    }
}

impl Display for RationalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Q")
    }
}

/// The height of a rational number: the bit length of the larger of its
/// numerator and denominator.
pub fn height(r: &Rational) -> u64 {
    r.numer()
        .significant_bits()
        .max(r.denom().significant_bits()) as u64
}

/// Return `true` if `r` is zero or a unit. Powers of such numbers never grow.
#[inline]
pub fn is_trivial_base(r: &Rational) -> bool {
    *r.denom() == 1 && (*r.numer() == 0 || *r.numer() == 1 || *r.numer() == -1)
}

/// Compute `g = gcd(a, b)` together with the cofactors `t1 = a / g` and
/// `t2 = b / g`, which are coprime integers.
///
/// For `a = n1/d1` and `b = n2/d2`, `g = gcd(n1, n2) / lcm(d1, d2)`. If both
/// are zero, `g` is zero and the cofactors are zero.
pub fn gcd_cofactors(a: &Rational, b: &Rational) -> (Rational, Integer, Integer) {
    if *a == 0 && *b == 0 {
        return (Rational::new(), Integer::new(), Integer::new());
    }

    let gn = a.numer().gcd_ref(b.numer()).complete();
    let ld = a.denom().lcm_ref(b.denom()).complete();

    // t1 = (n1 / gn) * (ld / d1)
    let mut t1 = a.numer().div_exact_ref(&gn).complete();
    t1 *= ld.div_exact_ref(a.denom()).complete();
    let mut t2 = b.numer().div_exact_ref(&gn).complete();
    t2 *= ld.div_exact_ref(b.denom()).complete();

    (Rational::from((gn, ld)), t1, t2)
}

/// Raise `b` to the power `e`, refusing when the result would need more
/// than `limit` bits.
pub fn pow_checked(b: &Rational, e: u64, limit: u64) -> Result<Rational, PolynomialError> {
    if e == 0 {
        return Ok(Rational::from(1));
    }

    if !is_trivial_base(b) {
        let estimate = height(b).saturating_mul(e);
        if estimate > limit {
            debug!("Refusing rational power: {} bits > {}", estimate, limit);
            return Err(PolynomialError::Infeasible { estimate, limit });
        }
    }

    Ok(Rational::from((
        integer_pow(b.numer(), e),
        integer_pow(b.denom(), e),
    )))
}

/// Raise `b` to an arbitrary-precision power, refusing when the result would
/// need more than `limit` bits.
pub fn pow_integer_checked(
    b: &Rational,
    e: &Integer,
    limit: u64,
) -> Result<Rational, PolynomialError> {
    assert!(e.cmp0() != Ordering::Less, "Negative exponent: {}", e);

    if let Some(e) = e.to_u64() {
        return pow_checked(b, e, limit);
    }

    if *b == 0 || *b == 1 {
        return Ok(b.clone());
    }
    if *b == -1 {
        return Ok(if e.is_even() {
            Rational::from(1)
        } else {
            b.clone()
        });
    }

    Err(PolynomialError::Infeasible {
        estimate: u64::MAX,
        limit,
    })
}

impl Ring for RationalField {
    type Element = Rational;

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

    fn add_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a += (b * c).complete();
    }

    fn sub_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a -= (b * c).complete();
    }

    #[inline]
    fn neg(&self, a: &Self::Element) -> Self::Element {
        (-a).complete()
    }

    #[inline]
    fn zero(&self) -> Self::Element {
        Rational::new()
    }

    #[inline]
    fn one(&self) -> Self::Element {
        Rational::from(1)
    }

    #[inline]
    fn nth(&self, n: u64) -> Self::Element {
        Rational::from(n)
    }

    #[inline]
    fn element_from_integer(&self, n: &Integer) -> Self::Element {
        Rational::from(n)
    }

    fn pow(&self, b: &Self::Element, e: u64) -> Self::Element {
        Rational::from((integer_pow(b.numer(), e), integer_pow(b.denom(), e)))
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
        false
    }
}

impl EuclideanDomain for RationalField {
    fn rem(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        Rational::new()
    }

    fn quot_rem(&self, a: &Self::Element, b: &Self::Element) -> (Self::Element, Self::Element) {
        (self.div(a, b), Rational::new())
    }

    fn gcd(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        gcd_cofactors(a, b).0
    }
}

impl Field for RationalField {
    #[inline]
    fn div(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        (a / b).complete()
    }

    #[inline]
    fn div_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a /= b;
    }

    fn inv(&self, a: &Self::Element) -> Self::Element {
        assert!(*a != 0, "0 is not invertible");
        a.clone().recip()
    }
}

#[cfg(test)]
mod test {
    use rug::{Integer, Rational};

    use super::{gcd_cofactors, height, pow_checked, pow_integer_checked};
    use crate::error::PolynomialError;

    #[test]
    fn cofactors() {
        let a = Rational::from((4, 9));
        let b = Rational::from((-10, 3));
        let (g, t1, t2) = gcd_cofactors(&a, &b);
        assert_eq!(g, Rational::from((2, 9)));
        assert_eq!(t1, 2);
        assert_eq!(t2, -15);
        assert_eq!(Rational::from(&g * &Rational::from(t1)), a);
        assert_eq!(Rational::from(&g * &Rational::from(t2)), b);
    }

    #[test]
    fn feasibility() {
        assert_eq!(height(&Rational::from((255, 2))), 8);
        assert_eq!(
            pow_checked(&Rational::from((2, 3)), 3, 100).unwrap(),
            Rational::from((8, 27))
        );
        assert!(matches!(
            pow_checked(&Rational::from(3), 1000, 100),
            Err(PolynomialError::Infeasible { .. })
        ));
        let huge = Integer::from(1) << 80u32;
        assert_eq!(
            pow_integer_checked(&Rational::from(-1), &huge, 10).unwrap(),
            1
        );
    }
}
