use std::cmp::Ordering;
use std::fmt::Display;

use rug::{Complete, Integer};

use super::{integer::IntegerRing, EuclideanDomain, Field, Ring};

/// The modular ring `Z / mZ`, where `m` can be any integer larger than one.
/// Elements are kept in the symmetric range `(-m/2, m/2]`.
///
/// This ring also implements `Field`. The user *must* make sure
/// to only use field features such as inverses when the input is coprime
/// to the modulus.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct IntegerMod(Integer);

impl IntegerMod {
    pub fn new(m: Integer) -> IntegerMod {
        assert!(m > 1, "Modulus must be larger than one: {}", m);
        IntegerMod(m)
    }

    pub fn modulus(&self) -> &Integer {
        &self.0
    }

    /// Map an integer into the symmetric range.
    pub fn to_element(&self, a: &Integer) -> Integer {
        self.reduce(a.clone())
    }

    fn reduce(&self, a: Integer) -> Integer {
        let mut r = a % &self.0;
        if r.cmp0() == Ordering::Less {
            r += &self.0;
        }
        if (&r * 2u32).complete() > self.0 {
            r -= &self.0;
        }
        r
    }
}

impl Display for IntegerMod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Z/{}Z", self.0)
    }
}

impl Ring for IntegerMod {
    type Element = Integer;

    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.reduce((a + b).complete())
    }

    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.reduce((a - b).complete())
    }

    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.reduce((a * b).complete())
    }

    fn add_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a += b;
        *a = self.reduce(std::mem::take(a));
    }

    fn sub_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a -= b;
        *a = self.reduce(std::mem::take(a));
    }

    fn mul_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a *= b;
        *a = self.reduce(std::mem::take(a));
    }

    fn add_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a += b * c;
        *a = self.reduce(std::mem::take(a));
    }

    fn sub_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a -= b * c;
        *a = self.reduce(std::mem::take(a));
    }

    fn neg(&self, a: &Self::Element) -> Self::Element {
        self.reduce((-a).complete())
    }

    fn zero(&self) -> Self::Element {
        Integer::new()
    }

    fn one(&self) -> Self::Element {
        Integer::from(1)
    }

    #[inline]
    fn nth(&self, n: u64) -> Self::Element {
        self.reduce(Integer::from(n))
    }

    fn element_from_integer(&self, n: &Integer) -> Self::Element {
        self.reduce(n.clone())
    }

    fn pow(&self, b: &Self::Element, e: u64) -> Self::Element {
        // reduce after every step so intermediates stay below m^2
        let mut x = b.clone();
        let mut y = self.one();
        let mut e = e;
        while e > 0 {
            if e % 2 == 1 {
                self.mul_assign(&mut y, &x);
            }
            e /= 2;
            if e > 0 {
                x = self.mul(&x, &x);
            }
        }
        y
    }

    fn is_zero(a: &Self::Element) -> bool {
        a.cmp0() == Ordering::Equal
    }

    fn is_one(&self, a: &Self::Element) -> bool {
        *a == 1
    }

    fn one_is_gcd_unit() -> bool {
        true
    }
}

impl EuclideanDomain for IntegerMod {
    fn rem(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        Integer::new()
    }

    fn quot_rem(&self, a: &Self::Element, b: &Self::Element) -> (Self::Element, Self::Element) {
        (self.mul(a, &self.inv(b)), Integer::new())
    }

    fn gcd(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        Integer::from(1)
    }
}

impl Field for IntegerMod {
    #[inline]
    fn div(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.mul(a, &self.inv(b))
    }

    #[inline]
    fn div_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.mul(a, &self.inv(b));
    }

    /// Compute the inverse when `a` and the modulus are coprime,
    /// otherwise panic.
    fn inv(&self, a: &Self::Element) -> Self::Element {
        assert!(!Self::is_zero(a), "0 is not invertible");

        let mut u1 = Integer::from(1);
        let mut u3 = a.clone();
        let mut v1 = Integer::new();
        let mut v3 = self.0.clone();
        let mut even_iter: bool = true;

        while !Self::is_zero(&v3) {
            let (q, t3) = IntegerRing::new().quot_rem(&u3, &v3);
            let t1 = (&u1 + &(&q * &v1).complete()).complete();
            u1 = v1;
            v1 = t1;
            u3 = v3;
            v3 = t3;
            even_iter = !even_iter;
        }

        assert!(u3 == 1, "{} is not invertible mod {}", a, self.0);
        if even_iter {
            self.reduce(u1)
        } else {
            self.reduce((&self.0 - &u1).complete())
        }
    }
}

#[cfg(test)]
mod test {
    use rug::Integer;

    use super::IntegerMod;
    use crate::rings::{Field, Ring};

    #[test]
    fn symmetric_range() {
        let r = IntegerMod::new(Integer::from(7));
        assert_eq!(r.to_element(&Integer::from(6)), -1);
        assert_eq!(r.to_element(&Integer::from(-10)), -3);
        assert_eq!(r.add(&Integer::from(3), &Integer::from(3)), -1);
        assert_eq!(r.pow(&Integer::from(3), 6), 1);
    }

    #[test]
    fn inverse() {
        let r = IntegerMod::new(Integer::from(11));
        for a in 1..11 {
            let a = r.to_element(&Integer::from(a));
            assert_eq!(r.mul(&a, &r.inv(&a)), 1);
        }
    }
}
