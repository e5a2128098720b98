//! Greatest common divisors of integer polynomials.
//!
//! The multivariate gcd is computed recursively: the polynomials are viewed
//! as univariate polynomials in a main variable, with coefficients that are
//! polynomials in the remaining variables. The gcd of the contents is
//! computed recursively and the gcd of the primitive parts with the
//! subresultant remainder sequence, which keeps the coefficients small
//! without taking contents at every step.
//!
//! Most pairs of polynomials are coprime. Before running the remainder
//! sequence, the primitive parts are mapped to univariate polynomials over
//! a prime field by evaluating the other variables. If the leading
//! coefficients survive the mapping, the degree of the gcd can only grow,
//! so a constant gcd of the images proves that the primitive parts are
//! coprime.

use std::cmp::Ordering;

use rug::Integer;
use tracing::{debug, instrument};

use super::polynomial::MultivariatePolynomial;
use crate::error::PolynomialError;
use crate::rings::integer::IntegerRing;
use crate::rings::integer_mod::IntegerMod;
use crate::rings::{Field, Ring};

/// The prime `2^31 - 1`, used for the modular coprimality test.
const IMAGE_PRIME: u64 = 2147483647;

impl MultivariatePolynomial<IntegerRing> {
    /// Compute the greatest common divisor over the integers. The result
    /// has a positive leading coefficient and includes the gcd of the
    /// integer contents. The gcd of two zero polynomials is zero.
    #[instrument(level = "debug", skip_all)]
    pub fn gcd(&self, other: &Self) -> Result<Self, PolynomialError> {
        self.check_context(other)?;

        if self.is_zero() {
            return Ok(other.clone().normalize());
        }
        if other.is_zero() {
            return Ok(self.clone().normalize());
        }
        if self == other {
            return Ok(self.clone().normalize());
        }

        if self.nterms() == 1 {
            return self.monomial_gcd(other);
        }
        if other.nterms() == 1 {
            return other.monomial_gcd(self);
        }

        // the main variable appears in both and has the lowest degree
        let Some(var) = (0..self.nvars())
            .filter(|&v| self.degree(v) != 0 && other.degree(v) != 0)
            .min_by_key(|&v| self.degree(v).max(other.degree(v)))
        else {
            // no common variable, so only integers can be shared
            return Ok(self.constant(self.content().abs().gcd(&other.content())));
        };

        // one polynomial often divides the other
        let (small, large) = if self.nterms() <= other.nterms() {
            (self, other)
        } else {
            (other, self)
        };
        if large.divides(small)?.is_some() {
            debug!("gcd is the polynomial with {} terms", small.nterms());
            return Ok(small.clone().normalize());
        }

        Self::gcd_in(self, other, var)
    }

    /// Compute the gcd of a list of polynomials.
    pub fn repeated_gcd(polys: &[Self]) -> Result<Self, PolynomialError> {
        let Some(first) = polys.first() else {
            return Err(PolynomialError::domain("gcd of an empty list"));
        };

        let mut g = first.clone().normalize();
        for p in &polys[1..] {
            if g.is_one() {
                break;
            }
            g = g.gcd(p)?;
        }
        Ok(g)
    }

    /// Negate if the leading coefficient is negative.
    fn normalize(self) -> Self {
        if !self.is_zero() && self.lcoeff().cmp0() == Ordering::Less {
            -self
        } else {
            self
        }
    }

    /// The gcd of the single term `self` with `other`: the monomial with the
    /// smallest exponents times the gcd of the coefficients.
    fn monomial_gcd(&self, other: &Self) -> Result<Self, PolynomialError> {
        let mut c = self.coefficients[0].clone().abs();
        for oc in &other.coefficients {
            if c == 1 {
                break;
            }
            c.gcd_mut(oc);
        }

        let mut res = self.constant(c);
        let exps = self.exponent_vector(0);
        for (v, e) in exps.iter().enumerate() {
            if *e == 0 {
                continue;
            }

            let mut m = e.clone();
            for i in 0..other.nterms() {
                let oe = other.codec.exponent_integer(other.exponents(i), v);
                if oe < m {
                    m = oe;
                }
                if m == 0 {
                    break;
                }
            }

            if m != 0 {
                res = res.mul_var_power(v, &m)?;
            }
        }
        Ok(res)
    }

    /// Write the polynomial as a dense list of coefficients in `var`, where
    /// index `i` holds the coefficient of `var^i`.
    fn to_dense_univariate(&self, var: usize) -> Result<Vec<Self>, PolynomialError> {
        let list = self.to_univariate_polynomial_list(var);
        let Some((_, d)) = list.first() else {
            return Ok(vec![]);
        };

        let d = d
            .to_usize()
            .ok_or_else(|| PolynomialError::domain(format!("degree {} is too large", d)))?;

        let mut dense = vec![self.zero(); d + 1];
        for (c, e) in list {
            if let Some(e) = e.to_usize() {
                dense[e] = c;
            }
        }
        Ok(dense)
    }

    fn from_dense_univariate(&self, var: usize, dense: &[Self]) -> Result<Self, PolynomialError> {
        let mut res = self.zero();
        for (e, c) in dense.iter().enumerate() {
            if !c.is_zero() {
                res = &res + &c.mul_var_power(var, &Integer::from(e))?;
            }
        }
        Ok(res)
    }

    /// Compute the content of a dense univariate polynomial, which is the
    /// gcd of its coefficients.
    fn univariate_content(dense: &[Self]) -> Result<Self, PolynomialError> {
        let mut coeffs: Vec<&Self> = dense.iter().filter(|c| !c.is_zero()).collect();
        // small coefficients first, to find a unit content early
        coeffs.sort_by_key(|c| c.nterms());

        let Some(first) = coeffs.first() else {
            return Err(PolynomialError::InvariantViolation(
                "content of the zero polynomial".to_owned(),
            ));
        };

        let mut g = (*first).clone().normalize();
        for c in &coeffs[1..] {
            if g.is_one() {
                break;
            }
            g = g.gcd(c)?;
        }
        Ok(g)
    }

    /// Divide all coefficients by the content `g`, which divides all of them.
    fn divide_content(dense: &mut [Self], g: &Self) -> Result<(), PolynomialError> {
        if g.is_one() {
            return Ok(());
        }

        for c in dense.iter_mut() {
            if c.is_zero() {
                continue;
            }

            if g.is_constant() {
                let z = c.zero();
                *c = std::mem::replace(c, z).div_coeff(&g.get_constant());
            } else {
                *c = exact_div(c, g)?;
            }
        }
        Ok(())
    }

    /// Compute the pseudo-remainder `R` of
    /// `lc(b)^(deg(a) - deg(b) + 1) * a = b * q + R`. Leading zeros are
    /// removed.
    fn pseudo_remainder(mut a: Vec<Self>, b: &[Self]) -> Result<Vec<Self>, PolynomialError> {
        let db = b.len() - 1;
        let lcb = &b[db];
        let mut e = a.len() - db;

        while a.len() > db {
            let da = a.len() - 1;
            let lca = a[da].clone();

            for c in a.iter_mut() {
                if !c.is_zero() {
                    *c = c.try_mul(lcb)?;
                }
            }

            let shift = da - db;
            for (i, bc) in b.iter().enumerate() {
                if !bc.is_zero() {
                    a[i + shift] = &a[i + shift] - &bc.try_mul(&lca)?;
                }
            }
            e -= 1;

            while a.last().is_some_and(|c| c.is_zero()) {
                a.pop();
            }
        }

        if e > 0 && !a.is_empty() {
            let f = lcb.pow(e as u64)?;
            for c in a.iter_mut() {
                if !c.is_zero() {
                    *c = c.try_mul(&f)?;
                }
            }
        }

        Ok(a)
    }

    /// Map a polynomial to its value modulo `field` at `point`.
    fn image(&self, field: &IntegerMod, point: &[Integer]) -> Result<Integer, PolynomialError> {
        let mut res = field.zero();
        for t in self {
            let mut c = field.to_element(t.coefficient);
            for (v, x) in point.iter().enumerate() {
                let e = self.codec.exponent_integer(t.exponents, v);
                if e == 0 {
                    continue;
                }

                let p = x.pow_mod_ref(&e, field.modulus()).ok_or_else(|| {
                    PolynomialError::InvariantViolation(format!("cannot raise {} to {}", x, e))
                })?;
                c = field.mul(&c, &field.to_element(&Integer::from(p)));
            }
            field.add_assign(&mut res, &c);
        }
        Ok(res)
    }

    /// Return `true` if the primitive parts `a` and `b`, dense in the main
    /// variable, are certainly coprime. A `false` is inconclusive.
    fn images_coprime(a: &[Self], b: &[Self]) -> Result<bool, PolynomialError> {
        let field = IntegerMod::new(Integer::from(IMAGE_PRIME));
        let nvars = a[a.len() - 1].nvars();
        let point: Vec<Integer> = (0..nvars).map(|v| Integer::from(2 * v + 3)).collect();

        let ia = a
            .iter()
            .map(|c| c.image(&field, &point))
            .collect::<Result<Vec<_>, _>>()?;
        let ib = b
            .iter()
            .map(|c| c.image(&field, &point))
            .collect::<Result<Vec<_>, _>>()?;

        if IntegerMod::is_zero(&ia[ia.len() - 1]) || IntegerMod::is_zero(&ib[ib.len() - 1]) {
            debug!("leading coefficient vanishes at the evaluation point");
            return Ok(false);
        }

        Ok(univariate_gcd_degree(&field, ia, ib) == 0)
    }

    /// Compute the gcd of `a` and `b` with `var` as the main variable.
    fn gcd_in(a: &Self, b: &Self, var: usize) -> Result<Self, PolynomialError> {
        let mut da = a.to_dense_univariate(var)?;
        let mut db = b.to_dense_univariate(var)?;

        let ca = Self::univariate_content(&da)?;
        let cb = Self::univariate_content(&db)?;
        let content_gcd = ca.gcd(&cb)?;

        Self::divide_content(&mut da, &ca)?;
        Self::divide_content(&mut db, &cb)?;

        if da.len() < db.len() {
            std::mem::swap(&mut da, &mut db);
        }

        if db.len() == 1 || Self::images_coprime(&da, &db)? {
            debug!("primitive parts are coprime in variable {}", var);
            return Ok(content_gcd.normalize());
        }

        // subresultant remainder sequence
        let mut g = a.one();
        let mut h = a.one();
        let mut steps = 0;
        let last = loop {
            let delta = (da.len() - db.len()) as u64;
            let r = Self::pseudo_remainder(da, &db)?;
            steps += 1;

            if r.is_empty() {
                break Some(db);
            }
            if r.len() == 1 {
                break None;
            }

            let d = g.try_mul(&h.pow(delta)?)?;
            da = db;
            db = r
                .iter()
                .map(|c| exact_div(c, &d))
                .collect::<Result<Vec<_>, _>>()?;

            g = da[da.len() - 1].clone();
            h = if delta == 0 {
                h
            } else {
                // g^delta / h^(delta - 1)
                exact_div(&g.pow(delta)?, &h.pow(delta - 1)?)?
            };
        };

        debug!("gcd in variable {} took {} remainder steps", var, steps);

        let Some(mut last) = last else {
            return Ok(content_gcd.normalize());
        };

        let c = Self::univariate_content(&last)?;
        Self::divide_content(&mut last, &c)?;
        let res = a.from_dense_univariate(var, &last)?.try_mul(&content_gcd)?;
        Ok(res.normalize())
    }
}

fn exact_div(
    a: &MultivariatePolynomial<IntegerRing>,
    b: &MultivariatePolynomial<IntegerRing>,
) -> Result<MultivariatePolynomial<IntegerRing>, PolynomialError> {
    a.divides(b)?.ok_or_else(|| {
        PolynomialError::InvariantViolation(format!("{} does not divide {}", b, a))
    })
}

/// The degree of the gcd of two dense univariate polynomials over a prime
/// field. Both must have a non-zero leading coefficient.
fn univariate_gcd_degree(field: &IntegerMod, mut a: Vec<Integer>, mut b: Vec<Integer>) -> usize {
    if a.len() < b.len() {
        std::mem::swap(&mut a, &mut b);
    }

    while !b.is_empty() {
        let inv = field.inv(&b[b.len() - 1]);
        while a.len() >= b.len() {
            let q = field.mul(&a[a.len() - 1], &inv);
            let shift = a.len() - b.len();
            for (i, bc) in b.iter().enumerate() {
                field.sub_mul_assign(&mut a[i + shift], bc, &q);
            }

            while a.last().is_some_and(IntegerMod::is_zero) {
                a.pop();
            }
        }
        std::mem::swap(&mut a, &mut b);
    }

    a.len() - 1
}

#[cfg(test)]
mod test {
    use rug::Integer;

    use super::univariate_gcd_degree;
    use crate::poly::polynomial::MultivariatePolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};
    use crate::rings::integer::IntegerRing;
    use crate::rings::integer_mod::IntegerMod;

    fn poly(
        ctx: &std::sync::Arc<PolynomialContext>,
        terms: &[(i64, [u64; 3])],
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
    fn univariate() {
        let ctx = PolynomialContext::new(&["x", "y", "z"], MonomialOrder::Lex);
        // (x + 1) * (2x - 3) and (x + 1) * (x + 5), times 2 and 4
        let a = poly(&ctx, &[(4, [2, 0, 0]), (-2, [1, 0, 0]), (-6, [0, 0, 0])]);
        let b = poly(&ctx, &[(4, [2, 0, 0]), (24, [1, 0, 0]), (20, [0, 0, 0])]);
        let g = a.gcd(&b).unwrap();
        assert_eq!(g, poly(&ctx, &[(2, [1, 0, 0]), (2, [0, 0, 0])]));
    }

    #[test]
    fn multivariate() {
        let ctx = PolynomialContext::new(&["x", "y", "z"], MonomialOrder::DegRevLex);
        let g = poly(&ctx, &[(3, [1, 1, 0]), (-1, [0, 0, 2]), (1, [0, 0, 0])]);
        let u = poly(&ctx, &[(1, [2, 0, 0]), (1, [0, 1, 1])]);
        let v = poly(&ctx, &[(1, [0, 2, 0]), (-2, [1, 0, 1]), (7, [0, 0, 0])]);

        let a = &g * &u;
        let b = &g * &v;
        let r = a.gcd(&b).unwrap();
        assert_eq!(r, g);
        assert!(a.divides(&r).unwrap().is_some());
    }

    #[test]
    fn special_cases() {
        let ctx = PolynomialContext::new(&["x", "y", "z"], MonomialOrder::Lex);
        let z = MultivariatePolynomial::new(&IntegerRing::new(), None, ctx.clone());
        assert!(z.gcd(&z).unwrap().is_zero());

        let a = poly(&ctx, &[(-2, [1, 0, 0]), (4, [0, 1, 0])]);
        assert_eq!(a.gcd(&z).unwrap(), -a.clone());

        // 6 x^2 y and 4 x y^3 + 2 x^3
        let m = poly(&ctx, &[(6, [2, 1, 0])]);
        let p = poly(&ctx, &[(4, [1, 3, 0]), (2, [3, 0, 0])]);
        assert_eq!(m.gcd(&p).unwrap(), poly(&ctx, &[(2, [1, 0, 0])]));

        let c = poly(&ctx, &[(6, [0, 0, 0])]);
        let d = poly(&ctx, &[(-4, [0, 0, 0])]);
        assert_eq!(c.gcd(&d).unwrap(), poly(&ctx, &[(2, [0, 0, 0])]));

        let coprime = poly(&ctx, &[(1, [1, 0, 0]), (1, [0, 1, 0])]);
        let other = poly(&ctx, &[(1, [1, 0, 0]), (-1, [0, 1, 0])]);
        assert!(coprime.gcd(&other).unwrap().is_one());

        let l = MultivariatePolynomial::repeated_gcd(&[&coprime * &other, coprime.clone()]).unwrap();
        assert_eq!(l, coprime);
    }

    #[test]
    fn sparse_coprime() {
        let ctx = PolynomialContext::new(&["x", "y", "z"], MonomialOrder::DegRevLex);
        let a = poly(
            &ctx,
            &[(3, [4, 2, 0]), (-1, [1, 0, 1]), (1, [0, 5, 0]), (-7, [0, 0, 0])],
        );
        let b = poly(
            &ctx,
            &[(1, [3, 0, 2]), (1, [1, 1, 0]), (-2, [0, 1, 4]), (1, [0, 0, 0])],
        );
        assert!(a.gcd(&b).unwrap().is_one());

        // no variable in common
        let c = poly(&ctx, &[(6, [2, 0, 0]), (4, [0, 0, 0])]);
        let d = poly(&ctx, &[(9, [0, 1, 3]), (-3, [0, 0, 0])]);
        assert_eq!(c.gcd(&d).unwrap(), poly(&ctx, &[(1, [0, 0, 0])]));
        let d2 = poly(&ctx, &[(8, [0, 1, 3]), (-6, [0, 0, 0])]);
        assert_eq!(c.gcd(&d2).unwrap(), poly(&ctx, &[(2, [0, 0, 0])]));
    }

    #[test]
    fn subresultant_sequence() {
        let ctx = PolynomialContext::new(&["x", "y", "z"], MonomialOrder::Lex);
        // common factor of degree 2 in x with a content in y
        let g = poly(&ctx, &[(2, [2, 1, 0]), (-1, [1, 0, 1]), (3, [0, 1, 0])]);
        let u = poly(&ctx, &[(1, [3, 0, 0]), (1, [0, 2, 0]), (-5, [0, 0, 0])]);
        let v = poly(&ctx, &[(-4, [3, 0, 0]), (1, [1, 0, 2]), (1, [0, 0, 1])]);

        let a = &g * &u;
        let b = &g * &v;
        assert_eq!(a.gcd(&b).unwrap(), g);
        assert_eq!(b.gcd(&a).unwrap(), g);

        let a2 = a.clone().mul_coeff(Integer::from(6));
        let b2 = b.clone().mul_coeff(Integer::from(-4));
        assert_eq!(a2.gcd(&b2).unwrap(), g.clone().mul_coeff(Integer::from(2)));
    }

    #[test]
    fn modular_image_degree() {
        let field = IntegerMod::new(Integer::from(7));
        let e = |c: &[i64]| -> Vec<Integer> {
            c.iter().map(|x| field.to_element(&Integer::from(*x))).collect()
        };
        // (x - 1)(x - 2) and (x - 1)(x + 3)
        assert_eq!(univariate_gcd_degree(&field, e(&[2, -3, 1]), e(&[-3, 2, 1])), 1);
        // x^2 + 1 and x + 1
        assert_eq!(univariate_gcd_degree(&field, e(&[1, 0, 1]), e(&[1, 1])), 0);
        assert_eq!(univariate_gcd_degree(&field, e(&[1, 1]), e(&[3, 3])), 1);
    }
}
