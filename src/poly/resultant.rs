//! Resultants and discriminants with respect to a single variable.

use rug::{Integer, Rational};
use tracing::debug;

use super::qpoly::QPolynomial;
use crate::error::PolynomialError;

/// A dense polynomial in one variable. Index `i` holds the coefficient of
/// `x^i` and the last coefficient is non-zero.
type Dense = Vec<QPolynomial>;

fn lc(a: &[QPolynomial]) -> &QPolynomial {
    &a[a.len() - 1]
}

fn deg(a: &[QPolynomial]) -> u64 {
    a.len() as u64 - 1
}

fn exact_div(a: &QPolynomial, b: &QPolynomial) -> Result<QPolynomial, PolynomialError> {
    a.divides(b)?.ok_or_else(|| {
        PolynomialError::InvariantViolation(format!(
            "subresultant division of {} by {} is not exact",
            a, b
        ))
    })
}

/// Compute the pseudo-remainder `R` of `lc(b)^(deg(a) - deg(b) + 1) * a = b * q + R`.
fn pseudo_remainder(mut a: Dense, b: &[QPolynomial]) -> Result<Dense, PolynomialError> {
    let db = b.len() - 1;
    let lcb = lc(b);
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
            a[i + shift] = &a[i + shift] - &bc.try_mul(&lca)?;
        }
        e -= 1;

        while a.last().is_some_and(|c| c.is_zero()) {
            a.pop();
        }
    }

    if e > 0 && !a.is_empty() {
        let f = lcb.pow(e as u64)?;
        for c in a.iter_mut() {
            *c = c.try_mul(&f)?;
        }
    }

    Ok(a)
}

impl QPolynomial {
    /// Compute the resultant of `self` and `other` with respect to `var`,
    /// using the subresultant remainder sequence. The result does not
    /// depend on `var`. The resultant with a zero polynomial is zero.
    pub fn resultant(&self, other: &QPolynomial, var: usize) -> Result<QPolynomial, PolynomialError> {
        self.zpoly.check_context(&other.zpoly)?;
        assert!(var < self.nvars(), "Variable index {} out of range", var);

        if self.is_zero() || other.is_zero() {
            return Ok(self.zero());
        }

        let mut a = self.to_univariate(var).to_dense()?;
        let mut b = other.to_univariate(var).to_dense()?;

        let mut s = false;
        if a.len() < b.len() {
            std::mem::swap(&mut a, &mut b);
            if deg(&a) % 2 == 1 && deg(&b) % 2 == 1 {
                s = true;
            }
        }

        if b.len() == 1 {
            // res(a, c) = c^deg(a)
            return lc(&b).pow(deg(&a));
        }

        let mut g = self.one();
        let mut h = self.one();
        let mut steps = 0;

        loop {
            let delta = deg(&a) - deg(&b);
            if deg(&a) % 2 == 1 && deg(&b) % 2 == 1 {
                s = !s;
            }

            let r = pseudo_remainder(a, &b)?;
            steps += 1;
            a = b;

            if r.is_empty() {
                debug!("Resultant vanishes after {} steps", steps);
                return Ok(self.zero());
            }

            let d = g.try_mul(&h.pow(delta)?)?;
            b = r
                .iter()
                .map(|c| exact_div(c, &d))
                .collect::<Result<Dense, _>>()?;

            g = lc(&a).clone();
            h = if delta == 0 {
                h
            } else {
                // h^(1 - delta) * g^delta
                exact_div(&g.pow(delta)?, &h.pow(delta - 1)?)?
            };

            if b.len() == 1 {
                break;
            }
        }

        debug!("Resultant in variable {} took {} steps", var, steps);

        // h^(1 - deg(a)) * lc(b)^deg(a)
        let da = deg(&a);
        let mut res = if da == 0 {
            self.one()
        } else {
            exact_div(&lc(&b).pow(da)?, &h.pow(da - 1)?)?
        };

        if s {
            res = -res;
        }
        Ok(res)
    }

    /// Compute the discriminant of `self` with respect to `var`, defined as
    /// `(-1)^(n(n-1)/2) * res(f, f') / lc(f)` where `n` is the degree in `var`.
    pub fn discriminant(&self, var: usize) -> Result<QPolynomial, PolynomialError> {
        let n = self.degree(var);
        if n < 1 {
            return Err(PolynomialError::domain(format!(
                "discriminant of a polynomial of degree {} in variable {}",
                n, var
            )));
        }

        let view = self.to_univariate(var);
        let Some(lcoeff) = view.lcoeff() else {
            return Err(PolynomialError::domain("discriminant of zero"));
        };

        let r = self.resultant(&self.derivative(var)?, var)?;
        let mut d = exact_div(&r, lcoeff)?;

        let n1 = Integer::from(&n - 1u32);
        let sign = Integer::from(&n * &n1) / 2u32;
        if sign.is_odd() {
            d = -d;
        }
        Ok(d)
    }

    /// The resultant of two polynomials without other variables, as a
    /// number.
    pub fn resultant_value(&self, other: &QPolynomial, var: usize) -> Result<Rational, PolynomialError> {
        let r = self.resultant(other, var)?;
        if !r.is_constant() {
            return Err(PolynomialError::domain(
                "resultant depends on other variables",
            ));
        }
        Ok(r.get_constant())
    }
}

#[cfg(test)]
mod test {
    use rug::Rational;

    use crate::poly::qpoly::QPolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};

    #[test]
    fn univariate() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let x = QPolynomial::new(ctx).variable(0);

        // res((x - 1)(x - 2), x - 3) = (3 - 1)(3 - 2)
        let a = &(&x - &Rational::from(1)) * &(&x - &Rational::from(2));
        let b = &x - &Rational::from(3);
        assert_eq!(a.resultant_value(&b, 0).unwrap(), 2);
        assert_eq!(b.resultant_value(&a, 0).unwrap(), 2);

        // a common root
        let c = &x - &Rational::from(2);
        assert!(a.resultant(&c, 0).unwrap().is_zero());

        // res(x^2 + 1, x^2 - 2) = (i^2 - 2)((-i)^2 - 2) = 9
        let d = &x.pow(2).unwrap() + &Rational::from(1);
        let e = &x.pow(2).unwrap() - &Rational::from(2);
        assert_eq!(d.resultant_value(&e, 0).unwrap(), 9);

        // res(2x^3 - x, 1/2) = (1/2)^3
        let f = &(&x.pow(3).unwrap() * &Rational::from(2)) - &x;
        let h = x.constant(Rational::from((1, 2)));
        assert_eq!(f.resultant_value(&h, 0).unwrap(), Rational::from((1, 8)));
    }

    #[test]
    fn eliminates_variable() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::DegLex);
        let x = QPolynomial::new(ctx).variable(0);
        let y = x.variable(1);

        // res_x(x - y, x^2 - 2) = y^2 - 2
        let a = &x - &y;
        let b = &x.pow(2).unwrap() - &Rational::from(2);
        let r = a.resultant(&b, 0).unwrap();
        assert_eq!(r, &y.pow(2).unwrap() - &Rational::from(2));
        assert_eq!(r.degree(0), 0);
    }

    #[test]
    fn discriminant() {
        let ctx = PolynomialContext::new(&["x", "a", "b", "c"], MonomialOrder::Lex);
        let x = QPolynomial::new(ctx).variable(0);
        let a = x.variable(1);
        let b = x.variable(2);
        let c = x.variable(3);

        // a x^2 + b x + c has discriminant b^2 - 4ac
        let f = &(&(&a * &x.pow(2).unwrap()) + &(&b * &x)) + &c;
        let d = f.discriminant(0).unwrap();
        let expected = &b.pow(2).unwrap() - &(&(&a * &c) * &Rational::from(4));
        assert_eq!(d, expected);

        // x^3 - x has discriminant 4
        let g = &x.pow(3).unwrap() - &x;
        assert_eq!(g.discriminant(0).unwrap(), x.constant(Rational::from(4)));

        assert!(a.discriminant(0).is_err());
    }
}
