use std::fmt::{self, Display, Write};

use rug::{Integer, Rational};

use crate::poly::polynomial::MultivariatePolynomial;
use crate::poly::qpoly::QPolynomial;
use crate::rings::Ring;

/// Options that control how polynomials are printed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    pub multiplication_operator: char,
    /// Print spaces around `+` and `-`.
    pub spaced_terms: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            multiplication_operator: '*',
            spaced_terms: false,
        }
    }
}

/// Prints a polynomial, using the variable names of its context unless
/// other names are given.
pub struct PolynomialPrinter<'a, 'b, P> {
    pub poly: &'a P,
    pub opts: PrintOptions,
    pub names: Option<&'b [&'b str]>,
}

impl<'a, 'b, P> PolynomialPrinter<'a, 'b, P> {
    pub fn new(poly: &'a P) -> PolynomialPrinter<'a, 'b, P> {
        PolynomialPrinter {
            poly,
            opts: PrintOptions::default(),
            names: None,
        }
    }

    pub fn new_with_options(poly: &'a P, opts: PrintOptions) -> PolynomialPrinter<'a, 'b, P> {
        PolynomialPrinter {
            poly,
            opts,
            names: None,
        }
    }

    /// Print with the variable names `names` instead of those of the context.
    pub fn with_names(mut self, names: &'b [&'b str]) -> Self {
        self.names = Some(names);
        self
    }
}

/// The sign and magnitude of a coefficient.
enum Coefficient {
    One,
    MinusOne,
    Positive(String),
    Negative(String),
}

/// Write the terms `(coefficient, exponents)` of a polynomial. Exponents
/// are listed per variable.
fn write_terms<I>(
    f: &mut fmt::Formatter,
    terms: I,
    names: &dyn Fn(usize) -> String,
    opts: &PrintOptions,
) -> fmt::Result
where
    I: Iterator<Item = (Coefficient, Vec<Integer>)>,
{
    let mut first = true;
    for (c, exps) in terms {
        let is_one = exps.iter().all(|e| *e == 0);

        let (negative, mag) = match c {
            Coefficient::One => (false, None),
            Coefficient::MinusOne => (true, None),
            Coefficient::Positive(s) => (false, Some(s)),
            Coefficient::Negative(s) => (true, Some(s)),
        };

        if first {
            if negative {
                f.write_char('-')?;
            }
        } else {
            let sign = if negative { '-' } else { '+' };
            if opts.spaced_terms {
                write!(f, " {} ", sign)?;
            } else {
                f.write_char(sign)?;
            }
        }
        first = false;

        let mut need_op = false;
        match mag {
            Some(m) => {
                f.write_str(&m)?;
                need_op = true;
            }
            None if is_one => {
                f.write_char('1')?;
            }
            None => {}
        }

        for (v, e) in exps.iter().enumerate() {
            if *e == 0 {
                continue;
            }

            if need_op {
                f.write_char(opts.multiplication_operator)?;
            }
            need_op = true;

            f.write_str(&names(v))?;
            if *e != 1 {
                write!(f, "^{}", e)?;
            }
        }
    }

    if first {
        f.write_char('0')?;
    }

    Ok(())
}

fn rational_coefficient(c: Rational) -> Coefficient {
    if c == 1 {
        Coefficient::One
    } else if c == -1 {
        Coefficient::MinusOne
    } else if c < 0 {
        Coefficient::Negative((-c).to_string())
    } else {
        Coefficient::Positive(c.to_string())
    }
}

impl<'a, 'b> Display for PolynomialPrinter<'a, 'b, QPolynomial> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ctx = self.poly.context();
        let names = |v: usize| match self.names.and_then(|n| n.get(v)) {
            Some(n) => n.to_string(),
            None => ctx.variables[v].to_string(),
        };

        let z = self.poly.zpoly();
        let content = self.poly.content();
        let terms = z.into_iter().map(|t| {
            (
                rational_coefficient(content * Rational::from(t.coefficient)),
                z.codec.unpack_integers(t.exponents).into_vec(),
            )
        });

        write_terms(f, terms, &names, &self.opts)
    }
}

impl<'a, 'b, R: Ring> Display for PolynomialPrinter<'a, 'b, MultivariatePolynomial<R>> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let p = self.poly;
        let names = |v: usize| match self.names.and_then(|n| n.get(v)) {
            Some(n) => n.to_string(),
            None => p.context.variables[v].to_string(),
        };

        let minus_one = p.ring.neg(&p.ring.one());
        let terms = p.into_iter().map(|t| {
            let c = if p.ring.is_one(t.coefficient) {
                Coefficient::One
            } else if *t.coefficient == minus_one {
                Coefficient::MinusOne
            } else {
                let s = t.coefficient.to_string();
                match s.strip_prefix('-') {
                    Some(m) => Coefficient::Negative(m.to_owned()),
                    None => Coefficient::Positive(s),
                }
            };
            (c, p.codec.unpack_integers(t.exponents).into_vec())
        });

        write_terms(f, terms, &names, &self.opts)
    }
}

impl Display for QPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        PolynomialPrinter::new(self).fmt(f)
    }
}

impl<R: Ring> Display for MultivariatePolynomial<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        PolynomialPrinter::new(self).fmt(f)
    }
}

#[cfg(test)]
mod test {
    use rug::{Integer, Rational};

    use super::{PolynomialPrinter, PrintOptions};
    use crate::poly::polynomial::MultivariatePolynomial;
    use crate::poly::qpoly::QPolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};
    use crate::rings::integer_mod::IntegerMod;

    #[test]
    fn rational() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let f = QPolynomial::from_terms(
            ctx.clone(),
            vec![
                (Rational::from((2, 3)), vec![2, 1]),
                (Rational::from(-1), vec![1, 0]),
                (Rational::from(1), vec![0, 0]),
            ],
        )
        .unwrap();

        assert_eq!(f.to_string(), "2/3*x^2*y-x+1");
        assert_eq!((-f.clone()).to_string(), "-2/3*x^2*y+x-1");
        assert_eq!(QPolynomial::new(ctx.clone()).to_string(), "0");
        assert_eq!(f.one().to_string(), "1");
        assert_eq!((-f.one()).to_string(), "-1");

        let opts = PrintOptions {
            multiplication_operator: ' ',
            spaced_terms: true,
        };
        let s = PolynomialPrinter::new_with_options(&f, opts)
            .with_names(&["a", "b"])
            .to_string();
        assert_eq!(s, "2/3 a^2 b - a + 1");
    }

    #[test]
    fn generated_names() {
        let ctx = PolynomialContext::with_nvars(3, MonomialOrder::DegLex);
        let f = &QPolynomial::new(ctx.clone()).variable(2)
            * &Rational::from(-5);
        assert_eq!(f.to_string(), "-5*x3");
    }

    #[test]
    fn modular() {
        let ctx = PolynomialContext::new(&["x"], MonomialOrder::Lex);
        let ring = IntegerMod::new(Integer::from(7));
        let p = MultivariatePolynomial::from_terms(
            &ring,
            ctx,
            vec![(Integer::from(3), vec![3]), (Integer::from(1), vec![0])],
        )
        .unwrap();
        assert_eq!(p.to_string(), "3*x^3+1");
    }
}
