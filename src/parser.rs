//! A parser for polynomials in the notation of the printer.
//!
//! The input is evaluated while it is read: every subexpression is
//! accumulated in a geobucket, so that long sums are built with few
//! merges.

use std::sync::Arc;

use bytes::Buf;
use rug::{Integer, Rational};
use tracing::trace;

use crate::error::PolynomialError;
use crate::poly::geobucket::QGeobucket;
use crate::poly::qpoly::QPolynomial;
use crate::poly::PolynomialContext;

/// A recursive descent parser over the bytes of the input.
///
/// ```text
/// expr   = term (('+' | '-') term)*
/// term   = unary (('*' | '/') unary)*
/// unary  = '-' unary | power
/// power  = atom ('^' integer)?
/// atom   = integer | name | '(' expr ')'
/// ```
pub struct Parser<'a> {
    input: &'a [u8],
    len: usize,
    context: Arc<PolynomialContext>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, context: Arc<PolynomialContext>) -> Parser<'a> {
        Parser {
            input: input.as_bytes(),
            len: input.len(),
            context,
        }
    }

    /// The byte offset of the cursor.
    #[inline]
    fn position(&self) -> usize {
        self.len - self.input.remaining()
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, PolynomialError> {
        Err(PolynomialError::Parse {
            position: self.position(),
            message: message.into(),
        })
    }

    fn skip_whitespace(&mut self) {
        while self.input.has_remaining() && self.input.chunk()[0].is_ascii_whitespace() {
            self.input.advance(1);
        }
    }

    /// Look at the next non-whitespace byte.
    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.chunk().first().copied()
    }

    fn expect(&mut self, c: u8) -> Result<(), PolynomialError> {
        match self.peek() {
            Some(x) if x == c => {
                self.input.advance(1);
                Ok(())
            }
            Some(x) => self.error(format!("expected '{}', found '{}'", c as char, x as char)),
            None => self.error(format!("expected '{}', found end of input", c as char)),
        }
    }

    /// Parse the full input.
    pub fn parse(mut self) -> Result<QPolynomial, PolynomialError> {
        let mut res = self.expr()?;
        if let Some(c) = self.peek() {
            return self.error(format!("unexpected '{}'", c as char));
        }
        Ok(res.empty())
    }

    fn expr(&mut self) -> Result<QGeobucket, PolynomialError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.input.advance(1);
                    let t = self.term()?;
                    acc.add_inplace(t);
                }
                Some(b'-') => {
                    self.input.advance(1);
                    let t = self.term()?;
                    acc.sub_inplace(t);
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<QGeobucket, PolynomialError> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.input.advance(1);
                    let f = self.unary()?;
                    acc.mul_inplace(f)?;
                }
                Some(b'/') => {
                    let pos = self.position();
                    self.input.advance(1);
                    let f = self.unary()?;
                    if !acc.divides_inplace(f)? {
                        return Err(PolynomialError::Parse {
                            position: pos,
                            message: "division is not exact".to_owned(),
                        });
                    }
                }
                _ => return Ok(acc),
            }
        }
    }

    fn unary(&mut self) -> Result<QGeobucket, PolynomialError> {
        if self.peek() == Some(b'-') {
            self.input.advance(1);
            let mut r = self.unary()?;
            r.neg_inplace();
            return Ok(r);
        }

        self.power()
    }

    fn power(&mut self) -> Result<QGeobucket, PolynomialError> {
        let mut base = self.atom()?;
        if self.peek() == Some(b'^') {
            self.input.advance(1);
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {}
                _ => return self.error("exponent must be a non-negative integer"),
            }

            let e = self.integer()?;
            trace!("Raising to the power {}", e);
            base.pow_integer_inplace(&e)?;
        }
        Ok(base)
    }

    fn integer(&mut self) -> Result<Integer, PolynomialError> {
        let start = self.position();
        let digits = self
            .input
            .chunk()
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .count();

        let n = Integer::parse(&self.input.chunk()[..digits]).map_err(|e| {
            PolynomialError::Parse {
                position: start,
                message: e.to_string(),
            }
        })?;
        self.input.advance(digits);
        Ok(Integer::from(n))
    }

    fn atom(&mut self) -> Result<QGeobucket, PolynomialError> {
        let zero = QPolynomial::new(self.context.clone());
        match self.peek() {
            Some(b'(') => {
                self.input.advance(1);
                let r = self.expr()?;
                self.expect(b')')?;
                Ok(r)
            }
            Some(c) if c.is_ascii_digit() => {
                let n = self.integer()?;
                Ok(QGeobucket::from_polynomial(zero.constant(Rational::from(n))))
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let start = self.position();
                let len = self
                    .input
                    .chunk()
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
                    .count();

                // the input came from a `&str` and the name is ASCII
                let name = String::from_utf8_lossy(&self.input.chunk()[..len]).into_owned();
                let Some(var) = self.context.var_index(&name) else {
                    return Err(PolynomialError::Parse {
                        position: start,
                        message: format!("unknown variable '{}'", name),
                    });
                };
                self.input.advance(len);
                Ok(QGeobucket::from_polynomial(zero.variable(var)))
            }
            Some(c) => self.error(format!("unexpected '{}'", c as char)),
            None => self.error("unexpected end of input"),
        }
    }
}

impl QPolynomial {
    /// Parse a polynomial in the variables of `context`.
    pub fn parse(input: &str, context: Arc<PolynomialContext>) -> Result<QPolynomial, PolynomialError> {
        Parser::new(input, context).parse()
    }
}

#[cfg(test)]
mod test {
    use rug::Rational;

    use crate::error::PolynomialError;
    use crate::poly::qpoly::QPolynomial;
    use crate::poly::{MonomialOrder, PolynomialContext};

    #[test]
    fn expressions() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let p = QPolynomial::parse("2/3*x^2*y - x + 1", ctx.clone()).unwrap();
        assert_eq!(p.to_string(), "2/3*x^2*y-x+1");

        let q = QPolynomial::parse("(x+y)^2 - (x - y)^2", ctx.clone()).unwrap();
        assert_eq!(q.to_string(), "4*x*y");

        let r = QPolynomial::parse("-(x^2 - y^2)/(x + y)", ctx.clone()).unwrap();
        assert_eq!(r.to_string(), "-x+y");

        let c = QPolynomial::parse("--3/6", ctx.clone()).unwrap();
        assert_eq!(c.get_constant(), Rational::from((1, 2)));
    }

    #[test]
    fn errors() {
        let ctx = PolynomialContext::new(&["x", "y"], MonomialOrder::Lex);
        let pos = |s: &str| match QPolynomial::parse(s, ctx.clone()) {
            Err(PolynomialError::Parse { position, .. }) => position,
            r => panic!("expected a parse error, got {:?}", r),
        };

        assert_eq!(pos("x + z"), 4);
        assert_eq!(pos("x / y"), 2);
        assert_eq!(pos("x^-1"), 2);
        assert_eq!(pos("(x + 1"), 6);
        assert_eq!(pos("x y"), 2);
        assert_eq!(pos("x +"), 3);

        assert_eq!(
            QPolynomial::parse("x / (y - y)", ctx),
            Err(PolynomialError::DivisionByZero)
        );
    }
}
