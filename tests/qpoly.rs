use std::sync::Arc;

use qpoly::config::Config;
use qpoly::error::PolynomialError;
use qpoly::poly::geobucket::QGeobucket;
use qpoly::poly::qpoly::QPolynomial;
use qpoly::poly::{MonomialOrder, PolynomialContext};
use rug::{Integer, Rational};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ctx() -> Arc<PolynomialContext> {
    PolynomialContext::new(&["x", "y"], MonomialOrder::Lex)
}

fn parse(s: &str) -> QPolynomial {
    QPolynomial::parse(s, ctx()).unwrap()
}

#[test]
fn cofactor_addition_cancels() {
    let f = parse("2/3*x^2*y + 1");
    let g = parse("-2/3*x^2*y + 1");
    let s = &f + &g;
    s.check_canonical().unwrap();
    assert!(s.is_constant());
    assert_eq!(s.get_constant(), 2);
    assert_eq!(*s.content(), 2);
    assert!(s.zpoly().is_one());

    let g = parse("-1/3*x^2*y + 5");
    assert_eq!((&f + &g).to_string(), "1/3*x^2*y+6");
}

#[test]
fn exact_division() {
    init_logging();
    let g = parse("1 + x + y");
    let f = g.pow(3).unwrap();
    assert_eq!(f.divides(&g).unwrap(), Some(g.pow(2).unwrap()));

    let a = parse("(1 + x)^2");
    let b = parse("1 + y");
    assert_eq!(a.divides(&b).unwrap(), None);

    let mut acc = QGeobucket::from_polynomial(a);
    assert!(!acc.divides_inplace(QGeobucket::from_polynomial(b)).unwrap());
    assert!(acc.empty().is_zero());
}

#[test]
fn scalar_multiplication_keeps_integer_part() {
    let f = parse("6*x*y");
    let zpoly = f.zpoly().clone();
    let g = f.mul_rational(&Rational::from(4));
    assert_eq!(*g.content(), 24);
    assert_eq!(*g.zpoly(), zpoly);
    assert_eq!(g.to_string(), "24*x*y");
}

#[test]
fn geobucket_order_independence() {
    let x = parse("x");
    let x2 = parse("x^2");

    let mut b = QGeobucket::new(ctx());
    b.add(&x);
    b.add(&x2);
    b.sub(&x);
    assert_eq!(b.empty(), x2);

    let mut b = QGeobucket::new(ctx());
    b.sub(&x);
    b.add(&x2);
    b.add(&x);
    assert_eq!(b.empty(), x2);
}

#[test]
fn division_of_zero() {
    let zero = QPolynomial::new(ctx());
    let f = parse("x - 3*y");
    assert!(zero.div(&f).unwrap().is_zero());
    assert_eq!(zero.div(&zero), Err(PolynomialError::DivisionByZero));
    assert_eq!(f.divides(&zero), Err(PolynomialError::DivisionByZero));
}

#[test]
fn evaluation_agrees() {
    let f = parse("x^2*y + 1");
    let v = f
        .evaluate_all(&[Rational::from(2), Rational::from(3)])
        .unwrap();
    assert_eq!(v, 13);

    let g = f.evaluate_one(0, &Rational::from(2)).unwrap();
    assert_eq!(g, parse("4*y + 1"));
    let w = g.evaluate_one(1, &Rational::from(3)).unwrap();
    assert!(w.is_constant());
    assert_eq!(w.get_constant(), 13);
}

#[test]
fn division_laws() {
    init_logging();
    let a = parse("3/2*x^3*y - x*y^2 + 7/5*y + 2");
    let b = parse("2*x*y + 1/3");

    let (q, r) = a.divrem(&b).unwrap();
    assert_eq!(&(&b * &q) + &r, a);
    let lm = b.zpoly().exponent_vector(0);
    for i in 0..r.nterms() {
        let e = r.zpoly().exponent_vector(i);
        assert!(e.iter().zip(lm.iter()).any(|(x, y)| x < y));
    }

    let c = parse("y^2 - 1");
    let (qs, r) = a.divrem_ideal(&[b.clone(), c.clone()]).unwrap();
    assert_eq!(&(&(&b * &qs[0]) + &(&c * &qs[1])) + &r, a);

    let p = &a * &c;
    assert_eq!(p.divides(&c).unwrap(), Some(a.clone()));
    assert_eq!(p.div(&a).unwrap(), c);
}

#[test]
fn print_parse_round_trip() {
    let ctx = PolynomialContext::with_nvars(3, MonomialOrder::DegRevLex);
    let inputs = [
        "0",
        "1",
        "-7/3",
        "x1^12*x3 - 1/2*x2 + 5",
        "(x1 + 2*x2 - x3/4)^5",
        "-x1*x2*x3 + x1^100000000000000000000",
    ];

    for s in inputs {
        let p = QPolynomial::parse(s, ctx.clone()).unwrap();
        let printed = p.to_string();
        let q = QPolynomial::parse(&printed, ctx.clone()).unwrap();
        assert_eq!(p, q, "{}", printed);
        q.check_canonical().unwrap();
    }
}

#[test]
fn large_exponents() {
    init_logging();
    let e = Integer::from(1) << 100;
    let f = parse("x*y + 1");
    let g = f.mul_var_power(0, &e).unwrap();
    assert_eq!(g.degree(0), Integer::from(&e + 1));
    assert_eq!(g.divides(&f).unwrap().map(|q| q.degree(0)), Some(e.clone()));

    let c = PolynomialContext::with_config(
        &["x", "y"],
        MonomialOrder::Lex,
        Config::default().with_max_exponent_bits(64),
    );
    let x = QPolynomial::new(c).variable(0);
    assert!(matches!(
        x.mul_var_power(0, &e),
        Err(PolynomialError::ExponentOverflow { .. })
    ));
}

#[test]
fn mismatched_contexts() {
    let f = parse("x");
    let other = PolynomialContext::new(&["x", "z"], MonomialOrder::Lex);
    let g = QPolynomial::parse("x", other).unwrap();
    assert_eq!(f.try_mul(&g), Err(PolynomialError::ContextMismatch));
    assert_eq!(f.gcd(&g), Err(PolynomialError::ContextMismatch));
}

#[test]
fn parallel_multiplication() {
    init_logging();
    let c = PolynomialContext::with_config(
        &["x", "y"],
        MonomialOrder::Lex,
        Config::default().with_parallel_min_terms(8),
    );
    let f = QPolynomial::parse("(x + 2*y - 1/3)^12", c.clone()).unwrap();
    let g = QPolynomial::parse("(3*x - y + 1)^11", c).unwrap();
    assert!(f.nterms() >= 8 && g.nterms() >= 8);

    let p = f.mul_parallel(&g, 4).unwrap();
    p.check_canonical().unwrap();
    assert_eq!(p, f.try_mul(&g).unwrap());
}

#[test]
fn gcd_of_sparse_trivariate_polynomials() {
    init_logging();
    let c = PolynomialContext::new(&["x", "y", "z"], MonomialOrder::DegRevLex);
    let p = |s: &str| QPolynomial::parse(s, c.clone()).unwrap();

    let a = p("3*x^4*y^2 - x*z + y^5 - 7");
    let b = p("x^3*z^2 + x*y - 2*y*z^4 + 1");
    let d = p("x^6*y^3 + x^2*z^5 - 3*y^4*z + x*y*z + 2");
    assert!(a.gcd(&b).unwrap().is_one());
    assert!(b.gcd(&d).unwrap().is_one());

    let g = p("x*y - 2*z + 1/2");
    let u = p("x^2 + z^3 - y");
    let r = (&g * &b).gcd(&(&g * &u)).unwrap();
    assert_eq!(r, g.gcd(&g).unwrap());
    assert!(r.divides(&g).unwrap().is_some());
}
