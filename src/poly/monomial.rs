//! Packed exponent vectors.
//!
//! An exponent vector is stored as a fixed number of `u64` words per term.
//! Every exponent occupies a *field* of `bits` bits, where `bits` is one of
//! 8, 16, 32, 64 or a multiple of 64. Narrow fields are packed several to a
//! word and never straddle a word boundary; wide fields span `bits / 64`
//! consecutive words, which allows exponents of arbitrary size.
//!
//! Graded orders store the total degree in an extra leading field. Fields
//! are laid out most significant first, so that comparing the words of two
//! monomials from left to right, after XOR with the comparison mask,
//! compares the monomials in the chosen order. The top bit of every field is
//! kept clear and serves as an overflow bit for addition and subtraction.

use std::cmp::Ordering;

use rug::{integer::Order, Integer};
use smallvec::{smallvec, SmallVec};

use super::{MonomialOrder, INLINED_EXPONENTS};
use crate::error::PolynomialError;
use crate::utils;

pub const INLINED_WORDS: usize = 4;

/// A packed monomial XORed with the comparison mask of its codec. The
/// natural order of keys is the monomial order.
pub type MonomialKey = SmallVec<[u64; 2]>;

/// Encoder and decoder of exponent vectors for a given number of variables,
/// monomial order and field width.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MonomialCodec {
    nvars: usize,
    order: MonomialOrder,
    bits: usize,
    words: usize,
    cmp_mask: SmallVec<[u64; INLINED_WORDS]>,
    overflow_mask: SmallVec<[u64; INLINED_WORDS]>,
}

impl MonomialCodec {
    pub fn new(nvars: usize, order: MonomialOrder, bits: usize) -> MonomialCodec {
        assert!(
            matches!(bits, 8 | 16 | 32 | 64) || bits % 64 == 0 && bits > 0,
            "Unsupported field width: {}",
            bits
        );

        let nfields = nvars + order.is_graded() as usize;
        let words = if bits <= 64 {
            let fpw = 64 / bits;
            ((nfields + fpw - 1) / fpw).max(1)
        } else {
            (nfields * (bits / 64)).max(1)
        };

        let mut c = MonomialCodec {
            nvars,
            order,
            bits,
            words,
            cmp_mask: smallvec![0; words],
            overflow_mask: smallvec![0; words],
        };

        let reverse = order == MonomialOrder::DegRevLex;
        for f in 0..nfields {
            if bits <= 64 {
                let (w, shift) = c.position(f);
                c.overflow_mask[w] |= 1 << (shift + bits as u32 - 1);
                if reverse && f > 0 {
                    c.cmp_mask[w] |= (c.field_mask() >> 1) << shift;
                }
            } else {
                let wpf = bits / 64;
                let start = f * wpf;
                c.overflow_mask[start] = 1 << 63;
                if reverse && f > 0 {
                    c.cmp_mask[start] = u64::MAX >> 1;
                    for w in &mut c.cmp_mask[start + 1..start + wpf] {
                        *w = u64::MAX;
                    }
                }
            }
        }

        c
    }

    /// Create a codec with the same variables and order but a different
    /// field width.
    pub fn with_bits(&self, bits: usize) -> MonomialCodec {
        MonomialCodec::new(self.nvars, self.order, bits)
    }

    #[inline]
    pub fn nvars(&self) -> usize {
        self.nvars
    }

    #[inline]
    pub fn order(&self) -> MonomialOrder {
        self.order
    }

    /// The width of a single exponent field, including the overflow bit.
    #[inline]
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// The number of words per packed monomial.
    #[inline]
    pub fn words(&self) -> usize {
        self.words
    }

    #[inline]
    pub fn is_multiword(&self) -> bool {
        self.bits > 64
    }

    #[inline]
    pub fn nfields(&self) -> usize {
        self.nvars + self.order.is_graded() as usize
    }

    /// The field that holds the exponent of `var`.
    #[inline]
    fn var_field(&self, var: usize) -> usize {
        match self.order {
            MonomialOrder::Lex => var,
            MonomialOrder::DegLex => var + 1,
            MonomialOrder::DegRevLex => self.nvars - var,
        }
    }

    /// Word index and shift of a narrow field.
    #[inline]
    fn position(&self, f: usize) -> (usize, u32) {
        let fpw = 64 / self.bits;
        (f / fpw, (64 - self.bits * (f % fpw + 1)) as u32)
    }

    #[inline]
    fn field_mask(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    /// Read a field as little-endian digits.
    fn read_field(&self, packed: &[u64], f: usize) -> SmallVec<[u64; 2]> {
        if self.bits <= 64 {
            let (w, shift) = self.position(f);
            smallvec![(packed[w] >> shift) & self.field_mask()]
        } else {
            let wpf = self.bits / 64;
            let start = f * wpf;
            packed[start..start + wpf].iter().rev().cloned().collect()
        }
    }

    /// Overwrite a field with little-endian digits. The value must fit in the
    /// field without touching the overflow bit.
    fn write_field(&self, packed: &mut [u64], f: usize, digits: &[u64]) {
        if self.bits <= 64 {
            debug_assert!(digits.iter().skip(1).all(|d| *d == 0));
            let v = digits.first().cloned().unwrap_or(0);
            debug_assert!(v <= self.field_mask() >> 1);
            let (w, shift) = self.position(f);
            packed[w] = (packed[w] & !(self.field_mask() << shift)) | (v << shift);
        } else {
            let wpf = self.bits / 64;
            debug_assert!(digits.iter().skip(wpf).all(|d| *d == 0));
            let start = f * wpf;
            for d in 0..wpf {
                packed[start + wpf - 1 - d] = digits.get(d).cloned().unwrap_or(0);
            }
            debug_assert!(packed[start] >> 63 == 0);
        }
    }

    /// Round a required number of value bits up to a supported field width,
    /// reserving one bit for overflow detection.
    pub fn bits_for_field_bits(
        field_bits: usize,
        max_bits: usize,
    ) -> Result<usize, PolynomialError> {
        let needed = field_bits + 1;
        let bits = match needed {
            0..=8 => 8,
            9..=16 => 16,
            17..=32 => 32,
            33..=64 => 64,
            _ => (needed + 63) / 64 * 64,
        };

        if bits > max_bits.max(64) {
            Err(PolynomialError::ExponentOverflow {
                required: bits,
                max: max_bits,
            })
        } else {
            Ok(bits)
        }
    }

    /// The field width needed to pack `exponents` under `order`.
    pub fn bits_required(
        order: MonomialOrder,
        exponents: &[u64],
        max_bits: usize,
    ) -> Result<usize, PolynomialError> {
        let mut field_bits = exponents
            .iter()
            .map(|e| (64 - e.leading_zeros()) as usize)
            .max()
            .unwrap_or(0);

        if order.is_graded() {
            let deg: u128 = exponents.iter().map(|e| *e as u128).sum();
            field_bits = field_bits.max(utils::bit_length_u128(deg));
        }

        Self::bits_for_field_bits(field_bits, max_bits)
    }

    /// The field width needed to pack arbitrary-precision `exponents`.
    pub fn bits_required_integers(
        order: MonomialOrder,
        exponents: &[Integer],
        max_bits: usize,
    ) -> Result<usize, PolynomialError> {
        if let Some(e) = exponents.iter().find(|e| e.cmp0() == Ordering::Less) {
            return Err(PolynomialError::domain(format!("negative exponent {}", e)));
        }

        let mut field_bits = exponents
            .iter()
            .map(|e| e.significant_bits() as usize)
            .max()
            .unwrap_or(0);

        if order.is_graded() {
            let deg = exponents.iter().fold(Integer::new(), |acc, e| acc + e);
            field_bits = field_bits.max(deg.significant_bits() as usize);
        }

        Self::bits_for_field_bits(field_bits, max_bits)
    }

    /// Pack `exponents` into `out`. The field width must be sufficient, see
    /// [bits_required](Self::bits_required).
    pub fn pack(&self, exponents: &[u64], out: &mut [u64]) {
        debug_assert_eq!(exponents.len(), self.nvars);
        out.fill(0);

        if self.order.is_graded() {
            let deg: u128 = exponents.iter().map(|e| *e as u128).sum();
            self.write_field(out, 0, &[deg as u64, (deg >> 64) as u64]);
        }

        for (v, e) in exponents.iter().enumerate() {
            self.write_field(out, self.var_field(v), &[*e]);
        }
    }

    /// Pack arbitrary-precision `exponents` into `out`.
    pub fn pack_integers(&self, exponents: &[Integer], out: &mut [u64]) {
        debug_assert_eq!(exponents.len(), self.nvars);
        out.fill(0);

        if self.order.is_graded() {
            let deg = exponents.iter().fold(Integer::new(), |acc, e| acc + e);
            self.write_field(out, 0, &deg.to_digits::<u64>(Order::Lsf));
        }

        for (v, e) in exponents.iter().enumerate() {
            self.write_field(out, self.var_field(v), &e.to_digits::<u64>(Order::Lsf));
        }
    }

    /// Unpack the exponents into `out`. Returns `false` if an exponent does
    /// not fit in a `u64`.
    pub fn unpack(&self, packed: &[u64], out: &mut [u64]) -> bool {
        debug_assert_eq!(out.len(), self.nvars);
        for (v, o) in out.iter_mut().enumerate() {
            match self.exponent(packed, v) {
                Some(e) => *o = e,
                None => return false,
            }
        }
        true
    }

    pub fn unpack_integers(&self, packed: &[u64]) -> SmallVec<[Integer; INLINED_EXPONENTS]> {
        (0..self.nvars)
            .map(|v| self.exponent_integer(packed, v))
            .collect()
    }

    /// The exponent of `var`, if it fits in a `u64`.
    #[inline]
    pub fn exponent(&self, packed: &[u64], var: usize) -> Option<u64> {
        let d = self.read_field(packed, self.var_field(var));
        if d.iter().skip(1).any(|x| *x != 0) {
            None
        } else {
            Some(d[0])
        }
    }

    pub fn exponent_integer(&self, packed: &[u64], var: usize) -> Integer {
        Integer::from_digits(&self.read_field(packed, self.var_field(var)), Order::Lsf)
    }

    /// The total degree of a packed monomial.
    pub fn total_degree(&self, packed: &[u64]) -> Integer {
        if self.order.is_graded() {
            Integer::from_digits(&self.read_field(packed, 0), Order::Lsf)
        } else {
            (0..self.nvars).fold(Integer::new(), |acc, v| {
                acc + self.exponent_integer(packed, v)
            })
        }
    }

    /// Returns `true` if all exponents are zero.
    #[inline]
    pub fn is_one(&self, packed: &[u64]) -> bool {
        packed.iter().all(|w| *w == 0)
    }

    /// Compute `out = a + b`. Check [overflows](Self::overflows) afterwards
    /// if the field width may be insufficient.
    #[inline]
    pub fn add(&self, a: &[u64], b: &[u64], out: &mut [u64]) {
        if self.bits <= 64 {
            for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
                *o = x.wrapping_add(*y);
            }
        } else {
            let mut carry = false;
            for i in (0..self.words).rev() {
                let (s, c1) = a[i].overflowing_add(b[i]);
                let (s, c2) = s.overflowing_add(carry as u64);
                out[i] = s;
                carry = c1 || c2;
            }
        }
    }

    #[inline]
    pub fn add_assign(&self, a: &mut [u64], b: &[u64]) {
        if self.bits <= 64 {
            for (x, y) in a.iter_mut().zip(b) {
                *x = x.wrapping_add(*y);
            }
        } else {
            let mut carry = false;
            for i in (0..self.words).rev() {
                let (s, c1) = a[i].overflowing_add(b[i]);
                let (s, c2) = s.overflowing_add(carry as u64);
                a[i] = s;
                carry = c1 || c2;
            }
        }
    }

    /// Compute `out = a - b`. Returns `false` if any exponent of `b` is
    /// larger than the corresponding exponent of `a`, in which case `out`
    /// holds garbage.
    #[inline]
    pub fn sub(&self, a: &[u64], b: &[u64], out: &mut [u64]) -> bool {
        if self.bits <= 64 {
            for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
                *o = x.wrapping_sub(*y);
            }
        } else {
            let mut borrow = false;
            for i in (0..self.words).rev() {
                let (s, b1) = a[i].overflowing_sub(b[i]);
                let (s, b2) = s.overflowing_sub(borrow as u64);
                out[i] = s;
                borrow = b1 || b2;
            }
        }

        !self.overflows(out)
    }

    /// Returns `true` if `b` divides `a`.
    #[inline]
    pub fn divides(&self, a: &[u64], b: &[u64]) -> bool {
        let mut tmp: SmallVec<[u64; INLINED_WORDS]> = smallvec![0; self.words];
        self.sub(a, b, &mut tmp)
    }

    /// Returns `true` if an overflow bit is set.
    #[inline]
    pub fn overflows(&self, a: &[u64]) -> bool {
        a.iter()
            .zip(&self.overflow_mask)
            .any(|(x, m)| x & m != 0)
    }

    /// Compare two packed monomials in the monomial order.
    #[inline]
    pub fn cmp(&self, a: &[u64], b: &[u64]) -> Ordering {
        for ((x, y), m) in a.iter().zip(b).zip(&self.cmp_mask) {
            match (x ^ m).cmp(&(y ^ m)) {
                Ordering::Equal => {}
                o => return o,
            }
        }
        Ordering::Equal
    }

    /// Convert a packed monomial to a key whose natural order is the
    /// monomial order.
    #[inline]
    pub fn key(&self, a: &[u64]) -> MonomialKey {
        a.iter().zip(&self.cmp_mask).map(|(x, m)| x ^ m).collect()
    }

    #[inline]
    pub fn from_key(&self, key: &[u64], out: &mut [u64]) {
        for ((o, k), m) in out.iter_mut().zip(key).zip(&self.cmp_mask) {
            *o = k ^ m;
        }
    }

    /// Write the packed form of `var^e` into `out`, where `e` is the
    /// exponent of `var` in `packed`.
    pub fn isolate(&self, packed: &[u64], var: usize, out: &mut [u64]) {
        out.fill(0);
        let vf = self.var_field(var);
        let d = self.read_field(packed, vf);
        self.write_field(out, vf, &d);
        if self.order.is_graded() {
            self.write_field(out, 0, &d);
        }
    }

    /// Write the packed form of `var^e` into `out`.
    pub fn var_power(&self, var: usize, e: &Integer, out: &mut [u64]) {
        out.fill(0);
        let d = e.to_digits::<u64>(Order::Lsf);
        self.write_field(out, self.var_field(var), &d);
        if self.order.is_graded() {
            self.write_field(out, 0, &d);
        }
    }

    /// The largest number of bits used by any field value of `packed`.
    pub fn field_bits(&self, packed: &[u64]) -> usize {
        (0..self.nfields())
            .map(|f| {
                let d = self.read_field(packed, f);
                d.iter()
                    .enumerate()
                    .rev()
                    .find(|(_, x)| **x != 0)
                    .map(|(i, x)| i * 64 + (64 - x.leading_zeros() as usize))
                    .unwrap_or(0)
            })
            .max()
            .unwrap_or(0)
    }

    /// Re-encode a monomial packed by `self` with the wider codec `target`.
    pub fn repack_into(&self, target: &MonomialCodec, packed: &[u64], out: &mut [u64]) {
        debug_assert!(target.bits >= self.bits);
        debug_assert_eq!(target.nvars, self.nvars);
        out.fill(0);
        for f in 0..self.nfields() {
            target.write_field(out, f, &self.read_field(packed, f));
        }
    }

    /// Re-encode a sequence of packed monomials at the field width
    /// `new_bits`. The width can only grow.
    pub fn repack(
        &self,
        exponents: &[u64],
        new_bits: usize,
    ) -> Result<(MonomialCodec, Vec<u64>), PolynomialError> {
        if new_bits < self.bits {
            return Err(PolynomialError::domain(format!(
                "cannot narrow packed exponents from {} to {} bits",
                self.bits, new_bits
            )));
        }

        let target = self.with_bits(new_bits);
        if new_bits == self.bits {
            return Ok((target, exponents.to_vec()));
        }

        let nterms = exponents.len() / self.words;
        let mut out = vec![0; nterms * target.words];
        for (src, dst) in exponents
            .chunks(self.words)
            .zip(out.chunks_mut(target.words))
        {
            self.repack_into(&target, src, dst);
        }

        Ok((target, out))
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use rug::Integer;

    use super::MonomialCodec;
    use crate::error::PolynomialError;
    use crate::poly::MonomialOrder;

    fn reference_cmp(order: MonomialOrder, a: &[u64], b: &[u64]) -> Ordering {
        let da: u64 = a.iter().sum();
        let db: u64 = b.iter().sum();
        match order {
            MonomialOrder::Lex => a.cmp(b),
            MonomialOrder::DegLex => da.cmp(&db).then_with(|| a.cmp(b)),
            MonomialOrder::DegRevLex => da.cmp(&db).then_with(|| {
                for (x, y) in a.iter().zip(b).rev() {
                    if x != y {
                        return y.cmp(x);
                    }
                }
                Ordering::Equal
            }),
        }
    }

    #[test]
    fn order_matches_unpacked() {
        let monomials = [
            [0, 0, 0],
            [3, 0, 0],
            [2, 1, 0],
            [0, 3, 0],
            [2, 0, 1],
            [1, 1, 1],
            [0, 0, 3],
            [1, 0, 2],
            [0, 2, 1],
            [5, 0, 0],
            [0, 0, 1],
        ];

        for order in [
            MonomialOrder::Lex,
            MonomialOrder::DegLex,
            MonomialOrder::DegRevLex,
        ] {
            for bits in [8, 16, 64, 128] {
                let c = MonomialCodec::new(3, order, bits);
                let mut pa = vec![0; c.words()];
                let mut pb = vec![0; c.words()];
                for a in &monomials {
                    for b in &monomials {
                        c.pack(a, &mut pa);
                        c.pack(b, &mut pb);
                        assert_eq!(
                            c.cmp(&pa, &pb),
                            reference_cmp(order, a, b),
                            "{:?} {} {:?} {:?}",
                            order,
                            bits,
                            a,
                            b
                        );
                        assert_eq!(c.key(&pa).cmp(&c.key(&pb)), c.cmp(&pa, &pb));
                    }
                }
            }
        }
    }

    #[test]
    fn degrevlex_known_order() {
        let c = MonomialCodec::new(3, MonomialOrder::DegRevLex, 8);
        let mut a = vec![0; c.words()];
        let mut b = vec![0; c.words()];
        // y^3 > x^2*z
        c.pack(&[0, 3, 0], &mut a);
        c.pack(&[2, 0, 1], &mut b);
        assert_eq!(c.cmp(&a, &b), Ordering::Greater);

        let c = MonomialCodec::new(3, MonomialOrder::Lex, 8);
        let mut a = vec![0; c.words()];
        let mut b = vec![0; c.words()];
        c.pack(&[0, 3, 0], &mut a);
        c.pack(&[2, 0, 1], &mut b);
        assert_eq!(c.cmp(&a, &b), Ordering::Less);
    }

    #[test]
    fn overflow_and_division() {
        let c = MonomialCodec::new(2, MonomialOrder::DegLex, 8);
        let mut a = vec![0; c.words()];
        let mut b = vec![0; c.words()];
        let mut r = vec![0; c.words()];
        c.pack(&[100, 20], &mut a);
        c.pack(&[27, 1], &mut b);
        c.add(&a, &b, &mut r);
        assert!(c.overflows(&r));

        c.pack(&[20, 10], &mut a);
        c.pack(&[7, 1], &mut b);
        c.add(&a, &b, &mut r);
        assert!(!c.overflows(&r));
        let mut e = [0; 2];
        assert!(c.unpack(&r, &mut e));
        assert_eq!(e, [27, 11]);

        assert!(c.divides(&a, &b));
        assert!(!c.divides(&b, &a));
        c.pack(&[0, 2], &mut b);
        assert!(!c.divides(&b, &a));
    }

    #[test]
    fn wide_exponents() {
        let e = [Integer::from(1) << 100u32, Integer::from(5)];
        let bits = MonomialCodec::bits_required_integers(MonomialOrder::DegRevLex, &e, 1024)
            .unwrap();
        assert_eq!(bits, 128);

        let c = MonomialCodec::new(2, MonomialOrder::DegRevLex, bits);
        let mut p = vec![0; c.words()];
        c.pack_integers(&e, &mut p);
        assert_eq!(c.unpack_integers(&p).as_slice(), &e);
        assert_eq!(c.exponent(&p, 0), None);
        assert_eq!(c.exponent(&p, 1), Some(5));
        assert_eq!(c.total_degree(&p), (Integer::from(1) << 100u32) + 5u32);

        let mut q = vec![0; c.words()];
        let mut s = vec![0; c.words()];
        c.add(&p, &p, &mut s);
        assert!(!c.overflows(&s));
        assert!(c.sub(&s, &p, &mut q));
        assert_eq!(q, p);
    }

    #[test]
    fn repacking() {
        let c = MonomialCodec::new(3, MonomialOrder::Lex, 8);
        let mut p = vec![0; 2 * c.words()];
        c.pack(&[1, 2, 3], &mut p[..c.words()]);
        c.pack(&[100, 0, 7], &mut p[c.words()..]);

        let (wide, q) = c.repack(&p, 128).unwrap();
        let mut e = [0; 3];
        assert!(wide.unpack(&q[wide.words()..], &mut e));
        assert_eq!(e, [100, 0, 7]);

        assert!(matches!(
            wide.repack(&q, 16),
            Err(PolynomialError::Domain(_))
        ));
        assert!(matches!(
            MonomialCodec::bits_required(MonomialOrder::Lex, &[u64::MAX], 64),
            Err(PolynomialError::ExponentOverflow { required: 128, .. })
        ));
    }
}
