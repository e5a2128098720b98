/// Compute `⌈log₄(n)⌉` for `n > 4` and `0` otherwise.
pub fn clog4(n: usize) -> usize {
    if n <= 4 {
        return 0;
    }

    let mut k = 1;
    let mut p: usize = 4;
    while p < n {
        k += 1;
        p = match p.checked_mul(4) {
            Some(p) => p,
            None => break,
        };
    }
    k
}

/// The number of bits needed to represent `n`.
#[inline]
pub fn bit_length_u128(n: u128) -> usize {
    (128 - n.leading_zeros()) as usize
}

#[cfg(test)]
mod test {
    use super::clog4;

    #[test]
    fn log4() {
        assert_eq!(clog4(0), 0);
        assert_eq!(clog4(4), 0);
        assert_eq!(clog4(5), 2);
        assert_eq!(clog4(16), 2);
        assert_eq!(clog4(17), 3);
        assert_eq!(clog4(64), 3);
        assert_eq!(clog4(65), 4);
    }
}
