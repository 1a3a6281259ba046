//! Low-level byte primitives: pattern search, little-endian numeric
//! encode/decode, UTF-8 decode. Everything here is pure; the only failures
//! are the explicitly noted width/format cases.

use crate::error::{Error, Result};

/// Scope terminator and string terminator of the tstprj wire format.
pub const TERMINATOR: u8 = 0x00;

/// First occurrence of `pattern` in `buf` at or after `from`, leftmost match.
///
/// Bad-character-shift skip search: on a mismatch the window advances by the
/// distance of the byte just past the window to its rightmost occurrence in
/// the pattern, so scanning for single-byte delimiters stays near O(n).
/// An empty pattern matches at `from`.
pub fn find_pattern(buf: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    let n = buf.len();
    let m = pattern.len();
    if m == 0 {
        return (from <= n).then_some(from);
    }

    let mut i = from;
    while i + m <= n {
        if &buf[i..i + m] == pattern {
            return Some(i);
        }
        if i + m < n {
            let next = buf[i + m];
            match pattern.iter().rposition(|&b| b == next) {
                Some(k) => i += m - k,
                None => i += m + 1,
            }
        } else {
            break;
        }
    }
    None
}

/// Little-endian unsigned integer of arbitrary byte length.
///
/// The empty slice decodes to zero. Significant bytes beyond the 8th do not
/// fit a `u64` and are reported rather than truncated.
pub fn decode_uint(bytes: &[u8]) -> Result<u64> {
    if bytes.len() > 8 && bytes[8..].iter().any(|&b| b != 0) {
        return Err(Error::UintWidth { len: bytes.len() });
    }
    let mut num: u64 = 0;
    for (i, &b) in bytes.iter().enumerate().take(8) {
        num |= u64::from(b) << (8 * i);
    }
    Ok(num)
}

/// IEEE-754 little-endian double from the first 8 bytes of `bytes`.
pub fn decode_f64(bytes: &[u8]) -> Result<f64> {
    if bytes.len() < 8 {
        return Err(Error::FloatWidth { got: bytes.len() });
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    Ok(f64::from_le_bytes(raw))
}

/// Minimal-width little-endian encoding of `n`.
///
/// Zero encodes as a single zero byte unless `zero_as_empty` is set; the
/// empty-for-zero variant is what the attribute-count field needs, where
/// zero must stay distinguishable from absent.
pub fn encode_uint(n: u64, zero_as_empty: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8);
    let mut temp = n;
    while temp > 0 {
        bytes.push((temp & 0xff) as u8);
        temp >>= 8;
    }
    if bytes.is_empty() && !zero_as_empty {
        bytes.push(0);
    }
    bytes
}

/// Fixed-width little-endian int32.
pub fn encode_i32(n: i32) -> [u8; 4] {
    n.to_le_bytes()
}

/// Fixed-width little-endian IEEE-754 double.
pub fn encode_f64(n: f64) -> [u8; 8] {
    n.to_le_bytes()
}

/// UTF-8 decode with a context tag for error reporting.
pub fn decode_utf8<'a>(bytes: &'a [u8], context: &'static str) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 { context })
}

/// Order-preserving concatenation of byte slices.
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(len);
    for p in parts {
        out.extend_from_slice(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_pattern_basic() {
        let buf = b"abcabcabc";
        assert_eq!(find_pattern(buf, b"abc", 0), Some(0));
        assert_eq!(find_pattern(buf, b"abc", 1), Some(3));
        assert_eq!(find_pattern(buf, b"cab", 0), Some(2));
        assert_eq!(find_pattern(buf, b"abcd", 0), None);
        assert_eq!(find_pattern(buf, b"c", 8), Some(8));
        assert_eq!(find_pattern(buf, b"a", 7), None);
    }

    #[test]
    fn find_pattern_empty_matches_at_from() {
        assert_eq!(find_pattern(b"xyz", b"", 0), Some(0));
        assert_eq!(find_pattern(b"xyz", b"", 2), Some(2));
        assert_eq!(find_pattern(b"xyz", b"", 3), Some(3));
        assert_eq!(find_pattern(b"xyz", b"", 4), None);
    }

    #[test]
    fn find_pattern_overlapping_returns_leftmost() {
        assert_eq!(find_pattern(b"aaaa", b"aa", 0), Some(0));
        assert_eq!(find_pattern(b"aaaa", b"aa", 1), Some(1));
        assert_eq!(find_pattern(b"abab", b"aba", 0), Some(0));
    }

    #[test]
    fn find_pattern_single_terminator() {
        let buf = [0x41, 0x42, 0x00, 0x43, 0x00];
        assert_eq!(find_pattern(&buf, &[TERMINATOR], 0), Some(2));
        assert_eq!(find_pattern(&buf, &[TERMINATOR], 3), Some(4));
        assert_eq!(find_pattern(&buf, &[TERMINATOR], 5), None);
    }

    #[test]
    fn uint_roundtrip() {
        for n in [0u64, 1, 0xff, 0x100, 0x1234, 0xff_ffff, u32::MAX as u64, u64::MAX] {
            let enc = encode_uint(n, false);
            assert_eq!(decode_uint(&enc).unwrap(), n, "n = {n}");
        }
    }

    #[test]
    fn uint_zero_variants() {
        assert_eq!(encode_uint(0, false), vec![0]);
        assert_eq!(encode_uint(0, true), Vec::<u8>::new());
        assert_eq!(decode_uint(&[]).unwrap(), 0);
    }

    #[test]
    fn uint_minimal_width() {
        assert_eq!(encode_uint(0x01, false), vec![0x01]);
        assert_eq!(encode_uint(0x0100, false), vec![0x00, 0x01]);
        assert_eq!(encode_uint(0x0102, false), vec![0x02, 0x01]);
    }

    #[test]
    fn uint_too_wide() {
        let wide = [0xffu8; 9];
        assert!(matches!(decode_uint(&wide), Err(Error::UintWidth { len: 9 })));
        // Padding zeros beyond the 8th byte are harmless.
        let padded = [0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_uint(&padded).unwrap(), 1);
    }

    #[test]
    fn f64_roundtrip() {
        for x in [0.0, -0.0, 1.5, -2.25, 120.0, f64::MAX, f64::MIN_POSITIVE] {
            assert_eq!(decode_f64(&encode_f64(x)).unwrap(), x);
        }
    }

    #[test]
    fn f64_too_short() {
        assert!(matches!(
            decode_f64(&[0, 0, 0, 0]),
            Err(Error::FloatWidth { got: 4 })
        ));
    }

    #[test]
    fn i32_little_endian() {
        assert_eq!(encode_i32(1), [0x01, 0x00, 0x00, 0x00]);
        assert_eq!(encode_i32(-1), [0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn concat_preserves_order() {
        assert_eq!(
            concat(&[b"ab", &[TERMINATOR], b"c"]),
            vec![b'a', b'b', 0x00, b'c']
        );
        assert_eq!(concat(&[]), Vec::<u8>::new());
    }
}
