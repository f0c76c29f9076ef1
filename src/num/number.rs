use serde_json::Number;

use crate::error::ScanError;
use crate::text::string::hex_value;

/// Shape of a text that passed the JSON number grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberClass {
    Integer,
    Float,
}

/// Scan a JSON number starting at `start` and return the index just past
/// it. Grammar: `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`.
pub fn scan_number(bytes: &[u8], start: usize) -> Result<usize, ScanError> {
    let mut idx = start;
    if bytes.get(idx) == Some(&b'-') {
        idx += 1;
    }
    match bytes.get(idx) {
        Some(b'0') => {
            idx += 1;
            if bytes.get(idx).is_some_and(u8::is_ascii_digit) {
                return Err(ScanError::InvalidNumber(start));
            }
        }
        Some(b'1'..=b'9') => idx = skip_digits(bytes, idx),
        _ => return Err(ScanError::InvalidNumber(start)),
    }
    if bytes.get(idx) == Some(&b'.') {
        let digits = idx + 1;
        idx = skip_digits(bytes, digits);
        if idx == digits {
            return Err(ScanError::InvalidNumber(start));
        }
    }
    if matches!(bytes.get(idx), Some(b'e' | b'E')) {
        idx += 1;
        if matches!(bytes.get(idx), Some(b'+' | b'-')) {
            idx += 1;
        }
        let digits = idx;
        idx = skip_digits(bytes, digits);
        if idx == digits {
            return Err(ScanError::InvalidNumber(start));
        }
    }
    Ok(idx)
}

#[inline]
fn skip_digits(bytes: &[u8], mut idx: usize) -> usize {
    while bytes.get(idx).is_some_and(u8::is_ascii_digit) {
        idx += 1;
    }
    idx
}

/// Decide whether a whole text is a JSON number, and of which shape.
///
/// This is the single place where untyped text is sorted into numbers and
/// strings: leading zeros (`"0123"`), a dangling dot (`"01."`, `"."`),
/// doubled signs and surrounding whitespace all make it a string.
pub fn classify_number(text: &[u8]) -> Option<NumberClass> {
    match scan_number(text, 0) {
        Ok(end) if end == text.len() => {
            if text.iter().any(|b| matches!(b, b'.' | b'e' | b'E')) {
                Some(NumberClass::Float)
            } else {
                Some(NumberClass::Integer)
            }
        }
        _ => None,
    }
}

pub fn looks_like_number(text: &[u8]) -> bool {
    classify_number(text).is_some()
}

pub fn parse_i64(text: &[u8]) -> Option<i64> {
    std::str::from_utf8(text).ok()?.parse().ok()
}

pub fn parse_u64(text: &[u8]) -> Option<u64> {
    std::str::from_utf8(text).ok()?.parse().ok()
}

pub fn parse_f64(text: &[u8]) -> Option<f64> {
    std::str::from_utf8(text).ok()?.parse().ok()
}

/// Parse a hexadecimal 64-bit value, either `0x`-prefixed or written as
/// exactly sixteen digits.
pub fn parse_hex_u64(text: &[u8]) -> Option<u64> {
    let digits = match text {
        [b'0', b'x' | b'X', rest @ ..] if !rest.is_empty() && rest.len() <= 16 => rest,
        _ if text.len() == 16 => text,
        _ => return None,
    };
    digits
        .iter()
        .try_fold(0u64, |acc, &digit| Some(acc << 4 | hex_value(digit)? as u64))
}

/// Append the JSON text of a `serde_json::Number`.
pub fn write_json_number(out: &mut Vec<u8>, number: &Number) {
    if let Some(value) = number.as_i64() {
        let mut buffer = itoa::Buffer::new();
        out.extend_from_slice(buffer.format(value).as_bytes());
    } else if let Some(value) = number.as_u64() {
        let mut buffer = itoa::Buffer::new();
        out.extend_from_slice(buffer.format(value).as_bytes());
    } else if let Some(value) = number.as_f64() {
        write_f64(out, value);
    } else {
        out.extend_from_slice(b"null");
    }
}

/// Append a float using the shortest text that reads back to the same
/// value. Non-finite values have no JSON form and are written as `null`.
pub fn write_f64(out: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        out.extend_from_slice(b"null");
        return;
    }
    let mut buffer = ryu::Buffer::new();
    out.extend_from_slice(buffer.format_finite(value).as_bytes());
}

pub fn write_f32(out: &mut Vec<u8>, value: f32) {
    if !value.is_finite() {
        out.extend_from_slice(b"null");
        return;
    }
    let mut buffer = ryu::Buffer::new();
    out.extend_from_slice(buffer.format_finite(value).as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(b"0", NumberClass::Integer)]
    #[case(b"-0", NumberClass::Integer)]
    #[case(b"123", NumberClass::Integer)]
    #[case(b"1e10", NumberClass::Float)]
    #[case(b"1.5e-3", NumberClass::Float)]
    #[case(b"-2.25E+7", NumberClass::Float)]
    fn test_classify_numbers(#[case] text: &[u8], #[case] expected: NumberClass) {
        assert_eq!(classify_number(text), Some(expected));
    }

    #[rstest::rstest]
    #[case(b"0123")]
    #[case(b"01.")]
    #[case(b"--1")]
    #[case(b".")]
    #[case(b"1.")]
    #[case(b"1e")]
    #[case(b"+1")]
    #[case(b" 1")]
    #[case(b"")]
    #[case(b"12abc")]
    fn test_classify_rejects(#[case] text: &[u8]) {
        assert_eq!(classify_number(text), None);
    }

    #[rstest::rstest]
    fn test_scan_number_stops_at_delimiter() {
        assert_eq!(scan_number(b"[12,3]", 1), Ok(3));
        assert_eq!(scan_number(b"-0.5}", 0), Ok(4));
        assert_eq!(scan_number(b"0123", 0), Err(ScanError::InvalidNumber(0)));
    }

    #[rstest::rstest]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64(b"0x1F"), Some(31));
        assert_eq!(parse_hex_u64(b"00000000000000ff"), Some(255));
        assert_eq!(parse_hex_u64(b"FFFFFFFFFFFFFFFF"), Some(u64::MAX));
        assert_eq!(parse_hex_u64(b"1F"), None);
        assert_eq!(parse_hex_u64(b"0x"), None);
        assert_eq!(parse_hex_u64(b"0xZZ"), None);
    }

    #[rstest::rstest]
    fn test_write_floats() {
        let mut out = Vec::new();
        write_f64(&mut out, 1.5);
        out.push(b' ');
        write_f64(&mut out, f64::NAN);
        out.push(b' ');
        write_f32(&mut out, 0.25);
        assert_eq!(out, b"1.5 null 0.25");
    }

    #[rstest::rstest]
    fn test_write_json_number() {
        let mut out = Vec::new();
        write_json_number(&mut out, &Number::from(-42));
        out.push(b',');
        write_json_number(&mut out, &Number::from(u64::MAX));
        assert_eq!(out, format!("-42,{}", u64::MAX).into_bytes());
    }
}
