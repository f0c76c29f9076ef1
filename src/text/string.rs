use memchr::memchr3;

use crate::arena::Span;
use crate::error::ScanError;
use crate::text::tables::{Escape, ESCAPE};

const HEX_LOWER: &[u8; 16] = b"0123456789abcdef";

/// Append `bytes` to `out` with JSON escapes applied, stopping at the first
/// NUL byte, which marks the end of the text.
pub fn escape_into(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut start = 0;
    for (idx, &byte) in bytes.iter().enumerate() {
        let action = ESCAPE[byte as usize];
        if action == Escape::None {
            continue;
        }
        out.extend_from_slice(&bytes[start..idx]);
        start = idx + 1;
        match action {
            Escape::None => {}
            Escape::Terminator => return,
            Escape::Named(letter) => out.extend_from_slice(&[b'\\', letter]),
            Escape::Unicode => out.extend_from_slice(&[
                b'\\',
                b'u',
                b'0',
                b'0',
                HEX_LOWER[(byte >> 4) as usize],
                HEX_LOWER[(byte & 0x0F) as usize],
            ]),
        }
    }
    out.extend_from_slice(&bytes[start..]);
}

/// Escape special characters for output inside a JSON string literal.
///
/// # Examples
/// ```
/// use jsonrt::text::string::escape_string;
///
/// assert_eq!(escape_string("a\"b\n"), "a\\\"b\\n");
/// ```
pub fn escape_string(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len() + 2);
    escape_into(&mut out, s.as_bytes());
    // Escaping only ever inserts ASCII and cuts at a NUL, which is a
    // character boundary.
    String::from_utf8(out).unwrap_or_default()
}

/// Decode, in place, the string literal whose opening quote sits at
/// `start`. The closing quote must match the opening one.
///
/// Returns the span of the decoded text and the position just past the
/// closing quote. Decoded bytes never extend past the bytes read, so the
/// buffer outside the literal is left untouched.
pub fn decode_quoted(buf: &mut [u8], start: usize) -> Result<(Span, usize), ScanError> {
    let quote = match buf.get(start) {
        Some(&q @ (b'"' | b'\'')) => q,
        _ => return Err(ScanError::unexpected(buf, start)),
    };
    let text_start = start + 1;
    let mut read = text_start;
    let mut write = text_start;
    loop {
        let Some(found) = memchr3(quote, b'\\', 0, &buf[read..]) else {
            return Err(ScanError::UnterminatedString(start));
        };
        let at = read + found;
        if write != read {
            buf.copy_within(read..at, write);
        }
        write += at - read;
        match buf[at] {
            0 => return Err(ScanError::EmbeddedNul(at)),
            b'\\' => {
                let Some(&escaped) = buf.get(at + 1) else {
                    return Err(ScanError::UnterminatedString(start));
                };
                read = at + 2;
                let single = match escaped {
                    b'b' => 0x08,
                    b't' => b'\t',
                    b'n' => b'\n',
                    b'f' => 0x0C,
                    b'r' => b'\r',
                    b'u' => {
                        let (ch, consumed) = decode_unicode_escape(buf, at)?;
                        read = at + consumed;
                        let mut utf8 = [0u8; 4];
                        let encoded = ch.encode_utf8(&mut utf8).as_bytes();
                        buf[write..write + encoded.len()].copy_from_slice(encoded);
                        write += encoded.len();
                        continue;
                    }
                    0 => return Err(ScanError::EmbeddedNul(at + 1)),
                    other => other,
                };
                buf[write] = single;
                write += 1;
            }
            _ => {
                return Ok((
                    Span {
                        start: text_start,
                        end: write,
                    },
                    at + 1,
                ))
            }
        }
    }
}

/// Decode the `\uXXXX` escape at `at`, joining a following low surrogate
/// escape when present. Lone surrogates decode to U+FFFD.
fn decode_unicode_escape(buf: &[u8], at: usize) -> Result<(char, usize), ScanError> {
    let high = read_hex4(buf, at + 2).ok_or(ScanError::InvalidEscape(at))?;
    if (0xD800..0xDC00).contains(&high) {
        if buf.get(at + 6) == Some(&b'\\') && buf.get(at + 7) == Some(&b'u') {
            if let Some(low) = read_hex4(buf, at + 8) {
                if (0xDC00..0xE000).contains(&low) {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    let ch = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                    return Ok((ch, 12));
                }
            }
        }
        return Ok((char::REPLACEMENT_CHARACTER, 6));
    }
    let ch = char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER);
    Ok((ch, 6))
}

fn read_hex4(buf: &[u8], at: usize) -> Option<u32> {
    let digits = buf.get(at..at + 4)?;
    digits
        .iter()
        .try_fold(0u32, |acc, &digit| Some(acc << 4 | hex_value(digit)? as u32))
}

#[inline]
pub(crate) fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Decode the body of a JSON string literal (without its quotes) into a new
/// buffer.
pub fn unescape(escaped: &[u8]) -> Result<Vec<u8>, ScanError> {
    let mut buf = Vec::with_capacity(escaped.len() + 2);
    buf.push(b'"');
    buf.extend_from_slice(escaped);
    buf.push(b'"');
    let (span, next) = decode_quoted(&mut buf, 0)?;
    if next != buf.len() {
        return Err(ScanError::unexpected(&buf, next));
    }
    buf.truncate(span.end);
    buf.remove(0);
    Ok(buf)
}

/// Strip the leading lowercase prefix of an enumeration name, so that
/// `"seFirstItem"` reads `"FirstItem"`. Names made of lowercase letters
/// only are returned unchanged.
pub fn trim_left_lowercase(name: &str) -> &str {
    let trimmed = name.trim_start_matches(|ch: char| ch.is_ascii_lowercase());
    if trimmed.is_empty() {
        name
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<(Vec<u8>, usize), ScanError> {
        let mut buf = input.to_vec();
        let (span, next) = decode_quoted(&mut buf, 0)?;
        Ok((buf[span.start..span.end].to_vec(), next))
    }

    #[rstest::rstest]
    fn test_escape_string() {
        assert_eq!(escape_string("hello"), "hello");
        assert_eq!(escape_string("hello\nworld"), "hello\\nworld");
        assert_eq!(escape_string("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_string("back\\slash"), "back\\\\slash");
        assert_eq!(escape_string("\u{1}\u{b}\u{1f}"), "\\u0001\\u000b\\u001f");
        assert_eq!(escape_string("\u{8}\u{c}\r\t"), "\\b\\f\\r\\t");
        assert_eq!(escape_string("héllo/"), "héllo/");
    }

    #[rstest::rstest]
    fn test_escape_stops_at_nul() {
        assert_eq!(escape_string("ab\0cd"), "ab");
    }

    #[rstest::rstest]
    fn test_decode_plain_string() {
        let (text, next) = decode(br#""hello" , 1"#).unwrap();
        assert_eq!(text, b"hello");
        assert_eq!(next, 7);
    }

    #[rstest::rstest]
    fn test_decode_named_escapes() {
        let (text, _) = decode(br#""a\"b\\c\/d\b\f\n\r\t""#).unwrap();
        assert_eq!(text, b"a\"b\\c/d\x08\x0c\n\r\t");
    }

    #[rstest::rstest]
    fn test_decode_unicode_escapes() {
        let (text, _) = decode(br#""\u00e9\u20AC""#).unwrap();
        assert_eq!(text, "é€".as_bytes());

        let (text, _) = decode(br#""\ud83d\ude00!""#).unwrap();
        assert_eq!(text, "😀!".as_bytes());

        let (text, _) = decode(br#""\ud83d x""#).unwrap();
        assert_eq!(text, "\u{FFFD} x".as_bytes());
    }

    #[rstest::rstest]
    fn test_decode_leaves_following_bytes() {
        let mut buf = br#"["a\nb","c"]"#.to_vec();
        let (span, next) = decode_quoted(&mut buf, 1).unwrap();
        assert_eq!(&buf[span.start..span.end], b"a\nb");
        assert_eq!(&buf[next..], br#","c"]"#);
    }

    #[rstest::rstest]
    fn test_decode_failures() {
        assert_eq!(
            decode(b"\"abc").unwrap_err(),
            ScanError::UnterminatedString(0)
        );
        assert_eq!(decode(b"\"ab\0c\"").unwrap_err(), ScanError::EmbeddedNul(3));
        assert_eq!(decode(br#""\u12G4""#).unwrap_err(), ScanError::InvalidEscape(1));
        assert_eq!(decode(b"\"abc\\").unwrap_err(), ScanError::UnterminatedString(0));
    }

    #[rstest::rstest]
    fn test_decode_single_quoted() {
        let (text, _) = decode(br#"'it\'s "fine"'"#).unwrap();
        assert_eq!(text, br#"it's "fine""#);
    }

    #[rstest::rstest]
    fn test_unescape_roundtrip_controls() {
        let original = "tab\tquote\"nul-free \u{1}\u{10FFFF}";
        let escaped = escape_string(original);
        assert_eq!(unescape(escaped.as_bytes()).unwrap(), original.as_bytes());
    }

    #[rstest::rstest]
    fn test_trim_left_lowercase() {
        assert_eq!(trim_left_lowercase("seFirstItem"), "FirstItem");
        assert_eq!(trim_left_lowercase("Plain"), "Plain");
        assert_eq!(trim_left_lowercase("lower"), "lower");
    }
}
