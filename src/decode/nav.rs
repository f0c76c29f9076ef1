//! Read-only navigation over raw JSON bytes.
//!
//! Nothing here decodes or allocates string content: values are located by
//! walking the bytes and returned as slices of the input, exactly as they
//! appear in it.

use memchr::memchr3;

use crate::constants::MAX_DEPTH;
use crate::error::ScanError;
use crate::num::number::scan_number;
use crate::text::tables::{class_of, is_ident_continue, is_whitespace, CharClass};

/// Accepted input dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Syntax {
    /// RFC 4627 JSON.
    #[default]
    Strict,
    /// Also accepts unquoted or single-quoted names and strings, trailing
    /// commas, `name(...)` constructor calls and `/regex/flags` literals.
    Extended,
}

impl Syntax {
    #[inline]
    pub fn is_extended(self) -> bool {
        self == Syntax::Extended
    }
}

/// Delimiter found right after a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndMarker {
    Comma,
    CloseObject,
    CloseArray,
    Colon,
    Eof,
}

impl EndMarker {
    pub fn from_byte(byte: Option<u8>) -> Option<Self> {
        match byte {
            None | Some(0) => Some(EndMarker::Eof),
            Some(b',') => Some(EndMarker::Comma),
            Some(b'}') => Some(EndMarker::CloseObject),
            Some(b']') => Some(EndMarker::CloseArray),
            Some(b':') => Some(EndMarker::Colon),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Literal {
    True,
    False,
    Null,
}

#[inline]
pub fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|&b| is_whitespace(b)) {
        pos += 1;
    }
    pos
}

/// Byte 0 terminates the input just like the end of the slice.
#[inline]
pub(crate) fn at_end(bytes: &[u8], pos: usize) -> bool {
    matches!(bytes.get(pos), None | Some(0))
}

/// Whether `pos` holds a byte allowed right after a scalar: whitespace,
/// `,`, `}`, `]` or the end of input.
#[inline]
pub(crate) fn is_value_end(bytes: &[u8], pos: usize) -> bool {
    match bytes.get(pos) {
        None => true,
        Some(&byte) => class_of(byte).intersects(
            CharClass::WHITESPACE
                .union(CharClass::COMMA)
                .union(CharClass::CLOSE)
                .union(CharClass::END),
        ),
    }
}

pub(crate) fn match_literal(bytes: &[u8], pos: usize) -> Option<(Literal, usize)> {
    let rest = bytes.get(pos..)?;
    let (literal, len) = if rest.starts_with(b"true") {
        (Literal::True, 4)
    } else if rest.starts_with(b"false") {
        (Literal::False, 5)
    } else if rest.starts_with(b"null") {
        (Literal::Null, 4)
    } else {
        return None;
    };
    is_value_end(bytes, pos + len).then_some((literal, pos + len))
}

/// Skip a quoted string whose opening quote sits at `start`, returning the
/// index past the closing quote.
pub(crate) fn skip_string(bytes: &[u8], start: usize) -> Result<usize, ScanError> {
    let quote = match bytes.get(start) {
        Some(&q @ (b'"' | b'\'')) => q,
        _ => return Err(ScanError::unexpected(bytes, start)),
    };
    let mut pos = start + 1;
    loop {
        let Some(found) = memchr3(quote, b'\\', 0, &bytes[pos..]) else {
            return Err(ScanError::UnterminatedString(start));
        };
        let at = pos + found;
        match bytes[at] {
            0 => return Err(ScanError::EmbeddedNul(at)),
            b'\\' => match bytes.get(at + 1) {
                None => return Err(ScanError::UnterminatedString(start)),
                Some(0) => return Err(ScanError::EmbeddedNul(at + 1)),
                Some(b'u') => {
                    let hex = bytes.get(at + 2..at + 6);
                    if !hex.is_some_and(|digits| digits.iter().all(u8::is_ascii_hexdigit)) {
                        return Err(ScanError::InvalidEscape(at));
                    }
                    pos = at + 6;
                }
                Some(_) => pos = at + 2,
            },
            _ => return Ok(at + 1),
        }
    }
}

/// End of a run of identifier bytes starting at `pos`.
#[inline]
pub(crate) fn identifier_end(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|&b| is_ident_continue(b)) {
        pos += 1;
    }
    pos
}

fn skip_parens(bytes: &[u8], open: usize) -> Result<usize, ScanError> {
    let mut depth = 0usize;
    let mut pos = open;
    loop {
        match bytes.get(pos) {
            None | Some(0) => return Err(ScanError::UnexpectedEnd(pos)),
            Some(b'"' | b'\'') => pos = skip_string(bytes, pos)?,
            Some(b'(') => {
                depth += 1;
                pos += 1;
            }
            Some(b')') => {
                depth -= 1;
                pos += 1;
                if depth == 0 {
                    return Ok(pos);
                }
            }
            Some(_) => pos += 1,
        }
    }
}

fn skip_regex(bytes: &[u8], start: usize) -> Result<usize, ScanError> {
    let mut pos = start + 1;
    loop {
        match bytes.get(pos) {
            None | Some(0 | b'\n') => return Err(ScanError::InvalidLiteral(start)),
            Some(b'\\') => pos += 2,
            Some(b'/') => break,
            Some(_) => pos += 1,
        }
    }
    pos += 1;
    while bytes.get(pos).is_some_and(u8::is_ascii_alphabetic) {
        pos += 1;
    }
    if is_value_end(bytes, pos) {
        Ok(pos)
    } else {
        Err(ScanError::InvalidLiteral(start))
    }
}

struct Walker<'a> {
    bytes: &'a [u8],
    syntax: Syntax,
}

impl<'a> Walker<'a> {
    fn value(&self, pos: usize, depth: usize) -> Result<usize, ScanError> {
        let pos = skip_whitespace(self.bytes, pos);
        let byte = match self.bytes.get(pos) {
            None | Some(0) => return Err(ScanError::UnexpectedEnd(pos)),
            Some(&byte) => byte,
        };
        let class = class_of(byte);
        let extended = self.syntax.is_extended();
        if class.contains(CharClass::QUOTE)
            || (extended && class.contains(CharClass::SINGLE_QUOTE))
        {
            return skip_string(self.bytes, pos);
        }
        if class.contains(CharClass::OPEN) {
            if depth >= MAX_DEPTH {
                return Err(ScanError::TooDeep {
                    max: MAX_DEPTH,
                    offset: pos,
                });
            }
            return if byte == b'{' {
                self.object(pos, depth + 1)
            } else {
                self.array(pos, depth + 1)
            };
        }
        if class.contains(CharClass::NUMBER_START) {
            let end = scan_number(self.bytes, pos)?;
            return if is_value_end(self.bytes, end) {
                Ok(end)
            } else {
                Err(ScanError::InvalidNumber(pos))
            };
        }
        if let Some((_, end)) = match_literal(self.bytes, pos) {
            return Ok(end);
        }
        if extended {
            if class.contains(CharClass::IDENT_START) {
                return self.identifier(pos);
            }
            if class.contains(CharClass::SLASH) {
                return skip_regex(self.bytes, pos);
            }
        }
        if class.contains(CharClass::CONSTANT_START) {
            return Err(ScanError::InvalidLiteral(pos));
        }
        Err(ScanError::unexpected(self.bytes, pos))
    }

    /// Bare word, optionally followed by a `(...)` argument list.
    fn identifier(&self, start: usize) -> Result<usize, ScanError> {
        let mut pos = identifier_end(self.bytes, start);
        if self.bytes.get(pos) == Some(&b'(') {
            pos = skip_parens(self.bytes, pos)?;
        }
        if is_value_end(self.bytes, pos) {
            Ok(pos)
        } else {
            Err(ScanError::InvalidLiteral(start))
        }
    }

    fn name(&self, pos: usize) -> Result<(usize, usize, usize), ScanError> {
        let byte = self.bytes.get(pos).copied().unwrap_or(0);
        let class = class_of(byte);
        if class.contains(CharClass::QUOTE)
            || (self.syntax.is_extended() && class.contains(CharClass::SINGLE_QUOTE))
        {
            let end = skip_string(self.bytes, pos)?;
            return Ok((pos + 1, end - 1, end));
        }
        if self.syntax.is_extended() && class.contains(CharClass::IDENT_START) {
            let end = identifier_end(self.bytes, pos);
            return Ok((pos, end, end));
        }
        Err(ScanError::unexpected(self.bytes, pos))
    }

    fn object(&self, open: usize, depth: usize) -> Result<usize, ScanError> {
        self.walk_object(open, depth, |_, _| true)
    }

    fn array(&self, open: usize, depth: usize) -> Result<usize, ScanError> {
        self.walk_array(open, depth, |_| true)
    }

    /// Walk the object opening at `open`, handing each raw name and raw value
    /// to `visit` until it returns `false`.
    fn walk_object(
        &self,
        open: usize,
        depth: usize,
        mut visit: impl FnMut(&'a [u8], &'a [u8]) -> bool,
    ) -> Result<usize, ScanError> {
        let bytes = self.bytes;
        let mut pos = open + 1;
        let mut first = true;
        loop {
            pos = skip_whitespace(bytes, pos);
            if bytes.get(pos) == Some(&b'}') && (first || self.syntax.is_extended()) {
                return Ok(pos + 1);
            }
            let (name_start, name_end, after_name) = self.name(pos)?;
            pos = skip_whitespace(bytes, after_name);
            if bytes.get(pos) != Some(&b':') {
                return Err(ScanError::unexpected(bytes, pos));
            }
            let value_start = skip_whitespace(bytes, pos + 1);
            let value_end = self.value(value_start, depth)?;
            if !visit(&bytes[name_start..name_end], &bytes[value_start..value_end]) {
                return Ok(value_end);
            }
            pos = skip_whitespace(bytes, value_end);
            match bytes.get(pos) {
                Some(b',') => {
                    pos += 1;
                    first = false;
                }
                Some(b'}') => return Ok(pos + 1),
                _ => return Err(ScanError::unexpected(bytes, pos)),
            }
        }
    }

    fn walk_array(
        &self,
        open: usize,
        depth: usize,
        mut visit: impl FnMut(&'a [u8]) -> bool,
    ) -> Result<usize, ScanError> {
        let bytes = self.bytes;
        let mut pos = open + 1;
        let mut first = true;
        loop {
            pos = skip_whitespace(bytes, pos);
            if bytes.get(pos) == Some(&b']') && (first || self.syntax.is_extended()) {
                return Ok(pos + 1);
            }
            let end = self.value(pos, depth)?;
            if !visit(&bytes[pos..end]) {
                return Ok(end);
            }
            pos = skip_whitespace(bytes, end);
            match bytes.get(pos) {
                Some(b',') => {
                    pos += 1;
                    first = false;
                }
                Some(b']') => return Ok(pos + 1),
                _ => return Err(ScanError::unexpected(bytes, pos)),
            }
        }
    }

    fn expect_open(&self, open: u8) -> Result<usize, ScanError> {
        let pos = skip_whitespace(self.bytes, 0);
        if self.bytes.get(pos) == Some(&open) {
            Ok(pos)
        } else {
            Err(ScanError::unexpected(self.bytes, pos))
        }
    }
}

/// Skip the value starting at `pos` (leading whitespace allowed) and return
/// the index just past it.
pub fn skip_value(bytes: &[u8], pos: usize, syntax: Syntax) -> Result<usize, ScanError> {
    Walker { bytes, syntax }.value(pos, 0)
}

/// Skip the value at `pos` and report the delimiter following it, together
/// with the delimiter's position.
pub fn item_end(
    bytes: &[u8],
    pos: usize,
    syntax: Syntax,
) -> Result<(usize, EndMarker), ScanError> {
    let end = skip_whitespace(bytes, skip_value(bytes, pos, syntax)?);
    match EndMarker::from_byte(bytes.get(end).copied()) {
        Some(marker) => Ok((end, marker)),
        None => Err(ScanError::unexpected(bytes, end)),
    }
}

/// Check that `bytes` holds exactly one value, surrounded by optional
/// whitespace.
pub fn validate(bytes: &[u8], syntax: Syntax) -> Result<(), ScanError> {
    let end = skip_whitespace(bytes, skip_value(bytes, 0, syntax)?);
    if at_end(bytes, end) {
        Ok(())
    } else {
        Err(ScanError::unexpected(bytes, end))
    }
}

pub fn is_valid(bytes: &[u8], syntax: Syntax) -> bool {
    validate(bytes, syntax).is_ok()
}

pub fn count_array_items(bytes: &[u8], syntax: Syntax) -> Result<usize, ScanError> {
    let walker = Walker { bytes, syntax };
    let open = walker.expect_open(b'[')?;
    let mut count = 0;
    walker.walk_array(open, 1, |_| {
        count += 1;
        true
    })?;
    Ok(count)
}

/// Lower-bound estimate of the number of items in the array whose content
/// starts at `pos` (just past `[`), looking no further than `window` bytes.
pub fn estimate_array_items(bytes: &[u8], pos: usize, window: usize) -> usize {
    let limit = pos.saturating_add(window).min(bytes.len());
    let walker = Walker {
        bytes: &bytes[..limit],
        syntax: Syntax::Extended,
    };
    let mut pos = pos;
    let mut count = 0;
    loop {
        pos = skip_whitespace(walker.bytes, pos);
        if matches!(walker.bytes.get(pos), None | Some(b']' | 0)) {
            return count;
        }
        let Ok(end) = walker.value(pos, 1) else {
            return count;
        };
        count += 1;
        pos = skip_whitespace(walker.bytes, end);
        if walker.bytes.get(pos) != Some(&b',') {
            return count;
        }
        pos += 1;
    }
}

pub fn array_items(bytes: &[u8], syntax: Syntax) -> Result<Vec<&[u8]>, ScanError> {
    let walker = Walker { bytes, syntax };
    let open = walker.expect_open(b'[')?;
    let mut items = Vec::new();
    walker.walk_array(open, 1, |item| {
        items.push(item);
        true
    })?;
    Ok(items)
}

/// Raw text of the item at `index`, or `None` when out of range or when
/// the bytes before it are malformed.
pub fn nth_array_item(bytes: &[u8], index: usize, syntax: Syntax) -> Option<&[u8]> {
    let walker = Walker { bytes, syntax };
    let open = walker.expect_open(b'[').ok()?;
    let mut seen = 0;
    let mut found = None;
    walker
        .walk_array(open, 1, |item| {
            if seen == index {
                found = Some(item);
                return false;
            }
            seen += 1;
            true
        })
        .ok()?;
    found
}

/// One member of an object. `name` is the raw name text without its quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
}

pub fn object_entries(bytes: &[u8], syntax: Syntax) -> Result<Vec<Entry<'_>>, ScanError> {
    let walker = Walker { bytes, syntax };
    let open = walker.expect_open(b'{')?;
    let mut entries = Vec::new();
    walker.walk_object(open, 1, |name, value| {
        entries.push(Entry { name, value });
        true
    })?;
    Ok(entries)
}

/// Compare a property name against `pattern`, ignoring ASCII case. A
/// trailing `*` in the pattern matches any suffix.
pub fn name_matches(name: &[u8], pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => {
            name.len() >= prefix.len() && name[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        }
        None => name.eq_ignore_ascii_case(pattern.as_bytes()),
    }
}

/// Raw value of the first property of the object in `bytes` whose name
/// matches `name` (see [`name_matches`]).
pub fn find_object_property<'a>(bytes: &'a [u8], name: &str, syntax: Syntax) -> Option<&'a [u8]> {
    let walker = Walker { bytes, syntax };
    let open = walker.expect_open(b'{').ok()?;
    let mut found = None;
    walker
        .walk_object(open, 1, |candidate, value| {
            if name_matches(candidate, name) {
                found = Some(value);
                return false;
            }
            true
        })
        .ok()?;
    found
}

/// Follow a dotted path such as `a.b.2.c`. A segment applied to an array
/// must be a decimal index.
pub fn find_path<'a>(bytes: &'a [u8], path: &str, syntax: Syntax) -> Option<&'a [u8]> {
    let start = skip_whitespace(bytes, 0);
    let mut current = &bytes[start..];
    for segment in path.split('.') {
        current = match current.first() {
            Some(b'[') => nth_array_item(current, segment.parse().ok()?, syntax)?,
            Some(b'{') => find_object_property(current, segment, syntax)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(br#""abc""#, 5)]
    #[case(b"-12.5e3 ", 7)]
    #[case(b"true,", 4)]
    #[case(br#"{"a":[1,{"b":null}]}"#, 20)]
    #[case(b"  [ ]", 5)]
    fn test_skip_value_strict(#[case] input: &[u8], #[case] end: usize) {
        assert_eq!(skip_value(input, 0, Syntax::Strict), Ok(end));
    }

    #[rstest::rstest]
    #[case(b"tru")]
    #[case(b"truex")]
    #[case(b"0123")]
    #[case(b"[1,]")]
    #[case(b"{a:1}")]
    #[case(b"'x'")]
    #[case(br#"{"a" 1}"#)]
    #[case(b"[1 2]")]
    fn test_skip_value_strict_rejects(#[case] input: &[u8]) {
        assert!(skip_value(input, 0, Syntax::Strict).is_err());
    }

    #[rstest::rstest]
    fn test_tolerant_object() {
        let input = b"{name:'John',age:1972,}";
        assert!(validate(input, Syntax::Strict).is_err());
        assert!(validate(input, Syntax::Extended).is_ok());

        let entries = object_entries(input, Syntax::Extended).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, b"name");
        assert_eq!(entries[0].value, b"'John'");
        assert_eq!(entries[1].name, b"age");
        assert_eq!(entries[1].value, b"1972");
    }

    #[rstest::rstest]
    fn test_extended_literals() {
        let input = br#"{age:{$gt:18},born:isodate("1970-01-01"),name:/^jo(h)?n/i}"#;
        assert!(is_valid(input, Syntax::Extended));
        assert!(!is_valid(input, Syntax::Strict));
        assert_eq!(
            find_object_property(input, "born", Syntax::Extended),
            Some(&br#"isodate("1970-01-01")"#[..])
        );
        assert_eq!(
            find_path(input, "age.$gt", Syntax::Extended),
            Some(&b"18"[..])
        );
    }

    #[rstest::rstest]
    fn test_nth_array_item() {
        let input = b"[10,20,30]";
        assert_eq!(nth_array_item(input, 1, Syntax::Strict), Some(&b"20"[..]));
        assert_eq!(nth_array_item(input, 2, Syntax::Strict), Some(&b"30"[..]));
        assert_eq!(nth_array_item(input, 3, Syntax::Strict), None);
        assert_eq!(count_array_items(input, Syntax::Strict), Ok(3));
        assert_eq!(count_array_items(b" [ ] ", Syntax::Strict), Ok(0));
    }

    #[rstest::rstest]
    fn test_find_path() {
        let input = br#"{"a":{"b":1},"list":[{"id":7},{"id":8}]}"#;
        assert_eq!(find_path(input, "a.b", Syntax::Strict), Some(&b"1"[..]));
        assert_eq!(find_path(input, "list.1.id", Syntax::Strict), Some(&b"8"[..]));
        assert_eq!(find_path(input, "a.c", Syntax::Strict), None);
        assert_eq!(find_path(input, "a.b.c", Syntax::Strict), None);
        assert_eq!(find_path(input, "list.x", Syntax::Strict), None);
    }

    #[rstest::rstest]
    fn test_property_lookup_case_and_wildcard() {
        let input = br#"{"FirstName":"Ada","lastName":"Lovelace"}"#;
        assert_eq!(
            find_object_property(input, "firstname", Syntax::Strict),
            Some(&br#""Ada""#[..])
        );
        assert_eq!(
            find_object_property(input, "last*", Syntax::Strict),
            Some(&br#""Lovelace""#[..])
        );
        assert_eq!(find_object_property(input, "middle", Syntax::Strict), None);
    }

    #[rstest::rstest]
    fn test_item_end_reports_marker() {
        let input = br#"["x\"y" , 2]"#;
        assert_eq!(item_end(input, 1, Syntax::Strict), Ok((8, EndMarker::Comma)));
        assert_eq!(item_end(input, 9, Syntax::Strict), Ok((11, EndMarker::CloseArray)));
        assert_eq!(item_end(b"1", 0, Syntax::Strict), Ok((1, EndMarker::Eof)));
    }

    #[rstest::rstest]
    fn test_nul_terminates_input() {
        assert!(validate(b"[1]\0garbage", Syntax::Strict).is_ok());
        assert_eq!(
            skip_value(b"[1,\0", 0, Syntax::Strict),
            Err(ScanError::UnexpectedEnd(3))
        );
    }

    #[rstest::rstest]
    fn test_depth_limit() {
        let deep = "[".repeat(MAX_DEPTH + 1) + &"]".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            skip_value(deep.as_bytes(), 0, Syntax::Strict),
            Err(ScanError::TooDeep { .. })
        ));
        let ok = "[".repeat(MAX_DEPTH) + &"]".repeat(MAX_DEPTH);
        assert!(is_valid(ok.as_bytes(), Syntax::Strict));
    }

    #[rstest::rstest]
    fn test_estimate_array_items() {
        let input = b"[1,2,3,4]";
        assert_eq!(estimate_array_items(input, 1, 64), 4);
        assert_eq!(estimate_array_items(input, 1, 4), 2);
        assert_eq!(estimate_array_items(b"[]", 1, 64), 0);
    }
}
