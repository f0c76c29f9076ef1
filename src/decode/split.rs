use crate::arena::Span;
use crate::decode::nav::{name_matches, EndMarker, Syntax};
use crate::decode::scanner::{Scanner, Token};
use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Bool,
    Null,
    Object,
    Array,
}

/// A member value located by [`split_object`]. Strings are decoded,
/// everything else is the raw JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawValue<'a> {
    pub kind: ValueKind,
    pub text: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitOptions {
    pub syntax: Syntax,
    /// Report booleans as `1` and `0`.
    pub normalize_bool: bool,
}

enum Located {
    Span(ValueKind, Span),
    Literal(ValueKind, &'static [u8]),
}

/// Decode the flat object in `buf` and pick out the members named in
/// `names`, in the order of `names`. Names are matched ignoring ASCII case
/// and may end with `*`. Members not asked for are skipped; nested objects
/// and arrays are returned as raw JSON.
pub fn split_object<'a>(
    buf: &'a mut [u8],
    names: &[&str],
    options: SplitOptions,
) -> Result<Vec<Option<RawValue<'a>>>, ScanError> {
    let mut located: Vec<Option<Located>> = names.iter().map(|_| None).collect();
    {
        let mut scanner = Scanner::new(&mut *buf, options.syntax);
        if scanner.next_token()? != Token::ObjectStart {
            return Err(ScanError::unexpected(scanner.bytes(), 0));
        }
        if !scanner.consume(b'}') {
            loop {
                let name = scanner.decode_name()?;
                let slot = names
                    .iter()
                    .position(|pattern| name_matches(scanner.text(name), pattern));
                scanner.expect(b':')?;
                match slot {
                    Some(idx) => located[idx] = Some(locate_value(&mut scanner, options)?),
                    None => {
                        scanner.skip_value()?;
                    }
                }
                match scanner.end_of_item()? {
                    EndMarker::Comma => {
                        if options.syntax.is_extended() && scanner.consume(b'}') {
                            break;
                        }
                    }
                    EndMarker::CloseObject => break,
                    _ => {
                        let at = scanner.position().saturating_sub(1);
                        return Err(ScanError::unexpected(scanner.bytes(), at));
                    }
                }
            }
        }
    }
    let buf: &'a [u8] = buf;
    Ok(located
        .into_iter()
        .map(|slot| {
            slot.map(|found| match found {
                Located::Span(kind, span) => RawValue {
                    kind,
                    text: &buf[span.start..span.end],
                },
                Located::Literal(kind, text) => RawValue { kind, text },
            })
        })
        .collect())
}

fn locate_value(scanner: &mut Scanner<'_>, options: SplitOptions) -> Result<Located, ScanError> {
    match scanner.peek() {
        Some(b'{') => return Ok(Located::Span(ValueKind::Object, scanner.skip_value()?)),
        Some(b'[') => return Ok(Located::Span(ValueKind::Array, scanner.skip_value()?)),
        _ => {}
    }
    let start = scanner.position();
    let located = match scanner.next_token()? {
        Token::String(span) => Located::Span(ValueKind::String, span),
        Token::Number(span) => Located::Span(ValueKind::Number, span),
        Token::Bool(value) if options.normalize_bool => {
            Located::Literal(ValueKind::Bool, if value { b"1" } else { b"0" })
        }
        Token::Bool(_) => Located::Span(ValueKind::Bool, Span::new(start, scanner.position())),
        Token::Null => Located::Span(ValueKind::Null, Span::new(start, scanner.position())),
        Token::ObjectStart | Token::ArrayStart => {
            return Err(ScanError::unexpected(scanner.bytes(), start))
        }
    };
    Ok(located)
}
