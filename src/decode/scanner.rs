use crate::arena::Span;
use crate::constants::ARRAY_ESTIMATE_WINDOW;
use crate::decode::nav::{self, EndMarker, Literal, Syntax};
use crate::error::ScanError;
use crate::num::number::scan_number;
use crate::text::string::decode_quoted;
use crate::text::tables::{class_of, CharClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Decoded string content. In extended syntax also the raw text of a
    /// bare word, constructor call or regex literal.
    String(Span),
    /// Raw ASCII text of a number that passed the grammar.
    Number(Span),
    Bool(bool),
    Null,
    ObjectStart,
    ArrayStart,
}

impl Token {
    pub fn describe(&self) -> &'static str {
        match self {
            Token::String(_) => "string",
            Token::Number(_) => "number",
            Token::Bool(_) => "boolean",
            Token::Null => "null",
            Token::ObjectStart => "object",
            Token::ArrayStart => "array",
        }
    }
}

/// Cursor over a mutable JSON buffer. Strings are unescaped in place, so
/// the buffer must not be shared while scanning.
pub struct Scanner<'a> {
    buf: &'a mut [u8],
    pos: usize,
    syntax: Syntax,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a mut [u8], syntax: Syntax) -> Self {
        Self {
            buf,
            pos: 0,
            syntax,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf[..]
    }

    pub fn skip_whitespace(&mut self) {
        self.pos = nav::skip_whitespace(self.buf, self.pos);
    }

    /// Next significant byte, or `None` at the end of input.
    pub fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        match self.buf.get(self.pos) {
            None | Some(0) => None,
            Some(&byte) => Some(byte),
        }
    }

    pub fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    pub fn consume(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, byte: u8) -> Result<(), ScanError> {
        if self.consume(byte) {
            Ok(())
        } else {
            Err(ScanError::unexpected(self.buf, self.pos))
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ScanError> {
        self.skip_whitespace();
        let start = self.pos;
        let byte = match self.buf.get(start) {
            None | Some(0) => return Err(ScanError::UnexpectedEnd(start)),
            Some(&byte) => byte,
        };
        let class = class_of(byte);
        let extended = self.syntax.is_extended();
        if class.contains(CharClass::QUOTE)
            || (extended && class.contains(CharClass::SINGLE_QUOTE))
        {
            let (span, next) = decode_quoted(self.buf, start)?;
            self.pos = next;
            return Ok(Token::String(span));
        }
        match byte {
            b'{' => {
                self.pos += 1;
                return Ok(Token::ObjectStart);
            }
            b'[' => {
                self.pos += 1;
                return Ok(Token::ArrayStart);
            }
            _ => {}
        }
        if class.contains(CharClass::NUMBER_START) {
            let end = scan_number(self.buf, start)?;
            if !nav::is_value_end(self.buf, end) {
                return Err(ScanError::InvalidNumber(start));
            }
            self.pos = end;
            return Ok(Token::Number(Span::new(start, end)));
        }
        if let Some((literal, end)) = nav::match_literal(self.buf, start) {
            self.pos = end;
            return Ok(match literal {
                Literal::True => Token::Bool(true),
                Literal::False => Token::Bool(false),
                Literal::Null => Token::Null,
            });
        }
        if extended && class.intersects(CharClass::IDENT_START.union(CharClass::SLASH)) {
            let end = nav::skip_value(self.buf, start, Syntax::Extended)?;
            self.pos = end;
            return Ok(Token::String(Span::new(start, end)));
        }
        if class.contains(CharClass::CONSTANT_START) {
            return Err(ScanError::InvalidLiteral(start));
        }
        Err(ScanError::unexpected(self.buf, start))
    }

    /// Decode an object member name, leaving the cursor before the colon.
    pub fn decode_name(&mut self) -> Result<Span, ScanError> {
        self.skip_whitespace();
        let start = self.pos;
        let class = class_of(self.buf.get(start).copied().unwrap_or(0));
        let extended = self.syntax.is_extended();
        if class.contains(CharClass::QUOTE)
            || (extended && class.contains(CharClass::SINGLE_QUOTE))
        {
            let (span, next) = decode_quoted(self.buf, start)?;
            self.pos = next;
            return Ok(span);
        }
        if extended && class.contains(CharClass::IDENT_START) {
            let end = nav::identifier_end(self.buf, start);
            self.pos = end;
            return Ok(Span::new(start, end));
        }
        Err(ScanError::unexpected(self.buf, start))
    }

    /// Consume the delimiter after a value. The end of input is reported
    /// but not consumed.
    pub fn end_of_item(&mut self) -> Result<EndMarker, ScanError> {
        self.skip_whitespace();
        let marker = EndMarker::from_byte(self.buf.get(self.pos).copied())
            .ok_or_else(|| ScanError::unexpected(self.buf, self.pos))?;
        if marker != EndMarker::Eof {
            self.pos += 1;
        }
        Ok(marker)
    }

    /// Skip the next value without decoding it and return its raw span.
    pub fn skip_value(&mut self) -> Result<Span, ScanError> {
        self.skip_whitespace();
        let start = self.pos;
        let end = nav::skip_value(self.buf, start, self.syntax)?;
        self.pos = end;
        Ok(Span::new(start, end))
    }

    /// Consume a `null` literal if one comes next.
    pub fn try_null(&mut self) -> bool {
        self.skip_whitespace();
        match nav::match_literal(self.buf, self.pos) {
            Some((Literal::Null, end)) => {
                self.pos = end;
                true
            }
            _ => false,
        }
    }

    /// Estimated item count of the array whose `[` was just consumed.
    pub fn estimate_items(&self) -> usize {
        nav::estimate_array_items(&self.buf[..], self.pos, ARRAY_ESTIMATE_WINDOW)
    }

    pub fn text(&self, span: Span) -> &[u8] {
        &self.buf[span.start..span.end]
    }

    pub fn str(&self, span: Span) -> Result<&str, ScanError> {
        std::str::from_utf8(self.text(span))
            .map_err(|err| ScanError::InvalidUtf8(span.start + err.valid_up_to()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_token_stream() {
        let mut buf = br#"{"a":[1,true,null],"b":"x\ny"}"#.to_vec();
        let mut scanner = Scanner::new(&mut buf, Syntax::Strict);

        assert_eq!(scanner.next_token().unwrap(), Token::ObjectStart);
        let name = scanner.decode_name().unwrap();
        assert_eq!(scanner.text(name), b"a");
        scanner.expect(b':').unwrap();
        assert_eq!(scanner.next_token().unwrap(), Token::ArrayStart);
        assert_eq!(scanner.estimate_items(), 3);
        let Token::Number(number) = scanner.next_token().unwrap() else {
            panic!("expected number");
        };
        assert_eq!(scanner.text(number), b"1");
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::Comma);
        assert_eq!(scanner.next_token().unwrap(), Token::Bool(true));
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::Comma);
        assert!(scanner.try_null());
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::CloseArray);
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::Comma);
        let name = scanner.decode_name().unwrap();
        assert_eq!(scanner.str(name).unwrap(), "b");
        scanner.expect(b':').unwrap();
        let Token::String(text) = scanner.next_token().unwrap() else {
            panic!("expected string");
        };
        assert_eq!(scanner.str(text).unwrap(), "x\ny");
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::CloseObject);
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::Eof);
        assert!(scanner.at_end());
    }

    #[rstest::rstest]
    #[case(b"truex")]
    #[case(b"nul")]
    #[case(b"12a")]
    #[case(b"'single'")]
    #[case(b"word")]
    fn test_strict_token_failures(#[case] input: &[u8]) {
        let mut buf = input.to_vec();
        assert!(Scanner::new(&mut buf, Syntax::Strict).next_token().is_err());
    }

    #[rstest::rstest]
    fn test_extended_tokens() {
        let mut buf = b"{name:'Jo\\'hn', re:/a+/g, at:date(1)}".to_vec();
        let mut scanner = Scanner::new(&mut buf, Syntax::Extended);

        assert_eq!(scanner.next_token().unwrap(), Token::ObjectStart);
        let name = scanner.decode_name().unwrap();
        assert_eq!(scanner.text(name), b"name");
        scanner.expect(b':').unwrap();
        let Token::String(text) = scanner.next_token().unwrap() else {
            panic!("expected string");
        };
        assert_eq!(scanner.text(text), b"Jo'hn");
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::Comma);

        scanner.decode_name().unwrap();
        scanner.expect(b':').unwrap();
        let Token::String(text) = scanner.next_token().unwrap() else {
            panic!("expected regex text");
        };
        assert_eq!(scanner.text(text), b"/a+/g");
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::Comma);

        scanner.decode_name().unwrap();
        scanner.expect(b':').unwrap();
        let raw = scanner.skip_value().unwrap();
        assert_eq!(scanner.text(raw), b"date(1)");
        assert_eq!(scanner.end_of_item().unwrap(), EndMarker::CloseObject);
    }

    #[rstest::rstest]
    fn test_invalid_utf8_reported() {
        let mut buf = b"\"a\xffb\"".to_vec();
        let mut scanner = Scanner::new(&mut buf, Syntax::Strict);
        let Token::String(text) = scanner.next_token().unwrap() else {
            panic!("expected string");
        };
        assert_eq!(scanner.str(text), Err(ScanError::InvalidUtf8(2)));
    }
}
