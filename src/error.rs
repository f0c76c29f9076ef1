use memchr::memchr_iter;
use thiserror::Error as ThisError;

/// Broad failure category, following the order in which a parse can break:
/// bytes, structure, destination type, then domain values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Structural,
    Type,
    Domain,
    Contract,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Encode,
    Decode,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Resolve a byte offset into 1-based line and column numbers.
    pub fn resolve(input: &[u8], offset: usize) -> Self {
        let offset = offset.min(input.len());
        let head = &input[..offset];
        let mut line = 1;
        let mut line_start = 0;
        for idx in memchr_iter(b'\n', head) {
            line += 1;
            line_start = idx + 1;
        }
        Self {
            offset,
            line,
            column: offset - line_start + 1,
        }
    }
}

/// Failure reported by the scanning primitives. Every variant carries the
/// byte offset where scanning stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ScanError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    #[error("embedded NUL byte in string at offset {0}")]
    EmbeddedNul(usize),
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),
    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),
    #[error("invalid literal at offset {0}")]
    InvalidLiteral(usize),
    #[error("invalid UTF-8 text at offset {0}")]
    InvalidUtf8(usize),
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("maximum nesting depth of {max} exceeded at offset {offset}")]
    TooDeep { max: usize, offset: usize },
}

impl ScanError {
    pub fn offset(&self) -> usize {
        match *self {
            ScanError::UnexpectedEnd(offset)
            | ScanError::UnterminatedString(offset)
            | ScanError::EmbeddedNul(offset)
            | ScanError::InvalidEscape(offset)
            | ScanError::InvalidNumber(offset)
            | ScanError::InvalidLiteral(offset)
            | ScanError::InvalidUtf8(offset) => offset,
            ScanError::UnexpectedChar { offset, .. } | ScanError::TooDeep { offset, .. } => offset,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::UnterminatedString(_)
            | ScanError::EmbeddedNul(_)
            | ScanError::InvalidEscape(_)
            | ScanError::InvalidNumber(_)
            | ScanError::InvalidLiteral(_)
            | ScanError::InvalidUtf8(_) => ErrorKind::Lexical,
            ScanError::UnexpectedEnd(_)
            | ScanError::UnexpectedChar { .. }
            | ScanError::TooDeep { .. } => ErrorKind::Structural,
        }
    }

    pub(crate) fn unexpected(bytes: &[u8], offset: usize) -> Self {
        match bytes.get(offset) {
            None | Some(0) => ScanError::UnexpectedEnd(offset),
            Some(&byte) => ScanError::UnexpectedChar {
                ch: byte as char,
                offset,
            },
        }
    }
}

#[derive(Debug, Clone, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub stage: ErrorStage,
    pub message: String,
    pub offset: Option<usize>,
}

impl Error {
    fn new(kind: ErrorKind, stage: ErrorStage, message: String) -> Self {
        Self {
            kind,
            stage,
            message,
            offset: None,
        }
    }

    pub fn lexical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lexical, ErrorStage::Decode, message.into())
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural, ErrorStage::Decode, message.into())
    }

    pub fn type_mismatch(expected: &str, found: &str) -> Self {
        Self::new(
            ErrorKind::Type,
            ErrorStage::Decode,
            format!("expected {expected}, found {found}"),
        )
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Domain, ErrorStage::Decode, message.into())
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Contract, ErrorStage::Unknown, message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, ErrorStage::Unknown, message.into())
    }

    pub fn with_stage(mut self, stage: ErrorStage) -> Self {
        self.stage = stage;
        self
    }

    /// Record where the failure happened, keeping the innermost offset when
    /// one is already set.
    pub fn at(mut self, offset: usize) -> Self {
        if self.offset.is_none() {
            self.offset = Some(offset);
        }
        self
    }

    pub fn location_in(&self, input: &[u8]) -> Option<Location> {
        self.offset.map(|offset| Location::resolve(input, offset))
    }
}

impl From<ScanError> for Error {
    fn from(err: ScanError) -> Self {
        Self {
            kind: err.kind(),
            stage: ErrorStage::Decode,
            message: err.to_string(),
            offset: Some(err.offset()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_location_resolve() {
        let input = b"{\n  \"a\": 1,\n  \"b\": x\n}";
        let offset = input.iter().position(|&b| b == b'x').unwrap();
        let location = Location::resolve(input, offset);
        assert_eq!(location.line, 3);
        assert_eq!(location.column, 8);
    }

    #[rstest::rstest]
    fn test_scan_error_conversion_keeps_offset() {
        let err: Error = ScanError::InvalidNumber(7).into();
        assert_eq!(err.kind, ErrorKind::Lexical);
        assert_eq!(err.offset, Some(7));
        assert!(err.to_string().contains("offset 7"));
    }

    #[rstest::rstest]
    fn test_at_keeps_innermost_offset() {
        let err = Error::domain("unknown property").at(3).at(10);
        assert_eq!(err.offset, Some(3));
    }

    #[rstest::rstest]
    fn test_unexpected_at_end() {
        assert_eq!(ScanError::unexpected(b"ab", 2), ScanError::UnexpectedEnd(2));
        assert_eq!(
            ScanError::unexpected(b"ab", 1),
            ScanError::UnexpectedChar { ch: 'b', offset: 1 }
        );
    }
}
