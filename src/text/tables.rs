//! Byte classification tables used by the scanner and the writer.
//!
//! Both tables are evaluated at compile time and occupy 256 entries each, so
//! every lookup in the hot loops is a single indexed load.

/// Escape action for one byte of string content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Copied as is.
    None,
    /// Byte 0: end of input, never written.
    Terminator,
    /// Written as `\u00xx` with lowercase hex digits.
    Unicode,
    /// Written as a backslash followed by the stored letter.
    Named(u8),
}

pub static ESCAPE: [Escape; 256] = build_escape_table();

const fn build_escape_table() -> [Escape; 256] {
    let mut table = [Escape::None; 256];
    table[0] = Escape::Terminator;
    let mut byte = 1;
    while byte < 0x20 {
        table[byte] = Escape::Unicode;
        byte += 1;
    }
    table[0x08] = Escape::Named(b'b');
    table[0x09] = Escape::Named(b't');
    table[0x0A] = Escape::Named(b'n');
    table[0x0C] = Escape::Named(b'f');
    table[0x0D] = Escape::Named(b'r');
    table[b'\\' as usize] = Escape::Named(b'\\');
    table[b'"' as usize] = Escape::Named(b'"');
    table
}

/// Set of token categories a byte may open or continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharClass(u16);

impl CharClass {
    pub const NONE: Self = Self(0);
    pub const WHITESPACE: Self = Self(1 << 0);
    pub const QUOTE: Self = Self(1 << 1);
    pub const SINGLE_QUOTE: Self = Self(1 << 2);
    pub const NUMBER_START: Self = Self(1 << 3);
    pub const DIGIT: Self = Self(1 << 4);
    pub const CONSTANT_START: Self = Self(1 << 5);
    pub const IDENT_START: Self = Self(1 << 6);
    pub const IDENT_CONTINUE: Self = Self(1 << 7);
    pub const OPEN: Self = Self(1 << 8);
    pub const CLOSE: Self = Self(1 << 9);
    pub const COMMA: Self = Self(1 << 10);
    pub const COLON: Self = Self(1 << 11);
    pub const SLASH: Self = Self(1 << 12);
    pub const END: Self = Self(1 << 13);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

pub static CHAR_CLASS: [CharClass; 256] = build_class_table();

const fn build_class_table() -> [CharClass; 256] {
    let mut table = [CharClass::NONE; 256];
    table[0] = CharClass::END;
    table[b' ' as usize] = CharClass::WHITESPACE;
    table[b'\t' as usize] = CharClass::WHITESPACE;
    table[b'\n' as usize] = CharClass::WHITESPACE;
    table[b'\r' as usize] = CharClass::WHITESPACE;
    table[b'"' as usize] = CharClass::QUOTE;
    table[b'\'' as usize] = CharClass::SINGLE_QUOTE;
    table[b'{' as usize] = CharClass::OPEN;
    table[b'[' as usize] = CharClass::OPEN;
    table[b'}' as usize] = CharClass::CLOSE;
    table[b']' as usize] = CharClass::CLOSE;
    table[b',' as usize] = CharClass::COMMA;
    table[b':' as usize] = CharClass::COLON;
    table[b'/' as usize] = CharClass::SLASH;
    table[b'-' as usize] = CharClass::NUMBER_START;

    let ident = CharClass::IDENT_START.union(CharClass::IDENT_CONTINUE);
    let mut byte = b'0';
    while byte <= b'9' {
        table[byte as usize] = CharClass::NUMBER_START
            .union(CharClass::DIGIT)
            .union(CharClass::IDENT_CONTINUE);
        byte += 1;
    }
    byte = b'a';
    while byte <= b'z' {
        table[byte as usize] = ident;
        table[(byte - 32) as usize] = ident;
        byte += 1;
    }
    table[b'_' as usize] = ident;
    table[b'$' as usize] = ident;
    table[b't' as usize] = ident.union(CharClass::CONSTANT_START);
    table[b'f' as usize] = ident.union(CharClass::CONSTANT_START);
    table[b'n' as usize] = ident.union(CharClass::CONSTANT_START);
    // UTF-8 lead and continuation bytes may appear in unquoted names.
    byte = 0x80;
    loop {
        table[byte as usize] = ident;
        if byte == 0xFF {
            break;
        }
        byte += 1;
    }
    table
}

#[inline]
pub fn class_of(byte: u8) -> CharClass {
    CHAR_CLASS[byte as usize]
}

#[inline]
pub fn is_whitespace(byte: u8) -> bool {
    class_of(byte).contains(CharClass::WHITESPACE)
}

#[inline]
pub fn is_ident_continue(byte: u8) -> bool {
    class_of(byte).contains(CharClass::IDENT_CONTINUE)
}
