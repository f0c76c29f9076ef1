use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_INDENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indent {
    Spaces(usize),
}

impl Indent {
    pub fn spaces(count: usize) -> Self {
        Indent::Spaces(count)
    }

    pub fn get_spaces(&self) -> usize {
        match self {
            Indent::Spaces(count) => *count,
        }
    }
}

impl Default for Indent {
    fn default() -> Self {
        Indent::Spaces(DEFAULT_INDENT)
    }
}

/// How bit-set values are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SetFormat {
    /// A plain integer bit mask.
    #[default]
    Bits,
    /// An array of element names, `["*"]` when every bit is set.
    Names,
    /// An object mapping every element name to a boolean.
    Flags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    pub human_readable: bool,
    pub indent: Indent,
    pub enums_as_text: bool,
    pub trim_enum_prefix: bool,
    pub set_format: SetFormat,
    pub skip_default_values: bool,
    pub skip_void_values: bool,
    pub skip_transient: bool,
    pub mask_sensitive: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            human_readable: false,
            indent: Indent::default(),
            enums_as_text: false,
            trim_enum_prefix: false,
            set_format: SetFormat::Bits,
            skip_default_values: false,
            skip_void_values: false,
            skip_transient: true,
            mask_sensitive: false,
        }
    }
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output with enums and sets written by name.
    pub fn human() -> Self {
        Self::default()
            .with_human_readable(true)
            .with_enums_as_text(true)
            .with_set_format(SetFormat::Names)
    }

    pub fn with_human_readable(mut self, human_readable: bool) -> Self {
        self.human_readable = human_readable;
        self
    }

    pub fn with_indent(mut self, indent: Indent) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_enums_as_text(mut self, enums_as_text: bool) -> Self {
        self.enums_as_text = enums_as_text;
        self
    }

    pub fn with_trim_enum_prefix(mut self, trim_enum_prefix: bool) -> Self {
        self.trim_enum_prefix = trim_enum_prefix;
        self
    }

    pub fn with_set_format(mut self, set_format: SetFormat) -> Self {
        self.set_format = set_format;
        self
    }

    pub fn with_skip_default_values(mut self, skip: bool) -> Self {
        self.skip_default_values = skip;
        self
    }

    pub fn with_skip_void_values(mut self, skip: bool) -> Self {
        self.skip_void_values = skip;
        self
    }

    pub fn with_skip_transient(mut self, skip: bool) -> Self {
        self.skip_transient = skip;
        self
    }

    pub fn with_mask_sensitive(mut self, mask: bool) -> Self {
        self.mask_sensitive = mask;
        self
    }
}

/// Flags steering the load dispatcher. `strict()` (the default) enables
/// none of them, `tolerant()` enables every `ignore_*` flag, hexadecimal
/// 64-bit integers and the extended syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub ignore_unknown_property: bool,
    pub ignore_string_type_mismatch: bool,
    pub ignore_unknown_enum: bool,
    /// Accept 64-bit integers as hex strings, `"0x..."` or exactly sixteen
    /// digits. A string that is a valid decimal integer is read as decimal.
    pub allow_int64_hex: bool,
    /// Keep every float loaded into a variant as a number. Without it, a
    /// float whose shortest text differs from the input stays a string.
    pub allow_double_in_variant: bool,
    pub clear_before_load: bool,
    pub null_keeps_instance: bool,
    /// A JSON object loaded into an optional instance always builds a fresh
    /// instance instead of populating the existing one.
    pub setter_owns_instance: bool,
    /// Unquoted or single-quoted names and strings, trailing commas and
    /// comments.
    pub extended_syntax: bool,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self::default()
    }

    pub fn tolerant() -> Self {
        Self {
            ignore_unknown_property: true,
            ignore_string_type_mismatch: true,
            ignore_unknown_enum: true,
            allow_int64_hex: true,
            extended_syntax: true,
            ..Self::default()
        }
    }

    pub fn with_ignore_unknown_property(mut self, value: bool) -> Self {
        self.ignore_unknown_property = value;
        self
    }

    pub fn with_ignore_string_type_mismatch(mut self, value: bool) -> Self {
        self.ignore_string_type_mismatch = value;
        self
    }

    pub fn with_ignore_unknown_enum(mut self, value: bool) -> Self {
        self.ignore_unknown_enum = value;
        self
    }

    pub fn with_allow_int64_hex(mut self, value: bool) -> Self {
        self.allow_int64_hex = value;
        self
    }

    pub fn with_allow_double_in_variant(mut self, value: bool) -> Self {
        self.allow_double_in_variant = value;
        self
    }

    pub fn with_clear_before_load(mut self, value: bool) -> Self {
        self.clear_before_load = value;
        self
    }

    pub fn with_null_keeps_instance(mut self, value: bool) -> Self {
        self.null_keeps_instance = value;
        self
    }

    pub fn with_setter_owns_instance(mut self, value: bool) -> Self {
        self.setter_owns_instance = value;
        self
    }

    pub fn with_extended_syntax(mut self, value: bool) -> Self {
        self.extended_syntax = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_bundles() {
        let strict = ParseOptions::strict();
        assert_eq!(strict, ParseOptions::default());
        assert!(!strict.extended_syntax);

        let tolerant = ParseOptions::tolerant();
        assert!(tolerant.ignore_unknown_property);
        assert!(tolerant.ignore_string_type_mismatch);
        assert!(tolerant.ignore_unknown_enum);
        assert!(tolerant.allow_int64_hex);
        assert!(tolerant.extended_syntax);
        assert!(!tolerant.clear_before_load);
        assert!(!tolerant.allow_double_in_variant);
    }

    #[rstest::rstest]
    fn test_options_from_config() {
        let options: ParseOptions =
            serde_json::from_str(r#"{"ignore_unknown_property":true}"#).unwrap();
        assert!(options.ignore_unknown_property);
        assert!(!options.extended_syntax);

        let save: SaveOptions =
            serde_json::from_str(r#"{"set_format":"Flags","indent":{"Spaces":4}}"#).unwrap();
        assert_eq!(save.set_format, SetFormat::Flags);
        assert_eq!(save.indent.get_spaces(), 4);
        assert!(save.skip_transient);
    }
}
