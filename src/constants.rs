pub const DEFAULT_INDENT: usize = 2;

pub const MAX_DEPTH: usize = 256;

/// Upper bound, in bytes, of the look-ahead used to estimate how many items
/// a JSON array holds before loading it.
pub const ARRAY_ESTIMATE_WINDOW: usize = 64 * 1024;

/// Text written in place of fields flagged as sensitive.
pub const MASKED_VALUE: &str = "***";

/// Set element name meaning "every bit".
pub const ALL_SET_ITEMS: &str = "*";
