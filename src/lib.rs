//! In-place JSON scanning and registry-driven serialization.
//!
//! Loads decode strings directly inside the caller's mutable buffer and
//! dispatch on runtime type descriptors from [`registry`]. Saves walk the
//! same descriptors into a [`encode::Writer`]. A tolerant dialect accepts
//! unquoted or single-quoted names, trailing commas and comments on input.

pub mod arena;
pub mod constants;
pub mod decode;
pub mod dict;
pub mod encode;
pub mod error;
pub mod num;
pub mod options;
pub mod registry;
pub mod text;
pub mod types;

use std::io::{Read, Write};

pub use crate::decode::{EndMarker, ParseContext, Partial, Syntax};
pub use crate::dict::{Clock, DictionaryGuard, ManualClock, SystemClock, TtlDictionary};
pub use crate::encode::{SaveContext, Writer};
pub use crate::error::{Error, ErrorKind, ErrorStage, Location, ScanError};
pub use crate::options::{Indent, ParseOptions, SaveOptions, SetFormat};
pub use crate::registry::{FieldInfo, Kind, Reflect, TypeInfo};
pub use crate::types::{Blob, Guid, Hash128, Hash256, UnixTime};

pub type Result<T> = std::result::Result<T, Error>;

pub fn to_string<T: Reflect>(value: &T) -> Result<String> {
    to_string_with_options(value, &SaveOptions::default())
}

pub fn to_string_with_options<T: Reflect>(value: &T, options: &SaveOptions) -> Result<String> {
    encode::to_string(value, options)
}

pub fn to_vec<T: Reflect>(value: &T) -> Result<Vec<u8>> {
    to_vec_with_options(value, &SaveOptions::default())
}

pub fn to_vec_with_options<T: Reflect>(value: &T, options: &SaveOptions) -> Result<Vec<u8>> {
    encode::to_vec(value, options)
}

pub fn to_writer<T: Reflect, W: Write>(writer: W, value: &T) -> Result<()> {
    to_writer_with_options(writer, value, &SaveOptions::default())
}

pub fn to_writer_with_options<T: Reflect, W: Write>(
    writer: W,
    value: &T,
    options: &SaveOptions,
) -> Result<()> {
    encode::to_writer(writer, value, options)
}

/// Load from `input`, decoding strings in place.
pub fn from_slice<T: Reflect + Default>(input: &mut [u8]) -> Result<T> {
    from_slice_with_options(input, &ParseOptions::default())
}

pub fn from_slice_with_options<T: Reflect + Default>(
    input: &mut [u8],
    options: &ParseOptions,
) -> Result<T> {
    decode::from_slice(input, options)
}

pub fn from_str<T: Reflect + Default>(input: &str) -> Result<T> {
    from_str_with_options(input, &ParseOptions::default())
}

pub fn from_str_with_options<T: Reflect + Default>(
    input: &str,
    options: &ParseOptions,
) -> Result<T> {
    decode::from_str(input, options)
}

pub fn from_reader<T: Reflect + Default, R: Read>(reader: R) -> Result<T> {
    from_reader_with_options(reader, &ParseOptions::default())
}

pub fn from_reader_with_options<T: Reflect + Default, R: Read>(
    reader: R,
    options: &ParseOptions,
) -> Result<T> {
    decode::from_reader(reader, options)
}

pub fn load_into<T: Reflect + Clone>(
    value: &mut T,
    input: &mut [u8],
    options: &ParseOptions,
) -> Result<()> {
    decode::load_into(value, input, options)
}

pub fn validate(input: &[u8], options: &ParseOptions) -> Result<()> {
    decode::validate(input, options)
}

pub fn is_valid(input: &[u8], options: &ParseOptions) -> bool {
    validate(input, options).is_ok()
}
