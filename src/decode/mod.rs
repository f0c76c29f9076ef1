pub mod comments;
mod load;
pub mod nav;
pub mod scanner;
pub mod split;

use std::io::Read;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub use load::ParseContext;
pub use nav::{EndMarker, Syntax};

use crate::decode::comments::strip_comments;
use crate::error::{Error, ErrorStage};
use crate::options::ParseOptions;
use crate::registry::Reflect;
use crate::Result;

/// Value loaded from the front of a buffer that may hold more.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial<T> {
    pub value: T,
    /// Delimiter found right after the value.
    pub end: EndMarker,
    /// Offset just past that delimiter.
    pub position: usize,
}

/// Load a fresh `T` from `buf`, which must hold exactly one value. Strings
/// are unescaped in place, so `buf` is left modified.
pub fn from_slice<T: Reflect + Default>(buf: &mut [u8], options: &ParseOptions) -> Result<T> {
    let mut value = T::default();
    let mut ctx = ParseContext::new(buf, *options);
    ctx.load(&mut value)?;
    ctx.finish()?;
    Ok(value)
}

/// Load the first value of `buf` and report the delimiter following it.
pub fn from_slice_partial<T: Reflect + Default>(
    buf: &mut [u8],
    options: &ParseOptions,
) -> Result<Partial<T>> {
    let mut value = T::default();
    let mut ctx = ParseContext::new(buf, *options);
    ctx.load(&mut value)?;
    let end = ctx.end_of_item()?;
    Ok(Partial {
        value,
        end,
        position: ctx.position(),
    })
}

pub fn from_str<T: Reflect + Default>(input: &str, options: &ParseOptions) -> Result<T> {
    let mut buf = input.as_bytes().to_vec();
    from_slice(&mut buf, options)
}

pub fn from_reader<T: Reflect + Default, R: Read>(
    mut reader: R,
    options: &ParseOptions,
) -> Result<T> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|err| Error::io(format!("read failed: {err}")).with_stage(ErrorStage::Decode))?;
    from_slice(&mut buf, options)
}

/// Load `buf` over an existing value. Fields absent from the input keep
/// their current content; on failure `value` is left untouched.
pub fn load_into<T: Reflect + Clone>(
    value: &mut T,
    buf: &mut [u8],
    options: &ParseOptions,
) -> Result<()> {
    let mut staged = value.clone();
    let mut ctx = ParseContext::new(buf, *options);
    ctx.load(&mut staged)?;
    ctx.finish()?;
    *value = staged;
    Ok(())
}

/// Check that `input` holds exactly one well-formed value, without
/// decoding it.
pub fn validate(input: &[u8], options: &ParseOptions) -> Result<()> {
    if options.extended_syntax {
        let mut buf = input.to_vec();
        strip_comments(&mut buf);
        nav::validate(&buf, Syntax::Extended)?;
    } else {
        nav::validate(input, Syntax::Strict)?;
    }
    Ok(())
}

/// Load independent buffers concurrently, one result per buffer.
#[cfg(feature = "parallel")]
pub fn from_slices_par<T: Reflect + Default>(
    bufs: &mut [Vec<u8>],
    options: &ParseOptions,
) -> Vec<Result<T>> {
    bufs.par_iter_mut()
        .map(|buf| from_slice(buf, options))
        .collect()
}
