use serde_json::{Number, Value};
use smallvec::SmallVec;

use crate::error::Error;
use crate::num::number::{write_f32, write_f64, write_json_number};
use crate::options::SaveOptions;
use crate::text::string::escape_into;
use crate::Result;

/// Growable JSON output sink.
///
/// Commas and, in human-readable mode, line breaks and indentation are
/// emitted by [`Writer::next_item`] and the block closers, so callers only
/// say where items start.
pub struct Writer {
    buffer: Vec<u8>,
    human_readable: bool,
    indent_unit: String,
    indent_cache: Vec<String>,
    /// Items written so far in every open object or array.
    blocks: SmallVec<[usize; 16]>,
}

impl Writer {
    pub fn new(options: &SaveOptions) -> Self {
        Self::with_capacity(options, 0)
    }

    pub fn with_capacity(options: &SaveOptions, capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            human_readable: options.human_readable,
            indent_unit: " ".repeat(options.indent.get_spaces()),
            indent_cache: vec![String::new()],
            blocks: SmallVec::new(),
        }
    }

    pub fn is_human_readable(&self) -> bool {
        self.human_readable
    }

    /// Nesting depth of the open blocks.
    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn finish(self) -> Result<String> {
        String::from_utf8(self.buffer).map_err(|err| {
            Error::contract(format!(
                "output is not valid UTF-8 at offset {}",
                err.utf8_error().valid_up_to()
            ))
        })
    }

    pub fn finish_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, s: &str) {
        self.buffer.extend_from_slice(s.as_bytes());
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    /// Append `bytes` with JSON escapes applied, without quotes.
    pub fn write_escaped(&mut self, bytes: &[u8]) {
        escape_into(&mut self.buffer, bytes);
    }

    pub fn write_quoted(&mut self, s: &str) {
        self.write_quoted_bytes(s.as_bytes());
    }

    pub fn write_quoted_bytes(&mut self, bytes: &[u8]) {
        self.buffer.push(b'"');
        escape_into(&mut self.buffer, bytes);
        self.buffer.push(b'"');
    }

    pub fn write_null(&mut self) {
        self.buffer.extend_from_slice(b"null");
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer
            .extend_from_slice(if value { b"true" } else { b"false" });
    }

    pub fn write_i64(&mut self, value: i64) {
        let mut buf = itoa::Buffer::new();
        self.buffer.extend_from_slice(buf.format(value).as_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut buf = itoa::Buffer::new();
        self.buffer.extend_from_slice(buf.format(value).as_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        write_f64(&mut self.buffer, value);
    }

    pub fn write_f32(&mut self, value: f32) {
        write_f32(&mut self.buffer, value);
    }

    pub fn write_number(&mut self, number: &Number) {
        write_json_number(&mut self.buffer, number);
    }

    /// Write an untyped value, honouring the writer's layout.
    pub fn write_value(&mut self, value: &Value) {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(flag) => self.write_bool(*flag),
            Value::Number(number) => self.write_number(number),
            Value::String(text) => self.write_quoted(text),
            Value::Array(items) => {
                self.begin_array();
                for item in items {
                    self.next_item();
                    self.write_value(item);
                }
                self.end_array();
            }
            Value::Object(members) => {
                self.begin_object();
                for (name, member) in members {
                    self.write_key(name);
                    self.write_value(member);
                }
                self.end_object();
            }
        }
    }

    pub fn begin_object(&mut self) {
        self.open(b'{');
    }

    pub fn end_object(&mut self) {
        self.close(b'}');
    }

    pub fn begin_array(&mut self) {
        self.open(b'[');
    }

    pub fn end_array(&mut self) {
        self.close(b']');
    }

    /// Start the next item of the innermost block.
    pub fn next_item(&mut self) {
        if let Some(count) = self.blocks.last_mut() {
            if *count > 0 {
                self.buffer.push(b',');
            }
            *count += 1;
        }
        if self.human_readable && !self.blocks.is_empty() {
            self.buffer.push(b'\n');
            self.write_indent(self.blocks.len());
        }
    }

    /// Start an object member: separator, quoted name and colon.
    pub fn write_key(&mut self, name: &str) {
        self.next_item();
        self.write_quoted(name);
        self.write_colon();
    }

    pub fn write_colon(&mut self) {
        self.buffer.push(b':');
        if self.human_readable {
            self.buffer.push(b' ');
        }
    }

    fn open(&mut self, bracket: u8) {
        self.buffer.push(bracket);
        self.blocks.push(0);
    }

    fn close(&mut self, bracket: u8) {
        let count = self.blocks.pop().unwrap_or(0);
        if self.human_readable && count > 0 {
            self.buffer.push(b'\n');
            self.write_indent(self.blocks.len());
        }
        self.buffer.push(bracket);
    }

    fn write_indent(&mut self, depth: usize) {
        if depth == 0 || self.indent_unit.is_empty() {
            return;
        }
        if depth >= self.indent_cache.len() {
            self.extend_indent_cache(depth);
        }
        self.buffer
            .extend_from_slice(self.indent_cache[depth].as_bytes());
    }

    fn extend_indent_cache(&mut self, depth: usize) {
        while self.indent_cache.len() <= depth {
            let next = match self.indent_cache.last() {
                Some(prev) => {
                    let mut s = String::with_capacity(prev.len() + self.indent_unit.len());
                    s.push_str(prev);
                    s.push_str(&self.indent_unit);
                    s
                }
                None => String::new(),
            };
            self.indent_cache.push(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Indent;

    #[rstest::rstest]
    fn test_writer_basic() {
        let mut writer = Writer::new(&SaveOptions::default());

        writer.write_str("hello");
        writer.write_byte(b' ');
        writer.write_raw(b"world");

        assert_eq!(writer.finish().unwrap(), "hello world");
    }

    #[rstest::rstest]
    fn test_compact_blocks() {
        let mut writer = Writer::new(&SaveOptions::default());

        writer.begin_object();
        writer.write_key("a");
        writer.write_i64(-1);
        writer.write_key("b");
        writer.begin_array();
        writer.next_item();
        writer.write_u64(2);
        writer.next_item();
        writer.write_null();
        writer.end_array();
        writer.write_key("c");
        writer.begin_object();
        writer.end_object();
        writer.end_object();

        assert_eq!(writer.finish().unwrap(), r#"{"a":-1,"b":[2,null],"c":{}}"#);
    }

    #[rstest::rstest]
    fn test_human_readable_indent() {
        let options = SaveOptions::default().with_human_readable(true);
        let mut writer = Writer::new(&options);

        writer.begin_object();
        writer.write_key("a");
        writer.begin_array();
        writer.next_item();
        writer.write_bool(true);
        writer.end_array();
        writer.write_key("b");
        writer.begin_array();
        writer.end_array();
        writer.end_object();

        assert_eq!(
            writer.finish().unwrap(),
            "{\n  \"a\": [\n    true\n  ],\n  \"b\": []\n}"
        );
    }

    #[rstest::rstest]
    fn test_custom_indent_width() {
        let options = SaveOptions::default()
            .with_human_readable(true)
            .with_indent(Indent::spaces(4));
        let mut writer = Writer::new(&options);

        writer.write_value(&serde_json::json!({"k": [1]}));

        assert_eq!(writer.finish().unwrap(), "{\n    \"k\": [\n        1\n    ]\n}");
    }

    #[rstest::rstest]
    fn test_write_quoted_string() {
        let mut writer = Writer::new(&SaveOptions::default());

        writer.write_quoted("say \"hi\"\n");
        assert_eq!(writer.finish().unwrap(), r#""say \"hi\"\n""#);
    }

    #[rstest::rstest]
    fn test_non_finite_floats_are_null() {
        let mut writer = Writer::new(&SaveOptions::default());

        writer.begin_array();
        writer.next_item();
        writer.write_f64(f64::NAN);
        writer.next_item();
        writer.write_f32(1.5);
        writer.end_array();

        assert_eq!(writer.finish().unwrap(), "[null,1.5]");
    }
}
