use std::any::Any;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Number, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::arena::Span;
use crate::constants::{ALL_SET_ITEMS, MAX_DEPTH};
use crate::decode::comments::strip_comments;
use crate::decode::nav::{EndMarker, Syntax};
use crate::decode::scanner::{Scanner, Token};
use crate::error::{Error, ErrorStage, ScanError};
use crate::num::number::{
    classify_number, looks_like_number, parse_f64, parse_hex_u64, parse_i64, parse_u64,
    write_json_number, NumberClass,
};
use crate::options::ParseOptions;
use crate::registry::{
    ClassInfo, HashWidth, IntKind, Kind, ListInfo, MapInfo, RecordInfo, Reflect,
    SetInfo, TypeInfo,
};
use crate::text::string::escape_into;
use crate::types::{decode_hex_into, Blob, Guid, Hash128, Hash256, UnixTime};
use crate::Result;

/// Steps of the record loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    ExpectOpenBrace,
    ExpectName,
    ExpectColon,
    ExpectValue,
    ExpectSeparatorOrClose,
    Done,
}

fn mismatch(info: &TypeInfo) -> Error {
    Error::contract(format!("value does not match type descriptor {}", info.name))
        .with_stage(ErrorStage::Decode)
}

fn slot<'v, T: Any>(value: &'v mut dyn Any, info: &TypeInfo) -> Result<&'v mut T> {
    value.downcast_mut::<T>().ok_or_else(|| mismatch(info))
}

fn parse_i128(text: &[u8]) -> Option<i128> {
    std::str::from_utf8(text).ok()?.parse().ok()
}

fn set_bit(bits: u64, bit: usize) -> u64 {
    if bit < 64 {
        bits | (1u64 << bit)
    } else {
        bits
    }
}

/// State of one load over a mutable buffer: the scanner, the options, and
/// the first error met. Once an error is recorded every further load
/// returns it without touching the buffer.
pub struct ParseContext<'a> {
    scanner: Scanner<'a>,
    options: ParseOptions,
    error: Option<Error>,
    end: Option<EndMarker>,
    depth: usize,
}

impl<'a> ParseContext<'a> {
    /// With `extended_syntax`, comments and trailing commas are blanked out
    /// of `buf` first.
    pub fn new(buf: &'a mut [u8], options: ParseOptions) -> Self {
        let syntax = if options.extended_syntax {
            strip_comments(buf);
            Syntax::Extended
        } else {
            Syntax::Strict
        };
        Self {
            scanner: Scanner::new(buf, syntax),
            options,
            error: None,
            end: None,
            depth: 0,
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn scanner(&mut self) -> &mut Scanner<'a> {
        &mut self.scanner
    }

    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Delimiter reported by the last [`ParseContext::end_of_item`].
    pub fn end_marker(&self) -> Option<EndMarker> {
        self.end
    }

    pub fn load<T: Reflect>(&mut self, value: &mut T) -> Result<()> {
        let info = T::type_info();
        log::trace!("load {}", info.name);
        self.load_value(value, info)
    }

    /// Load the next value into `value`, described by `info`.
    pub fn load_value(&mut self, value: &mut dyn Any, info: &'static TypeInfo) -> Result<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.scanner.skip_whitespace();
        let start = self.scanner.position();
        let result = match info.custom_codec() {
            Some(codec) => codec.load(value, self),
            None => self.load_kind(value, info),
        };
        result.map_err(|err| self.invalidate(err.at(start)))
    }

    /// Consume the delimiter following the last value.
    pub fn end_of_item(&mut self) -> Result<EndMarker> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.scanner.end_of_item() {
            Ok(marker) => {
                self.end = Some(marker);
                Ok(marker)
            }
            Err(err) => Err(self.invalidate(err.into())),
        }
    }

    /// Require that nothing but whitespace follows.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.scanner.at_end() {
            self.end = Some(EndMarker::Eof);
            return Ok(());
        }
        let err = ScanError::unexpected(self.scanner.bytes(), self.scanner.position());
        Err(self.invalidate(err.into()))
    }

    fn invalidate(&mut self, err: Error) -> Error {
        if self.error.is_none() {
            log::debug!(
                "load failed at offset {}: {}",
                err.offset.unwrap_or_default(),
                err.message
            );
            self.error = Some(err.clone());
        }
        err
    }

    fn nested<R>(&mut self, body: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.depth >= MAX_DEPTH {
            return Err(ScanError::TooDeep {
                max: MAX_DEPTH,
                offset: self.scanner.position(),
            }
            .into());
        }
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn next_token(&mut self) -> Result<Token> {
        Ok(self.scanner.next_token()?)
    }

    fn delimiter_error(&self, marker: EndMarker) -> Error {
        let pos = self.scanner.position();
        let at = if marker == EndMarker::Eof {
            pos
        } else {
            pos.saturating_sub(1)
        };
        ScanError::unexpected(self.scanner.bytes(), at).into()
    }

    /// Run `item` for every item of the array whose `[` was just consumed.
    fn for_each_item(&mut self, mut item: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        if self.scanner.consume(b']') {
            return Ok(());
        }
        loop {
            item(self)?;
            match self.scanner.end_of_item()? {
                EndMarker::Comma => {
                    if self.scanner.syntax().is_extended() && self.scanner.consume(b']') {
                        return Ok(());
                    }
                }
                EndMarker::CloseArray => return Ok(()),
                other => return Err(self.delimiter_error(other)),
            }
        }
    }

    /// Run `member` with the decoded name of every member of the object
    /// whose `{` was just consumed, the cursor resting on the value.
    fn for_each_member(
        &mut self,
        mut member: impl FnMut(&mut Self, Span) -> Result<()>,
    ) -> Result<()> {
        if self.scanner.consume(b'}') {
            return Ok(());
        }
        loop {
            let name = self.scanner.decode_name()?;
            self.scanner.expect(b':')?;
            member(self, name)?;
            match self.scanner.end_of_item()? {
                EndMarker::Comma => {
                    if self.scanner.syntax().is_extended() && self.scanner.consume(b'}') {
                        return Ok(());
                    }
                }
                EndMarker::CloseObject => return Ok(()),
                other => return Err(self.delimiter_error(other)),
            }
        }
    }

    fn string_token(&mut self, expected: &str) -> Result<Option<Span>> {
        match self.next_token()? {
            Token::String(span) => Ok(Some(span)),
            Token::Null => Ok(None),
            other => Err(Error::type_mismatch(expected, other.describe())),
        }
    }

    fn load_kind(&mut self, value: &mut dyn Any, info: &'static TypeInfo) -> Result<()> {
        match &info.kind {
            Kind::Bool => {
                let flag = self.read_bool()?;
                *slot::<bool>(value, info)? = flag;
            }
            Kind::Int(kind) => {
                let number = self.read_integer(*kind)?;
                match kind.store(value, number) {
                    None => return Err(mismatch(info)),
                    Some(false) => {
                        return Err(Error::domain(format!(
                            "integer {number} out of range for {}",
                            info.name
                        )))
                    }
                    Some(true) => {}
                }
            }
            Kind::Float(kind) => {
                let number = self.read_float()?;
                if !kind.store(value, number) {
                    return Err(mismatch(info));
                }
            }
            Kind::Str => self.load_string(slot::<String>(value, info)?)?,
            Kind::Blob => {
                let bytes = match self.string_token("base64 string")? {
                    None => Vec::new(),
                    Some(span) => BASE64
                        .decode(self.scanner.text(span))
                        .map_err(|err| Error::domain(format!("invalid base64: {err}")))?,
                };
                slot::<Blob>(value, info)?.0 = bytes;
            }
            Kind::DateTime => {
                let at = match self.next_token()? {
                    Token::Null => OffsetDateTime::UNIX_EPOCH,
                    Token::String(span) => OffsetDateTime::parse(self.scanner.str(span)?, &Rfc3339)
                        .map_err(|err| Error::domain(format!("invalid date-time: {err}")))?,
                    Token::Number(span) => parse_i64(self.scanner.text(span))
                        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
                        .ok_or_else(|| Error::domain("invalid unix timestamp"))?,
                    other => return Err(Error::type_mismatch("date-time", other.describe())),
                };
                *slot::<OffsetDateTime>(value, info)? = at;
            }
            Kind::UnixTime => {
                let seconds = self.read_integer(IntKind::I64)?;
                let seconds = i64::try_from(seconds)
                    .map_err(|_| Error::domain(format!("unix time {seconds} out of range")))?;
                slot::<UnixTime>(value, info)?.0 = seconds;
            }
            Kind::Guid => {
                let guid = match self.string_token("GUID string")? {
                    None => Guid::default(),
                    Some(span) => self.scanner.str(span)?.parse()?,
                };
                *slot::<Guid>(value, info)? = guid;
            }
            Kind::Hash(width) => {
                let span = self.string_token("hex string")?;
                let target: &mut [u8] = match width {
                    HashWidth::W128 => &mut slot::<Hash128>(value, info)?.0,
                    HashWidth::W256 => &mut slot::<Hash256>(value, info)?.0,
                };
                match span {
                    None => target.fill(0),
                    Some(span) => decode_hex_into(self.scanner.text(span), target).ok_or_else(
                        || Error::domain(format!("expected {} hex digits", width.bytes() * 2)),
                    )?,
                }
            }
            Kind::Enum(names) => {
                let ordinal = match self.next_token()? {
                    Token::Null => Some(0),
                    Token::Number(span) => parse_u64(self.scanner.text(span))
                        .and_then(|number| usize::try_from(number).ok())
                        .filter(|&ordinal| ordinal < names.names.len()),
                    Token::String(span) => names.find(self.scanner.text(span)),
                    other => return Err(Error::type_mismatch("enumeration", other.describe())),
                };
                match ordinal {
                    Some(ordinal) => {
                        if !names.set_ordinal(value, ordinal) {
                            return Err(mismatch(info));
                        }
                    }
                    None if self.options.ignore_unknown_enum => {}
                    None => {
                        return Err(Error::domain(format!(
                            "unknown value for enumeration {}",
                            info.name
                        )))
                    }
                }
            }
            Kind::Set(set) => {
                let bits = match self.next_token()? {
                    Token::Null => 0,
                    Token::Number(span) => parse_u64(self.scanner.text(span))
                        .ok_or_else(|| Error::domain("invalid set bit mask"))?,
                    Token::ArrayStart => self.nested(|ctx| ctx.load_set_names(set))?,
                    Token::ObjectStart => self.nested(|ctx| ctx.load_set_flags(set))?,
                    other => return Err(Error::type_mismatch("set", other.describe())),
                };
                if !set.set_bits(value, bits) {
                    return Err(mismatch(info));
                }
            }
            Kind::List(list) => {
                match self.next_token()? {
                    Token::ArrayStart => {}
                    Token::Null => {
                        list.access.clear(value);
                        return Ok(());
                    }
                    other => return Err(Error::type_mismatch("array", other.describe())),
                }
                list.access.clear(value);
                let result = self.nested(|ctx| ctx.load_list(&mut *value, list, info));
                if result.is_err() {
                    list.access.clear(value);
                }
                result?;
            }
            Kind::Map(map) => {
                match self.next_token()? {
                    Token::ObjectStart => {}
                    Token::Null => {
                        map.access.clear(value);
                        return Ok(());
                    }
                    other => return Err(Error::type_mismatch("map", other.describe())),
                }
                if self.options.clear_before_load {
                    map.access.clear(value);
                }
                let result = self.nested(|ctx| ctx.load_map(&mut *value, map, info));
                if result.is_err() {
                    map.access.clear(value);
                }
                result?;
            }
            Kind::Record(record) => {
                if self.scanner.try_null() {
                    info.reset(value);
                    return Ok(());
                }
                if self.options.clear_before_load {
                    info.reset(value);
                }
                let result = self.nested(|ctx| ctx.load_record(&mut *value, record, info));
                if result.is_err() {
                    info.reset(value);
                }
                result?;
            }
            Kind::Class(class) => self.load_class(value, class, info)?,
            Kind::Variant => {
                let variant = self.load_variant()?;
                *slot::<Value>(value, info)? = variant;
            }
            Kind::Custom => {
                return Err(Error::contract(format!(
                    "no custom codec registered for {}",
                    info.name
                ))
                .with_stage(ErrorStage::Decode))
            }
        }
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        let flag = match self.next_token()? {
            Token::Bool(flag) => flag,
            Token::Null => false,
            Token::Number(span) => self.scanner.text(span) != b"0",
            Token::String(span) if self.options.ignore_string_type_mismatch => {
                let text = self.scanner.text(span);
                if text.eq_ignore_ascii_case(b"true") || text == b"1" {
                    true
                } else if text.eq_ignore_ascii_case(b"false") || text == b"0" || text.is_empty() {
                    false
                } else {
                    return Err(Error::domain("invalid boolean text"));
                }
            }
            other => return Err(Error::type_mismatch("boolean", other.describe())),
        };
        Ok(flag)
    }

    fn read_integer(&mut self, kind: IntKind) -> Result<i128> {
        match self.next_token()? {
            Token::Number(span) => {
                let text = self.scanner.text(span);
                if classify_number(text) != Some(NumberClass::Integer) {
                    return Err(Error::type_mismatch("integer", "float"));
                }
                parse_i128(text).ok_or_else(|| Error::domain("integer out of range"))
            }
            Token::String(span) => {
                let text = self.scanner.text(span);
                let decimal = classify_number(text) == Some(NumberClass::Integer);
                if self.options.allow_int64_hex && kind.is_64bit() && !decimal {
                    if let Some(bits) = parse_hex_u64(text) {
                        return Ok(if kind.is_signed() {
                            i128::from(bits as i64)
                        } else {
                            i128::from(bits)
                        });
                    }
                }
                if decimal
                    && (self.options.ignore_string_type_mismatch
                        || (self.options.allow_int64_hex && kind.is_64bit()))
                {
                    return parse_i128(text).ok_or_else(|| Error::domain("integer out of range"));
                }
                Err(Error::type_mismatch("integer", "string"))
            }
            Token::Null => Ok(0),
            Token::Bool(flag) if self.options.ignore_string_type_mismatch => Ok(i128::from(flag)),
            other => Err(Error::type_mismatch("integer", other.describe())),
        }
    }

    fn read_float(&mut self) -> Result<f64> {
        match self.next_token()? {
            Token::Number(span) => {
                parse_f64(self.scanner.text(span)).ok_or_else(|| Error::lexical("invalid number"))
            }
            Token::Null => Ok(0.0),
            Token::String(span)
                if self.options.ignore_string_type_mismatch
                    && looks_like_number(self.scanner.text(span)) =>
            {
                parse_f64(self.scanner.text(span)).ok_or_else(|| Error::lexical("invalid number"))
            }
            other => Err(Error::type_mismatch("float", other.describe())),
        }
    }

    fn load_string(&mut self, target: &mut String) -> Result<()> {
        let token = self.next_token()?;
        target.clear();
        match token {
            Token::String(span) => target.push_str(self.scanner.str(span)?),
            Token::Null => {}
            Token::Number(span) if self.options.ignore_string_type_mismatch => {
                target.push_str(self.scanner.str(span)?)
            }
            Token::Bool(flag) if self.options.ignore_string_type_mismatch => {
                target.push_str(if flag { "true" } else { "false" })
            }
            other => return Err(Error::type_mismatch("string", other.describe())),
        }
        Ok(())
    }

    fn set_element(&self, set: &SetInfo, name: Span) -> Result<Option<usize>> {
        match set.find(self.scanner.text(name)) {
            Some(bit) => Ok(Some(bit)),
            None if self.options.ignore_unknown_enum => Ok(None),
            None => Err(Error::domain(format!(
                "unknown set element {}",
                String::from_utf8_lossy(self.scanner.text(name))
            ))
            .at(name.start)),
        }
    }

    fn load_set_names(&mut self, set: &SetInfo) -> Result<u64> {
        let mut bits = 0;
        self.for_each_item(|ctx| {
            let Some(name) = ctx.string_token("set element name")? else {
                return Ok(());
            };
            if ctx.scanner.text(name) == ALL_SET_ITEMS.as_bytes() {
                bits |= set.all_bits();
            } else if let Some(bit) = ctx.set_element(set, name)? {
                bits = set_bit(bits, bit);
            }
            Ok(())
        })?;
        Ok(bits)
    }

    fn load_set_flags(&mut self, set: &SetInfo) -> Result<u64> {
        let mut bits = 0;
        self.for_each_member(|ctx, name| {
            let Some(bit) = ctx.set_element(set, name)? else {
                ctx.scanner.skip_value()?;
                return Ok(());
            };
            if ctx.read_bool()? {
                bits = set_bit(bits, bit);
            }
            Ok(())
        })?;
        Ok(bits)
    }

    fn load_list(&mut self, value: &mut dyn Any, list: &ListInfo, info: &TypeInfo) -> Result<()> {
        let item_info = (list.item)();
        let Some(len) = list.access.fixed_len() else {
            list.access.reserve(value, self.scanner.estimate_items());
            return self.for_each_item(|ctx| {
                let mut item = item_info.create();
                ctx.load_value(&mut *item, item_info)?;
                if list.access.push(&mut *value, item) {
                    Ok(())
                } else {
                    Err(mismatch(info))
                }
            });
        };
        let mut loaded = 0;
        self.for_each_item(|ctx| {
            let item = list
                .access
                .item_mut(&mut *value, loaded)
                .ok_or_else(|| Error::domain(format!("more than {len} items for {}", info.name)))?;
            ctx.load_value(item, item_info)?;
            loaded += 1;
            Ok(())
        })?;
        if loaded == len {
            Ok(())
        } else {
            Err(Error::domain(format!(
                "expected {len} items for {}, found {loaded}",
                info.name
            )))
        }
    }

    fn load_map(&mut self, value: &mut dyn Any, map: &MapInfo, info: &TypeInfo) -> Result<()> {
        let key_info = (map.key)();
        let value_info = (map.value)();
        self.for_each_member(|ctx, name| {
            let key = ctx.load_map_key(name, key_info)?;
            let mut item = value_info.create();
            ctx.load_value(&mut *item, value_info)?;
            if map.access.insert(&mut *value, key, item) {
                Ok(())
            } else {
                Err(mismatch(info))
            }
        })
    }

    /// Member names are always strings; keys of other kinds are re-read
    /// from the name text as JSON.
    fn load_map_key(&mut self, name: Span, key_info: &'static TypeInfo) -> Result<Box<dyn Any>> {
        let mut key = key_info.create();
        if let Kind::Str = key_info.kind {
            let text = self.scanner.str(name)?;
            let target = key
                .downcast_mut::<String>()
                .ok_or_else(|| mismatch(key_info))?;
            target.push_str(text);
            return Ok(key);
        }
        let text = self.scanner.text(name);
        let mut buf = Vec::with_capacity(text.len() + 2);
        if matches!(key_info.kind, Kind::Int(_)) && looks_like_number(text) {
            buf.extend_from_slice(text);
        } else {
            buf.push(b'"');
            escape_into(&mut buf, text);
            buf.push(b'"');
        }
        let options = ParseOptions {
            extended_syntax: false,
            ..self.options
        };
        let mut sub = ParseContext::new(&mut buf, options);
        sub.load_value(&mut *key, key_info)
            .and_then(|()| sub.finish())
            .map_err(|err| {
                Error::domain(format!(
                    "invalid map key {}: {}",
                    String::from_utf8_lossy(text),
                    err.message
                ))
                .at(name.start)
            })?;
        Ok(key)
    }

    fn load_record(
        &mut self,
        value: &mut dyn Any,
        record: &RecordInfo,
        info: &TypeInfo,
    ) -> Result<()> {
        let mut state = ObjectState::ExpectOpenBrace;
        let mut name = Span::new(0, 0);
        let mut next_field = 0;
        loop {
            state = match state {
                ObjectState::ExpectOpenBrace => match self.next_token()? {
                    Token::ObjectStart if self.scanner.consume(b'}') => ObjectState::Done,
                    Token::ObjectStart => ObjectState::ExpectName,
                    other => return Err(Error::type_mismatch("record", other.describe())),
                },
                ObjectState::ExpectName => {
                    name = self.scanner.decode_name()?;
                    ObjectState::ExpectColon
                }
                ObjectState::ExpectColon => {
                    self.scanner.expect(b':')?;
                    ObjectState::ExpectValue
                }
                ObjectState::ExpectValue => {
                    match record.find_field(self.scanner.text(name), next_field) {
                        Some(index) => {
                            let field = &record.fields[index];
                            let member = field.get_mut(value).ok_or_else(|| mismatch(info))?;
                            self.load_value(member, field.info())?;
                            next_field = index + 1;
                        }
                        None if self.options.ignore_unknown_property => {
                            self.scanner.skip_value()?;
                        }
                        None => {
                            return Err(Error::domain(format!(
                                "unknown property {} for {}",
                                String::from_utf8_lossy(self.scanner.text(name)),
                                info.name
                            ))
                            .at(name.start))
                        }
                    }
                    ObjectState::ExpectSeparatorOrClose
                }
                ObjectState::ExpectSeparatorOrClose => match self.scanner.end_of_item()? {
                    EndMarker::Comma
                        if self.scanner.syntax().is_extended() && self.scanner.consume(b'}') =>
                    {
                        ObjectState::Done
                    }
                    EndMarker::Comma => ObjectState::ExpectName,
                    EndMarker::CloseObject => ObjectState::Done,
                    other => return Err(self.delimiter_error(other)),
                },
                ObjectState::Done => return Ok(()),
            };
        }
    }

    fn load_class(&mut self, value: &mut dyn Any, class: &ClassInfo, info: &TypeInfo) -> Result<()> {
        let existed = class
            .access
            .instance(value)
            .ok_or_else(|| mismatch(info))?
            .is_some();
        if self.scanner.try_null() {
            if !self.options.null_keeps_instance {
                class.access.release(value);
            }
            return Ok(());
        }
        let inner_info = (class.inner)();
        let inner = class
            .access
            .instantiate(value, self.options.setter_owns_instance)
            .ok_or_else(|| mismatch(info))?;
        let result = self.load_value(inner, inner_info);
        if result.is_err() && !existed {
            class.access.release(value);
        }
        result
    }

    fn load_variant(&mut self) -> Result<Value> {
        let variant = match self.next_token()? {
            Token::Null => Value::Null,
            Token::Bool(flag) => Value::Bool(flag),
            Token::String(span) => Value::String(self.scanner.str(span)?.to_owned()),
            Token::Number(span) => self.variant_number(span)?,
            Token::ArrayStart => self.nested(|ctx| {
                let mut items = Vec::with_capacity(ctx.scanner.estimate_items());
                ctx.for_each_item(|ctx| {
                    items.push(ctx.load_variant()?);
                    Ok(())
                })?;
                Ok(Value::Array(items))
            })?,
            Token::ObjectStart => self.nested(|ctx| {
                let mut members = Map::new();
                ctx.for_each_member(|ctx, name| {
                    let key = ctx.scanner.str(name)?.to_owned();
                    members.insert(key, ctx.load_variant()?);
                    Ok(())
                })?;
                Ok(Value::Object(members))
            })?,
        };
        Ok(variant)
    }

    /// Integers become numbers. Other numbers stay numbers when the double
    /// writes back to the same text, or always with `allow_double_in_variant`;
    /// anything else is kept as its text.
    fn variant_number(&self, span: Span) -> Result<Value> {
        let text = self.scanner.text(span);
        let number = match classify_number(text) {
            Some(NumberClass::Integer) => parse_i64(text)
                .map(Number::from)
                .or_else(|| parse_u64(text).map(Number::from)),
            Some(NumberClass::Float) => {
                let number = parse_f64(text).and_then(Number::from_f64);
                if self.options.allow_double_in_variant {
                    number
                } else {
                    number.filter(|number| writes_back_as(number, text))
                }
            }
            _ => None,
        };
        match number {
            Some(number) => Ok(Value::Number(number)),
            None => Ok(Value::String(self.scanner.str(span)?.to_owned())),
        }
    }
}

fn writes_back_as(number: &Number, text: &[u8]) -> bool {
    let mut written = Vec::with_capacity(text.len());
    write_json_number(&mut written, number);
    written == text
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::error::ErrorKind;
    use crate::field;
    use crate::registry::{lookup_or_register, ReflectEnum, ReflectSet};

    #[allow(non_camel_case_types)]
    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    enum Shade {
        #[default]
        shLight,
        shDark,
    }

    impl ReflectEnum for Shade {
        const NAMES: &'static [&'static str] = &["shLight", "shDark"];

        fn ordinal(self) -> usize {
            self as usize
        }

        fn from_ordinal(ordinal: usize) -> Option<Self> {
            [Shade::shLight, Shade::shDark].get(ordinal).copied()
        }
    }

    impl Reflect for Shade {
        fn type_info() -> &'static TypeInfo {
            lookup_or_register::<Self>(|| TypeInfo::enumeration::<Self>("Shade"))
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Days(u64);

    impl ReflectSet for Days {
        const NAMES: &'static [&'static str] = &["Mon", "Tue", "Wed"];

        fn bits(&self) -> u64 {
            self.0
        }

        fn set_bits(&mut self, bits: u64) {
            self.0 = bits;
        }
    }

    impl Reflect for Days {
        fn type_info() -> &'static TypeInfo {
            lookup_or_register::<Self>(|| TypeInfo::set::<Self>("Days"))
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Person {
        name: String,
        age: u32,
        shade: Shade,
        days: Days,
        tags: Vec<String>,
    }

    impl Reflect for Person {
        fn type_info() -> &'static TypeInfo {
            lookup_or_register::<Self>(|| {
                TypeInfo::record::<Self>(
                    "Person",
                    vec![
                        field!(Person, name),
                        field!(Person, age),
                        field!(Person, shade),
                        field!(Person, days),
                        field!(Person, tags),
                    ],
                )
            })
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Holder {
        id: i64,
        inner: Option<Box<Person>>,
    }

    crate::reflect_record!(Holder { id, inner });

    fn load<T: Reflect + Default>(input: &str, options: ParseOptions) -> Result<T> {
        let mut buf = input.as_bytes().to_vec();
        let mut value = T::default();
        let mut ctx = ParseContext::new(&mut buf, options);
        ctx.load(&mut value)?;
        ctx.finish()?;
        Ok(value)
    }

    #[rstest::rstest]
    fn test_record_in_order_and_shuffled() {
        let person: Person = load(
            r#"{"name":"Ann","age":41,"shade":1,"days":5,"tags":["a","b"]}"#,
            ParseOptions::strict(),
        )
        .unwrap();
        assert_eq!(person.name, "Ann");
        assert_eq!(person.age, 41);
        assert_eq!(person.shade, Shade::shDark);
        assert_eq!(person.days, Days(5));
        assert_eq!(person.tags, vec!["a", "b"]);

        let person: Person =
            load(r#"{ "TAGS" : [], "Age" : 3, "name" : "B" }"#, ParseOptions::strict()).unwrap();
        assert_eq!(person.age, 3);
        assert_eq!(person.name, "B");
    }

    #[rstest::rstest]
    fn test_unknown_property() {
        let err = load::<Person>(r#"{"name":"A","extra":{"x":[1]}}"#, ParseOptions::strict())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Domain);
        assert_eq!(err.offset, Some(13));

        let options = ParseOptions::strict().with_ignore_unknown_property(true);
        let person: Person = load(r#"{"name":"A","extra":{"x":[1]},"age":2}"#, options).unwrap();
        assert_eq!(person.age, 2);
    }

    #[rstest::rstest]
    fn test_tolerant_extended_record() {
        let input = "{name:'John', age:1972, // born\n shade:\"Dark\", days:[\"mon\",'Wed'],}";
        assert!(load::<Person>(input, ParseOptions::strict()).is_err());

        let person: Person = load(input, ParseOptions::tolerant()).unwrap();
        assert_eq!(person.name, "John");
        assert_eq!(person.age, 1972);
        assert_eq!(person.shade, Shade::shDark);
        assert_eq!(person.days, Days(0b101));
    }

    #[rstest::rstest]
    fn test_string_type_mismatch() {
        let input = r#"{"name":12,"age":"7"}"#;
        let err = load::<Person>(input, ParseOptions::strict()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);

        let options = ParseOptions::strict().with_ignore_string_type_mismatch(true);
        let person: Person = load(input, options).unwrap();
        assert_eq!(person.name, "12");
        assert_eq!(person.age, 7);
    }

    #[rstest::rstest]
    fn test_integer_ranges_and_hex() {
        assert_eq!(load::<u8>("255", ParseOptions::strict()).unwrap(), 255);
        assert_eq!(load::<u8>("256", ParseOptions::strict()).unwrap_err().kind, ErrorKind::Domain);
        assert_eq!(load::<i32>("1.5", ParseOptions::strict()).unwrap_err().kind, ErrorKind::Type);
        assert_eq!(load::<i64>("null", ParseOptions::strict()).unwrap(), 0);

        let hex = ParseOptions::strict().with_allow_int64_hex(true);
        assert_eq!(load::<u64>(r#""0xff""#, hex).unwrap(), 255);
        assert_eq!(load::<i64>(r#""ffffffffffffffff""#, hex).unwrap(), -1);
        assert!(load::<u32>(r#""0xff""#, hex).is_err());
        assert_eq!(load::<u64>(r#""1234567890123456""#, hex).unwrap(), 1_234_567_890_123_456);
        assert_eq!(load::<i64>(r#""9000000000000001""#, hex).unwrap(), 9_000_000_000_000_001);
        assert_eq!(load::<u64>(r#""00000000000000ff""#, hex).unwrap(), 255);
    }

    #[rstest::rstest]
    fn test_unknown_enum() {
        assert!(load::<Shade>(r#""Grey""#, ParseOptions::strict()).is_err());
        assert!(load::<Shade>("2", ParseOptions::strict()).is_err());
        let options = ParseOptions::strict().with_ignore_unknown_enum(true);
        assert_eq!(load::<Shade>(r#""Grey""#, options).unwrap(), Shade::shLight);
        assert_eq!(load::<Shade>(r#""SHDARK""#, options).unwrap(), Shade::shDark);
    }

    #[rstest::rstest]
    #[case(r#"["*"]"#, 0b111)]
    #[case(r#"["Tue"]"#, 0b010)]
    #[case(r#"{"Mon":true,"Tue":false,"Wed":true}"#, 0b101)]
    #[case("6", 0b110)]
    #[case("null", 0)]
    fn test_set_shapes(#[case] input: &str, #[case] bits: u64) {
        assert_eq!(load::<Days>(input, ParseOptions::strict()).unwrap(), Days(bits));
    }

    #[rstest::rstest]
    fn test_fixed_array_length() {
        assert_eq!(load::<[u8; 3]>("[1,2,3]", ParseOptions::strict()).unwrap(), [1, 2, 3]);
        assert_eq!(
            load::<[u8; 3]>("[1,2]", ParseOptions::strict()).unwrap_err().kind,
            ErrorKind::Domain
        );
        assert!(load::<[u8; 3]>("[1,2,3,4]", ParseOptions::strict()).is_err());
    }

    #[rstest::rstest]
    fn test_list_cleared_on_failure() {
        let mut buf = br#"[1,2,"x"]"#.to_vec();
        let mut items = vec![9u16];
        let mut ctx = ParseContext::new(&mut buf, ParseOptions::strict());
        assert!(ctx.load(&mut items).is_err());
        assert!(items.is_empty());
        assert!(!ctx.is_valid());
        assert_eq!(ctx.error().and_then(|err| err.offset), Some(5));

        let mut other = 0u8;
        assert!(ctx.load(&mut other).is_err());
    }

    #[rstest::rstest]
    fn test_map_keys() {
        let map: BTreeMap<u16, String> =
            load(r#"{"1":"a","20":"b","1":"c"}"#, ParseOptions::strict()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1], "c");

        let err = load::<BTreeMap<u16, String>>(r#"{"x":"a"}"#, ParseOptions::strict()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Domain);
        assert!(err.message.starts_with("invalid map key x"));

        let by_name: HashMap<String, Vec<bool>> =
            load(r#"{"a b":[true],"":[]}"#, ParseOptions::strict()).unwrap();
        assert_eq!(by_name["a b"], vec![true]);
        assert!(by_name[""].is_empty());
    }

    #[rstest::rstest]
    fn test_class_instances() {
        let holder: Holder =
            load(r#"{"id":1,"inner":{"name":"x","age":2}}"#, ParseOptions::strict()).unwrap();
        assert_eq!(holder.inner.as_ref().map(|person| person.age), Some(2));

        let mut value = holder.clone();
        let mut buf = br#"{"inner":null}"#.to_vec();
        ParseContext::new(&mut buf, ParseOptions::strict())
            .load(&mut value)
            .unwrap();
        assert!(value.inner.is_none());

        let mut value = holder.clone();
        let mut buf = br#"{"inner":null}"#.to_vec();
        ParseContext::new(&mut buf, ParseOptions::strict().with_null_keeps_instance(true))
            .load(&mut value)
            .unwrap();
        assert!(value.inner.is_some());

        let mut merged = holder.clone();
        let mut buf = br#"{"inner":{"age":5}}"#.to_vec();
        ParseContext::new(&mut buf, ParseOptions::strict())
            .load(&mut merged)
            .unwrap();
        let inner = merged.inner.unwrap();
        assert_eq!((inner.name.as_str(), inner.age), ("x", 5));

        let mut fresh = holder;
        let mut buf = br#"{"inner":{"age":5}}"#.to_vec();
        ParseContext::new(&mut buf, ParseOptions::strict().with_setter_owns_instance(true))
            .load(&mut fresh)
            .unwrap();
        let inner = fresh.inner.unwrap();
        assert_eq!((inner.name.as_str(), inner.age), ("", 5));
    }

    #[rstest::rstest]
    fn test_failed_class_is_released() {
        let mut holder = Holder::default();
        let mut buf = br#"{"inner":{"age":"old"}}"#.to_vec();
        let mut ctx = ParseContext::new(&mut buf, ParseOptions::strict());
        assert!(ctx.load(&mut holder).is_err());
        assert!(holder.inner.is_none());
    }

    #[rstest::rstest]
    fn test_failed_record_is_released() {
        let mut person = Person {
            name: "Old".to_string(),
            age: 7,
            ..Person::default()
        };
        let mut buf = br#"{"name":"A","age":"x","tags":["t"]}"#.to_vec();
        let mut ctx = ParseContext::new(&mut buf, ParseOptions::strict());
        let err = ctx.load(&mut person).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(person, Person::default());

        let mut holder = Holder {
            id: 3,
            inner: None,
        };
        let mut buf = br#"{"id":4,"inner":{"name":"B","shade":"Nope"}}"#.to_vec();
        assert!(ParseContext::new(&mut buf, ParseOptions::strict())
            .load(&mut holder)
            .is_err());
        assert_eq!(holder, Holder::default());
    }

    #[rstest::rstest]
    fn test_variant_numbers() {
        let value: Value = load(r#"{"i":-3,"f":1.5,"s":"t","a":[null,true]}"#, ParseOptions::strict())
            .unwrap();
        assert_eq!(value["i"], Value::from(-3));
        assert_eq!(value["f"], Value::from(1.5));
        assert_eq!(value["a"], serde_json::json!([null, true]));
    }

    #[rstest::rstest]
    #[case("1.5", false, Value::from(1.5))]
    #[case("-0.25", false, Value::from(-0.25))]
    #[case("1e5", false, Value::from("1e5"))]
    #[case("0.1000000000000000055", false, Value::from("0.1000000000000000055"))]
    #[case("1e5", true, Value::from(100000.0))]
    #[case("0.1000000000000000055", true, Value::from(0.1))]
    fn test_variant_floats(#[case] text: &str, #[case] allow_double: bool, #[case] expected: Value) {
        let options = ParseOptions::strict().with_allow_double_in_variant(allow_double);
        let value: Value = load(text, options).unwrap();
        assert_eq!(value, expected);
    }

    #[rstest::rstest]
    fn test_scalar_wire_types() {
        let blob: Blob = load(r#""aGk=""#, ParseOptions::strict()).unwrap();
        assert_eq!(blob.0, b"hi");
        assert!(load::<Blob>(r#""*""#, ParseOptions::strict()).is_err());

        let mut at = OffsetDateTime::UNIX_EPOCH;
        crate::decode::load_into(
            &mut at,
            &mut br#""2024-02-29T12:30:00Z""#.to_vec(),
            &ParseOptions::strict(),
        )
        .unwrap();
        assert_eq!(at.unix_timestamp(), 1_709_209_800);

        let hash: Hash128 = load(&format!("\"{}\"", "0f".repeat(16)), ParseOptions::strict()).unwrap();
        assert_eq!(hash.0, [0x0f; 16]);
        assert!(load::<Hash128>(r#""0f""#, ParseOptions::strict()).is_err());

        let guid: Guid =
            load(r#""{3F2504E0-4F89-11D3-9A0C-0305E82C3301}""#, ParseOptions::strict()).unwrap();
        assert_eq!(guid.0[0], 0x3F);
    }

    #[rstest::rstest]
    fn test_trailing_content_rejected() {
        let err = load::<u32>("1 2", ParseOptions::strict()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert_eq!(err.offset, Some(2));
    }

    #[rstest::rstest]
    fn test_depth_limit() {
        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        let err = load::<Value>(&deep, ParseOptions::strict()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
    }
}
