pub mod writer;

use std::any::Any;
use std::io;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub use writer::Writer;

use crate::constants::{ALL_SET_ITEMS, MASKED_VALUE};
use crate::error::{Error, ErrorStage};
use crate::options::{SaveOptions, SetFormat};
use crate::registry::{FloatKind, HashWidth, Kind, Reflect, SetInfo, TypeInfo};
use crate::text::string::trim_left_lowercase;
use crate::types::{write_hex, Blob, Guid, Hash128, Hash256, UnixTime};
use crate::Result;

/// State shared by one save: the output sink and the options.
pub struct SaveContext<'w> {
    writer: &'w mut Writer,
    options: SaveOptions,
}

fn mismatch(info: &TypeInfo) -> Error {
    Error::contract(format!("value does not match type descriptor {}", info.name))
        .with_stage(ErrorStage::Encode)
}

impl<'w> SaveContext<'w> {
    pub fn new(writer: &'w mut Writer, options: SaveOptions) -> Self {
        Self { writer, options }
    }

    pub fn writer(&mut self) -> &mut Writer {
        self.writer
    }

    pub fn options(&self) -> &SaveOptions {
        &self.options
    }

    pub fn save<T: Reflect>(&mut self, value: &T) -> Result<()> {
        let info = T::type_info();
        log::trace!("save {}", info.name);
        self.save_value(value, info)
    }

    /// Write `value`, described by `info`. A registered custom codec takes
    /// over for its type wherever the type appears.
    pub fn save_value(&mut self, value: &dyn Any, info: &'static TypeInfo) -> Result<()> {
        if let Some(codec) = info.custom_codec() {
            return codec.save(value, self);
        }
        match &info.kind {
            Kind::Bool => {
                let flag = value.downcast_ref::<bool>().ok_or_else(|| mismatch(info))?;
                self.writer.write_bool(*flag);
            }
            Kind::Int(kind) => {
                let number = kind.read(value).ok_or_else(|| mismatch(info))?;
                if kind.is_signed() {
                    self.writer.write_i64(number as i64);
                } else {
                    self.writer.write_u64(number as u64);
                }
            }
            Kind::Float(FloatKind::F32) => {
                let number = value.downcast_ref::<f32>().ok_or_else(|| mismatch(info))?;
                self.writer.write_f32(*number);
            }
            Kind::Float(FloatKind::F64) => {
                let number = value.downcast_ref::<f64>().ok_or_else(|| mismatch(info))?;
                self.writer.write_f64(*number);
            }
            Kind::Str => {
                let text = value.downcast_ref::<String>().ok_or_else(|| mismatch(info))?;
                self.writer.write_quoted(text);
            }
            Kind::Blob => {
                let blob = value.downcast_ref::<Blob>().ok_or_else(|| mismatch(info))?;
                self.writer.write_quoted(&BASE64.encode(&blob.0));
            }
            Kind::DateTime => {
                let at = value
                    .downcast_ref::<OffsetDateTime>()
                    .ok_or_else(|| mismatch(info))?;
                let text = at.format(&Rfc3339).map_err(|err| {
                    Error::contract(format!("cannot format date-time: {err}"))
                        .with_stage(ErrorStage::Encode)
                })?;
                self.writer.write_quoted(&text);
            }
            Kind::UnixTime => {
                let at = value.downcast_ref::<UnixTime>().ok_or_else(|| mismatch(info))?;
                self.writer.write_i64(at.0);
            }
            Kind::Guid => {
                let guid = value.downcast_ref::<Guid>().ok_or_else(|| mismatch(info))?;
                self.writer.write_quoted(&guid.to_string());
            }
            Kind::Hash(width) => {
                let bytes: &[u8] = match width {
                    HashWidth::W128 => {
                        &value.downcast_ref::<Hash128>().ok_or_else(|| mismatch(info))?.0
                    }
                    HashWidth::W256 => {
                        &value.downcast_ref::<Hash256>().ok_or_else(|| mismatch(info))?.0
                    }
                };
                let mut text = Vec::with_capacity(bytes.len() * 2 + 2);
                text.push(b'"');
                write_hex(&mut text, bytes);
                text.push(b'"');
                self.writer.write_raw(&text);
            }
            Kind::Enum(names) => {
                let ordinal = names.ordinal(value).ok_or_else(|| mismatch(info))?;
                if self.options.enums_as_text {
                    let name = names.names.get(ordinal).ok_or_else(|| mismatch(info))?;
                    let name = self.element_name(name);
                    self.writer.write_quoted(name);
                } else {
                    self.writer.write_u64(ordinal as u64);
                }
            }
            Kind::Set(set) => {
                let bits = set.bits(value).ok_or_else(|| mismatch(info))?;
                self.save_set(set, bits);
            }
            Kind::List(list) => {
                let item_info = (list.item)();
                self.writer.begin_array();
                for index in 0..list.access.len(value) {
                    let item = list.access.item(value, index).ok_or_else(|| mismatch(info))?;
                    self.writer.next_item();
                    self.save_value(item, item_info)?;
                }
                self.writer.end_array();
            }
            Kind::Map(map) => {
                let key_info = (map.key)();
                if !matches!(key_info.kind, Kind::Str | Kind::Int(_)) {
                    return Err(Error::contract(format!(
                        "unsupported map key type {}",
                        key_info.name
                    ))
                    .with_stage(ErrorStage::Encode));
                }
                let value_info = (map.value)();
                self.writer.begin_object();
                for (key, item) in map.access.entries(value) {
                    self.writer.next_item();
                    self.save_map_key(key, key_info)?;
                    self.writer.write_colon();
                    self.save_value(item, value_info)?;
                }
                self.writer.end_object();
            }
            Kind::Record(record) => {
                self.writer.begin_object();
                for field in &record.fields {
                    if field.transient && self.options.skip_transient {
                        continue;
                    }
                    let member = field.get(value).ok_or_else(|| mismatch(info))?;
                    let member_info = field.info();
                    if self.options.skip_default_values
                        && is_default(member, member_info, field.default)
                    {
                        continue;
                    }
                    if self.options.skip_void_values && is_void(member, member_info) {
                        continue;
                    }
                    self.writer.write_key(&field.name);
                    if field.sensitive && self.options.mask_sensitive {
                        self.writer.write_quoted(MASKED_VALUE);
                    } else {
                        self.save_value(member, member_info)?;
                    }
                }
                self.writer.end_object();
            }
            Kind::Class(class) => match class.access.instance(value) {
                None => return Err(mismatch(info)),
                Some(None) => self.writer.write_null(),
                Some(Some(inner)) => self.save_value(inner, (class.inner)())?,
            },
            Kind::Variant => {
                let variant = value.downcast_ref::<Value>().ok_or_else(|| mismatch(info))?;
                self.writer.write_value(variant);
            }
            Kind::Custom => {
                return Err(Error::contract(format!(
                    "no custom codec registered for {}",
                    info.name
                ))
                .with_stage(ErrorStage::Encode))
            }
        }
        Ok(())
    }

    fn element_name<'n>(&self, name: &'n str) -> &'n str {
        if self.options.trim_enum_prefix {
            trim_left_lowercase(name)
        } else {
            name
        }
    }

    fn save_set(&mut self, set: &SetInfo, bits: u64) {
        match self.options.set_format {
            SetFormat::Bits => self.writer.write_u64(bits),
            SetFormat::Names => {
                self.writer.begin_array();
                if !set.names.is_empty() && bits & set.all_bits() == set.all_bits() {
                    self.writer.next_item();
                    self.writer.write_quoted(ALL_SET_ITEMS);
                } else {
                    for (bit, name) in set.names.iter().enumerate() {
                        if has_bit(bits, bit) {
                            self.writer.next_item();
                            let name = self.element_name(name);
                            self.writer.write_quoted(name);
                        }
                    }
                }
                self.writer.end_array();
            }
            SetFormat::Flags => {
                self.writer.begin_object();
                for (bit, name) in set.names.iter().enumerate() {
                    let name = self.element_name(name);
                    self.writer.write_key(name);
                    self.writer.write_bool(has_bit(bits, bit));
                }
                self.writer.end_object();
            }
        }
    }

    fn save_map_key(&mut self, key: &dyn Any, info: &'static TypeInfo) -> Result<()> {
        match &info.kind {
            Kind::Str => {
                let text = key.downcast_ref::<String>().ok_or_else(|| mismatch(info))?;
                self.writer.write_quoted(text);
            }
            Kind::Int(kind) => {
                let number = kind.read(key).ok_or_else(|| mismatch(info))?;
                self.writer.write_byte(b'"');
                if kind.is_signed() {
                    self.writer.write_i64(number as i64);
                } else {
                    self.writer.write_u64(number as u64);
                }
                self.writer.write_byte(b'"');
            }
            _ => return Err(mismatch(info)),
        }
        Ok(())
    }
}

fn has_bit(bits: u64, bit: usize) -> bool {
    bit < 64 && bits & (1u64 << bit) != 0
}

/// Zero, empty or absent.
fn is_void(value: &dyn Any, info: &TypeInfo) -> bool {
    match &info.kind {
        Kind::Bool => value.downcast_ref::<bool>().is_some_and(|flag| !*flag),
        Kind::Int(kind) => kind.read(value) == Some(0),
        Kind::Float(kind) => kind.read(value) == Some(0.0),
        Kind::Str => value.downcast_ref::<String>().is_some_and(String::is_empty),
        Kind::Blob => value.downcast_ref::<Blob>().is_some_and(|blob| blob.0.is_empty()),
        Kind::DateTime => value
            .downcast_ref::<OffsetDateTime>()
            .is_some_and(|at| *at == OffsetDateTime::UNIX_EPOCH),
        Kind::UnixTime => value.downcast_ref::<UnixTime>().is_some_and(|at| at.0 == 0),
        Kind::Guid => value.downcast_ref::<Guid>().is_some_and(|guid| guid.0 == [0; 16]),
        Kind::Hash(HashWidth::W128) => value
            .downcast_ref::<Hash128>()
            .is_some_and(|hash| hash.0 == [0; 16]),
        Kind::Hash(HashWidth::W256) => value
            .downcast_ref::<Hash256>()
            .is_some_and(|hash| hash.0 == [0; 32]),
        Kind::Enum(names) => names.ordinal(value) == Some(0),
        Kind::Set(set) => set.bits(value) == Some(0),
        Kind::List(list) => list.access.fixed_len().is_none() && list.access.len(value) == 0,
        Kind::Map(map) => map.access.len(value) == 0,
        Kind::Class(class) => matches!(class.access.instance(value), Some(None)),
        Kind::Variant => value.downcast_ref::<Value>().is_some_and(Value::is_null),
        Kind::Record(_) | Kind::Custom => false,
    }
}

/// Equal to the field's declared default. Fields without one are never
/// considered default.
fn is_default(value: &dyn Any, info: &TypeInfo, default: Option<i64>) -> bool {
    let Some(default) = default else {
        return false;
    };
    match &info.kind {
        Kind::Bool => value
            .downcast_ref::<bool>()
            .is_some_and(|flag| *flag == (default != 0)),
        Kind::Int(kind) => kind.read(value) == Some(i128::from(default)),
        Kind::Float(kind) => kind.read(value) == Some(default as f64),
        Kind::UnixTime => value.downcast_ref::<UnixTime>().is_some_and(|at| at.0 == default),
        Kind::Enum(names) => {
            usize::try_from(default).is_ok_and(|default| names.ordinal(value) == Some(default))
        }
        Kind::Set(set) => set.bits(value) == Some(default as u64),
        _ => false,
    }
}

pub fn to_vec<T: Reflect>(value: &T, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut writer = Writer::new(options);
    SaveContext::new(&mut writer, *options).save(value)?;
    Ok(writer.finish_bytes())
}

pub fn to_string<T: Reflect>(value: &T, options: &SaveOptions) -> Result<String> {
    let mut writer = Writer::new(options);
    SaveContext::new(&mut writer, *options).save(value)?;
    writer.finish()
}

pub fn to_writer<W: io::Write, T: Reflect>(
    mut out: W,
    value: &T,
    options: &SaveOptions,
) -> Result<()> {
    let bytes = to_vec(value, options)?;
    out.write_all(&bytes)
        .map_err(|err| Error::io(err.to_string()).with_stage(ErrorStage::Encode))
}
