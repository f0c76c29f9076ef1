//! Runtime type descriptors consumed by the save and load dispatchers.
//!
//! Every type that takes part in dispatch implements [`Reflect`], which
//! returns a process-wide [`TypeInfo`]. Descriptors are built lazily on
//! first use, leaked, and never change afterwards, apart from the one-time
//! attachment of a [`CustomCodec`].
//!
//! ```
//! use jsonrt::registry::{lookup_or_register, Reflect, TypeInfo};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Reflect for Point {
//!     fn type_info() -> &'static TypeInfo {
//!         lookup_or_register::<Self>(|| {
//!             TypeInfo::record::<Self>(
//!                 "Point",
//!                 vec![jsonrt::field!(Point, x), jsonrt::field!(Point, y).with_default(0)],
//!             )
//!         })
//!     }
//! }
//!
//! let json = jsonrt::to_string(&Point { x: 1, y: 2 }).unwrap();
//! assert_eq!(json, r#"{"x":1,"y":2}"#);
//! ```

mod access;
mod builtin;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{LazyLock, OnceLock};

use parking_lot::RwLock;
use smol_str::SmolStr;

pub use access::{ClassAccess, FieldAccess, ListAccess, MapAccess};

use crate::decode::ParseContext;
use crate::encode::SaveContext;
use crate::text::string::trim_left_lowercase;
use crate::Result;

/// A type the dispatchers can save and load.
pub trait Reflect: Any + Send + Sync {
    fn type_info() -> &'static TypeInfo;
}

/// Unit-only enumeration written as an ordinal or a name.
pub trait ReflectEnum: Copy + Any {
    const NAMES: &'static [&'static str];

    fn ordinal(self) -> usize;

    fn from_ordinal(ordinal: usize) -> Option<Self>;
}

/// Bit set over at most 64 named elements.
pub trait ReflectSet: Any {
    const NAMES: &'static [&'static str];

    fn bits(&self) -> u64;

    fn set_bits(&mut self, bits: u64);
}

/// Save and load routines replacing the built-in dispatch for one type.
pub trait CustomCodec: Send + Sync {
    fn save(&self, value: &dyn Any, ctx: &mut SaveContext<'_>) -> Result<()>;

    fn load(&self, value: &mut dyn Any, ctx: &mut ParseContext<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    pub fn is_signed(self) -> bool {
        matches!(self, IntKind::I8 | IntKind::I16 | IntKind::I32 | IntKind::I64)
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, IntKind::I64 | IntKind::U64)
    }

    pub(crate) fn read(self, value: &dyn Any) -> Option<i128> {
        match self {
            IntKind::I8 => read_int::<i8>(value),
            IntKind::I16 => read_int::<i16>(value),
            IntKind::I32 => read_int::<i32>(value),
            IntKind::I64 => read_int::<i64>(value),
            IntKind::U8 => read_int::<u8>(value),
            IntKind::U16 => read_int::<u16>(value),
            IntKind::U32 => read_int::<u32>(value),
            IntKind::U64 => read_int::<u64>(value),
        }
    }

    /// Store `number` into `value`. `None` when `value` is not of this kind,
    /// `Some(false)` when the number does not fit.
    pub(crate) fn store(self, value: &mut dyn Any, number: i128) -> Option<bool> {
        match self {
            IntKind::I8 => store_int::<i8>(value, number),
            IntKind::I16 => store_int::<i16>(value, number),
            IntKind::I32 => store_int::<i32>(value, number),
            IntKind::I64 => store_int::<i64>(value, number),
            IntKind::U8 => store_int::<u8>(value, number),
            IntKind::U16 => store_int::<u16>(value, number),
            IntKind::U32 => store_int::<u32>(value, number),
            IntKind::U64 => store_int::<u64>(value, number),
        }
    }
}

fn read_int<T: Any + Copy + Into<i128>>(value: &dyn Any) -> Option<i128> {
    value.downcast_ref::<T>().map(|number| (*number).into())
}

fn store_int<T: Any + TryFrom<i128>>(value: &mut dyn Any, number: i128) -> Option<bool> {
    let slot = value.downcast_mut::<T>()?;
    match T::try_from(number) {
        Ok(converted) => {
            *slot = converted;
            Some(true)
        }
        Err(_) => Some(false),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub(crate) fn read(self, value: &dyn Any) -> Option<f64> {
        match self {
            FloatKind::F32 => value.downcast_ref::<f32>().map(|v| f64::from(*v)),
            FloatKind::F64 => value.downcast_ref::<f64>().copied(),
        }
    }

    pub(crate) fn store(self, value: &mut dyn Any, number: f64) -> bool {
        match self {
            FloatKind::F32 => value
                .downcast_mut::<f32>()
                .map(|slot| *slot = number as f32)
                .is_some(),
            FloatKind::F64 => value
                .downcast_mut::<f64>()
                .map(|slot| *slot = number)
                .is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashWidth {
    W128,
    W256,
}

impl HashWidth {
    pub fn bytes(self) -> usize {
        match self {
            HashWidth::W128 => 16,
            HashWidth::W256 => 32,
        }
    }
}

pub struct EnumInfo {
    pub names: Vec<SmolStr>,
    ordinal: fn(&dyn Any) -> Option<usize>,
    set_ordinal: fn(&mut dyn Any, usize) -> bool,
}

impl EnumInfo {
    pub fn max_ordinal(&self) -> usize {
        self.names.len().saturating_sub(1)
    }

    pub fn ordinal(&self, value: &dyn Any) -> Option<usize> {
        (self.ordinal)(value)
    }

    pub fn set_ordinal(&self, value: &mut dyn Any, ordinal: usize) -> bool {
        (self.set_ordinal)(value, ordinal)
    }

    pub fn find(&self, name: &[u8]) -> Option<usize> {
        find_name(&self.names, name)
    }
}

pub struct SetInfo {
    pub names: Vec<SmolStr>,
    bits: fn(&dyn Any) -> Option<u64>,
    set_bits: fn(&mut dyn Any, u64) -> bool,
}

impl SetInfo {
    pub fn all_bits(&self) -> u64 {
        match self.names.len() {
            0 => 0,
            len if len >= 64 => u64::MAX,
            len => (1u64 << len) - 1,
        }
    }

    pub fn bits(&self, value: &dyn Any) -> Option<u64> {
        (self.bits)(value)
    }

    pub fn set_bits(&self, value: &mut dyn Any, bits: u64) -> bool {
        (self.set_bits)(value, bits)
    }

    pub fn find(&self, name: &[u8]) -> Option<usize> {
        find_name(&self.names, name)
    }
}

/// Exact match ignoring ASCII case, then a match against names stripped of
/// their lowercase prefix.
fn find_name(names: &[SmolStr], name: &[u8]) -> Option<usize> {
    names
        .iter()
        .position(|candidate| candidate.as_bytes().eq_ignore_ascii_case(name))
        .or_else(|| {
            names.iter().position(|candidate| {
                trim_left_lowercase(candidate)
                    .as_bytes()
                    .eq_ignore_ascii_case(name)
            })
        })
}

pub struct ListInfo {
    pub item: fn() -> &'static TypeInfo,
    pub access: Box<dyn ListAccess>,
}

pub struct MapInfo {
    pub key: fn() -> &'static TypeInfo,
    pub value: fn() -> &'static TypeInfo,
    pub access: Box<dyn MapAccess>,
}

pub struct RecordInfo {
    pub fields: Vec<FieldInfo>,
}

impl RecordInfo {
    /// Index of the field called `name`. The field at `expected` is tried
    /// first with an exact comparison, then every field ignoring ASCII case.
    pub fn find_field(&self, name: &[u8], expected: usize) -> Option<usize> {
        if self
            .fields
            .get(expected)
            .is_some_and(|field| field.name.as_bytes() == name)
        {
            return Some(expected);
        }
        self.fields
            .iter()
            .position(|field| field.name.as_bytes().eq_ignore_ascii_case(name))
    }
}

pub struct ClassInfo {
    pub inner: fn() -> &'static TypeInfo,
    pub access: Box<dyn ClassAccess>,
}

/// Closed set of shapes the dispatchers know how to walk.
pub enum Kind {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    Str,
    /// Bytes written as base64.
    Blob,
    /// `time::OffsetDateTime` written as RFC 3339 text.
    DateTime,
    /// Seconds since the epoch written as an integer.
    UnixTime,
    Guid,
    Hash(HashWidth),
    Enum(EnumInfo),
    Set(SetInfo),
    List(ListInfo),
    Map(MapInfo),
    Record(RecordInfo),
    /// Optional heap instance, created on demand while loading.
    Class(ClassInfo),
    /// Untyped `serde_json::Value`.
    Variant,
    /// Handled only by a registered [`CustomCodec`].
    Custom,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "boolean",
            Kind::Int(_) => "integer",
            Kind::Float(_) => "float",
            Kind::Str => "string",
            Kind::Blob => "blob",
            Kind::DateTime => "date-time",
            Kind::UnixTime => "unix time",
            Kind::Guid => "GUID",
            Kind::Hash(_) => "hash",
            Kind::Enum(_) => "enumeration",
            Kind::Set(_) => "set",
            Kind::List(_) => "array",
            Kind::Map(_) => "map",
            Kind::Record(_) => "record",
            Kind::Class(_) => "class",
            Kind::Variant => "variant",
            Kind::Custom => "custom",
        }
    }
}

pub struct FieldInfo {
    pub name: SmolStr,
    /// Not written when `SaveOptions::skip_transient` is set.
    pub transient: bool,
    /// Written as `"***"` when `SaveOptions::mask_sensitive` is set.
    pub sensitive: bool,
    /// Declared default, compared against when
    /// `SaveOptions::skip_default_values` is set.
    pub default: Option<i64>,
    info: fn() -> &'static TypeInfo,
    resolved: OnceLock<&'static TypeInfo>,
    access: Box<dyn FieldAccess>,
}

impl FieldInfo {
    pub fn new<T: Any, F: Reflect>(
        name: &str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        Self {
            name: SmolStr::new(name),
            transient: false,
            sensitive: false,
            default: None,
            info: F::type_info,
            resolved: OnceLock::new(),
            access: Box::new(access::Accessor::new(get, get_mut)),
        }
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, default: i64) -> Self {
        self.default = Some(default);
        self
    }

    /// Descriptor of the field type. Resolved through the registry once,
    /// then served from the field itself.
    pub fn info(&self) -> &'static TypeInfo {
        self.resolved.get_or_init(self.info)
    }

    pub fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        self.access.get(owner)
    }

    pub fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.access.get_mut(owner)
    }
}

/// Build a [`FieldInfo`] for a named struct field.
#[macro_export]
macro_rules! field {
    ($owner:ty, $field:ident) => {
        $crate::registry::FieldInfo::new::<$owner, _>(
            stringify!($field),
            |value| &value.$field,
            |value| &mut value.$field,
        )
    };
}

/// Implement `Reflect` for a `Default` struct as a record of the listed
/// fields, in order.
#[macro_export]
macro_rules! reflect_record {
    ($owner:ident { $($field:ident),* $(,)? }) => {
        impl $crate::registry::Reflect for $owner {
            fn type_info() -> &'static $crate::registry::TypeInfo {
                static INFO: ::std::sync::OnceLock<&'static $crate::registry::TypeInfo> =
                    ::std::sync::OnceLock::new();
                INFO.get_or_init(|| {
                    $crate::registry::lookup_or_register::<Self>(|| {
                        $crate::registry::TypeInfo::record::<Self>(
                            stringify!($owner),
                            vec![$($crate::field!($owner, $field)),*],
                        )
                    })
                })
            }
        }
    };
}

pub struct TypeInfo {
    pub name: SmolStr,
    pub kind: Kind,
    create: fn() -> Box<dyn Any>,
    reset: fn(&mut dyn Any),
    custom: OnceLock<Box<dyn CustomCodec>>,
}

fn create_default<T: Any + Default>() -> Box<dyn Any> {
    Box::new(T::default())
}

fn reset_default<T: Any + Default>(value: &mut dyn Any) {
    if let Some(value) = value.downcast_mut::<T>() {
        *value = T::default();
    }
}

fn enum_ordinal<E: ReflectEnum>(value: &dyn Any) -> Option<usize> {
    value.downcast_ref::<E>().map(|value| value.ordinal())
}

fn enum_set_ordinal<E: ReflectEnum>(value: &mut dyn Any, ordinal: usize) -> bool {
    match (value.downcast_mut::<E>(), E::from_ordinal(ordinal)) {
        (Some(slot), Some(variant)) => {
            *slot = variant;
            true
        }
        _ => false,
    }
}

fn set_bits_of<S: ReflectSet>(value: &dyn Any) -> Option<u64> {
    value.downcast_ref::<S>().map(ReflectSet::bits)
}

fn set_bits_to<S: ReflectSet>(value: &mut dyn Any, bits: u64) -> bool {
    value
        .downcast_mut::<S>()
        .map(|slot| slot.set_bits(bits))
        .is_some()
}

impl TypeInfo {
    pub fn new<T: Any + Default>(name: impl Into<SmolStr>, kind: Kind) -> Self {
        Self::with_constructor(name, kind, create_default::<T>, reset_default::<T>)
    }

    pub fn with_constructor(
        name: impl Into<SmolStr>,
        kind: Kind,
        create: fn() -> Box<dyn Any>,
        reset: fn(&mut dyn Any),
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            create,
            reset,
            custom: OnceLock::new(),
        }
    }

    pub fn record<T: Any + Default>(name: impl Into<SmolStr>, fields: Vec<FieldInfo>) -> Self {
        Self::new::<T>(name, Kind::Record(RecordInfo { fields }))
    }

    pub fn enumeration<E: ReflectEnum + Default>(name: impl Into<SmolStr>) -> Self {
        Self::new::<E>(
            name,
            Kind::Enum(EnumInfo {
                names: E::NAMES.iter().map(|name| SmolStr::new(name)).collect(),
                ordinal: enum_ordinal::<E>,
                set_ordinal: enum_set_ordinal::<E>,
            }),
        )
    }

    pub fn set<S: ReflectSet + Default>(name: impl Into<SmolStr>) -> Self {
        Self::new::<S>(
            name,
            Kind::Set(SetInfo {
                names: S::NAMES.iter().map(|name| SmolStr::new(name)).collect(),
                bits: set_bits_of::<S>,
                set_bits: set_bits_to::<S>,
            }),
        )
    }

    /// Fresh default value of the described type.
    pub fn create(&self) -> Box<dyn Any> {
        (self.create)()
    }

    /// Put `value` back to its default.
    pub fn reset(&self, value: &mut dyn Any) {
        (self.reset)(value)
    }

    pub fn custom_codec(&self) -> Option<&dyn CustomCodec> {
        self.custom.get().map(|codec| codec.as_ref())
    }
}

type Registry = HashMap<TypeId, &'static TypeInfo>;

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(HashMap::new()));

pub fn lookup<T: Any>() -> Option<&'static TypeInfo> {
    REGISTRY.read().get(&TypeId::of::<T>()).copied()
}

/// Descriptor registered for `T`, building and registering it with `build`
/// on first use. `build` runs without the registry lock held, so it may
/// look up other types; when two threads race, the first insert wins.
pub fn lookup_or_register<T: Any>(build: impl FnOnce() -> TypeInfo) -> &'static TypeInfo {
    let id = TypeId::of::<T>();
    if let Some(info) = REGISTRY.read().get(&id).copied() {
        return info;
    }
    let info = build();
    let mut registry = REGISTRY.write();
    *registry.entry(id).or_insert_with(|| {
        log::trace!("registered type {} as {}", info.name, info.kind.name());
        Box::leak(Box::new(info))
    })
}

/// Attach a custom codec to `T`. Returns `false` when one is already set.
pub fn register_custom<T: Reflect>(codec: impl CustomCodec + 'static) -> bool {
    let info = T::type_info();
    let attached = info.custom.set(Box::new(codec)).is_ok();
    if attached {
        log::trace!("custom codec attached to {}", info.name);
    }
    attached
}

pub fn registered_count() -> usize {
    REGISTRY.read().len()
}
