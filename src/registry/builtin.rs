use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::OnceLock;

use serde_json::Value;
use time::OffsetDateTime;

use super::access::{ArrayAccess, BTreeMapAccess, BoxedOption, HashMapAccess, VecAccess};
use super::{
    lookup_or_register, ClassInfo, FloatKind, HashWidth, IntKind, Kind, ListInfo, MapInfo,
    Reflect, TypeInfo,
};
use crate::types::{Blob, Guid, Hash128, Hash256, UnixTime};

macro_rules! reflect_scalar {
    ($($ty:ty => $name:literal, $kind:expr;)*) => {
        $(
            impl Reflect for $ty {
                fn type_info() -> &'static TypeInfo {
                    static INFO: OnceLock<&'static TypeInfo> = OnceLock::new();
                    INFO.get_or_init(|| {
                        lookup_or_register::<Self>(|| TypeInfo::new::<Self>($name, $kind))
                    })
                }
            }
        )*
    };
}

reflect_scalar! {
    bool => "bool", Kind::Bool;
    i8 => "i8", Kind::Int(IntKind::I8);
    i16 => "i16", Kind::Int(IntKind::I16);
    i32 => "i32", Kind::Int(IntKind::I32);
    i64 => "i64", Kind::Int(IntKind::I64);
    u8 => "u8", Kind::Int(IntKind::U8);
    u16 => "u16", Kind::Int(IntKind::U16);
    u32 => "u32", Kind::Int(IntKind::U32);
    u64 => "u64", Kind::Int(IntKind::U64);
    f32 => "f32", Kind::Float(FloatKind::F32);
    f64 => "f64", Kind::Float(FloatKind::F64);
    String => "String", Kind::Str;
    Blob => "Blob", Kind::Blob;
    UnixTime => "UnixTime", Kind::UnixTime;
    Guid => "Guid", Kind::Guid;
    Hash128 => "Hash128", Kind::Hash(HashWidth::W128);
    Hash256 => "Hash256", Kind::Hash(HashWidth::W256);
    Value => "Value", Kind::Variant;
}

fn create_epoch() -> Box<dyn Any> {
    Box::new(OffsetDateTime::UNIX_EPOCH)
}

fn reset_epoch(value: &mut dyn Any) {
    if let Some(value) = value.downcast_mut::<OffsetDateTime>() {
        *value = OffsetDateTime::UNIX_EPOCH;
    }
}

impl Reflect for OffsetDateTime {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| {
            TypeInfo::with_constructor("OffsetDateTime", Kind::DateTime, create_epoch, reset_epoch)
        })
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| {
            TypeInfo::new::<Self>(
                type_name::<Self>(),
                Kind::List(ListInfo {
                    item: T::type_info,
                    access: Box::new(VecAccess::<T>::new()),
                }),
            )
        })
    }
}

fn create_array<T: Default + Any, const N: usize>() -> Box<dyn Any> {
    Box::new(std::array::from_fn::<T, N, _>(|_| T::default()))
}

fn reset_array<T: Default + Any, const N: usize>(value: &mut dyn Any) {
    if let Some(items) = value.downcast_mut::<[T; N]>() {
        items.iter_mut().for_each(|item| *item = T::default());
    }
}

impl<T: Reflect + Default, const N: usize> Reflect for [T; N] {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| {
            TypeInfo::with_constructor(
                type_name::<Self>(),
                Kind::List(ListInfo {
                    item: T::type_info,
                    access: Box::new(ArrayAccess::<T, N>::new()),
                }),
                create_array::<T, N>,
                reset_array::<T, N>,
            )
        })
    }
}

impl<K: Reflect + Ord, V: Reflect> Reflect for BTreeMap<K, V> {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| {
            TypeInfo::new::<Self>(
                type_name::<Self>(),
                Kind::Map(MapInfo {
                    key: K::type_info,
                    value: V::type_info,
                    access: Box::new(BTreeMapAccess::<K, V>::new()),
                }),
            )
        })
    }
}

impl<K: Reflect + Eq + Hash, V: Reflect> Reflect for HashMap<K, V> {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| {
            TypeInfo::new::<Self>(
                type_name::<Self>(),
                Kind::Map(MapInfo {
                    key: K::type_info,
                    value: V::type_info,
                    access: Box::new(HashMapAccess::<K, V>::new()),
                }),
            )
        })
    }
}

impl<T: Reflect> Reflect for Option<Box<T>> {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| {
            TypeInfo::new::<Self>(
                type_name::<Self>(),
                Kind::Class(ClassInfo {
                    inner: T::type_info,
                    access: Box::new(BoxedOption::<T>::new()),
                }),
            )
        })
    }
}
