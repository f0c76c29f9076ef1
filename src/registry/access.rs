use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;

use super::Reflect;

/// Type-erased access to one field of a record.
pub trait FieldAccess: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

pub(crate) struct Accessor<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F> Accessor<T, F> {
    pub(crate) fn new(get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self {
        Self { get, get_mut }
    }
}

impl<T: Any, F: Any> FieldAccess for Accessor<T, F> {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        owner
            .downcast_ref::<T>()
            .map(|owner| (self.get)(owner) as &dyn Any)
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        owner
            .downcast_mut::<T>()
            .map(|owner| (self.get_mut)(owner) as &mut dyn Any)
    }
}

/// Type-erased access to a growable list or a fixed-size array.
pub trait ListAccess: Send + Sync {
    fn len(&self, list: &dyn Any) -> usize;

    /// Item count of a fixed-size array, `None` for growable lists.
    fn fixed_len(&self) -> Option<usize>;

    fn item<'a>(&self, list: &'a dyn Any, index: usize) -> Option<&'a dyn Any>;

    fn item_mut<'a>(&self, list: &'a mut dyn Any, index: usize) -> Option<&'a mut dyn Any>;

    /// Remove every item, or reset every item of a fixed-size array.
    fn clear(&self, list: &mut dyn Any);

    fn reserve(&self, list: &mut dyn Any, additional: usize);

    /// Append a boxed item. Fails on fixed-size arrays and on type mismatch.
    fn push(&self, list: &mut dyn Any, item: Box<dyn Any>) -> bool;
}

pub(crate) struct VecAccess<T>(PhantomData<fn() -> T>);

impl<T> VecAccess<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Reflect> ListAccess for VecAccess<T> {
    fn len(&self, list: &dyn Any) -> usize {
        list.downcast_ref::<Vec<T>>().map_or(0, Vec::len)
    }

    fn fixed_len(&self) -> Option<usize> {
        None
    }

    fn item<'a>(&self, list: &'a dyn Any, index: usize) -> Option<&'a dyn Any> {
        list.downcast_ref::<Vec<T>>()?
            .get(index)
            .map(|item| item as &dyn Any)
    }

    fn item_mut<'a>(&self, list: &'a mut dyn Any, index: usize) -> Option<&'a mut dyn Any> {
        list.downcast_mut::<Vec<T>>()?
            .get_mut(index)
            .map(|item| item as &mut dyn Any)
    }

    fn clear(&self, list: &mut dyn Any) {
        if let Some(list) = list.downcast_mut::<Vec<T>>() {
            list.clear();
        }
    }

    fn reserve(&self, list: &mut dyn Any, additional: usize) {
        if let Some(list) = list.downcast_mut::<Vec<T>>() {
            list.reserve(additional);
        }
    }

    fn push(&self, list: &mut dyn Any, item: Box<dyn Any>) -> bool {
        match (list.downcast_mut::<Vec<T>>(), item.downcast::<T>()) {
            (Some(list), Ok(item)) => {
                list.push(*item);
                true
            }
            _ => false,
        }
    }
}

pub(crate) struct ArrayAccess<T, const N: usize>(PhantomData<fn() -> T>);

impl<T, const N: usize> ArrayAccess<T, N> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Reflect + Default, const N: usize> ListAccess for ArrayAccess<T, N> {
    fn len(&self, _list: &dyn Any) -> usize {
        N
    }

    fn fixed_len(&self) -> Option<usize> {
        Some(N)
    }

    fn item<'a>(&self, list: &'a dyn Any, index: usize) -> Option<&'a dyn Any> {
        list.downcast_ref::<[T; N]>()?
            .get(index)
            .map(|item| item as &dyn Any)
    }

    fn item_mut<'a>(&self, list: &'a mut dyn Any, index: usize) -> Option<&'a mut dyn Any> {
        list.downcast_mut::<[T; N]>()?
            .get_mut(index)
            .map(|item| item as &mut dyn Any)
    }

    fn clear(&self, list: &mut dyn Any) {
        if let Some(list) = list.downcast_mut::<[T; N]>() {
            list.iter_mut().for_each(|item| *item = T::default());
        }
    }

    fn reserve(&self, _list: &mut dyn Any, _additional: usize) {}

    fn push(&self, _list: &mut dyn Any, _item: Box<dyn Any>) -> bool {
        false
    }
}

/// Type-erased access to a key/value map.
pub trait MapAccess: Send + Sync {
    fn len(&self, map: &dyn Any) -> usize;

    fn entries<'a>(&self, map: &'a dyn Any) -> Vec<(&'a dyn Any, &'a dyn Any)>;

    fn clear(&self, map: &mut dyn Any);

    /// Insert a boxed entry, replacing the value of an existing key.
    fn insert(&self, map: &mut dyn Any, key: Box<dyn Any>, value: Box<dyn Any>) -> bool;
}

pub(crate) struct BTreeMapAccess<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> BTreeMapAccess<K, V> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<K: Reflect + Ord, V: Reflect> MapAccess for BTreeMapAccess<K, V> {
    fn len(&self, map: &dyn Any) -> usize {
        map.downcast_ref::<BTreeMap<K, V>>().map_or(0, BTreeMap::len)
    }

    fn entries<'a>(&self, map: &'a dyn Any) -> Vec<(&'a dyn Any, &'a dyn Any)> {
        map.downcast_ref::<BTreeMap<K, V>>()
            .map(|map| {
                map.iter()
                    .map(|(key, value)| (key as &dyn Any, value as &dyn Any))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn clear(&self, map: &mut dyn Any) {
        if let Some(map) = map.downcast_mut::<BTreeMap<K, V>>() {
            map.clear();
        }
    }

    fn insert(&self, map: &mut dyn Any, key: Box<dyn Any>, value: Box<dyn Any>) -> bool {
        match (
            map.downcast_mut::<BTreeMap<K, V>>(),
            key.downcast::<K>(),
            value.downcast::<V>(),
        ) {
            (Some(map), Ok(key), Ok(value)) => {
                map.insert(*key, *value);
                true
            }
            _ => false,
        }
    }
}

pub(crate) struct HashMapAccess<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> HashMapAccess<K, V> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<K: Reflect + Eq + Hash, V: Reflect> MapAccess for HashMapAccess<K, V> {
    fn len(&self, map: &dyn Any) -> usize {
        map.downcast_ref::<HashMap<K, V>>().map_or(0, HashMap::len)
    }

    fn entries<'a>(&self, map: &'a dyn Any) -> Vec<(&'a dyn Any, &'a dyn Any)> {
        map.downcast_ref::<HashMap<K, V>>()
            .map(|map| {
                map.iter()
                    .map(|(key, value)| (key as &dyn Any, value as &dyn Any))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn clear(&self, map: &mut dyn Any) {
        if let Some(map) = map.downcast_mut::<HashMap<K, V>>() {
            map.clear();
        }
    }

    fn insert(&self, map: &mut dyn Any, key: Box<dyn Any>, value: Box<dyn Any>) -> bool {
        match (
            map.downcast_mut::<HashMap<K, V>>(),
            key.downcast::<K>(),
            value.downcast::<V>(),
        ) {
            (Some(map), Ok(key), Ok(value)) => {
                map.insert(*key, *value);
                true
            }
            _ => false,
        }
    }
}

/// Type-erased access to an optional heap instance.
pub trait ClassAccess: Send + Sync {
    /// `None` when `slot` is not of the described type, `Some(None)` when
    /// it holds no instance.
    fn instance<'a>(&self, slot: &'a dyn Any) -> Option<Option<&'a dyn Any>>;

    /// The instance in `slot`, created first when missing or when `fresh`.
    fn instantiate<'a>(&self, slot: &'a mut dyn Any, fresh: bool) -> Option<&'a mut dyn Any>;

    fn release(&self, slot: &mut dyn Any);
}

pub(crate) struct BoxedOption<T>(PhantomData<fn() -> T>);

impl<T> BoxedOption<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Reflect> ClassAccess for BoxedOption<T> {
    fn instance<'a>(&self, slot: &'a dyn Any) -> Option<Option<&'a dyn Any>> {
        slot.downcast_ref::<Option<Box<T>>>()
            .map(|slot| slot.as_deref().map(|instance| instance as &dyn Any))
    }

    fn instantiate<'a>(&self, slot: &'a mut dyn Any, fresh: bool) -> Option<&'a mut dyn Any> {
        let slot = slot.downcast_mut::<Option<Box<T>>>()?;
        if fresh || slot.is_none() {
            let created = T::type_info().create().downcast::<T>().ok()?;
            *slot = Some(created);
        }
        slot.as_deref_mut().map(|instance| instance as &mut dyn Any)
    }

    fn release(&self, slot: &mut dyn Any) {
        if let Some(slot) = slot.downcast_mut::<Option<Box<T>>>() {
            *slot = None;
        }
    }
}
