//! Thread-safe key/value store with per-entry expiry and JSON import and
//! export.
//!
//! Keys, values and expiry ticks live in parallel vectors at the same
//! index, with a hash index from key to slot. Deleting swaps the last entry
//! into the freed slot, so slots are not stable.

mod clock;

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::{Mutex, MutexGuard};

pub use clock::{Clock, ManualClock, SystemClock};

use crate::decode::comments::strip_comments;
use crate::decode::nav::{self, EndMarker, Syntax};
use crate::decode::scanner::Scanner;
use crate::encode::Writer;
use crate::error::{Error, ScanError};
use crate::num::number::looks_like_number;
use crate::options::{ParseOptions, SaveOptions};
use crate::registry::{Kind, Reflect};
use crate::text::string::escape_into;
use crate::Result;

struct Entries<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    /// Tick after which the entry may be purged, 0 for never.
    expires: Vec<u64>,
    index: HashMap<K, usize>,
    last_purge: u64,
}

impl<K: Eq + Hash + Clone, V> Entries<K, V> {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            expires: Vec::new(),
            index: HashMap::new(),
            last_purge: 0,
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn find(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    fn push(&mut self, key: K, value: V, expiry: u64) {
        self.index.insert(key.clone(), self.keys.len());
        self.keys.push(key);
        self.values.push(value);
        self.expires.push(expiry);
    }

    fn upsert(&mut self, key: K, value: V, expiry: u64) -> Option<V> {
        match self.find(&key) {
            Some(slot) => {
                self.expires[slot] = expiry;
                Some(std::mem::replace(&mut self.values[slot], value))
            }
            None => {
                self.push(key, value, expiry);
                None
            }
        }
    }

    fn remove_at(&mut self, slot: usize) -> (K, V) {
        let key = self.keys.swap_remove(slot);
        let value = self.values.swap_remove(slot);
        self.expires.swap_remove(slot);
        self.index.remove(&key);
        if slot < self.keys.len() {
            if let Some(moved) = self.index.get_mut(&self.keys[slot]) {
                *moved = slot;
            }
        }
        (key, value)
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.expires.clear();
        self.index.clear();
    }
}

/// Dictionary whose entries expire `timeout` seconds after they were last
/// stored or refreshed. A timeout of 0 disables expiry.
///
/// Expired entries stay visible until [`TtlDictionary::delete_deprecated`]
/// removes them.
pub struct TtlDictionary<K, V, C = SystemClock> {
    entries: Mutex<Entries<K, V>>,
    timeout: u64,
    clock: C,
}

impl<K: Eq + Hash + Clone, V> TtlDictionary<K, V, SystemClock> {
    pub fn new(timeout: u64) -> Self {
        Self::with_clock(timeout, SystemClock::default())
    }
}

impl<K, V, C> TtlDictionary<K, V, C>
where
    K: Eq + Hash + Clone,
    C: Clock,
{
    pub fn with_clock(timeout: u64, clock: C) -> Self {
        Self {
            entries: Mutex::new(Entries::new()),
            timeout,
            clock,
        }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    fn expiry(&self) -> u64 {
        if self.timeout == 0 {
            0
        } else {
            self.clock.now_ticks().saturating_add(self.timeout)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a new entry. Returns `false`, leaving the dictionary unchanged,
    /// when `key` is already present.
    pub fn add(&self, key: K, value: V) -> bool {
        let expiry = self.expiry();
        let mut entries = self.entries.lock();
        if entries.find(&key).is_some() {
            return false;
        }
        entries.push(key, value, expiry);
        true
    }

    /// Store `value` under `key`, returning the value it replaced.
    pub fn add_or_update(&self, key: K, value: V) -> Option<V> {
        let expiry = self.expiry();
        self.entries.lock().upsert(key, value, expiry)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().find(key).is_some()
    }

    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let entries = self.entries.lock();
        entries.find(key).map(|slot| entries.values[slot].clone())
    }

    /// Like [`TtlDictionary::find`], also restarting the entry's timeout.
    pub fn find_and_refresh(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let expiry = self.expiry();
        let mut entries = self.entries.lock();
        let slot = entries.find(key)?;
        entries.expires[slot] = expiry;
        Some(entries.values[slot].clone())
    }

    pub fn delete(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let slot = entries.find(key)?;
        Some(entries.remove_at(slot).1)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Visit entries in storage order until `visit` returns `false`. The
    /// lock is held for the whole walk, so `visit` must not call back into
    /// the dictionary. Returns the number of entries visited.
    pub fn for_each(&self, mut visit: impl FnMut(&K, &V) -> bool) -> usize {
        let entries = self.entries.lock();
        let mut visited = 0;
        for (key, value) in entries.keys.iter().zip(&entries.values) {
            visited += 1;
            if !visit(key, value) {
                break;
            }
        }
        visited
    }

    /// Remove expired entries. Runs at most once per tick; later calls
    /// within the same tick return 0.
    pub fn delete_deprecated(&self) -> usize {
        self.delete_deprecated_with(|_, _| true)
    }

    /// Remove expired entries for which `may_delete` agrees.
    pub fn delete_deprecated_with(&self, mut may_delete: impl FnMut(&K, &V) -> bool) -> usize {
        if self.timeout == 0 {
            return 0;
        }
        let now = self.clock.now_ticks();
        let mut entries = self.entries.lock();
        if entries.last_purge == now {
            return 0;
        }
        entries.last_purge = now;
        let mut removed = 0;
        let mut slot = 0;
        while slot < entries.len() {
            let expiry = entries.expires[slot];
            if expiry != 0
                && now > expiry
                && may_delete(&entries.keys[slot], &entries.values[slot])
            {
                entries.remove_at(slot);
                removed += 1;
            } else {
                slot += 1;
            }
        }
        if removed > 0 {
            log::debug!(
                "purged {removed} expired entries at tick {now}, {} left",
                entries.len()
            );
        }
        removed
    }

    /// Hold the dictionary lock for a sequence of operations, such as a
    /// find followed by an add.
    pub fn lock(&self) -> DictionaryGuard<'_, K, V> {
        DictionaryGuard {
            expiry: self.expiry(),
            entries: self.entries.lock(),
        }
    }
}

impl<K, V, C> TtlDictionary<K, V, C>
where
    K: Eq + Hash + Clone + Reflect,
    V: Reflect,
    C: Clock,
{
    /// Write the content as one JSON object. Keys must be strings or
    /// integers; integer keys are written as quoted numbers.
    pub fn save_to_json(&self, options: &SaveOptions) -> Result<String> {
        let key_info = K::type_info();
        if !matches!(key_info.kind, Kind::Str | Kind::Int(_)) {
            return Err(Error::contract(format!(
                "unsupported dictionary key type {}",
                key_info.name
            )));
        }
        let options = options.with_human_readable(false);
        let entries = self.entries.lock();
        let keys_json = crate::encode::to_vec(&entries.keys, &options)?;
        let values_json = crate::encode::to_vec(&entries.values, &options)?;
        drop(entries);

        let keys = nav::array_items(&keys_json, Syntax::Strict)?;
        let values = nav::array_items(&values_json, Syntax::Strict)?;
        let mut writer = Writer::with_capacity(&options, keys_json.len() + values_json.len() + 2);
        writer.begin_object();
        for (key, value) in keys.iter().zip(&values) {
            writer.next_item();
            if key.first() == Some(&b'"') {
                writer.write_raw(key);
            } else {
                writer.write_byte(b'"');
                writer.write_raw(key);
                writer.write_byte(b'"');
            }
            writer.write_colon();
            writer.write_raw(value);
        }
        writer.end_object();
        writer.finish()
    }

    /// Replace the content with the entries of the JSON object in `buf`.
    /// When a key appears twice the last occurrence wins. On failure the
    /// dictionary is left unchanged.
    pub fn load_from_json(&self, buf: &mut [u8], options: &ParseOptions) -> Result<()> {
        let numeric_keys = matches!(K::type_info().kind, Kind::Int(_));
        let syntax = if options.extended_syntax {
            strip_comments(buf);
            Syntax::Extended
        } else {
            Syntax::Strict
        };
        let mut keys_json = vec![b'['];
        let mut values_json = vec![b'['];
        {
            let mut scanner = Scanner::new(buf, syntax);
            scanner.expect(b'{')?;
            let mut first = true;
            if !scanner.consume(b'}') {
                loop {
                    let name = scanner.decode_name()?;
                    scanner.expect(b':')?;
                    let value = scanner.skip_value()?;
                    if !first {
                        keys_json.push(b',');
                        values_json.push(b',');
                    }
                    first = false;
                    let name = scanner.text(name);
                    if numeric_keys && looks_like_number(name) {
                        keys_json.extend_from_slice(name);
                    } else {
                        keys_json.push(b'"');
                        escape_into(&mut keys_json, name);
                        keys_json.push(b'"');
                    }
                    values_json.extend_from_slice(scanner.text(value));
                    match scanner.end_of_item()? {
                        EndMarker::Comma => {
                            if syntax.is_extended() && scanner.consume(b'}') {
                                break;
                            }
                        }
                        EndMarker::CloseObject => break,
                        _ => {
                            let at = scanner.position().saturating_sub(1);
                            return Err(ScanError::unexpected(scanner.bytes(), at).into());
                        }
                    }
                }
            }
            if !scanner.at_end() {
                return Err(ScanError::unexpected(scanner.bytes(), scanner.position()).into());
            }
        }
        keys_json.push(b']');
        values_json.push(b']');

        let keys: Vec<K> = crate::decode::from_slice(&mut keys_json, options)?;
        let values: Vec<V> = crate::decode::from_slice(&mut values_json, options)?;
        let expiry = self.expiry();
        let mut entries = self.entries.lock();
        entries.clear();
        for (key, value) in keys.into_iter().zip(values) {
            entries.upsert(key, value, expiry);
        }
        log::debug!("loaded {} dictionary entries", entries.len());
        Ok(())
    }
}

/// Exclusive access to a [`TtlDictionary`] obtained with
/// [`TtlDictionary::lock`]. Entries stored through the guard expire relative
/// to the moment the lock was taken.
pub struct DictionaryGuard<'d, K, V> {
    entries: MutexGuard<'d, Entries<K, V>>,
    expiry: u64,
}

impl<K: Eq + Hash + Clone, V> DictionaryGuard<'_, K, V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    pub fn find(&self, key: &K) -> Option<&V> {
        self.entries
            .find(key)
            .map(|slot| &self.entries.values[slot])
    }

    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = self.entries.find(key)?;
        Some(&mut self.entries.values[slot])
    }

    pub fn add(&mut self, key: K, value: V) -> bool {
        if self.entries.find(&key).is_some() {
            return false;
        }
        let expiry = self.expiry;
        self.entries.push(key, value, expiry);
        true
    }

    pub fn add_or_update(&mut self, key: K, value: V) -> Option<V> {
        let expiry = self.expiry;
        self.entries.upsert(key, value, expiry)
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.find(key)?;
        Some(self.entries.remove_at(slot).1)
    }
}
