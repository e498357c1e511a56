//! Dict: the public, reference-counted dictionary handle.
//!
//! A `Dict` is a cheap handle to a heap-resident engine shared by every
//! clone of the handle. `Clone` shares (refcount increment); `copy` makes
//! an independent duplicate. The engine is destroyed, records first and
//! buffers after, when the last handle drops.
//!
//! Cursors (`Keys`, `Values`, `Items`) traverse item slots in slot order
//! and carry a length snapshot; any mutation that changes the length is
//! detected on the next cursor step and fails the traversal.

use crate::dict_core::DictCore;
use crate::error::DictError;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::cell::RefCell;
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// A mapping-like source: key iteration plus fallible per-key lookup.
/// Anything implementing this can seed or update a `Dict`, including
/// another `Dict` with convertible key/value types behind its impl.
pub trait Mapping<K, V> {
    /// Iterate the source's keys.
    fn keys(&self) -> Box<dyn Iterator<Item = K> + '_>;
    /// Look up the value for a key previously yielded by `keys`.
    fn lookup(&self, key: &K) -> Result<V, DictError>;
}

#[derive(Debug)]
pub struct Dict<K, V, S = RandomState> {
    inner: Rc<RefCell<DictCore<K, V, S>>>,
}

/// Sharing, not duplication: the clone refers to the same engine. Use
/// [`Dict::copy`] for an independent container.
impl<K, V, S> Clone for Dict<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K, V> Dict<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DictCore::new())),
        }
    }
}

impl<K, V> Default for Dict<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Dict<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DictCore::with_hasher(hasher))),
        }
    }

    /// Number of live records. O(1), tracked incrementally.
    pub fn len(&self) -> usize {
        self.inner.as_ref().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.as_ref().borrow().is_empty()
    }

    /// How many handles (including live cursors) share this engine.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.as_ref().borrow().contains(q)
    }

    /// The value stored for a key, or `KeyNotFound`.
    pub fn get<Q>(&self, q: &Q) -> Result<V, DictError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.inner
            .as_ref()
            .borrow()
            .get(q)
            .cloned()
            .ok_or(DictError::KeyNotFound)
    }

    /// The value stored for a key, or `default` if absent. Never fails.
    pub fn get_or<Q>(&self, q: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.inner.as_ref().borrow().get(q).cloned().unwrap_or(default)
    }

    /// Insert or overwrite; returns the replaced value on overwrite. An
    /// overwrite replaces the value only, leaving the stored key alone.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.borrow_mut().insert(key, value)
    }

    /// Remove a key, or fail with `KeyNotFound`.
    pub fn remove<Q>(&self, q: &Q) -> Result<(), DictError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner
            .borrow_mut()
            .remove(q)
            .map(|_| ())
            .ok_or(DictError::KeyNotFound)
    }

    /// Remove a key and return its value, or fail with `KeyNotFound`.
    pub fn pop<Q>(&self, q: &Q) -> Result<V, DictError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner
            .borrow_mut()
            .remove(q)
            .map(|(_, v)| v)
            .ok_or(DictError::KeyNotFound)
    }

    /// Remove a key and return its value, or `default` if absent.
    pub fn pop_or<Q>(&self, q: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner
            .borrow_mut()
            .remove(q)
            .map_or(default, |(_, v)| v)
    }

    /// Find-or-insert over a single probe: the stored value if the key is
    /// present, else `default` is inserted and returned. A present key is
    /// never overwritten.
    pub fn get_or_insert(&self, key: K, default: V) -> V
    where
        V: Clone,
    {
        self.get_or_insert_with(key, || default)
    }

    /// Find-or-insert with a lazy default; the closure runs only when the
    /// key is absent.
    pub fn get_or_insert_with<F>(&self, key: K, default: F) -> V
    where
        V: Clone,
        F: FnOnce() -> V,
    {
        let mut core = self.inner.borrow_mut();
        let slot = core.get_or_insert_with(key, default);
        core.value_at(slot)
            .cloned()
            .expect("slot must be populated after find-or-insert")
    }

    /// Find-or-insert using the value type's default construction.
    pub fn get_or_insert_default(&self, key: K) -> V
    where
        V: Default + Clone,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Assign `self[key] = other[key]` for each key in `other`. Stops at
    /// the first source failure, leaving earlier assignments applied; no
    /// atomicity is promised.
    pub fn update<M>(&self, other: &M) -> Result<(), DictError>
    where
        M: Mapping<K, V> + ?Sized,
    {
        for key in other.keys() {
            let value = other.lookup(&key)?;
            self.insert(key, value);
        }
        Ok(())
    }

    /// Destroy every record and return to the empty state.
    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    /// Rewrite dense storage contiguously, dropping deletion holes, and
    /// re-derive the hash index.
    pub fn compact(&self) {
        self.inner.borrow_mut().compact();
    }

    /// An independent duplicate with the same records, produced by the
    /// structural fast path (buffer clone, no re-insertion).
    pub fn copy(&self) -> Self
    where
        K: Clone,
        V: Clone,
    {
        Self {
            inner: Rc::new(RefCell::new(self.inner.as_ref().borrow().duplicate())),
        }
    }

    /// Build a fresh dictionary from a mapping-like source, inserting key
    /// by key through the normal insertion path. On any source failure the
    /// partially built engine is destroyed before the error propagates;
    /// no partially constructed dictionary is ever observable.
    pub fn from_mapping<M>(source: &M) -> Result<Self, DictError>
    where
        M: Mapping<K, V> + ?Sized,
    {
        let mut core = DictCore::with_hasher(S::default());
        for key in source.keys() {
            let value = source.lookup(&key)?;
            core.insert(key, value);
        }
        Ok(Self {
            inner: Rc::new(RefCell::new(core)),
        })
    }

    /// Cursor over keys, in item-slot order.
    pub fn keys(&self) -> Keys<K, V, S> {
        Keys(Cursor::new(self))
    }

    /// Cursor over values, in item-slot order.
    pub fn values(&self) -> Values<K, V, S> {
        Values(Cursor::new(self))
    }

    /// Cursor over key/value pairs, in item-slot order.
    pub fn items(&self) -> Items<K, V, S> {
        Items(Cursor::new(self))
    }
}

impl<K, V, S> Mapping<K, V> for Dict<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn keys(&self) -> Box<dyn Iterator<Item = K> + '_> {
        Box::new(Dict::keys(self))
    }

    fn lookup(&self, key: &K) -> Result<V, DictError> {
        self.get(key)
    }
}

impl<K, V, S2> Mapping<K, V> for std::collections::HashMap<K, V, S2>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S2: BuildHasher,
{
    fn keys(&self) -> Box<dyn Iterator<Item = K> + '_> {
        Box::new(self.keys().cloned())
    }

    fn lookup(&self, key: &K) -> Result<V, DictError> {
        self.get(key).cloned().ok_or(DictError::KeyNotFound)
    }
}

// Shared cursor state: all three flavors run the same slot scan and differ
// only in what they read out of a populated slot.
struct Cursor<K, V, S> {
    dict: Dict<K, V, S>,
    next_slot: usize,
    expected_len: usize,
}

impl<K, V, S> Cursor<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn new(dict: &Dict<K, V, S>) -> Self {
        Self {
            dict: dict.clone(),
            next_slot: 0,
            expected_len: dict.len(),
        }
    }

    /// One cursor step: verify the length snapshot, then scan forward to
    /// the next populated slot and read it out. `read` returns `None` for
    /// holes, which the scan skips; `Ok(None)` is normal exhaustion.
    fn step<T, F>(&mut self, read: F) -> Result<Option<T>, DictError>
    where
        F: Fn(&DictCore<K, V, S>, usize) -> Option<T>,
    {
        let core = self.dict.inner.as_ref().borrow();
        if core.len() != self.expected_len {
            return Err(DictError::SizeChanged);
        }
        while self.next_slot < core.top_slot() {
            let slot = self.next_slot;
            self.next_slot += 1;
            if let Some(item) = read(&core, slot) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
}

/// Key cursor. The `Iterator` impl panics if the dictionary's length
/// changes mid-traversal; use [`Keys::try_next`] to observe that as an
/// error instead.
pub struct Keys<K, V, S = RandomState>(Cursor<K, V, S>);

impl<K, V, S> Keys<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Clone + Default,
{
    pub fn try_next(&mut self) -> Result<Option<K>, DictError> {
        self.0.step(|core, slot| core.key_at(slot).cloned())
    }
}

impl<K, V, S> Iterator for Keys<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Clone + Default,
{
    type Item = K;
    fn next(&mut self) -> Option<K> {
        match self.try_next() {
            Ok(item) => item,
            Err(e) => panic!("{e}"),
        }
    }
}

/// Value cursor; see [`Keys`] for the mutation-detection contract.
pub struct Values<K, V, S = RandomState>(Cursor<K, V, S>);

impl<K, V, S> Values<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    pub fn try_next(&mut self) -> Result<Option<V>, DictError> {
        self.0.step(|core, slot| core.value_at(slot).cloned())
    }
}

impl<K, V, S> Iterator for Values<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    type Item = V;
    fn next(&mut self) -> Option<V> {
        match self.try_next() {
            Ok(item) => item,
            Err(e) => panic!("{e}"),
        }
    }
}

/// Key/value cursor; see [`Keys`] for the mutation-detection contract.
pub struct Items<K, V, S = RandomState>(Cursor<K, V, S>);

impl<K, V, S> Items<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    pub fn try_next(&mut self) -> Result<Option<(K, V)>, DictError> {
        self.0
            .step(|core, slot| core.entry_at(slot).map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl<K, V, S> Iterator for Items<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    type Item = (K, V);
    fn next(&mut self) -> Option<(K, V)> {
        match self.try_next() {
            Ok(item) => item,
            Err(e) => panic!("{e}"),
        }
    }
}
