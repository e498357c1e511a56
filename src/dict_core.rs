//! DictCore: the unshared dictionary engine.
//!
//! Composes `SlotStorage` (dense records) with `HashIndex` (bucket ->
//! item-slot mapping). All key comparisons happen here; `K: Eq`/`K: Hash`
//! is user code, so the operations that run it carry a debug-only re-entry
//! check. The shared-handle layer in `dict` wraps this in `Rc<RefCell<..>>`.
//!
//! Slot indices handed out by this layer (`top_slot`, `key_at`, ...) are
//! invalidated by any operation that removes, clears, or compacts; the
//! cursor layer detects that through its length snapshot.

use crate::hash_index::{HashIndex, Probe};
use crate::slot_storage::{Record, SlotStorage};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use std::collections::hash_map::RandomState;

// Compact after a removal once holes outnumber live records past this
// floor, so storage stays O(live) under churn without thrashing tiny maps.
const COMPACT_FLOOR: usize = 16;

// Debug-only re-entry check. Probe and install sections run user `Eq` and
// `Hash` code while storage and index may disagree; in debug builds a
// callback that re-enters the same engine panics instead of reading a
// half-updated table. Release builds compile the check away.
#[derive(Debug)]
struct OpFlag {
    #[cfg(debug_assertions)]
    busy: core::cell::Cell<bool>,
    // Keeps the engine !Send + !Sync; sharing is the handle layer's job.
    _single_thread: PhantomData<*mut ()>,
}

impl OpFlag {
    const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: core::cell::Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    #[inline]
    fn begin(&self) -> OpInFlight<'_> {
        #[cfg(debug_assertions)]
        assert!(
            !self.busy.replace(true),
            "dictionary operation re-entered from key Eq/Hash code"
        );
        OpInFlight {
            #[cfg(debug_assertions)]
            flag: self,
            #[cfg(not(debug_assertions))]
            _flag: PhantomData,
        }
    }
}

// Clears the flag on drop, including during an unwind, so a caught panic
// leaves the engine usable.
struct OpInFlight<'a> {
    #[cfg(debug_assertions)]
    flag: &'a OpFlag,
    #[cfg(not(debug_assertions))]
    _flag: PhantomData<&'a OpFlag>,
}

impl Drop for OpInFlight<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.flag.busy.set(false);
    }
}

#[derive(Debug)]
pub(crate) struct DictCore<K, V, S = RandomState> {
    hasher: S,
    storage: SlotStorage<K, V>,
    index: HashIndex,
    active: OpFlag,
}

impl<K, V, S> DictCore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            storage: SlotStorage::new(),
            index: HashIndex::new(),
            active: OpFlag::new(),
        }
    }

    /// Truncated 32-bit hash; this is what bucket placement and the cached
    /// hash arrays use throughout.
    fn make_hash<Q>(&self, q: &Q) -> i32
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q) as i32
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.storage.live()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.live() == 0
    }

    /// First never-used slot; the exclusive upper bound for cursor scans.
    #[inline]
    pub fn top_slot(&self) -> usize {
        self.storage.top()
    }

    fn probe<Q>(&self, hash: i32, q: &Q) -> Probe
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let storage = &self.storage;
        self.index.probe(hash, |slot| {
            storage.record(slot).map_or(false, |r| r.key.borrow() == q)
        })
    }

    pub fn find_slot<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _op = self.active.begin();
        let hash = self.make_hash(q);
        match self.probe(hash, q) {
            Probe::Found { slot, .. } => Some(slot),
            Probe::Absent { .. } => None,
        }
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.storage.record(slot).map(|r| &r.value)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_slot(q).is_some()
    }

    /// Insert or overwrite. Overwriting replaces the stored value only;
    /// the existing key and its bucket stay untouched. Returns the
    /// previous value on overwrite.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let _op = self.active.begin();
        let hash = self.make_hash(&key);
        match self.probe(hash, &key) {
            Probe::Found { slot, .. } => {
                let record = self
                    .storage
                    .record_mut(slot)
                    .expect("found slot must be populated");
                Some(core::mem::replace(&mut record.value, value))
            }
            Probe::Absent { insert_bucket } => {
                Self::install_new(
                    &mut self.index,
                    &mut self.storage,
                    insert_bucket,
                    hash,
                    key,
                    value,
                );
                None
            }
        }
    }

    /// Combined find-or-insert over a single probe: returns the slot of
    /// the existing record, or inserts `default()` and returns the new
    /// slot. The closure runs only when inserting.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> usize
    where
        F: FnOnce() -> V,
    {
        let _op = self.active.begin();
        let hash = self.make_hash(&key);
        match self.probe(hash, &key) {
            Probe::Found { slot, .. } => slot,
            Probe::Absent { insert_bucket } => Self::install_new(
                &mut self.index,
                &mut self.storage,
                insert_bucket,
                hash,
                key,
                default(),
            ),
        }
    }

    // Install a key known absent. `insert_bucket` is the probe's suggested
    // bucket, stale if the index must grow first. Takes the two layers
    // directly so callers can keep their in-flight token alive.
    fn install_new(
        index: &mut HashIndex,
        storage: &mut SlotStorage<K, V>,
        insert_bucket: Option<usize>,
        hash: i32,
        key: K,
        value: V,
    ) -> usize {
        let bucket = if index.needs_grow() {
            index.rebuild(storage.live(), storage.live_hashes());
            index.vacant_bucket(hash)
        } else {
            // A non-full index always reports an insert bucket.
            insert_bucket.expect("probe on a sized index yields a bucket")
        };
        let slot = storage.allocate();
        storage.occupy(slot, Record { key, value, hash });
        index.install(bucket, hash, slot);
        slot
    }

    /// Remove a key, returning the owned record. The bucket becomes a
    /// tombstone; the item slot becomes a reusable hole. Compacts when
    /// holes dominate.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let record = {
            let _op = self.active.begin();
            let hash = self.make_hash(q);
            match self.probe(hash, q) {
                Probe::Found { bucket, slot } => {
                    self.index.erase(bucket);
                    self.storage
                        .vacate(slot)
                        .expect("found slot must be populated")
                }
                Probe::Absent { .. } => return None,
            }
        };
        if self.storage.top() >= COMPACT_FLOOR && self.storage.top() > 2 * self.storage.live() {
            self.compact();
        }
        Some((record.key, record.value))
    }

    /// Rewrite storage contiguously and re-derive the index from the new
    /// slot numbering. No-op when there are no holes.
    pub fn compact(&mut self) {
        if self.storage.compact() {
            self.index
                .rebuild(self.storage.live(), self.storage.live_hashes());
        }
    }

    /// Destroy every record and return both layers to their empty state.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.index.clear();
    }

    /// Structural duplicate: clones all four buffers directly instead of
    /// re-inserting record by record.
    pub fn duplicate(&self) -> Self
    where
        K: Clone,
        V: Clone,
    {
        Self {
            hasher: self.hasher.clone(),
            storage: self.storage.clone(),
            index: self.index.clone(),
            active: OpFlag::new(),
        }
    }

    // Slot accessors for the cursor layer and bulk copies. `None` means
    // the slot is a hole or out of range.

    #[inline]
    pub fn key_at(&self, slot: usize) -> Option<&K> {
        self.storage.record(slot).map(|r| &r.key)
    }

    #[inline]
    pub fn value_at(&self, slot: usize) -> Option<&V> {
        self.storage.record(slot).map(|r| &r.value)
    }

    #[inline]
    pub fn entry_at(&self, slot: usize) -> Option<(&K, &V)> {
        self.storage.record(slot).map(|r| (&r.key, &r.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;

    // Forces every key onto one probe chain; collision paths get exercised
    // by ordinary operations.
    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    /// Invariant: insert stores, overwrite replaces the value only and
    /// returns the old one, and lookups see the latest value.
    #[test]
    fn insert_overwrite_get() {
        let mut d: DictCore<String, i32> = DictCore::new();
        assert_eq!(d.insert("a".to_string(), 1), None);
        assert_eq!(d.len(), 1);
        assert_eq!(d.get("a"), Some(&1));

        assert_eq!(d.insert("a".to_string(), 2), Some(1));
        assert_eq!(d.len(), 1, "overwrite must not add a record");
        assert_eq!(d.get("a"), Some(&2));
        assert_eq!(d.get("b"), None);
    }

    /// Invariant: remove returns the owned pair, tombstones the bucket,
    /// and leaves other entries reachable.
    #[test]
    fn remove_returns_pair_and_preserves_rest() {
        let mut d: DictCore<String, i32> = DictCore::new();
        d.insert("a".to_string(), 1);
        d.insert("b".to_string(), 2);
        d.insert("c".to_string(), 3);

        assert_eq!(d.remove("b"), Some(("b".to_string(), 2)));
        assert_eq!(d.len(), 2);
        assert_eq!(d.remove("b"), None);
        assert_eq!(d.get("a"), Some(&1));
        assert_eq!(d.get("c"), Some(&3));
    }

    /// Invariant: collision chains resolve by equality after the cached
    /// hash matches; removal mid-chain keeps later entries reachable.
    #[test]
    fn collisions_under_const_hasher() {
        let mut d: DictCore<String, i32, ConstBuildHasher> =
            DictCore::with_hasher(ConstBuildHasher);
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            d.insert((*k).to_string(), i as i32);
        }
        assert_eq!(d.remove("b"), Some(("b".to_string(), 1)));
        assert_eq!(d.get("a"), Some(&0));
        assert_eq!(d.get("c"), Some(&2));
        assert_eq!(d.get("d"), Some(&3));

        // Reinsertion lands on the tombstoned chain without duplication.
        d.insert("b".to_string(), 10);
        assert_eq!(d.get("b"), Some(&10));
        assert_eq!(d.len(), 4);
    }

    /// Invariant: `get_or_insert_with` probes once; present keys return
    /// the existing slot untouched, and absent keys run the closure
    /// exactly once.
    #[test]
    fn get_or_insert_with_is_lazy() {
        use std::cell::Cell;
        let mut d: DictCore<String, i32> = DictCore::new();
        let calls = Cell::new(0);

        let slot = d.get_or_insert_with("x".to_string(), || {
            calls.set(calls.get() + 1);
            5
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(d.value_at(slot), Some(&5));

        let slot2 = d.get_or_insert_with("x".to_string(), || {
            calls.set(calls.get() + 1);
            99
        });
        assert_eq!(slot2, slot);
        assert_eq!(calls.get(), 1, "closure must not run for a present key");
        assert_eq!(d.get("x"), Some(&5));
    }

    /// Invariant: growth rehashes every live entry; lookups survive many
    /// resizes.
    #[test]
    fn growth_preserves_entries() {
        let mut d: DictCore<String, i32> = DictCore::new();
        for i in 0..1000 {
            d.insert(format!("k{i}"), i);
        }
        assert_eq!(d.len(), 1000);
        for i in 0..1000 {
            assert_eq!(d.get(format!("k{i}").as_str()), Some(&i));
        }
    }

    /// Invariant: churn on one key never duplicates records and keeps
    /// dense storage bounded by compaction.
    #[test]
    fn churn_is_bounded_by_compaction() {
        let mut d: DictCore<String, i32> = DictCore::new();
        d.insert("anchor".to_string(), 0);
        for i in 0..10_000 {
            d.insert("churn".to_string(), i);
            assert_eq!(d.remove("churn"), Some(("churn".to_string(), i)));
        }
        assert_eq!(d.len(), 1);
        d.compact();
        assert!(
            d.top_slot() <= 2 * d.len(),
            "storage must be O(live) after compaction, top={} live={}",
            d.top_slot(),
            d.len()
        );
        assert_eq!(d.get("anchor"), Some(&0));
    }

    /// Invariant: compaction renumbers slots without changing contents,
    /// and the rebuilt index resolves every key.
    #[test]
    fn compact_renumbers_and_rebuilds_index() {
        let mut d: DictCore<String, i32> = DictCore::new();
        for i in 0..32 {
            d.insert(format!("k{i}"), i);
        }
        for i in (0..32).step_by(2) {
            d.remove(format!("k{i}").as_str());
        }
        d.compact();
        assert_eq!(d.top_slot(), d.len());
        for i in (1..32).step_by(2) {
            assert_eq!(d.get(format!("k{i}").as_str()), Some(&i));
        }
    }

    /// Invariant: clear empties both layers and is idempotent.
    #[test]
    fn clear_twice_stays_empty() {
        let mut d: DictCore<String, i32> = DictCore::new();
        for i in 0..10 {
            d.insert(format!("k{i}"), i);
        }
        d.clear();
        assert_eq!(d.len(), 0);
        assert_eq!(d.top_slot(), 0);
        assert_eq!(d.get("k3"), None);
        d.clear();
        assert_eq!(d.len(), 0);
        // The container stays usable after clearing.
        d.insert("again".to_string(), 1);
        assert_eq!(d.get("again"), Some(&1));
    }

    /// Invariant: `duplicate` is structurally independent of the source.
    #[test]
    fn duplicate_is_independent() {
        let mut d: DictCore<String, i32> = DictCore::new();
        d.insert("a".to_string(), 1);
        d.insert("b".to_string(), 2);

        let mut copy = d.duplicate();
        assert_eq!(copy.len(), 2);
        copy.insert("c".to_string(), 3);
        copy.remove("a");

        assert_eq!(d.len(), 2);
        assert_eq!(d.get("a"), Some(&1));
        assert_eq!(d.get("c"), None);
        assert_eq!(copy.get("c"), Some(&3));
        assert_eq!(copy.get("a"), None);
    }

    // A key whose `Eq` callback calls back into the engine it is stored in,
    // for the debug re-entry check tests.
    #[cfg(debug_assertions)]
    struct ReentryKey {
        id: &'static str,
        core: *const DictCore<ReentryKey, i32, ConstBuildHasher>,
        trigger: bool,
    }
    #[cfg(debug_assertions)]
    impl PartialEq for ReentryKey {
        fn eq(&self, other: &Self) -> bool {
            if self.id == other.id {
                return true;
            }
            if other.trigger {
                // Attempt to re-enter the same engine during probing.
                unsafe {
                    let d = &*other.core;
                    let _ = d.contains(self.id);
                }
            }
            false
        }
    }
    #[cfg(debug_assertions)]
    impl Eq for ReentryKey {}
    #[cfg(debug_assertions)]
    impl Hash for ReentryKey {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }
    #[cfg(debug_assertions)]
    impl Borrow<str> for ReentryKey {
        fn borrow(&self) -> &str {
            self.id
        }
    }

    #[cfg(debug_assertions)]
    fn reentry_engine() -> DictCore<ReentryKey, i32, ConstBuildHasher> {
        let mut d = DictCore::with_hasher(ConstBuildHasher);
        let core_ptr = &d as *const _;
        d.insert(
            ReentryKey {
                id: "a",
                core: core_ptr,
                trigger: false,
            },
            1,
        );
        d
    }

    /// Invariant (debug-only): re-entering the engine from `K: Eq` during
    /// a lookup's probe panics, and the caught panic leaves the engine
    /// usable.
    #[cfg(debug_assertions)]
    #[test]
    fn lookup_reentered_from_eq_panics() {
        let d = reentry_engine();
        let query = ReentryKey {
            id: "b",
            core: &d as *const _,
            trigger: true,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = d.find_slot(&query);
        }));
        assert!(res.is_err(), "expected the re-entry check to panic");
        // The in-flight token was dropped during the unwind.
        assert!(d.contains("a"));
    }

    /// Invariant (debug-only): the removal path carries the same re-entry
    /// check as lookups.
    #[cfg(debug_assertions)]
    #[test]
    fn removal_reentered_from_eq_panics() {
        let mut d = reentry_engine();
        let query = ReentryKey {
            id: "b",
            core: &d as *const _,
            trigger: true,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = d.remove(&query);
        }));
        assert!(res.is_err(), "expected the re-entry check to panic");
        assert_eq!(d.len(), 1);
        assert!(d.contains("a"));
    }
}
