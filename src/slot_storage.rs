//! SlotStorage: dense record storage addressed by item-slot index.
//!
//! Records live in a packed array; the hash index refers to them by slot
//! index, never by pointer, so the backing `Vec` may reallocate freely on
//! growth. Removal leaves a hole that is preferentially reused by the next
//! allocation; `compact` rewrites the array to drop all holes, which
//! renumbers slots and therefore requires the caller to rebuild its index.

/// One stored key/value pair plus the truncated hash cached at insertion.
/// The hash index is rebuilt from `hash`, so `K: Hash` is never re-invoked
/// after a record is created.
#[derive(Clone, Debug)]
pub(crate) struct Record<K, V> {
    pub key: K,
    pub value: V,
    pub hash: i32,
}

#[derive(Clone, Debug)]
pub(crate) struct SlotStorage<K, V> {
    // `Some` = populated slot, `None` = vacated hole awaiting reuse.
    // Length is the high-water mark: slots at or past it never held a record.
    slots: Vec<Option<Record<K, V>>>,
    // Vacated slot indices below the high-water mark, reusable in LIFO order.
    free: Vec<usize>,
    live: usize,
}

impl<K, V> SlotStorage<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// First never-used slot index. Every populated slot is below this.
    #[inline]
    pub fn top(&self) -> usize {
        self.slots.len()
    }

    /// Number of populated slots.
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Reserve a slot for a new record: a vacated hole if one exists,
    /// otherwise a fresh slot at the high-water mark.
    pub fn allocate(&mut self) -> usize {
        if let Some(slot) = self.free.pop() {
            slot
        } else {
            self.slots.push(None);
            self.slots.len() - 1
        }
    }

    /// Place a record into a slot obtained from `allocate`.
    pub fn occupy(&mut self, slot: usize, record: Record<K, V>) {
        debug_assert!(self.slots[slot].is_none(), "slot must be unoccupied");
        self.slots[slot] = Some(record);
        self.live += 1;
    }

    #[inline]
    pub fn record(&self, slot: usize) -> Option<&Record<K, V>> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    #[inline]
    pub fn record_mut(&mut self, slot: usize) -> Option<&mut Record<K, V>> {
        self.slots.get_mut(slot).and_then(|s| s.as_mut())
    }

    /// Remove and return the record at `slot`, leaving a reusable hole.
    pub fn vacate(&mut self, slot: usize) -> Option<Record<K, V>> {
        let record = self.slots.get_mut(slot)?.take()?;
        self.live -= 1;
        self.free.push(slot);
        Some(record)
    }

    /// Populated slots in slot order, with their cached hashes. This is the
    /// index-rebuild feed after growth or compaction.
    pub fn live_hashes(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| s.as_ref().map(|r| (slot, r.hash)))
    }

    /// Rewrite the array dropping every hole, preserving slot order of the
    /// survivors. Returns true if any slot was renumbered; the caller must
    /// then rebuild any index that refers to slots by number.
    pub fn compact(&mut self) -> bool {
        if self.free.is_empty() {
            return false;
        }
        self.slots.retain(|s| s.is_some());
        self.free.clear();
        debug_assert_eq!(self.slots.len(), self.live);
        true
    }

    /// Drop every record and release the slot array.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
