//! HashIndex: open-addressing table mapping truncated hashes to item slots.
//!
//! Buckets form a power-of-two array probed linearly. Each bucket is either
//! EMPTY, DELETED (tombstone left by a removal, kept so probe chains stay
//! intact), or an item-slot index into `SlotStorage`. A parallel array
//! caches each occupant's truncated hash so probing compares hashes before
//! ever touching key equality.
//!
//! The index stores no keys. Callers supply an equality callback that
//! resolves a candidate slot against their storage.

const EMPTY: i32 = -1;
const DELETED: i32 = -2;

/// Outcome of probing for a key's bucket.
pub(crate) enum Probe {
    /// The key occupies `bucket`, which points at `slot`.
    Found { bucket: usize, slot: usize },
    /// The key is absent. `insert_bucket` is where it should be installed:
    /// the first tombstone on its probe chain if any, else the terminating
    /// EMPTY bucket. `None` only when the table has no buckets at all.
    Absent { insert_bucket: Option<usize> },
}

#[derive(Clone, Debug)]
pub(crate) struct HashIndex {
    // Parallel arrays: bucket -> item-slot index (or sentinel), and the
    // cached truncated hash of that bucket's occupant.
    slots: Vec<i32>,
    hashes: Vec<i32>,
    // Non-EMPTY buckets (occupied + tombstoned).
    count: usize,
    // EMPTY buckets; growth triggers when this runs low so every probe
    // chain stays finite.
    empty: usize,
}

impl HashIndex {
    /// A fresh index owns no buckets until the first rebuild.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            hashes: Vec::new(),
            count: 0,
            empty: 0,
        }
    }

    #[cfg(test)]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn tombstones(&self) -> usize {
        let occupied = self.slots.iter().filter(|&&s| s >= 0).count();
        self.count - occupied
    }

    /// True when an insertion must not proceed before a rebuild. Keeps at
    /// least a quarter of the buckets EMPTY so probes terminate quickly.
    #[inline]
    pub fn needs_grow(&self) -> bool {
        self.slots.is_empty() || self.empty <= self.slots.len() / 4
    }

    /// Probe the chain for `hash`. `key_eq_at(slot)` must report whether
    /// the record at `slot` holds the key being sought; it runs only on
    /// buckets whose cached hash matches.
    pub fn probe<F>(&self, hash: i32, mut key_eq_at: F) -> Probe
    where
        F: FnMut(usize) -> bool,
    {
        if self.slots.is_empty() {
            return Probe::Absent {
                insert_bucket: None,
            };
        }
        let mask = self.slots.len() - 1;
        let mut bucket = (hash as u32 as usize) & mask;
        let mut reusable = None;
        loop {
            match self.slots[bucket] {
                EMPTY => {
                    return Probe::Absent {
                        insert_bucket: Some(reusable.unwrap_or(bucket)),
                    }
                }
                DELETED => {
                    if reusable.is_none() {
                        reusable = Some(bucket);
                    }
                }
                slot => {
                    if self.hashes[bucket] == hash && key_eq_at(slot as usize) {
                        return Probe::Found {
                            bucket,
                            slot: slot as usize,
                        };
                    }
                }
            }
            bucket = (bucket + 1) & mask;
        }
    }

    /// First EMPTY bucket on the probe chain for `hash`. Valid only when
    /// the key is known absent, e.g. right after a rebuild.
    pub fn vacant_bucket(&self, hash: i32) -> usize {
        debug_assert!(!self.slots.is_empty());
        let mask = self.slots.len() - 1;
        let mut bucket = (hash as u32 as usize) & mask;
        while self.slots[bucket] != EMPTY {
            bucket = (bucket + 1) & mask;
        }
        bucket
    }

    /// Point `bucket` (EMPTY or a tombstone) at `slot`.
    pub fn install(&mut self, bucket: usize, hash: i32, slot: usize) {
        debug_assert!(slot <= i32::MAX as usize);
        let prev = self.slots[bucket];
        debug_assert!(prev == EMPTY || prev == DELETED, "bucket must be free");
        if prev == EMPTY {
            self.count += 1;
            self.empty -= 1;
        }
        self.slots[bucket] = slot as i32;
        self.hashes[bucket] = hash;
    }

    /// Tombstone an occupied bucket. The bucket stays non-EMPTY so probe
    /// chains passing through it keep working until the next rebuild.
    pub fn erase(&mut self, bucket: usize) {
        debug_assert!(self.slots[bucket] >= 0, "bucket must be occupied");
        self.slots[bucket] = DELETED;
    }

    /// Rebuild at a size fitting `live` entries, installing every pair from
    /// `live_hashes`. Tombstones are not carried over. Keys are known
    /// pairwise distinct so no equality runs, only hash placement.
    pub fn rebuild<I>(&mut self, live: usize, live_hashes: I)
    where
        I: Iterator<Item = (usize, i32)>,
    {
        let size = (live * 2).next_power_of_two().max(8);
        self.slots = vec![EMPTY; size];
        self.hashes = vec![0; size];
        self.count = 0;
        self.empty = size;
        for (slot, hash) in live_hashes {
            let bucket = self.vacant_bucket(hash);
            self.install(bucket, hash, slot);
        }
    }

    /// Release all buckets, returning to the fresh zero-size state.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.hashes = Vec::new();
        self.count = 0;
        self.empty = 0;
    }
}
