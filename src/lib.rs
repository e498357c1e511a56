//! slot-dict: a single-threaded, reference-counted dictionary built on
//! dense slot storage and a hand-rolled open-addressing hash index.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build `Dict` in safe, verifiable layers so each piece can be
//!   reasoned about independently.
//! - Layers:
//!   - SlotStorage<K, V>: packed record array addressed by item-slot
//!     index, with hole reuse and compaction. Slots, not pointers, are
//!     the stable names for records.
//!   - HashIndex: power-of-two open-addressing table mapping truncated
//!     hashes to item slots, with EMPTY/DELETED sentinels, cached hashes,
//!     tombstone-aware probing, and tombstone-free rebuilds.
//!   - DictCore<K, V, S>: composes the two; owns every key comparison and
//!     all growth/compaction policy; carries a debug-only re-entry check
//!     on the operations that run user `Eq`/`Hash` code.
//!   - Dict<K, V, S>: public `Rc`-shared handle. `Clone` shares the
//!     engine; `copy` duplicates it. Cursors (`Keys`/`Values`/`Items`)
//!     traverse item slots and detect length changes mid-traversal.
//!
//! Constraints
//! - Single-threaded: `Rc`-based, `!Send`/`!Sync` by design (no atomics).
//!   Sharing across threads would require external serialization the
//!   crate deliberately does not provide.
//! - Average O(1) lookups; no worst-case bound is attempted.
//! - Iteration order is item-slot order: roughly insertion order, modulo
//!   holes left by deletion and any compaction since.
//! - Storage stays O(live records): deletions leave reusable holes and a
//!   compaction pass (automatic under churn, or explicit via `compact`)
//!   rewrites storage densely and re-derives the index.
//!
//! Why this split?
//! - Localize invariants: the index never touches keys, storage never
//!   hashes, and only the core sequences the two.
//! - Clear failure boundaries: once a record is placed, neither lower
//!   layer calls back into user code; rebuilds run off cached hashes, so
//!   `K: Hash` is never invoked after insertion.
//!
//! Hasher and cached-hash invariants
//! - `S: BuildHasher` output is truncated to 32 bits once per key; every
//!   bucket caches its occupant's truncated hash, so probing compares
//!   integers first and runs `K: Eq` only on hash matches. Resize and
//!   compaction rebuild the index from the stored hashes.
//!
//! Mutation during iteration
//! - Cursors snapshot the length at creation and re-check it on every
//!   step. A length change fails the traversal fatally ("dictionary size
//!   changed during iteration"); cursors never try to tolerate structural
//!   changes. Length-neutral overwrites are not detected.
//!
//! Notes and non-goals
//! - Overwriting a present key replaces the stored value only; the key
//!   originally inserted stays.
//! - `get_or_insert_with` is a single combined probe; there is no second
//!   lookup to suppress.
//! - No weak handles; no ordering guarantee beyond slot order.
//! - Public API surface is `Dict`, its cursors, `Mapping`, and
//!   `DictError`; lower layers are implementation details.

mod dict;
mod dict_core;
mod dict_core_proptest;
mod error;
mod hash_index;
mod slot_storage;

// Public surface
pub use dict::{Dict, Items, Keys, Mapping, Values};
pub use error::DictError;
