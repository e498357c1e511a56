//! Error taxonomy for the dictionary engine.

use thiserror::Error;

/// Failures surfaced by dictionary operations. None of these are retried
/// internally; every failure propagates to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DictError {
    /// Lookup, removal, or pop on an absent key.
    #[error("key not found")]
    KeyNotFound,

    /// The dictionary's length no longer matches a cursor's snapshot.
    /// Fatal for that cursor; the traversal must be abandoned.
    #[error("dictionary size changed during iteration")]
    SizeChanged,

    /// A mapping source failed to produce the value for one of its own
    /// keys while building or updating a dictionary.
    #[error("mapping source lookup failed: {0}")]
    Source(String),
}
