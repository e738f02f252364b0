// =====================================================================
// File: error.rs
//
// Description:
//   Error taxonomy for the B+ tree ordered map. Three expected, caller
//   triggerable kinds (`InvalidCapacity`, `KeyNotFound`, `Empty`) plus
//   `CorruptedStructure` for internal invariant violations that must
//   never occur on a legal sequence of public calls — if one fires,
//   the tree's bookkeeping has a bug.
// =====================================================================

use thiserror::Error;

/// Errors produced by [`crate::BPlusTreeMap`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BPlusTreeError {
    /// Construction was attempted with `capacity < 4`.
    #[error("capacity must be at least 4 to maintain B+ tree invariants, got {capacity}")]
    InvalidCapacity { capacity: usize },

    /// `delete`/`pop` (without a default) was called on a key that is not present.
    #[error("key not found")]
    KeyNotFound,

    /// `popitem` was called on a tree with no entries.
    #[error("tree is empty")]
    Empty,

    /// An internal structural invariant was violated. Not reachable from any
    /// legal sequence of public calls; indicates a bug in the rebalancer.
    ///
    /// If this is ever returned from `delete`/`pop`/`popitem`, the key may
    /// already have been removed from its leaf before the rebalancer hit the
    /// check — the returned value is not recoverable through this error, and
    /// the tree should be treated as unreliable for further use.
    #[error("corrupted tree structure: {0}")]
    CorruptedStructure(String),
}
