//! Flat in-memory collections: a compact prefix tree stored in dense
//! arrays, a bucketed work scheduler, the binary heap it dispatches from,
//! and a dictionary keyed by string regions.
//!
//! The prefix tree, heap and dictionary are single-threaded; synchronize
//! externally if shared. The scheduler is the one concurrent component and
//! runs its workers on an injected [`TaskPool`].

/// Construction options shared across the collections
pub mod config;
/// Crate-wide error type
pub mod error;

/// Hash map keyed by string-region contents
pub mod dict;
/// Array-backed binary min-heap
pub mod heap;
/// Bucketed work scheduler
pub mod sched;
/// Compact prefix tree
pub mod trie;

pub use crate::config::{InsertBehavior, TreeConfig};
pub use crate::dict::SubstringDictionary;
pub use crate::error::{CollectionError, Result};
pub use crate::heap::BinaryHeap;
pub use crate::sched::{TaskPool, WorkScheduler};
pub use crate::trie::CompactPrefixTree;

/// Backing arrays grow by doubling up to this bound, just below `i32::MAX`,
/// keeping every index representable in 32 bits regardless of pointer width.
pub(crate) const MAX_CAPACITY: usize = i32::MAX as usize - 1;
