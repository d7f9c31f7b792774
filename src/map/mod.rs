//! # Ordered Map
//!
//! The sorted container at the heart of the write buffer: a
//! [`BTreeMap`] from [`Key`] to [`Value`] with approximate memory
//! accounting and cursor-based forward traversal.
//!
//! ## Design Invariants
//!
//! - Entries are totally ordered by the seven-attribute key comparison;
//!   `cursor_from` followed by forward traversal visits entries in exactly
//!   that order.
//! - An entry is never modified in place. A second `apply` under a
//!   fully-equal key overwrites the value.
//! - Tombstones are ordinary entries; the map gives them no special
//!   treatment.
//! - The map grows only through `apply` and shrinks only on `clear`.
//!
//! ## Ownership
//!
//! An `OrderedMap` is owned by exactly one [`WriteBuffer`] and is never
//! accessed outside that buffer's reader/writer lock. The methods here
//! take `&self`/`&mut self` without locking; the envelope enforces the
//! locking discipline.
//!
//! [`WriteBuffer`]: crate::buffer::WriteBuffer

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;
use std::sync::Arc;

use crate::data::{Key, Mutation, Value};

pub mod cursor;
pub use cursor::{CursorCheck, RawCursor};

// ------------------------------------------------------------------------------------------------
// Ordered Map
// ------------------------------------------------------------------------------------------------

/// Fixed structural overhead charged per entry, on top of the key and
/// value byte lengths.
const ENTRY_OVERHEAD: usize = std::mem::size_of::<Key>() + std::mem::size_of::<Value>();

/// The sorted mapping from [`Key`] to [`Value`].
///
/// Supports logarithmic insert-or-overwrite, exact lookup, and ordered
/// forward traversal from an arbitrary start position via [`RawCursor`].
#[derive(Debug, Default)]
pub struct OrderedMap {
    /// The backing tree.
    entries: BTreeMap<Key, Value>,

    /// Approximate resident bytes: keys, values, and structural overhead.
    bytes: usize,
}

impl OrderedMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            bytes: 0,
        }
    }

    /// Inserts or overwrites one entry.
    ///
    /// Overwrite happens only under a fully-equal key (all seven
    /// attributes); the memory accounting is adjusted by the value-length
    /// delta in that case.
    pub fn apply(&mut self, key: Key, value: Value) {
        let key_size = key.size();
        let value_len = value.len();

        match self.entries.insert(key, value) {
            Some(old) => {
                self.bytes = self.bytes - old.len() + value_len;
            }
            None => {
                self.bytes += ENTRY_OVERHEAD + key_size + value_len;
            }
        }
    }

    /// Applies every column update of a mutation, tagging each produced
    /// key with `count`.
    ///
    /// The mutation's row allocation is shared by all produced keys; the
    /// row bytes exist once regardless of the number of updates.
    pub fn apply_mutation(&mut self, mutation: &Mutation, count: u32) {
        for update in mutation.updates() {
            let key = Key::new(
                Arc::clone(mutation.row_arc()),
                update.family().to_vec(),
                update.qualifier().to_vec(),
                update.visibility().to_vec(),
                update.timestamp(),
                update.is_deleted(),
            )
            .with_count(count);

            self.apply(key, Value::new(update.value().to_vec()));
        }
    }

    /// Exact lookup over all seven key attributes.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate resident bytes: key bytes, value bytes, and a fixed
    /// per-entry structural overhead.
    pub fn memory_used(&self) -> usize {
        self.bytes
    }

    /// Removes every entry, releasing the associated memory.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }

    /// Creates a forward cursor positioned at the first entry within the
    /// given start bound, snapshotting the supplied modification-counter
    /// value.
    ///
    /// If no entry lies within the bound, the cursor is constructed empty
    /// (`has_next() == false`).
    pub fn cursor_from(&self, start: Bound<Key>, snapshot: u64) -> RawCursor {
        RawCursor::new(self, start, snapshot)
    }

    /// Ordered traversal from the given lower bound.
    pub(crate) fn range_from(&self, start: Bound<Key>) -> btree_map::Range<'_, Key, Value> {
        self.entries.range((start, Bound::Unbounded))
    }
}
