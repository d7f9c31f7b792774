//! Raw forward cursor over the ordered map.
//!
//! A [`RawCursor`] walks [`OrderedMap`] entries in comparison order from a
//! starting bound. It is the lowest iterator layer: no buffering, no range
//! filtering, no interrupt handling — those live in the scan module.
//!
//! # Locking Contract
//!
//! Every method taking an [`OrderedMap`] reference must be called with the
//! owning buffer's shared lock held; the map reference is only obtainable
//! from the lock guard, so the contract is enforced by construction. The
//! cursor itself holds no borrow of the map and therefore stays valid
//! across lock releases.
//!
//! # Invalidation
//!
//! The cursor snapshots the buffer's modification counter at creation.
//! [`RawCursor::pre_check`] compares that snapshot against the current
//! counter and reports [`CursorCheck::Stale`] on any disagreement. The
//! cursor does not check on every advance — a batch of advances under one
//! shared-lock acquisition cannot be invalidated mid-batch, so one check
//! per batch is sufficient.
//!
//! # Row Compression
//!
//! When the next entry's row bytes equal the previously returned entry's
//! row bytes, the returned key reuses the previous row allocation instead
//! of carrying a fresh one. Tablets commonly accumulate many cells per
//! row, and row bytes can dominate the rest of the key.

use std::ops::Bound;
use std::sync::Arc;

use crate::data::{Key, Value};

use super::OrderedMap;

// ------------------------------------------------------------------------------------------------
// Pre-check Signal
// ------------------------------------------------------------------------------------------------

/// Result of comparing a cursor's counter snapshot against the current
/// modification counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorCheck {
    /// No write event since the cursor was created; the position is valid.
    Fresh,

    /// At least one write event occurred; the caller must re-seek before
    /// trusting the cursor's position.
    Stale,
}

// ------------------------------------------------------------------------------------------------
// Raw Cursor
// ------------------------------------------------------------------------------------------------

/// A forward cursor over an [`OrderedMap`].
///
/// The cursor tracks its position as the bound just past the last returned
/// key, so advancing re-locates in logarithmic time and the cursor remains
/// usable across shared-lock reacquisitions as long as
/// [`RawCursor::pre_check`] reports [`CursorCheck::Fresh`].
#[derive(Debug)]
pub struct RawCursor {
    /// Modification-counter value observed at creation.
    snapshot: u64,

    /// Lower bound of the next entry to return.
    position: Bound<Key>,

    /// Row allocation of the most recently returned entry.
    last_row: Option<Arc<[u8]>>,

    /// Whether another entry lies within the current bound.
    has_next: bool,
}

impl RawCursor {
    /// Positions a cursor at the first entry within `start`.
    ///
    /// Constructed empty when the map has no entry within the bound.
    pub(crate) fn new(map: &OrderedMap, start: Bound<Key>, snapshot: u64) -> Self {
        let has_next = map.range_from(start.clone()).next().is_some();

        Self {
            snapshot,
            position: start,
            last_row: None,
            has_next,
        }
    }

    /// Compares the creation-time counter snapshot against `current`.
    pub fn pre_check(&self, current: u64) -> CursorCheck {
        if current == self.snapshot {
            CursorCheck::Fresh
        } else {
            CursorCheck::Stale
        }
    }

    /// Whether a further entry is available.
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Returns the next entry and moves one position forward, or `None`
    /// when the cursor is exhausted.
    ///
    /// Consecutive returned keys with byte-equal rows share one row
    /// allocation.
    pub fn advance(&mut self, map: &OrderedMap) -> Option<(Key, Value)> {
        if !self.has_next {
            return None;
        }

        let mut range = map.range_from(self.position.clone());
        let Some((stored, value)) = range.next() else {
            self.has_next = false;
            return None;
        };

        let mut key = stored.clone();
        let value = value.clone();
        self.has_next = range.next().is_some();

        if let Some(prev) = &self.last_row {
            if prev.as_ref() == key.row() && !Arc::ptr_eq(prev, key.row_arc()) {
                key.share_row(prev);
            }
        }

        self.position = Bound::Excluded(key.clone());
        self.last_row = Some(Arc::clone(key.row_arc()));

        Some((key, value))
    }

    /// Releases auxiliary state and marks the cursor exhausted.
    ///
    /// A dropped cursor is reclaimed either way; closing eagerly releases
    /// the cached row buffer.
    pub fn close(&mut self) {
        self.has_next = false;
        self.last_row = None;
    }
}
