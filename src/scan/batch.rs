//! Batched read-ahead cursor over the write buffer.
//!
//! Under a lock-per-entry model, concurrent readers contend catastrophically
//! on the shared lock and a lone writer makes every reader thrash. The
//! [`BatchCursor`] amortises lock acquisition by draining entries in
//! batches: one shared-lock hold fills a small ring buffer, and subsequent
//! reads are served lock-free from that buffer.
//!
//! # Adaptive Batch Size
//!
//! The ring grows from one entry, doubling on each refill up to
//! [`MAX_BATCH`]. Short scans never pay for a large batch; long scans
//! quickly reach the amortisation ceiling. A refill also stops once the
//! cumulative key-plus-value byte size exceeds [`READ_AHEAD_BYTES`] — a
//! batch of sixteen multi-megabyte values would pin the shared lock far
//! too long and copy far too much.
//!
//! # Concurrent-Modification Recovery
//!
//! Each refill runs the raw cursor's pre-check against the buffer's
//! modification counter. On a stale result the cursor recovers by
//! re-seeking at the last key it returned and dropping the one duplicate
//! that re-seek produces, preserving the no-duplicate, no-skip property
//! across any number of intervening writes. Writes that land strictly
//! before the last returned key are invisible to the scan: a forward
//! cursor is, by definition, a snapshot of the prefix it has already
//! traversed.

use std::collections::VecDeque;
use std::ops::Bound;

use tracing::trace;

use crate::buffer::{BufferError, WriteBuffer};
use crate::data::{Key, Value};
use crate::map::{CursorCheck, RawCursor};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Maximum entries drained per shared-lock hold.
pub const MAX_BATCH: usize = 16;

/// Byte ceiling (keys plus values) per refill.
pub const READ_AHEAD_BYTES: usize = 4096;

// ------------------------------------------------------------------------------------------------
// Batch Cursor
// ------------------------------------------------------------------------------------------------

/// A forward cursor that reads ahead in batches.
///
/// Owns its current [`RawCursor`] exclusively and replaces it on
/// concurrent-modification recovery. Borrows the buffer for its whole
/// lifetime; the buffer cannot be dropped while a cursor is live, and a
/// closed buffer fails the next refill with [`BufferError::Closed`].
///
/// Forward-only: no backward traversal, no mutation through the cursor.
pub struct BatchCursor<'a> {
    buffer: &'a WriteBuffer,

    /// Current raw cursor; replaced on recovery.
    raw: RawCursor,

    /// Start bound used when recovery happens before anything was
    /// returned.
    origin: Bound<Key>,

    /// Read-ahead ring.
    batch: VecDeque<(Key, Value)>,

    /// Entries to pull on the next refill; doubles up to [`MAX_BATCH`].
    batch_cap: usize,

    /// Last entry handed to the caller, the re-seek anchor for recovery.
    last_returned: Option<Key>,

    /// Set once the raw cursor reports end-of-map.
    exhausted: bool,
}

impl<'a> BatchCursor<'a> {
    /// Opens a cursor positioned at the first entry within `start`.
    pub fn new(buffer: &'a WriteBuffer, start: Bound<Key>) -> Result<Self, BufferError> {
        let guard = buffer.read_inner()?;
        let raw = guard.map.cursor_from(start.clone(), guard.mod_count);

        Ok(Self {
            buffer,
            raw,
            origin: start,
            batch: VecDeque::new(),
            batch_cap: 1,
            last_returned: None,
            exhausted: false,
        })
    }

    /// Returns the next entry, refilling the ring as needed.
    pub fn next(&mut self) -> Result<Option<(Key, Value)>, BufferError> {
        if self.batch.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            self.refill()?;
        }

        match self.batch.pop_front() {
            Some((key, value)) => {
                self.last_returned = Some(key.clone());
                Ok(Some((key, value)))
            }
            None => Ok(None),
        }
    }

    /// Closes the underlying raw cursor and drops any buffered entries.
    pub fn close(&mut self) {
        self.raw.close();
        self.batch.clear();
        self.exhausted = true;
    }

    /// Fills the ring under one shared-lock hold.
    ///
    /// Loops only when recovery's duplicate-drop empties the batch again.
    fn refill(&mut self) -> Result<(), BufferError> {
        loop {
            let guard = self.buffer.read_inner()?;

            let recovered = match self.raw.pre_check(guard.mod_count) {
                CursorCheck::Fresh => false,
                CursorCheck::Stale => {
                    trace!("write since cursor snapshot; re-seeking at last returned key");
                    self.raw.close();

                    let start = match &self.last_returned {
                        Some(last) => Bound::Included(last.clone()),
                        None => self.origin.clone(),
                    };
                    self.raw = guard.map.cursor_from(start, guard.mod_count);
                    true
                }
            };

            let mut bytes = 0;
            while self.batch.len() < self.batch_cap {
                match self.raw.advance(&guard.map) {
                    Some((key, value)) => {
                        bytes += key.size() + value.len();
                        self.batch.push_back((key, value));
                        if bytes > READ_AHEAD_BYTES {
                            break;
                        }
                    }
                    None => {
                        self.exhausted = true;
                        break;
                    }
                }
            }

            drop(guard);
            self.batch_cap = (self.batch_cap * 2).min(MAX_BATCH);

            // The re-seek is inclusive at the anchor, so the anchor itself
            // comes back once; it was already delivered.
            if recovered {
                if let (Some(last), Some((front, _))) = (&self.last_returned, self.batch.front()) {
                    if front == last {
                        self.batch.pop_front();
                    }
                }
            }

            if !self.batch.is_empty() || self.exhausted {
                return Ok(());
            }
        }
    }
}
