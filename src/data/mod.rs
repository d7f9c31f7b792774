//! # Cell Data Model
//!
//! The vocabulary types of the write buffer: [`Key`], [`Value`],
//! [`ColumnUpdate`], and [`Mutation`].
//!
//! ## Key Ordering
//!
//! A [`Key`] is an ordered tuple of attributes:
//!
//! ```text
//! (row, family, qualifier, visibility, timestamp, deleted, count)
//! ```
//!
//! Comparison is byte-lexicographic on the four byte-string attributes and
//! natural on the scalars, with two deliberate twists:
//!
//! - **Timestamps sort descending** — for multiple versions of the same
//!   cell, the most recent version is encountered first in a forward scan.
//! - **The writer-assigned `count` breaks ties** — for keys identical on
//!   the first five attributes, the smaller count sorts first, preserving
//!   the order of column updates within a row.
//!
//! The tombstone flag does not order user keys. It is compared dead last,
//! only so the total order stays consistent with seven-attribute equality
//! when two keys collide on their count as well; writers keep counts
//! unique, so that branch never decides a real comparison.
//!
//! ## Row Sharing
//!
//! Row bytes are reference-counted (`Arc<[u8]>`). All keys produced by one
//! [`Mutation`] share a single row allocation, and cursors re-unify the row
//! allocation of consecutive entries with byte-equal rows. Rows are
//! observationally immutable; no caller can mutate a returned key's row.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::cmp::Ordering;
use std::sync::Arc;

// ------------------------------------------------------------------------------------------------
// Key
// ------------------------------------------------------------------------------------------------

/// Fixed per-key footprint of the scalar attributes: an `i64` timestamp,
/// a `bool` tombstone flag, and a `u32` count.
const KEY_SCALAR_BYTES: usize = 8 + 1 + 4;

/// A multi-attribute cell key.
///
/// Keys identify a single cell version in the buffer. Two keys are equal
/// only when **all seven** attributes are equal; inserting a value under a
/// fully-equal key overwrites the previous value.
///
/// The tombstone flag is carried as data, not as absence: a delete is an
/// insert of a key with `deleted = true`. The buffer itself gives
/// tombstones no special treatment — the merging reader above interprets
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// Row bytes, shared across all keys of one mutation.
    row: Arc<[u8]>,

    /// Column family bytes.
    family: Vec<u8>,

    /// Column qualifier bytes.
    qualifier: Vec<u8>,

    /// Column visibility bytes.
    visibility: Vec<u8>,

    /// Version timestamp. Later timestamps sort **before** earlier ones.
    timestamp: i64,

    /// Tombstone flag.
    deleted: bool,

    /// Writer-assigned insertion count, the last ordering discriminator.
    count: u32,
}

impl Key {
    /// Creates a key with `count = 0`.
    ///
    /// The count is assigned by the writer at insertion time; use
    /// [`Key::with_count`] to tag a key explicitly (mostly useful in
    /// tests and when constructing seek positions).
    pub fn new(
        row: impl Into<Arc<[u8]>>,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        visibility: impl Into<Vec<u8>>,
        timestamp: i64,
        deleted: bool,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            visibility: visibility.into(),
            timestamp,
            deleted,
            count: 0,
        }
    }

    /// Returns the infimum key of a row: empty columns, maximum timestamp,
    /// count zero, tombstone flag set.
    ///
    /// Every cell of `row` compares greater than or equal to this key —
    /// a cell matching it through the timestamp sorts after it by count,
    /// and a cell matching it through the count as well sorts after it on
    /// the final tombstone tiebreak. Every cell of any earlier row
    /// compares less. That makes it the natural boundary for row-interval
    /// scans.
    pub fn from_row(row: impl Into<Arc<[u8]>>) -> Self {
        Self {
            row: row.into(),
            family: Vec::new(),
            qualifier: Vec::new(),
            visibility: Vec::new(),
            timestamp: i64::MAX,
            deleted: true,
            count: 0,
        }
    }

    /// Returns this key tagged with the given insertion count.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Row bytes.
    pub fn row(&self) -> &[u8] {
        &self.row
    }

    /// Column family bytes.
    pub fn family(&self) -> &[u8] {
        &self.family
    }

    /// Column qualifier bytes.
    pub fn qualifier(&self) -> &[u8] {
        &self.qualifier
    }

    /// Column visibility bytes.
    pub fn visibility(&self) -> &[u8] {
        &self.visibility
    }

    /// Version timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Whether this key is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Writer-assigned insertion count.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Byte footprint of this key: the four byte-string lengths plus the
    /// fixed scalar widths. Used for read-ahead batch pacing and memory
    /// accounting.
    pub fn size(&self) -> usize {
        self.row.len()
            + self.family.len()
            + self.qualifier.len()
            + self.visibility.len()
            + KEY_SCALAR_BYTES
    }

    /// The shared row allocation.
    pub(crate) fn row_arc(&self) -> &Arc<[u8]> {
        &self.row
    }

    /// Replaces the row allocation with a byte-equal one.
    ///
    /// Cursor row compression: consecutive returned keys with equal row
    /// bytes share a single allocation.
    pub(crate) fn share_row(&mut self, row: &Arc<[u8]>) {
        debug_assert_eq!(self.row.as_ref(), row.as_ref());
        self.row = Arc::clone(row);
    }
}

impl Ord for Key {
    /// Compares by `(row, family, qualifier, visibility)` ascending,
    /// `timestamp` **descending**, then `count` ascending. The tombstone
    /// flag (tombstone first) is consulted only on a full count tie, to
    /// keep the order consistent with equality.
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .as_ref()
            .cmp(other.row.as_ref())
            .then_with(|| self.family.cmp(&other.family))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
            .then_with(|| self.visibility.cmp(&other.visibility))
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| self.count.cmp(&other.count))
            .then_with(|| other.deleted.cmp(&self.deleted))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ------------------------------------------------------------------------------------------------
// Value
// ------------------------------------------------------------------------------------------------

/// An opaque, immutable byte payload.
///
/// The buffer never interprets value bytes. The constructor takes
/// ownership of the supplied vector and does **not** copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    bytes: Vec<u8>,
}

impl Value {
    /// Wraps the given bytes. An owned `Vec<u8>` is taken as-is without
    /// copying; borrowed slices are copied by the `Into` conversion.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// The payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the value, returning the payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ------------------------------------------------------------------------------------------------
// Column Update
// ------------------------------------------------------------------------------------------------

/// A single column write within a [`Mutation`]: the column coordinates,
/// a timestamp, the tombstone flag, and the value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnUpdate {
    family: Vec<u8>,
    qualifier: Vec<u8>,
    visibility: Vec<u8>,
    timestamp: i64,
    deleted: bool,
    value: Vec<u8>,
}

impl ColumnUpdate {
    /// Column family bytes.
    pub fn family(&self) -> &[u8] {
        &self.family
    }

    /// Column qualifier bytes.
    pub fn qualifier(&self) -> &[u8] {
        &self.qualifier
    }

    /// Column visibility bytes.
    pub fn visibility(&self) -> &[u8] {
        &self.visibility
    }

    /// Version timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Whether this update is a delete.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Value bytes. Empty for deletes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

// ------------------------------------------------------------------------------------------------
// Mutation
// ------------------------------------------------------------------------------------------------

/// A row plus an ordered list of column updates, applied atomically with
/// respect to readers.
///
/// No reader ever observes a partial mutation: the buffer applies all of a
/// mutation's updates under one exclusive-lock hold and a single
/// modification-counter increment.
///
/// The row bytes are stored once and shared by every key the mutation
/// produces.
///
/// # Example
///
/// ```rust
/// use tabula::data::Mutation;
///
/// let mut m = Mutation::new(b"row1".to_vec());
/// m.put(b"cf".to_vec(), b"cq".to_vec(), b"".to_vec(), 42, b"v".to_vec());
/// m.delete(b"cf".to_vec(), b"old".to_vec(), b"".to_vec(), 42);
/// assert_eq!(m.size(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Mutation {
    row: Arc<[u8]>,
    updates: Vec<ColumnUpdate>,
}

impl Mutation {
    /// Creates an empty mutation on the given row.
    pub fn new(row: impl Into<Arc<[u8]>>) -> Self {
        Self {
            row: row.into(),
            updates: Vec::new(),
        }
    }

    /// Appends a column write.
    pub fn put(
        &mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        visibility: impl Into<Vec<u8>>,
        timestamp: i64,
        value: impl Into<Vec<u8>>,
    ) {
        self.updates.push(ColumnUpdate {
            family: family.into(),
            qualifier: qualifier.into(),
            visibility: visibility.into(),
            timestamp,
            deleted: false,
            value: value.into(),
        });
    }

    /// Appends a column delete (tombstone).
    pub fn delete(
        &mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        visibility: impl Into<Vec<u8>>,
        timestamp: i64,
    ) {
        self.updates.push(ColumnUpdate {
            family: family.into(),
            qualifier: qualifier.into(),
            visibility: visibility.into(),
            timestamp,
            deleted: true,
            value: Vec::new(),
        });
    }

    /// Row bytes.
    pub fn row(&self) -> &[u8] {
        &self.row
    }

    /// The shared row allocation, referenced by all keys this mutation
    /// produces.
    pub(crate) fn row_arc(&self) -> &Arc<[u8]> {
        &self.row
    }

    /// The ordered column updates.
    pub fn updates(&self) -> &[ColumnUpdate] {
        &self.updates
    }

    /// Number of column updates. Bulk writes sum this across mutations to
    /// pace exclusive-lock holds.
    pub fn size(&self) -> usize {
        self.updates.len()
    }

    /// Whether the mutation carries no updates.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}
