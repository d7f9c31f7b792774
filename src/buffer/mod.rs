//! # Write Buffer
//!
//! The concurrency envelope around the ordered map: one reader/writer
//! lock, the modification counter, the Live/Closed lifecycle, and the
//! process-wide allocation bookkeeping.
//!
//! ## Design Invariants
//!
//! - Writers hold the exclusive lock; readers share the lock and may
//!   proceed concurrently.
//! - The modification counter increments exactly once per externally
//!   visible write event: one [`WriteBuffer::put`], or one lock hold of a
//!   bulk [`WriteBuffer::mutate`] batch. It is monotonic and observed only
//!   under the lock.
//! - All column updates of one mutation become visible atomically at the
//!   counter increment; no reader observes a partial mutation.
//! - Bulk writes release and reacquire the exclusive lock every
//!   [`MUTATION_BATCH_UPDATES`] column updates so a long mutation list
//!   cannot starve readers.
//! - After [`WriteBuffer::close`], every operation except `close` itself
//!   fails with [`BufferError::Closed`]. Close is idempotent.
//!
//! ## Resource Discipline
//!
//! A buffer is a long-lived, fleet-wide resource: explicit `close` is the
//! normal teardown path and eagerly releases the map's memory. Dropping an
//! unclosed buffer still reclaims it, but is logged as a warning — the
//! shutdown diagnostic in [`registry`] exists to surface exactly those
//! leaks.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{error, info, trace, warn};

use crate::data::{Key, Mutation, Value};
use crate::map::OrderedMap;

pub mod registry;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Column updates applied per exclusive-lock hold in bulk [`WriteBuffer::mutate`].
///
/// One lock per update wrecks write throughput; one lock for the whole
/// list starves readers. Ten updates per hold balances the two under
/// observed tablet workloads.
pub const MUTATION_BATCH_UPDATES: usize = 10;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by [`WriteBuffer`] operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The buffer has been closed; the operation was rejected.
    #[error("Write buffer is closed")]
    Closed,

    /// Internal invariant violation or poisoned lock.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Write Buffer
// ------------------------------------------------------------------------------------------------

/// Shared state under the reader/writer lock.
pub(crate) struct BufferInner {
    /// The sorted entries.
    pub(crate) map: OrderedMap,

    /// Modification counter; see the module invariants.
    pub(crate) mod_count: u64,

    /// Lifecycle flag. Set once by `close`, never cleared.
    closed: bool,
}

/// The in-memory sorted write buffer of a single tablet.
///
/// Accumulates recent mutations before they are flushed to immutable
/// on-disk files by machinery outside this crate. Readers merge this live
/// buffer with on-disk data through the scan surface in [`crate::scan`].
///
/// # Concurrency
/// - `put`, `mutate`, and `close` take the exclusive lock.
/// - `get`, `size`, `memory_used`, and scan-cursor refills take the
///   shared lock.
///
/// # Lifecycle
/// Construction registers the buffer in the process-wide allocation
/// registry; `close` deregisters it. The registry's shutdown report counts
/// buffers that were never closed.
pub struct WriteBuffer {
    inner: RwLock<BufferInner>,

    /// Allocation identity, unique for the lifetime of the process.
    id: u64,
}

impl WriteBuffer {
    /// Creates an empty buffer and registers its allocation identity.
    pub fn new() -> Self {
        let id = registry::register();
        info!("write buffer {} created", id);

        Self {
            inner: RwLock::new(BufferInner {
                map: OrderedMap::new(),
                mod_count: 0,
                closed: false,
            }),
            id,
        }
    }

    /// Applies a single mutation as one write event.
    ///
    /// Every column update is tagged with the caller-supplied `count`;
    /// all updates become visible atomically. A mutation with no updates
    /// is a no-op and does not bump the modification counter.
    pub fn put(&self, mutation: &Mutation, count: u32) -> Result<(), BufferError> {
        trace!(
            "put() started, row: {}, updates: {}, count: {}",
            HexRow(mutation.row()),
            mutation.size(),
            count
        );

        if mutation.is_empty() {
            return Ok(());
        }

        let mut guard = self.write_inner()?;
        guard.map.apply_mutation(mutation, count);
        guard.mod_count += 1;

        Ok(())
    }

    /// Applies a list of mutations, handing out one `count` per mutation
    /// starting at `start_count`. Returns the next unused count.
    ///
    /// The exclusive lock is released and reacquired every
    /// [`MUTATION_BATCH_UPDATES`] column updates (summed over
    /// [`Mutation::size`]); each lock hold is one write event. Mutations
    /// in earlier batches are fully visible before mutations in later
    /// batches.
    ///
    /// Counts within one bulk call are unique and increasing in list
    /// order, which preserves column-update order through ordered
    /// traversal.
    pub fn mutate(&self, mutations: &[Mutation], start_count: u32) -> Result<u32, BufferError> {
        trace!(
            "mutate() started, mutations: {}, start count: {}",
            mutations.len(),
            start_count
        );

        let mut count = start_count;
        let mut index = 0;

        while index < mutations.len() {
            let mut guard = self.write_inner()?;

            let mut applied = 0;
            while index < mutations.len() && applied < MUTATION_BATCH_UPDATES {
                let mutation = &mutations[index];
                guard.map.apply_mutation(mutation, count);
                applied += mutation.size();
                count = count.wrapping_add(1);
                index += 1;
            }

            guard.mod_count += 1;
        }

        Ok(count)
    }

    /// Exact lookup over all seven key attributes.
    ///
    /// An absent key is `Ok(None)`, not an error.
    pub fn get(&self, key: &Key) -> Result<Option<Value>, BufferError> {
        let guard = self.read_inner()?;
        Ok(guard.map.get(key).cloned())
    }

    /// Number of entries.
    pub fn size(&self) -> Result<usize, BufferError> {
        let guard = self.read_inner()?;
        Ok(guard.map.len())
    }

    /// Approximate resident bytes of keys, values, and structural
    /// overhead.
    pub fn memory_used(&self) -> Result<usize, BufferError> {
        let guard = self.read_inner()?;
        Ok(guard.map.memory_used())
    }

    /// Transitions the buffer to Closed, releasing the map's memory and
    /// deregistering the allocation identity.
    ///
    /// Idempotent: closing an already-closed buffer is a no-op. Any
    /// cursor over the buffer fails with [`BufferError::Closed`] on its
    /// next refill.
    pub fn close(&self) -> Result<(), BufferError> {
        let mut guard = self.inner.write().map_err(|_| {
            error!("Read-write lock poisoned during close");
            BufferError::Internal("Read-write lock poisoned".into())
        })?;

        if guard.closed {
            return Ok(());
        }

        guard.closed = true;
        guard.map.clear();
        registry::deregister(self.id);
        info!("write buffer {} closed", self.id);

        Ok(())
    }

    /// Allocation identity assigned at construction.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Shared-lock snapshot of the inner state, for cursor construction
    /// and refills.
    pub(crate) fn read_inner(&self) -> Result<RwLockReadGuard<'_, BufferInner>, BufferError> {
        let guard = self.inner.read().map_err(|_| {
            error!("Read-write lock poisoned during read");
            BufferError::Internal("Read-write lock poisoned".into())
        })?;

        if guard.closed {
            return Err(BufferError::Closed);
        }

        Ok(guard)
    }

    /// Exclusive-lock access to the inner state.
    fn write_inner(&self) -> Result<RwLockWriteGuard<'_, BufferInner>, BufferError> {
        let guard = self.inner.write().map_err(|_| {
            error!("Read-write lock poisoned during write");
            BufferError::Internal("Read-write lock poisoned".into())
        })?;

        if guard.closed {
            return Err(BufferError::Closed);
        }

        Ok(guard)
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WriteBuffer {
    /// Reclamation safety net for buffers dropped without `close`.
    ///
    /// The explicit close path is the normal one; landing here indicates
    /// a leak in the owning server and is logged as such.
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !inner.closed {
            warn!("write buffer {} dropped without close; reclaiming", self.id);
            inner.closed = true;
            inner.map.clear();
            registry::deregister(self.id);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Tracing Helper
// ------------------------------------------------------------------------------------------------

/// Hex-truncating display adapter for row bytes in log statements.
struct HexRow<'a>(&'a [u8]);

impl<'a> std::fmt::Display for HexRow<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.len() <= 32 {
            for byte in self.0 {
                write!(f, "{:02x}", byte)?;
            }
        } else {
            for byte in &self.0[..16] {
                write!(f, "{:02x}", byte)?;
            }
            write!(f, "...[{} bytes]", self.0.len())?;
        }
        Ok(())
    }
}
