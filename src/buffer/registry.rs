//! Process-wide allocation bookkeeping for write buffers.
//!
//! Every [`WriteBuffer`](super::WriteBuffer) registers a unique identity
//! at construction and deregisters it on close (or through the drop
//! safety net). The registry backs a shutdown diagnostic: a server calls
//! [`log_shutdown_report`] during teardown to surface buffers that were
//! never closed, together with the cumulative allocation count.
//!
//! Duplicate registration of one identity means the bookkeeping itself is
//! corrupt; that is an internal-consistency violation and aborts via
//! panic rather than being reported as a recoverable error.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, info, warn};

// ------------------------------------------------------------------------------------------------
// Registry State
// ------------------------------------------------------------------------------------------------

/// Source of allocation identities, unique per process lifetime.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    live: Vec::new(),
    allocated: 0,
});

struct Registry {
    /// Identities of buffers that are registered and not yet closed.
    live: Vec<u64>,

    /// Cumulative count of buffers ever allocated.
    allocated: u64,
}

/// The registry must stay usable even if a panicking thread poisoned the
/// mutex; the state is a plain id list with no broken-invariant window.
fn lock() -> std::sync::MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ------------------------------------------------------------------------------------------------
// Registration
// ------------------------------------------------------------------------------------------------

/// Allocates a fresh identity and registers it as live.
///
/// # Panics
/// If the identity is already registered. Identities are handed out by a
/// monotonic counter, so a duplicate means the bookkeeping is corrupt;
/// continuing would make the leak diagnostic meaningless.
pub(crate) fn register() -> u64 {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let mut registry = lock();

    if registry.live.contains(&id) {
        error!(id, "duplicate write buffer identity");
        panic!("duplicate write buffer identity: {id}");
    }

    registry.live.push(id);
    registry.allocated += 1;
    id
}

/// Removes an identity from the live set.
pub(crate) fn deregister(id: u64) {
    let mut registry = lock();

    match registry.live.iter().position(|&live| live == id) {
        Some(index) => {
            registry.live.swap_remove(index);
        }
        None => {
            warn!(id, "deregister of unknown write buffer identity");
        }
    }
}

/// Whether an identity is currently registered as live.
pub(crate) fn contains(id: u64) -> bool {
    lock().live.contains(&id)
}

// ------------------------------------------------------------------------------------------------
// Diagnostics
// ------------------------------------------------------------------------------------------------

/// Count of registered, un-closed buffers.
pub fn live_buffers() -> usize {
    lock().live.len()
}

/// Cumulative count of buffers ever allocated in this process.
pub fn total_allocated() -> u64 {
    lock().allocated
}

/// Teardown diagnostic hook.
///
/// Logs the count of un-closed buffers and the cumulative allocation
/// count. Intended to be called once by the owning server during process
/// shutdown; an unclosed count above zero indicates a leak.
pub fn log_shutdown_report() {
    let registry = lock();

    if registry.live.is_empty() {
        info!(
            allocated = registry.allocated,
            "all write buffers closed at shutdown"
        );
    } else {
        warn!(
            unclosed = registry.live.len(),
            allocated = registry.allocated,
            "write buffers left unclosed at shutdown"
        );
    }
}
