//! # Tabula
//!
//! A **concurrent, in-memory sorted write buffer** for tablet storage
//! engines. A single tablet accumulates recent mutations here before they
//! are flushed to immutable on-disk files; reads against the tablet merge
//! this live buffer with on-disk data through the scan surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      WriteBuffer                        │
//! │   writers ──► exclusive lock ──► OrderedMap             │
//! │                  │                  ▲                   │
//! │                  ▼                  │ shared lock       │
//! │          modification counter       │                   │
//! │                                     │                   │
//! │  ┌──────────────┐   ┌─────────────┐ │                   │
//! │  │ RangeScanner │◄──│ BatchCursor │◄┴── RawCursor       │
//! │  │ (seek / top /│   │ (read-ahead │     (forward        │
//! │  │  interrupt)  │   │  ring)      │      cursor)        │
//! │  └──────────────┘   └─────────────┘                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`data`] | Cell keys, values, and mutations — the vocabulary types |
//! | [`map`] | The sorted container and its raw forward cursor |
//! | [`buffer`] | The concurrency envelope: lock, counter, lifecycle, allocation registry |
//! | [`scan`] | Batched read-ahead and the range-bounded, interruptible scan surface |
//!
//! ## Key Features
//!
//! - **Multi-attribute keys** — `(row, family, qualifier, visibility,
//!   timestamp, deleted, count)` with timestamp-descending ordering, so
//!   the newest version of a cell is scanned first.
//! - **Atomic mutations** — all column updates of one mutation become
//!   visible at a single modification-counter increment; no reader ever
//!   observes a partial mutation.
//! - **Batched read-ahead scans** — cursors drain entries in adaptive
//!   batches under one shared-lock hold, amortising lock traffic across
//!   many concurrent readers.
//! - **Transparent write recovery** — a scan invalidated by concurrent
//!   writes re-seeks at its last returned key and continues with no
//!   duplicates and no skips.
//! - **Cooperative cancellation** — scans poll a shared interrupt flag,
//!   so a server can abort long scans without deadlocking writers.
//! - **Leak diagnostics** — every buffer registers a process-wide
//!   allocation identity; a shutdown hook reports buffers that were never
//!   closed.
//!
//! ## Quick Start
//!
//! ```rust
//! use tabula::buffer::WriteBuffer;
//! use tabula::data::Mutation;
//! use tabula::scan::{RangeScanner, ScanRange};
//!
//! let buffer = WriteBuffer::new();
//!
//! // Write one row with two columns, atomically.
//! let mut m = Mutation::new(b"row1".to_vec());
//! m.put(b"cf".to_vec(), b"name".to_vec(), b"".to_vec(), 1, b"alpha".to_vec());
//! m.put(b"cf".to_vec(), b"size".to_vec(), b"".to_vec(), 1, b"42".to_vec());
//! buffer.put(&m, 1).unwrap();
//!
//! // Scan it back in key order.
//! let mut scanner = RangeScanner::new(&buffer);
//! scanner.seek(ScanRange::all(), &[], false).unwrap();
//! while scanner.has_top() {
//!     let key = scanner.top_key().unwrap();
//!     let value = scanner.top_value().unwrap();
//!     println!("{:?} -> {:?}", key.qualifier(), value.as_bytes());
//!     scanner.next().unwrap();
//! }
//!
//! // Graceful teardown.
//! buffer.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod buffer;
pub mod data;
pub mod map;
pub mod scan;
