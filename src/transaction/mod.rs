//! # Change Tracking
//!
//! A transactional storage records, per element, what the element looked
//! like before the first mutation of the current cycle. `commit()` diffs
//! those snapshots against the live values and emits one [`ChangeRecord`]
//! per `(field, element)` that actually changed.
//!
//! ## State Machine
//!
//! ```text
//!            first write / clear to element e
//!   Idle ───────────────────────────────────────> Dirty
//!    ^          (snapshot of e captured once)       │
//!    │                                              │ further writes:
//!    │                commit() / rollback()         │ no new snapshot
//!    └──────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - at most one record per `(field, element)` per commit
//! - `old` is the value at snapshot time, `new` the value at commit time
//! - writes that leave a field unchanged produce no record, even though
//!   they still captured a snapshot
//! - records are ordered by element, then by compiled field index
//! - object fields are never diffed
//!
//! Commit on a non-transactional storage is an error, not a no-op.

mod change;
mod commit_log;

pub use change::ChangeRecord;
pub use commit_log::{CommitLog, ElementState, Snapshot};
