//! Necker store: per-type event aggregators, single-object blame attribution,
//! and the manager that runs one aggregator per target type.

#![forbid(unsafe_code)]

mod aggregator;
mod blame;
mod lifecycle;
mod manager;
pub mod export;

pub use aggregator::Aggregator;
pub use blame::BlameAttributor;
pub use lifecycle::Phase;
pub use manager::{StartFailure, WatcherManager};

/// What happened to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Counted,
    /// Rejected by the object or namespace selector.
    Filtered,
    /// Replayed `Add` for an object that predates the start.
    Backfill,
    /// Namespace labels could not be read; event dropped.
    LookupFailed,
    /// No ownership claim newer than the high-water mark.
    Stale,
    /// Event kind or object not tracked by this watcher.
    Ignored,
    /// Watcher not running.
    Inactive,
}
