//! Change watching via periodic polling
//!
//! A [`PollWatcher`] owns a set of (path, listener) watches and a single
//! background worker that wakes on a fixed delay, diffs every watch
//! against the filesystem, and dispatches a notification per changed
//! watch. The worker exists only while at least one watch is registered.
//!
//! This is deliberately a portable polling design: latency is bounded by
//! the poll interval, delivery is best-effort and in-memory only.

mod poll;
mod record;

pub use poll::{PollWatcher, DEFAULT_POLL_INTERVAL};

use crate::notification::ResourceNotification;

/// Callback capability invoked when a watched path changes.
///
/// Called sequentially from the poll worker; a panic here is caught at
/// the dispatch boundary and never disturbs other listeners or later
/// polls.
pub trait ResourceListener: Send + Sync {
    /// Notification of changes to the watched path since the last poll.
    fn changed(&self, notification: &ResourceNotification);
}
