//! Trove - path-addressed resource store with polling change notification
//!
//! Trove hands an application a portable view of a directory tree:
//! every item is addressed by a store-relative `/`-separated path and
//! handled through a [`Resource`] exposing streams, metadata, children
//! and an advisory lock. Writes stage into a sibling temp file and
//! rename into place on commit, so a reader never observes a partially
//! written target. A [`PollWatcher`] tells registered listeners which
//! paths changed since the last poll - eventual, bounded-delay
//! notification, not event-driven immediacy.

pub mod error;
pub mod fs;
pub mod notification;
pub mod path;
pub mod resource;
pub mod store;
pub mod watcher;

// Re-exports for convenience
pub use error::{TroveError, TroveResult};
pub use fs::{move_file, remove, AtomicWriteFile};
pub use notification::ResourceNotification;
pub use resource::{Resource, ResourceKind, ResourceLock, ResourceWriter};
pub use store::FileStore;
pub use watcher::{PollWatcher, ResourceListener, DEFAULT_POLL_INTERVAL};
