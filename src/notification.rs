//! Change notifications
//!
//! A [`ResourceNotification`] is an immutable delta of changed store
//! paths. A listener on a single file receives that file's path; a
//! listener on a directory receives the added and removed children by
//! name plus the directory's own path when content inside it changed.
//! Deleted paths still appear in the delta - they resolve back to a
//! resource of kind `Undefined`.

use std::path::Path;

use tracing::warn;

use crate::error::{TroveError, TroveResult};
use crate::path;
use crate::resource::Resource;
use crate::store::FileStore;

/// Immutable set of changed paths, tied to the store they belong to.
#[derive(Debug, Clone)]
pub struct ResourceNotification {
    store: FileStore,
    delta: Vec<String>,
}

impl ResourceNotification {
    /// Notification of a change to a single resource.
    pub fn single(store: &FileStore, resource_path: &str) -> Self {
        Self {
            store: store.clone(),
            delta: vec![resource_path.to_string()],
        }
    }

    /// Notification built from an unordered set of changed paths.
    ///
    /// The delta is sorted lexicographically. Paths are taken as given;
    /// keeping them distinct is the producer's responsibility.
    pub fn from_paths(store: &FileStore, paths: impl IntoIterator<Item = String>) -> Self {
        let mut delta: Vec<String> = paths.into_iter().collect();
        delta.sort();
        Self {
            store: store.clone(),
            delta,
        }
    }

    /// Notification built from changed filesystem items under a base
    /// directory.
    ///
    /// Items are converted to store paths in discovery order - this
    /// shape is not sorted. Items outside the base directory are skipped.
    pub fn from_items(store: &FileStore, base: &Path, items: &[std::path::PathBuf]) -> Self {
        let delta = items
            .iter()
            .filter_map(|item| {
                let converted = path::convert(base, item);
                if converted.is_none() {
                    warn!(item = %item.display(), "changed item outside store base, skipped");
                }
                converted
            })
            .collect();
        Self {
            store: store.clone(),
            delta,
        }
    }

    /// Paths of changed resources.
    pub fn delta(&self) -> &[String] {
        &self.delta
    }

    /// The first changed resource from [`delta`](Self::delta).
    ///
    /// A deleted path resolves to a resource of kind `Undefined`.
    pub fn resource(&self) -> TroveResult<Resource> {
        let first = self
            .delta
            .first()
            .ok_or_else(|| TroveError::precondition("notification delta is empty"))?;
        self.store.get(first)
    }
}
