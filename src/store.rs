//! File-backed resource store
//!
//! A [`FileStore`] roots a tree of resources at a base directory and
//! hands out [`Resource`] handles for store-relative paths. The store is
//! cheap to clone; clones share the same base.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::TroveResult;
use crate::path;
use crate::resource::Resource;

/// Path-addressed resource store over a base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base: Arc<PathBuf>,
}

impl FileStore {
    /// Open a store rooted at `base`, creating the directory if needed.
    pub fn new(base: impl Into<PathBuf>) -> TroveResult<Self> {
        let base = base.into();
        std::fs::create_dir_all(&base)?;
        // Canonical base keeps location-to-path conversion stable when the
        // caller hands us a symlinked or relative directory.
        let base = base.canonicalize()?;
        Ok(Self {
            base: Arc::new(base),
        })
    }

    /// Base directory backing this store.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resource handle for a store path.
    ///
    /// The path is normalized and validated; the backing item need not
    /// exist (the resource reports `ResourceKind::Undefined` until it
    /// does). The empty path addresses the store root.
    pub fn get(&self, resource_path: &str) -> TroveResult<Resource> {
        let normalized = path::valid(resource_path)?;
        Ok(Resource::for_store(self.clone(), normalized))
    }

    /// Filesystem location of a store path.
    pub(crate) fn location(&self, resource_path: &str) -> PathBuf {
        path::to_file(&self.base, resource_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use tempfile::tempdir;

    #[test]
    fn new_creates_base_directory() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("store");
        let store = FileStore::new(&base).unwrap();
        assert!(base.is_dir());
        assert!(store.base().ends_with("store"));
    }

    #[test]
    fn get_normalizes_path() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let resource = store.get("styles//./default.css").unwrap();
        assert_eq!(resource.path(), "styles/default.css");
    }

    #[test]
    fn get_rejects_traversal() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.get("../outside").is_err());
    }

    #[test]
    fn get_missing_is_undefined() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let resource = store.get("no/such/item").unwrap();
        assert_eq!(resource.kind(), ResourceKind::Undefined);
    }

    #[test]
    fn empty_path_is_store_root() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let root = store.get("").unwrap();
        assert_eq!(root.kind(), ResourceKind::Directory);
    }
}
