//! Resource handles
//!
//! A [`Resource`] is a handle to a path-addressed item in a store: a
//! file, a directory, or nothing yet. Handles carry no state beyond the
//! path; the actual kind is probed from the filesystem on every call, so
//! it may legitimately change between calls.
//!
//! Two variants share the capability set: the store-backed resource
//! (crash-safe writes, navigation, locking) and a read-only single-file
//! adaptor for legacy call sites that hold a bare file path. The adaptor
//! supports no tree navigation and its writes are not atomic.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs2::FileExt;
use tracing::debug;

use crate::error::{TroveError, TroveResult};
use crate::fs::AtomicWriteFile;
use crate::path;
use crate::store::FileStore;

/// What a resource path currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A regular file
    File,
    /// A directory
    Directory,
    /// Nothing - the backing item does not exist
    Undefined,
}

/// Handle to a path-addressed item in a store.
#[derive(Debug, Clone)]
pub struct Resource {
    inner: Inner,
}

#[derive(Debug, Clone)]
enum Inner {
    /// Backed by a [`FileStore`] and addressed by a store path.
    Store { store: FileStore, path: String },
    /// Read-only adaptor over exactly one pre-existing file.
    Adaptor { file: PathBuf, path: String },
}

impl Resource {
    pub(crate) fn for_store(store: FileStore, resource_path: String) -> Self {
        Self {
            inner: Inner::Store {
                store,
                path: resource_path,
            },
        }
    }

    /// Adapt a bare file path as a read-only single-file resource.
    ///
    /// Fails before touching anything else if the file does not exist or
    /// is a directory. Navigation (`parent`, `get`, `dir`) is
    /// unsupported on the result, and `writer()` opens the real file
    /// directly with no atomicity guarantee.
    pub fn adapt(file: impl AsRef<Path>) -> TroveResult<Self> {
        let file = file.as_ref();
        if !file.exists() {
            return Err(TroveError::precondition(format!(
                "file '{}' required",
                file.display()
            )));
        }
        if file.is_dir() {
            return Err(TroveError::precondition(format!(
                "file required, '{}' is a directory",
                file.display()
            )));
        }
        let resource_path = file.to_string_lossy().replace('\\', "/");
        Ok(Self {
            inner: Inner::Adaptor {
                file: file.to_path_buf(),
                path: resource_path,
            },
        })
    }

    /// Store path of this resource.
    pub fn path(&self) -> &str {
        match &self.inner {
            Inner::Store { path, .. } => path,
            Inner::Adaptor { path, .. } => path,
        }
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        path::name(self.path())
    }

    /// Filesystem location backing this resource.
    pub(crate) fn location(&self) -> PathBuf {
        match &self.inner {
            Inner::Store { store, path } => store.location(path),
            Inner::Adaptor { file, .. } => file.clone(),
        }
    }

    /// Probe the current kind of the backing item.
    pub fn kind(&self) -> ResourceKind {
        let location = self.location();
        if location.is_dir() {
            ResourceKind::Directory
        } else if location.exists() {
            ResourceKind::File
        } else {
            ResourceKind::Undefined
        }
    }

    /// Open the backing file for reading.
    pub fn reader(&self) -> TroveResult<File> {
        if self.kind() == ResourceKind::Directory {
            return Err(TroveError::illegal_state(self.path(), "is a directory"));
        }
        Ok(File::open(self.location())?)
    }

    /// Open the resource for writing.
    ///
    /// On a store resource the bytes are staged in a sibling temp file
    /// and renamed into place on [`ResourceWriter::commit`]; on the
    /// adaptor the real file is opened directly.
    pub fn writer(&self) -> TroveResult<ResourceWriter> {
        if self.kind() == ResourceKind::Directory {
            return Err(TroveError::illegal_state(self.path(), "is a directory"));
        }
        match &self.inner {
            Inner::Store { .. } => {
                let location = self.location();
                if let Some(parent) = location.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(ResourceWriter {
                    inner: WriterInner::Atomic(AtomicWriteFile::create(&location)?),
                })
            }
            Inner::Adaptor { file, .. } => Ok(ResourceWriter {
                inner: WriterInner::Direct(File::create(file)?),
            }),
        }
    }

    /// Filesystem location, checked to be a regular file.
    pub fn file(&self) -> TroveResult<PathBuf> {
        match self.kind() {
            ResourceKind::File => Ok(self.location()),
            _ => Err(TroveError::illegal_state(self.path(), "not a file")),
        }
    }

    /// Filesystem location, checked to be a directory.
    ///
    /// Never supported on the single-file adaptor.
    pub fn dir(&self) -> TroveResult<PathBuf> {
        if let Inner::Adaptor { .. } = self.inner {
            return Err(TroveError::illegal_state(
                self.path(),
                "single-file adaptor cannot be used as a directory",
            ));
        }
        match self.kind() {
            ResourceKind::Directory => Ok(self.location()),
            _ => Err(TroveError::illegal_state(self.path(), "not a directory")),
        }
    }

    /// Parent resource.
    pub fn parent(&self) -> TroveResult<Resource> {
        match &self.inner {
            Inner::Store { store, path } => match path::parent(path) {
                Some(parent) => Ok(Resource::for_store(store.clone(), parent.to_string())),
                None => Err(TroveError::illegal_state(path.clone(), "store root has no parent")),
            },
            Inner::Adaptor { path, .. } => Err(TroveError::illegal_state(
                path.clone(),
                "single-file adaptor does not support parent()",
            )),
        }
    }

    /// Child resource by relative path.
    pub fn get(&self, child: &str) -> TroveResult<Resource> {
        match &self.inner {
            Inner::Store { store, path } => {
                let joined = if path.is_empty() {
                    child.to_string()
                } else {
                    format!("{path}/{child}")
                };
                store.get(&joined)
            }
            Inner::Adaptor { path, .. } => Err(TroveError::illegal_state(
                path.clone(),
                "single-file adaptor does not support get()",
            )),
        }
    }

    /// Child resources of a directory.
    ///
    /// Returns an empty list for anything that is not a directory,
    /// including the single-file adaptor.
    pub fn list(&self) -> Vec<Resource> {
        let Inner::Store { store, path } = &self.inner else {
            return Vec::new();
        };
        if self.kind() != ResourceKind::Directory {
            return Vec::new();
        }
        let entries = match fs::read_dir(self.location()) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %path, error = %e, "could not list resource");
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let child = if path.is_empty() {
                    name
                } else {
                    format!("{path}/{name}")
                };
                Resource::for_store(store.clone(), child)
            })
            .collect()
    }

    /// Modification time of the backing item, if it exists.
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(self.location())
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Acquire an advisory lock on this resource.
    ///
    /// The store variant takes an exclusive lock on a sibling `.lock`
    /// file, released when the returned guard drops. The adaptor returns
    /// a no-op guard: no real mutual exclusion (documented limitation of
    /// the legacy shim).
    pub fn lock(&self) -> TroveResult<ResourceLock> {
        match &self.inner {
            Inner::Store { .. } => {
                let lock_path = self.location().with_extension("lock");
                if let Some(parent) = lock_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = File::create(&lock_path)?;
                file.lock_exclusive()?;
                Ok(ResourceLock {
                    inner: LockInner::Exclusive {
                        file,
                        path: lock_path,
                    },
                })
            }
            Inner::Adaptor { .. } => Ok(ResourceLock {
                inner: LockInner::Noop,
            }),
        }
    }

    /// Delete the backing item, recursively for directories.
    ///
    /// Best-effort: individual failures are logged, and the returned
    /// flag reports whether everything was removed. Deleting an absent
    /// item succeeds.
    pub fn delete(&self) -> TroveResult<bool> {
        match &self.inner {
            Inner::Store { .. } => Ok(crate::fs::remove(&self.location())),
            Inner::Adaptor { path, .. } => Err(TroveError::illegal_state(
                path.clone(),
                "single-file adaptor does not support delete()",
            )),
        }
    }

    /// Move the backing item over another store resource's location.
    pub fn rename_to(&self, dest: &Resource) -> TroveResult<()> {
        match (&self.inner, &dest.inner) {
            (Inner::Store { .. }, Inner::Store { .. }) => {
                let target = dest.location();
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                crate::fs::move_file(&self.location(), &target)
            }
            _ => Err(TroveError::illegal_state(
                self.path(),
                "single-file adaptor does not support rename_to()",
            )),
        }
    }
}

/// Writer handle returned by [`Resource::writer`].
pub struct ResourceWriter {
    inner: WriterInner,
}

enum WriterInner {
    Atomic(AtomicWriteFile),
    Direct(File),
}

impl ResourceWriter {
    /// Finish the write.
    ///
    /// For a store resource this renames the staged temp file over the
    /// target; until then readers see the previous content. For the
    /// adaptor this is a flush.
    pub fn commit(self) -> TroveResult<()> {
        match self.inner {
            WriterInner::Atomic(atomic) => atomic.commit(),
            WriterInner::Direct(mut file) => {
                file.flush()?;
                Ok(())
            }
        }
    }
}

impl Write for ResourceWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            WriterInner::Atomic(atomic) => atomic.write(buf),
            WriterInner::Direct(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            WriterInner::Atomic(atomic) => atomic.flush(),
            WriterInner::Direct(file) => file.flush(),
        }
    }
}

/// Scoped advisory lock, released on drop.
pub struct ResourceLock {
    inner: LockInner,
}

enum LockInner {
    Exclusive { file: File, path: PathBuf },
    Noop,
}

impl Drop for ResourceLock {
    fn drop(&mut self) {
        if let LockInner::Exclusive { file, path } = &self.inner {
            let _ = file.unlock();
            let _ = fs::remove_file(path);
        }
    }
}
