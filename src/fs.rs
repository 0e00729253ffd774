//! Crash-safe file operations
//!
//! Helpers for store implementations: write-then-rename, move with
//! overwrite, recursive best-effort delete. A concurrent reader never
//! observes a partially written target; an interrupted write leaves the
//! original file untouched.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{TroveError, TroveResult};

/// Staged write to a sibling `<name>.tmp` file.
///
/// Bytes go to the temp file until [`commit`](AtomicWriteFile::commit)
/// renames it over the target. Dropping the writer without committing
/// removes the temp file and leaves the target untouched.
pub struct AtomicWriteFile {
    target: PathBuf,
    temp: PathBuf,
    file: Option<File>,
}

impl AtomicWriteFile {
    /// Open a staged writer for `target`.
    ///
    /// A stale temp file from an earlier interrupted write is replaced.
    pub fn create(target: &Path) -> TroveResult<Self> {
        let name = target
            .file_name()
            .ok_or_else(|| TroveError::precondition("write target has no file name"))?;
        let mut temp_name = name.to_os_string();
        temp_name.push(".tmp");
        let temp = target.with_file_name(temp_name);

        if temp.exists() {
            fs::remove_file(&temp)?;
        }
        let file = File::create(&temp)?;
        Ok(Self {
            target: target.to_path_buf(),
            temp,
            file: Some(file),
        })
    }

    /// Flush the staged bytes and rename the temp file over the target.
    pub fn commit(mut self) -> TroveResult<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        move_file(&self.temp, &self.target)
    }
}

impl Write for AtomicWriteFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("write after commit")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for AtomicWriteFile {
    fn drop(&mut self) {
        // Not committed: abandon the staged bytes, keep the target as-is.
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Move (rename) `source` to `dest`.
///
/// Succeeds without touching the filesystem when both resolve to the same
/// canonical location. On platforms where rename cannot replace an
/// existing destination, the destination is deleted first. Errors if the
/// source is missing (before any mutation), if the pre-delete fails, or
/// if the rename itself fails.
pub fn move_file(source: &Path, dest: &Path) -> TroveResult<()> {
    if !source.exists() {
        return Err(TroveError::precondition(format!(
            "move source '{}' does not exist",
            source.display()
        )));
    }
    if dest.as_os_str().is_empty() {
        return Err(TroveError::precondition("move destination is empty"));
    }

    // Same canonical location: nothing to do.
    if dest.exists() {
        if let (Ok(src), Ok(dst)) = (source.canonicalize(), dest.canonicalize()) {
            if src == dst {
                return Ok(());
            }
        }
    }

    // Windows cannot rename onto an existing file.
    if cfg!(windows) && dest.exists() {
        fs::remove_file(dest).map_err(|e| TroveError::MoveFailed {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            message: format!("unable to remove existing destination: {e}"),
        })?;
    }

    fs::rename(source, dest).map_err(|e| TroveError::MoveFailed {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        message: e.to_string(),
    })
}

/// Delete a file or directory tree.
///
/// Directories are emptied first, then removed. Deleting an item that is
/// already absent succeeds. Individual failures are logged and folded
/// into the returned flag: `true` means everything is gone.
pub fn remove(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    if path.is_dir() {
        let clean = empty_directory(path);
        match fs::remove_dir(path) {
            Ok(()) => clean,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not remove directory");
                false
            }
        }
    } else {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not delete");
                false
            }
        }
    }
}

/// Delete the contents of a directory, recursing into subdirectories.
fn empty_directory(directory: &Path) -> bool {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %directory.display(), error = %e, "could not list directory");
            return false;
        }
    };

    let mut all_clean = true;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %directory.display(), error = %e, "could not read entry");
                all_clean = false;
                continue;
            }
        };
        let child = entry.path();
        if child.is_dir() {
            all_clean &= remove(&child);
        } else if let Err(e) = fs::remove_file(&child) {
            warn!(path = %child.display(), error = %e, "could not delete");
            all_clean = false;
        }
    }
    all_clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_commit() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("config.txt");

        let mut out = AtomicWriteFile::create(&target).unwrap();
        out.write_all(b"fully written").unwrap();
        out.commit().unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "fully written");
        assert!(!dir.path().join("config.txt.tmp").exists());
    }

    #[test]
    fn atomic_write_stages_in_sibling_tmp() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("config.txt");

        let mut out = AtomicWriteFile::create(&target).unwrap();
        out.write_all(b"staged").unwrap();
        out.flush().unwrap();

        // Before commit the target does not exist; the temp sibling does.
        assert!(!target.exists());
        assert!(dir.path().join("config.txt.tmp").exists());
        out.commit().unwrap();
        assert!(target.exists());
    }

    #[test]
    fn atomic_write_abandoned_leaves_original() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("config.txt");
        fs::write(&target, "original").unwrap();

        {
            let mut out = AtomicWriteFile::create(&target).unwrap();
            out.write_all(b"half-writ").unwrap();
            // Dropped without commit: interrupted write.
        }

        assert_eq!(fs::read_to_string(&target).unwrap(), "original");
        assert!(!dir.path().join("config.txt.tmp").exists());
    }

    #[test]
    fn atomic_write_replaces_stale_tmp() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("config.txt");
        fs::write(dir.path().join("config.txt.tmp"), "stale").unwrap();

        let mut out = AtomicWriteFile::create(&target).unwrap();
        out.write_all(b"fresh").unwrap();
        out.commit().unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "fresh");
    }

    #[test]
    fn move_same_file_is_noop() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("keep.txt");
        fs::write(&file, "content").unwrap();
        let modified = fs::metadata(&file).unwrap().modified().unwrap();

        move_file(&file, &file).unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "content");
        assert_eq!(fs::metadata(&file).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn move_missing_source_fails_fast() {
        let dir = tempdir().unwrap();
        let result = move_file(&dir.path().join("absent"), &dir.path().join("dest"));
        assert!(matches!(result, Err(TroveError::Precondition { .. })));
    }

    #[test]
    fn move_replaces_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("new.txt");
        let dest = dir.path().join("old.txt");
        fs::write(&source, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        move_file(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn remove_absent_is_idempotent() {
        let dir = tempdir().unwrap();
        assert!(remove(&dir.path().join("never-existed")));
    }

    #[test]
    fn remove_deletes_nested_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), "x").unwrap();
        fs::write(root.join("a/mid.txt"), "y").unwrap();
        fs::write(root.join("a/b/leaf.txt"), "z").unwrap();

        assert!(remove(&root));
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn remove_reports_partial_completion() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path().join("tree");
        let sealed = root.join("sealed");
        fs::create_dir_all(&sealed).unwrap();
        fs::write(root.join("ok.txt"), "x").unwrap();
        fs::write(sealed.join("stuck.txt"), "y").unwrap();

        // Read-only directory: its entry cannot be unlinked.
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o555)).unwrap();

        let clean = remove(&root);

        // Restore so tempdir cleanup can finish.
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!clean);
        assert!(sealed.join("stuck.txt").exists());
        assert!(!root.join("ok.txt").exists());
    }
}
