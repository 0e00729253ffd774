//! Per-watch baseline state and the poll diff
//!
//! A [`Watch`] pairs a store path with a listener and remembers what the
//! path looked like at the last poll: a `checked` timestamp (`None`
//! means known absent) and, for directories, the child listing. The
//! diff advances the baseline every tick regardless of outcome.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::ResourceListener;
use crate::path;

/// Record of a listener that wishes to be notified of changes to a path.
///
/// Identity is the (path, listener) pair; the baseline fields are
/// mutated only by the poll worker.
#[derive(Clone)]
pub(crate) struct Watch {
    pub(crate) path: String,
    pub(crate) listener: Arc<dyn ResourceListener>,
    location: PathBuf,
    checked: Option<SystemTime>,
    contents: Vec<PathBuf>,
}

impl Watch {
    pub(crate) fn new(base: &Path, watch_path: String, listener: Arc<dyn ResourceListener>) -> Self {
        let location = path::to_file(base, &watch_path);
        let checked = if location.exists() {
            Some(SystemTime::now())
        } else {
            None
        };
        let contents = if location.is_dir() {
            list_children(&location)
        } else {
            Vec::new()
        };
        Self {
            path: watch_path,
            listener,
            location,
            checked,
            contents,
        }
    }

    /// Identity check over exactly (path, listener).
    pub(crate) fn matches(&self, watch_path: &str, listener: &Arc<dyn ResourceListener>) -> bool {
        self.path == watch_path && Arc::ptr_eq(&self.listener, listener)
    }

    /// Copy the advanced baseline from a polled snapshot of this record.
    pub(crate) fn adopt_baseline(&mut self, polled: &Watch) {
        self.checked = polled.checked;
        self.contents = polled.contents.clone();
    }

    /// Diff this watch against the filesystem and advance the baseline.
    ///
    /// Returns the changed filesystem items, empty when nothing changed.
    pub(crate) fn changed(&mut self, now: SystemTime) -> Vec<PathBuf> {
        if !self.location.exists() {
            if self.checked.is_some() {
                // Deleted since the last poll: report once, then stay quiet
                // until it reappears.
                self.checked = None;
                self.contents.clear();
                return vec![self.location.clone()];
            }
            return Vec::new();
        }

        let mark = self.checked;
        self.checked = Some(now);

        if self.location.is_file() {
            if newer(mtime(&self.location), mark) {
                return vec![self.location.clone()];
            }
            return Vec::new();
        }

        if self.location.is_dir() {
            let current = list_children(&self.location);
            let previous = std::mem::replace(&mut self.contents, current.clone());

            let mut delta: Vec<PathBuf> = Vec::new();
            for former in &previous {
                if !current.contains(former) {
                    delta.push(former.clone());
                }
            }
            for child in &current {
                if !previous.contains(child) {
                    delta.push(child.clone());
                }
            }
            let structural = !delta.is_empty();

            // A child present across both listings with a newer mtime means
            // content changed inside: reported as "the directory changed".
            let mut directory_changed = current
                .iter()
                .filter(|child| previous.contains(*child))
                .any(|child| newer(mtime(child), mark));

            // The directory's own timestamp also advances whenever a child
            // is added or removed; only report it when no structural entry
            // already accounts for the change.
            if !structural && newer(mtime(&self.location), mark) {
                directory_changed = true;
            }

            if directory_changed {
                delta.push(self.location.clone());
            }
            return delta;
        }

        Vec::new()
    }
}

fn list_children(location: &Path) -> Vec<PathBuf> {
    let mut children: Vec<PathBuf> = match fs::read_dir(location) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    };
    children.sort();
    children
}

fn mtime(location: &Path) -> Option<SystemTime> {
    fs::metadata(location).and_then(|meta| meta.modified()).ok()
}

fn newer(modified: Option<SystemTime>, mark: Option<SystemTime>) -> bool {
    match (modified, mark) {
        (Some(modified), Some(mark)) => modified > mark,
        // No baseline: the item appeared since we last knew anything.
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::tests::NullListener;
    use filetime::{set_file_mtime, FileTime};
    use std::time::Duration;
    use tempfile::tempdir;

    fn future_mtime() -> FileTime {
        FileTime::from_system_time(SystemTime::now() + Duration::from_secs(5))
    }

    #[test]
    fn file_change_detected_by_mtime() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("data.txt"), "v1").unwrap();

        let mut watch = Watch::new(dir.path(), "data.txt".into(), Arc::new(NullListener));
        assert!(watch.changed(SystemTime::now()).is_empty());

        fs::write(dir.path().join("data.txt"), "v2").unwrap();
        set_file_mtime(dir.path().join("data.txt"), future_mtime()).unwrap();

        let delta = watch.changed(SystemTime::now());
        assert_eq!(delta, vec![dir.path().join("data.txt")]);
    }

    #[test]
    fn deletion_reported_exactly_once() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("doomed.txt"), "x").unwrap();

        let mut watch = Watch::new(dir.path(), "doomed.txt".into(), Arc::new(NullListener));
        fs::remove_file(dir.path().join("doomed.txt")).unwrap();

        assert_eq!(
            watch.changed(SystemTime::now()),
            vec![dir.path().join("doomed.txt")]
        );
        // Still absent: known state, no repeat notification.
        assert!(watch.changed(SystemTime::now()).is_empty());
    }

    #[test]
    fn reappearing_file_is_reported() {
        let dir = tempdir().unwrap();
        let mut watch = Watch::new(dir.path(), "late.txt".into(), Arc::new(NullListener));

        assert!(watch.changed(SystemTime::now()).is_empty());

        fs::write(dir.path().join("late.txt"), "here now").unwrap();
        let delta = watch.changed(SystemTime::now());
        assert_eq!(delta, vec![dir.path().join("late.txt")]);
    }
}
