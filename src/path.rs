//! Store-relative path helpers
//!
//! Store paths are relative, `/`-separated and free of traversal
//! components regardless of platform. The empty string addresses the
//! store root.

use std::path::{Path, PathBuf};

use crate::error::{TroveError, TroveResult};

/// Normalize a path string into store form.
///
/// Backslashes become `/`, empty and `.` segments are dropped. The result
/// may still contain `..` segments; use [`valid`] to reject those.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize and validate a store path.
///
/// Rejects traversal segments (`..`); a store path can never address
/// anything above the base directory.
pub fn valid(path: &str) -> TroveResult<String> {
    let normalized = normalize(path);
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(TroveError::InvalidPath {
            path: path.to_string(),
            message: "contains traversal segments".to_string(),
        });
    }
    Ok(normalized)
}

/// Final segment of a store path (the resource name).
pub fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Parent of a store path; `None` for the store root.
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map_or("", |(parent, _)| parent))
}

/// Resolve a store path to a location under the base directory.
pub fn to_file(base: &Path, path: &str) -> PathBuf {
    if path.is_empty() {
        base.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Convert a filesystem location under `base` back to a store path.
///
/// Returns `None` when the location does not live under `base`.
pub fn convert(base: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(base).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
    )
}
