//! Error types for trove
//!
//! Uses `thiserror` for library errors. Read-style queries on missing items
//! do not error (they report `ResourceKind::Undefined` or an empty listing);
//! the variants here cover mutation failures, precondition violations and
//! operations that disagree with a resource's actual state.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type TroveResult<T> = Result<T, TroveError>;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum TroveError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation does not match the resource's actual state
    /// (e.g. `dir()` on a file, `parent()` on a single-file adaptor)
    #[error("illegal state for '{path}': {message}")]
    IllegalState { path: String, message: String },

    /// Required argument missing or invalid - detected before any I/O
    #[error("precondition failed: {message}")]
    Precondition { message: String },

    /// Path contains traversal components or is absolute
    #[error("path '{path}' is not a valid store path: {message}")]
    InvalidPath { path: String, message: String },

    /// Rename failed after preconditions were met
    #[error("failed to move {from} to {to}: {message}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },
}

impl TroveError {
    /// Shorthand for an illegal-state error on a resource path
    pub(crate) fn illegal_state(path: impl Into<String>, message: impl Into<String>) -> Self {
        TroveError::IllegalState {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a precondition violation
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        TroveError::Precondition {
            message: message.into(),
        }
    }
}
