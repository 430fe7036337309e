//! Error taxonomy shared by every filesystem and decorator.
//!
//! Core validation errors (path shape, read-only, not-found) are raised
//! before any backend I/O and are never wrapped in backend-specific
//! types, so callers can match on them regardless of which backend is
//! mounted. Backend errors pass through as [`VfsError::Io`] untranslated;
//! retrying them is the backend's business, not ours.

use stratafs_glob::{PatternError, WalkError};
use stratafs_path::PathError;
use thiserror::Error;

/// Errors raised by filesystems, nodes and decorators.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path resolution tried to ascend above an enforced root.
    #[error("path `{path}` is outside the filesystem root")]
    PathOutsideRoot { path: String },

    /// A virtual path has no backend location (e.g. outside a prefix mount).
    #[error("path `{path}` cannot be mapped to a backend location")]
    PathMapping { path: String },

    /// A mutation was attempted on a read-only filesystem.
    #[error("write operations are not supported on a read-only filesystem")]
    ReadOnly,

    /// A read-intent operation addressed an absent file.
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// Malformed path input.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// A file was copied onto itself (by resolved path equality).
    #[error("source and destination are the same file: {path}")]
    SelfCopy { path: String },

    /// `overwrite = false` and the destination already exists.
    #[error("destination already exists: {path}")]
    AlreadyExists { path: String },

    /// A composite filesystem re-entered itself while flattening.
    #[error("composite filesystem contains itself")]
    CyclicComposite,

    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A glob pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Backend I/O failure, passed through untranslated.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything a foreign tree source surfaced that is not a `VfsError`.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

impl From<WalkError> for VfsError {
    fn from(err: WalkError) -> Self {
        match err {
            WalkError::Cancelled => Self::Cancelled,
            WalkError::Source(inner) => match inner.downcast::<VfsError>() {
                Ok(vfs) => *vfs,
                Err(other) => Self::Other(other.to_string()),
            },
        }
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
