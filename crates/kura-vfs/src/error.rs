//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
///
/// Messages may contain object keys. Callers at a request boundary should
/// report [`VfsError::kind`] and a fixed message instead of `Display`.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The caller supplied an empty path.
    #[error("path is empty")]
    EmptyPath,

    /// Path escapes the tenant root (security violation).
    #[error("path escapes tenant root: {0}")]
    TraversalDetected(String),

    /// Object not found in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend or transport failure.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Upload filename→path mapping is invalid or incomplete.
    #[error("malformed upload mapping: {0}")]
    MalformedMapping(String),

    /// Move would touch the tenant root or nest a folder inside itself.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Writing a zip archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error classification, stable across variants' payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyPath,
    TraversalDetected,
    NotFound,
    StoreUnavailable,
    MalformedMapping,
    InvalidMove,
    Cancelled,
    Internal,
}

impl VfsError {
    /// Create a TraversalDetected error.
    pub fn traversal(path: impl Into<String>) -> Self {
        Self::TraversalDetected(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create a StoreUnavailable error.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a MalformedMapping error.
    pub fn malformed_mapping(msg: impl Into<String>) -> Self {
        Self::MalformedMapping(msg.into())
    }

    /// Create an InvalidMove error.
    pub fn invalid_move(msg: impl Into<String>) -> Self {
        Self::InvalidMove(msg.into())
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::EmptyPath => ErrorKind::EmptyPath,
            VfsError::TraversalDetected(_) => ErrorKind::TraversalDetected,
            VfsError::NotFound(_) => ErrorKind::NotFound,
            VfsError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            VfsError::MalformedMapping(_) => ErrorKind::MalformedMapping,
            VfsError::InvalidMove(_) => ErrorKind::InvalidMove,
            VfsError::Cancelled => ErrorKind::Cancelled,
            VfsError::Archive(_) | VfsError::Io(_) => ErrorKind::Internal,
        }
    }

    /// True for errors raised before any store call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EmptyPath
                | ErrorKind::TraversalDetected
                | ErrorKind::MalformedMapping
                | ErrorKind::InvalidMove
        )
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
