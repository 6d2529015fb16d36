//! Common error types for UniFS.

use std::io;

use thiserror::Error;

/// Top-level error type for file and folder operations.
///
/// Every backend translates its native failures into one of these kinds so
/// callers never see backend-specific error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A name contains a path separator or is empty.
    #[error("Invalid name: {0}")]
    NameInvalid(String),

    /// File, folder or parent does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Collision on create, rename, copy or move without replacement.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Operation or attribute has no meaning on the active backend.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// No storage backend could be resolved.
    #[error("No file system provider found: {0}")]
    ProviderNotFound(String),

    /// Isolated store quota would be exceeded.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A move copied the file but could not remove the source.
    #[error("Move incomplete: {0}")]
    MoveIncomplete(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl Error {
    /// Whether this error means the entity is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether this error is an unsupported capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }

    /// Translate an I/O error, attaching the path or name it concerns.
    pub fn from_io(err: io::Error, subject: impl std::fmt::Display) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(subject.to_string()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(subject.to_string()),
            io::ErrorKind::Unsupported => Error::Unsupported(format!("{}: {}", subject, err)),
            _ => Error::Io(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(err.to_string()),
            io::ErrorKind::Unsupported => Error::Unsupported(err.to_string()),
            _ => Error::Io(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kinds_are_translated() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());

        let err: Error = io::Error::new(io::ErrorKind::AlreadyExists, "taken").into();
        assert!(matches!(err, Error::AlreadyExists(_)));

        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_io_keeps_subject() {
        let err = Error::from_io(io::Error::from(io::ErrorKind::NotFound), "/tmp/a.txt");
        match err {
            Error::NotFound(msg) => assert_eq!(msg, "/tmp/a.txt"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
