//! Error types for BAG dataset operations.

use thiserror::Error;

/// Errors that can occur while creating, opening, reading or writing a dataset.
#[derive(Error, Debug)]
pub enum BagError {
    /// A path, layer, field or record is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create call collided with an existing identity.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A mutation was attempted on a dataset opened read-only.
    #[error("dataset is read-only: {0}")]
    ReadOnlyViolation(String),

    /// A row, column, index or corrector is outside its valid bounds.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A buffer or record does not have the expected number of elements.
    #[error("size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// A value tag does not match the declared type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Illegal type, group or profile combination.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The container is not a valid dataset or fails schema checks.
    #[error("invalid dataset format: {0}")]
    FormatError(String),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    IoError(String),
}

/// The kind of a [`BagError`], for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ReadOnlyViolation,
    OutOfRange,
    SizeMismatch,
    TypeMismatch,
    InvalidArgument,
    FormatError,
    IoError,
}

impl BagError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::ReadOnlyViolation(_) => ErrorKind::ReadOnlyViolation,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::FormatError(_) => ErrorKind::FormatError,
            Self::IoError(_) => ErrorKind::IoError,
        }
    }

    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a ReadOnlyViolation error.
    pub fn read_only(msg: impl Into<String>) -> Self {
        Self::ReadOnlyViolation(msg.into())
    }

    /// Create an OutOfRange error.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Create a SizeMismatch error.
    pub fn size_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a TypeMismatch error.
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a FormatError.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::FormatError(msg.into())
    }

    /// Create an IoError.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }
}

impl From<std::io::Error> for BagError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for BagError {
    fn from(err: serde_json::Error) -> Self {
        Self::FormatError(err.to_string())
    }
}

/// Result type for BAG operations.
pub type Result<T> = std::result::Result<T, BagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(BagError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            BagError::size_mismatch("buffer", 4, 3).kind(),
            ErrorKind::SizeMismatch
        );
        assert_eq!(BagError::read_only("write").kind(), ErrorKind::ReadOnlyViolation);
    }

    #[test]
    fn test_size_mismatch_message() {
        let err = BagError::size_mismatch("record", 14, 2);
        assert_eq!(
            err.to_string(),
            "size mismatch for record: expected 14, got 2"
        );
    }

    #[test]
    fn test_io_error_conversion_keeps_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.bag");
        let err: BagError = io.into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
