//! Error types for the Tessera library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TesseraError`] enum. Each variant belongs to one [`ErrorKind`] so callers
//! can branch on the category of a failure without matching on messages.
//!
//! # Examples
//!
//! ```
//! use tessera::error::{ErrorKind, Result, TesseraError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TesseraError::invalid_argument("top_k must be greater than zero"))
//! }
//!
//! let err = example_operation().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidArgument);
//! ```

use std::io;

use thiserror::Error;

/// Failure reported by an embedding provider.
///
/// The index never retries or rewraps these; they surface to the caller as
/// [`TesseraError::Embedding`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// The provider could not be reached.
    #[error("network failure: {0}")]
    Network(String),

    /// The provider rejected the credentials.
    #[error("authentication failure: {0}")]
    Authentication(String),

    /// The provider throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other provider-side failure.
    #[error("provider failure: {0}")]
    Provider(String),
}

/// The main error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// A caller supplied an argument the operation cannot accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A record or persisted index does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persisted content failed structural validation.
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Embedding provider error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Resource exhausted
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Operation cancelled
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// A collaborator broke its contract (for example an executor returning
    /// the wrong number of scores).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse category of a [`TesseraError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller passed something the operation rejects.
    InvalidArgument,
    /// A record, file or index directory is missing.
    NotFound,
    /// Persisted bytes failed validation.
    CorruptData,
    /// I/O, serialization, an embedder or an executor failed.
    CollaboratorFailure,
    /// A configured limit would be exceeded.
    ResourceExhausted,
    /// The operation was cancelled through its token.
    Cancelled,
}

/// Result type alias for operations that may fail with TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidArgument(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        TesseraError::NotFound(msg.into())
    }

    /// Create a new corrupt data error.
    pub fn corrupt_data<S: Into<String>>(msg: S) -> Self {
        TesseraError::CorruptData(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        TesseraError::Serialization(msg.into())
    }

    /// Create a new resource exhausted error.
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        TesseraError::ResourceExhausted(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        TesseraError::Internal(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        TesseraError::OperationCancelled(msg.into())
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TesseraError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TesseraError::NotFound(_) => ErrorKind::NotFound,
            TesseraError::CorruptData(_) => ErrorKind::CorruptData,
            TesseraError::Io(_)
            | TesseraError::Serialization(_)
            | TesseraError::Embedding(_)
            | TesseraError::Internal(_) => ErrorKind::CollaboratorFailure,
            TesseraError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            TesseraError::OperationCancelled(_) => ErrorKind::Cancelled,
        }
    }
}

impl From<bincode::Error> for TesseraError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(e) => TesseraError::Io(e),
            other => TesseraError::serialization(other.to_string()),
        }
    }
}
