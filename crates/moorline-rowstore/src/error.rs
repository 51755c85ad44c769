//! Error types for row-store operations.

use thiserror::Error;

/// Result type alias for row-store operations.
pub type RowStoreResult<T> = Result<T, RowStoreError>;

/// Errors that can occur while talking to a row store.
///
/// `Clone` so a construction-time failure can be held by a readiness gate
/// and handed to every writer that awaits it.
#[derive(Debug, Clone, Error)]
pub enum RowStoreError {
    /// The connection string or client configuration is unusable.
    #[error("invalid row-store configuration: {0}")]
    Config(String),

    /// The service answered with a non-success status.
    #[error("row service returned {status}: {message}")]
    Service { status: u16, message: String },

    /// The request never produced a service answer (connect, I/O, timeout).
    #[error("row-store transport error: {0}")]
    Transport(String),

    /// A request or response body did not round-trip the wire contract.
    #[error("row-store body codec error: {0}")]
    Decode(String),
}

impl RowStoreError {
    /// The status code the service answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RowStoreError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this failure means "the resource already exists".
    ///
    /// True exactly for a service error carrying the conflict status (409).
    /// Transport and decode failures are never classified as conflicts.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(http::StatusCode::CONFLICT.as_u16())
    }
}
