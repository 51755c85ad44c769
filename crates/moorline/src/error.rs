//! Error types surfaced by the persister.

use moorline_rowstore::RowStoreError;
use thiserror::Error;

/// Result alias for persister operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors a persister operation can surface.
#[derive(Debug, Error)]
pub enum PersistError {
    /// A required construction field is missing or unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote table setup failed for a reason other than the table
    /// already existing.
    #[error("table setup failed: {0}")]
    Setup(RowStoreError),

    /// The readiness gate vanished before resolving. Construction always
    /// arms the gate, so a writer seeing this holds a persister whose
    /// setup task was torn down mid-flight.
    #[error("table setup never completed")]
    NotReady,

    /// A remote row operation failed.
    #[error("row operation failed: {0}")]
    Store(#[from] RowStoreError),

    /// A cached value could not be serialized for storage.
    #[error("content encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert() {
        let source = RowStoreError::Transport("connection refused".into());
        let error = PersistError::from(source);
        assert!(matches!(error, PersistError::Store(_)));
    }

    #[test]
    fn display_includes_cause() {
        let error = PersistError::Setup(RowStoreError::Service {
            status: 500,
            message: "boom".into(),
        });
        assert!(error.to_string().contains("boom"));
    }
}
