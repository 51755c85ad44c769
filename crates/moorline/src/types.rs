//! Host-facing configuration and state types.

use serde_json::Value;

/// Construction options for a [`TablePersister`](crate::TablePersister).
///
/// All three fields are required. The connection string carries the
/// row-store endpoint and credential, the partition key scopes every row
/// this persister touches, and the table name picks the remote table the
/// rows live in.
#[derive(Debug, Clone)]
pub struct PersistOptions {
    pub connection_string: String,
    pub partition_key: String,
    pub table_name: String,
}

impl PersistOptions {
    pub fn new(
        connection_string: impl Into<String>,
        partition_key: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            connection_string: connection_string.into(),
            partition_key: partition_key.into(),
            table_name: table_name.into(),
        }
    }
}

/// What the cache knows about one logical table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableState {
    /// Never loaded and never written in this process.
    Unloaded,
    /// Loaded or written, but holding no value. A table in this state is
    /// known to have no remote row worth reading.
    Empty,
    /// Holding a value.
    Value(Value),
}

impl TableState {
    /// Whether the table has been resolved, with or without a value.
    pub fn is_loaded(&self) -> bool {
        !matches!(self, TableState::Unloaded)
    }
}

/// Receiver for operator-facing diagnostics.
///
/// Load and persist failures are logged through `tracing` regardless; a
/// sink additionally routes them to whatever invocation-scoped channel
/// the host runs under.
pub trait DiagnosticSink: Send + Sync {
    fn error(&self, message: &str);
}
