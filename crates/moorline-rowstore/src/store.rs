//! The `RowStore` trait — the single contract a persister drives.

use async_trait::async_trait;

use crate::error::RowStoreResult;
use crate::types::RowEntity;

/// Outcome of a table-creation attempt.
///
/// Creation is racy by nature: another client may create the table between
/// "does it exist" and "create it", so a conflict is part of the contract,
/// not an error. Implementations must map their transport's conflict signal
/// (HTTP 409 for the REST client) to `AlreadyExists` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The table did not exist and was created by this call.
    Created,
    /// The table already existed (possibly created concurrently).
    AlreadyExists,
}

/// A remote store of string-keyed rows, bound to one table.
///
/// Each handle is fixed to a single table at construction; row addressing
/// within the table is by `(partition_key, row_key)`. Implementations must
/// be shareable across async tasks (`Send + Sync`), and `delete_row` must
/// succeed when the row does not exist.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Create the bound table if it does not exist yet.
    async fn create_table(&self) -> RowStoreResult<CreateOutcome>;

    /// Fetch the rows matching a partition key and row key.
    ///
    /// The row key addresses at most one row, but the contract returns the
    /// matching set so callers decide what a multi-row answer means.
    async fn query_rows(&self, partition_key: &str, row_key: &str)
    -> RowStoreResult<Vec<RowEntity>>;

    /// Create or replace a row.
    async fn upsert_row(&self, row: RowEntity) -> RowStoreResult<()>;

    /// Remove a row. Succeeds even if the row does not exist.
    async fn delete_row(&self, partition_key: &str, row_key: &str) -> RowStoreResult<()>;
}
