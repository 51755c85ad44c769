//! In-memory row store for tests and embedding.
//!
//! Behaves like the remote service — idempotent creation surfacing
//! [`CreateOutcome::AlreadyExists`] on the second attempt, idempotent
//! deletes, last-write-wins upserts — while staying fully in-process.
//! Failure injection flags and per-operation counters let tests assert how
//! a caller drives the contract, not just what ends up stored.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::{RowStoreError, RowStoreResult};
use crate::store::{CreateOutcome, RowStore};
use crate::types::RowEntity;

/// In-process [`RowStore`] implementation.
#[derive(Default)]
pub struct MemoryRowStore {
    /// Rows keyed by `(partition_key, row_key)`.
    rows: RwLock<HashMap<(String, String), String>>,
    /// Whether the bound table has been created.
    table_exists: AtomicBool,
    fail_create: AtomicBool,
    fail_query: AtomicBool,
    fail_writes: AtomicBool,
    create_count: AtomicU64,
    query_count: AtomicU64,
    upsert_count: AtomicU64,
    delete_count: AtomicU64,
}

impl MemoryRowStore {
    /// A store whose table does not exist yet: the first `create_table`
    /// reports `Created`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose table already exists: every `create_table` reports
    /// `AlreadyExists`. Models losing the creation race.
    pub fn with_existing_table() -> Self {
        let store = Self::default();
        store.table_exists.store(true, Ordering::SeqCst);
        store
    }

    // ── Failure injection ──────────────────────────────────────────

    /// Make every `create_table` fail with a service error.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make every `query_rows` fail with a service error.
    pub fn fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }

    /// Make every `upsert_row` and `delete_row` fail with a service error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    // ── Inspection ─────────────────────────────────────────────────

    /// The stored content of a row, if any.
    pub fn row(&self, partition_key: &str, row_key: &str) -> Option<String> {
        let rows = self.rows.read().expect("rows lock");
        rows.get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    /// Number of rows currently stored.
    pub fn row_count(&self) -> usize {
        self.rows.read().expect("rows lock").len()
    }

    /// Seed a row directly, bypassing the contract (test setup).
    pub fn put_row(&self, row: RowEntity) {
        let mut rows = self.rows.write().expect("rows lock");
        rows.insert((row.partition_key, row.row_key), row.content);
    }

    pub fn create_count(&self) -> u64 {
        self.create_count.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> u64 {
        self.upsert_count.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u64 {
        self.delete_count.load(Ordering::SeqCst)
    }

    fn injected(&self, flag: &AtomicBool, op: &str) -> RowStoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(RowStoreError::Service {
                status: 500,
                message: format!("injected {op} failure"),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn create_table(&self) -> RowStoreResult<CreateOutcome> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        self.injected(&self.fail_create, "create")?;
        if self.table_exists.swap(true, Ordering::SeqCst) {
            Ok(CreateOutcome::AlreadyExists)
        } else {
            Ok(CreateOutcome::Created)
        }
    }

    async fn query_rows(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> RowStoreResult<Vec<RowEntity>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.injected(&self.fail_query, "query")?;
        let rows = self.rows.read().expect("rows lock");
        Ok(rows
            .iter()
            .filter(|((p, r), _)| p == partition_key && r == row_key)
            .map(|((p, r), content)| RowEntity::new(p.clone(), r.clone(), content.clone()))
            .collect())
    }

    async fn upsert_row(&self, row: RowEntity) -> RowStoreResult<()> {
        self.upsert_count.fetch_add(1, Ordering::SeqCst);
        self.injected(&self.fail_writes, "upsert")?;
        let mut rows = self.rows.write().expect("rows lock");
        rows.insert((row.partition_key, row.row_key), row.content);
        Ok(())
    }

    async fn delete_row(&self, partition_key: &str, row_key: &str) -> RowStoreResult<()> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        self.injected(&self.fail_writes, "delete")?;
        let mut rows = self.rows.write().expect("rows lock");
        rows.remove(&(partition_key.to_string(), row_key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_idempotent_by_outcome() {
        let store = MemoryRowStore::new();
        assert_eq!(store.create_table().await.unwrap(), CreateOutcome::Created);
        assert_eq!(
            store.create_table().await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(store.create_count(), 2);
    }

    #[tokio::test]
    async fn existing_table_reports_already_exists() {
        let store = MemoryRowStore::with_existing_table();
        assert_eq!(
            store.create_table().await.unwrap(),
            CreateOutcome::AlreadyExists
        );
    }

    #[tokio::test]
    async fn upsert_then_query_round_trips() {
        let store = MemoryRowStore::new();
        store
            .upsert_row(RowEntity::new("p", "p-users", "{\"a\":1}"))
            .await
            .unwrap();

        let rows = store.query_rows("p", "p-users").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "{\"a\":1}");

        // Different partition sees nothing.
        assert!(store.query_rows("q", "p-users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_content() {
        let store = MemoryRowStore::new();
        store
            .upsert_row(RowEntity::new("p", "k", "old"))
            .await
            .unwrap();
        store
            .upsert_row(RowEntity::new("p", "k", "new"))
            .await
            .unwrap();

        assert_eq!(store.row("p", "k").as_deref(), Some("new"));
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn delete_missing_row_succeeds() {
        let store = MemoryRowStore::new();
        store.delete_row("p", "never-there").await.unwrap();
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_service_errors() {
        let store = MemoryRowStore::new();
        store.fail_query(true);
        let err = store.query_rows("p", "k").await.unwrap_err();
        assert_eq!(err.status(), Some(500));

        store.fail_query(false);
        assert!(store.query_rows("p", "k").await.is_ok());
    }
}
