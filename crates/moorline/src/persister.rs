//! The table persister: a write-through cache of JSON table values backed
//! by a remote row store.
//!
//! Every logical table maps to one row under the persister's partition
//! key, with row key `{partition}-{table}`. Values are cached in memory;
//! reads never touch the network, writes mutate the cache synchronously
//! and push the new row content from a spawned task. A second namespace
//! per table, addressed by the [`METADATA_SUFFIX`], carries host metadata
//! through the same machinery.
//!
//! Construction arms a one-time readiness gate: a background task asks
//! the store to create the remote table and records the outcome. Writers
//! wait on the gate; loads and deletes do not, since the rows they touch
//! exist independently of whether this process created the table.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use moorline_rowstore::{CreateOutcome, RestRowStore, RowEntity, RowStore, RowStoreError};

use crate::changes::{Change, apply_changes};
use crate::codec;
use crate::error::{PersistError, PersistResult};
use crate::types::{DiagnosticSink, PersistOptions, TableState};

/// Suffix that turns a table name into its metadata namespace.
///
/// Namespacing is purely syntactic and not enforced: a table literally
/// named `users__m` shares its row with the metadata of `users`. Callers
/// must pick table names that do not collide after suffixing.
pub const METADATA_SUFFIX: &str = "__m";

const ROW_KEY_SEPARATOR: char = '-';

/// Outcome of the one-time remote table setup.
#[derive(Debug, Clone)]
enum ReadyState {
    Pending,
    Ready,
    Failed(RowStoreError),
}

/// Persistence adapter binding a reactive state store to a row store.
///
/// Cloning is cheap and shares the cache, the readiness gate, and the
/// underlying client.
#[derive(Clone)]
pub struct TablePersister {
    inner: Arc<PersisterInner>,
}

struct PersisterInner {
    store: Arc<dyn RowStore>,
    partition_key: String,
    table_name: String,
    /// Absent entry means never loaded, `None` means known empty,
    /// `Some(v)` is the current value.
    cache: RwLock<HashMap<String, Option<Value>>>,
    ready: watch::Receiver<ReadyState>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl TablePersister {
    /// Build a persister that talks to its row store over HTTP.
    ///
    /// Fails when any of the three option fields is empty or the
    /// connection string does not parse. Must be called from within a
    /// Tokio runtime: the remote table setup runs on a spawned task and
    /// construction itself never blocks on it.
    pub fn new(
        options: PersistOptions,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> PersistResult<Self> {
        if options.connection_string.is_empty() {
            return Err(PersistError::Config(
                "no valid connection string provided".into(),
            ));
        }
        validate_names(&options.partition_key, &options.table_name)?;
        let store = RestRowStore::from_connection_string(
            &options.connection_string,
            &options.table_name,
        )
        .map_err(|error| PersistError::Config(error.to_string()))?;
        Ok(Self::assemble(
            Arc::new(store),
            options.partition_key,
            options.table_name,
            sink,
        ))
    }

    /// Build a persister over an existing row store client.
    ///
    /// The same readiness gate is armed, so the store sees one
    /// `create_table` call per persister. Must be called from within a
    /// Tokio runtime.
    pub fn with_store(
        store: Arc<dyn RowStore>,
        partition_key: impl Into<String>,
        table_name: impl Into<String>,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> PersistResult<Self> {
        let partition_key = partition_key.into();
        let table_name = table_name.into();
        validate_names(&partition_key, &table_name)?;
        Ok(Self::assemble(store, partition_key, table_name, sink))
    }

    fn assemble(
        store: Arc<dyn RowStore>,
        partition_key: String,
        table_name: String,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> Self {
        let (tx, rx) = watch::channel(ReadyState::Pending);
        let setup_store = Arc::clone(&store);
        let setup_table = table_name.clone();
        tokio::spawn(async move {
            let state = match setup_store.create_table().await {
                Ok(CreateOutcome::Created) => {
                    debug!(table = %setup_table, "remote table created");
                    ReadyState::Ready
                }
                Ok(CreateOutcome::AlreadyExists) => {
                    debug!(table = %setup_table, "remote table already existed");
                    ReadyState::Ready
                }
                Err(error) => {
                    error!(table = %setup_table, %error, "remote table setup failed");
                    ReadyState::Failed(error)
                }
            };
            // Receivers may all be gone already; nothing to do then.
            let _ = tx.send(state);
        });
        Self {
            inner: Arc::new(PersisterInner {
                store,
                partition_key,
                table_name,
                cache: RwLock::new(HashMap::new()),
                ready: rx,
                sink,
            }),
        }
    }

    /// Wait until the remote table is known to exist.
    ///
    /// Resolves once per persister and is then immediate. Fails with
    /// [`PersistError::Setup`] when table creation failed for a reason
    /// other than the table already existing.
    pub async fn ready(&self) -> PersistResult<()> {
        self.await_ready().await
    }

    async fn await_ready(&self) -> PersistResult<()> {
        let mut ready = self.inner.ready.clone();
        let state = ready
            .wait_for(|state| !matches!(state, ReadyState::Pending))
            .await
            .map_err(|_| PersistError::NotReady)?;
        match &*state {
            ReadyState::Ready => Ok(()),
            ReadyState::Failed(error) => Err(PersistError::Setup(error.clone())),
            ReadyState::Pending => Err(PersistError::NotReady),
        }
    }

    /// Pull a table's row into the cache.
    ///
    /// Effective at most once per table: a table the cache already knows,
    /// even as known-empty, is left alone. Query failures are reported
    /// and leave the table unloaded, so a later call retries.
    pub async fn load_table(&self, table: &str) {
        if self
            .inner
            .cache
            .read()
            .expect("cache lock")
            .contains_key(table)
        {
            return;
        }
        let row_key = self.row_key(table);
        match self
            .inner
            .store
            .query_rows(&self.inner.partition_key, &row_key)
            .await
        {
            Ok(rows) => {
                let value = rows
                    .into_iter()
                    .last()
                    .and_then(|row| codec::decode(&row.content))
                    .filter(|value| !value.is_null());
                let mut cache = self.inner.cache.write().expect("cache lock");
                // A set that landed while the query was in flight wins.
                cache.entry(table.to_string()).or_insert(value);
            }
            Err(error) => {
                warn!(table, %error, "table load failed");
                self.report(&format!("failed to load table `{table}`: {error}"));
            }
        }
    }

    /// [`load_table`](Self::load_table) for the metadata namespace.
    pub async fn load_metadata(&self, table: &str) {
        self.load_table(&metadata_table(table)).await;
    }

    /// Current cached value of a table, or `fallback` when the cache
    /// holds nothing for it. A null fallback degrades to an empty
    /// object, so callers always get something indexable back. Never
    /// touches the remote store.
    pub fn get_table(&self, table: &str, fallback: Value) -> Value {
        match self.table_state(table) {
            TableState::Value(value) => value,
            TableState::Unloaded | TableState::Empty => {
                if fallback.is_null() {
                    json!({})
                } else {
                    fallback
                }
            }
        }
    }

    /// Cached metadata of a table, defaulting to an empty object.
    pub fn get_metadata(&self, table: &str) -> Value {
        self.get_table(&metadata_table(table), json!({}))
    }

    /// What the cache knows about a table.
    pub fn table_state(&self, table: &str) -> TableState {
        let cache = self.inner.cache.read().expect("cache lock");
        match cache.get(table) {
            None => TableState::Unloaded,
            Some(None) => TableState::Empty,
            Some(Some(value)) if value.is_null() => TableState::Empty,
            Some(Some(value)) => TableState::Value(value.clone()),
        }
    }

    /// Apply host changes to a table and persist the result.
    ///
    /// The cache mutation happens before this returns, so a `get_table`
    /// issued right after `set` observes the new value. The remote write
    /// runs on the returned task; hosts that do not care about
    /// durability confirmation may drop the handle, and failures are
    /// logged either way.
    pub fn set(&self, table: &str, changes: &[Change]) -> JoinHandle<PersistResult<()>> {
        {
            let mut cache = self.inner.cache.write().expect("cache lock");
            let base = match cache.get(table) {
                Some(Some(value)) if !value.is_null() => value.clone(),
                _ => json!({}),
            };
            cache.insert(table.to_string(), apply_changes(base, changes));
        }
        self.spawn_save(table)
    }

    /// Replace a table's metadata wholesale and persist it.
    pub fn set_metadata(&self, table: &str, metadata: Value) -> JoinHandle<PersistResult<()>> {
        let table = metadata_table(table);
        self.inner
            .cache
            .write()
            .expect("cache lock")
            .insert(table.clone(), Some(metadata));
        self.spawn_save(&table)
    }

    /// Forget a table locally and delete its remote row.
    ///
    /// Does not wait for the readiness gate. Deleting a row that does
    /// not exist succeeds; anything else the store reports is returned.
    pub async fn delete_table(&self, table: &str) -> PersistResult<()> {
        self.inner
            .cache
            .write()
            .expect("cache lock")
            .remove(table);
        let row_key = self.row_key(table);
        self.inner
            .store
            .delete_row(&self.inner.partition_key, &row_key)
            .await?;
        debug!(table, row_key = %row_key, "row deleted");
        Ok(())
    }

    /// [`delete_table`](Self::delete_table) for the metadata namespace.
    pub async fn delete_metadata(&self, table: &str) -> PersistResult<()> {
        self.delete_table(&metadata_table(table)).await
    }

    /// The partition every row of this persister lives under.
    pub fn partition_key(&self) -> &str {
        &self.inner.partition_key
    }

    /// The remote table this persister's client is bound to.
    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    fn spawn_save(&self, table: &str) -> JoinHandle<PersistResult<()>> {
        let this = self.clone();
        let table = table.to_string();
        tokio::spawn(async move {
            let result = this.save(&table).await;
            // Logged here so a dropped handle is not a silent failure.
            if let Err(error) = &result {
                error!(table = %table, %error, "persist failed");
            }
            result
        })
    }

    /// Push a table's cached state out: upsert the row when a value is
    /// present, delete it when not, so row existence always mirrors the
    /// cache once the write lands.
    async fn save(&self, table: &str) -> PersistResult<()> {
        self.await_ready().await?;
        let cached = {
            let cache = self.inner.cache.read().expect("cache lock");
            cache.get(table).cloned().flatten()
        };
        let row_key = self.row_key(table);
        match cached.filter(|value| !value.is_null()) {
            Some(value) => {
                let content = codec::encode(&value)?;
                let row = RowEntity::new(
                    self.inner.partition_key.clone(),
                    row_key.clone(),
                    content,
                );
                self.inner.store.upsert_row(row).await?;
                debug!(table, row_key = %row_key, "row upserted");
            }
            None => {
                self.inner
                    .store
                    .delete_row(&self.inner.partition_key, &row_key)
                    .await?;
                debug!(table, row_key = %row_key, "tombstoned");
            }
        }
        Ok(())
    }

    fn report(&self, message: &str) {
        if let Some(sink) = &self.inner.sink {
            sink.error(message);
        }
    }

    fn row_key(&self, table: &str) -> String {
        format!(
            "{}{}{}",
            self.inner.partition_key, ROW_KEY_SEPARATOR, table
        )
    }
}

/// The metadata namespace of a table name.
///
/// See [`METADATA_SUFFIX`] for the collision caveat.
pub fn metadata_table(table: &str) -> String {
    format!("{table}{METADATA_SUFFIX}")
}

fn validate_names(partition_key: &str, table_name: &str) -> PersistResult<()> {
    if table_name.is_empty() {
        return Err(PersistError::Config("no valid table name provided".into()));
    }
    if partition_key.is_empty() {
        return Err(PersistError::Config(
            "no valid partition key provided".into(),
        ));
    }
    Ok(())
}
