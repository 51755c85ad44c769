//! moorline-rowstore — the remote row-store boundary for moorline.
//!
//! A row store keeps string-keyed rows grouped under partitions, one table
//! per client handle. This crate defines the contract ([`RowStore`]) the
//! persister speaks, plus two implementations:
//!
//! - [`RestRowStore`] — the production client, JSON over HTTP against the
//!   row service's `/v1` endpoints, built from a connection string.
//! - [`MemoryRowStore`] — an in-process backend for tests and embedding,
//!   with failure injection and operation counters.
//!
//! Table creation is idempotent by convention: a concurrent creator losing
//! the race surfaces as [`CreateOutcome::AlreadyExists`], never as an
//! error. Row deletion is idempotent too — deleting a row that does not
//! exist succeeds.

pub mod error;
pub mod memory;
pub mod rest;
pub mod store;
pub mod types;

pub use error::{RowStoreError, RowStoreResult};
pub use memory::MemoryRowStore;
pub use rest::RestRowStore;
pub use store::{CreateOutcome, RowStore};
pub use types::RowEntity;
