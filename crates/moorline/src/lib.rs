//! Moorline persists the tables of a reactive state store into a remote
//! key/row storage service.
//!
//! A [`TablePersister`] owns an in-memory cache of JSON table values and
//! reconciles it with one remote table, one row per logical table, all
//! under a single partition key. Hosts hand it change descriptors and
//! read cached values back synchronously; durability happens on spawned
//! tasks behind a one-time readiness gate.
//!
//! ```no_run
//! use moorline::{Change, PersistOptions, TablePersister};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), moorline::PersistError> {
//! let persister = TablePersister::new(
//!     PersistOptions::new("endpoint=http://localhost:7171;accesskey=dev", "tenant-7", "state"),
//!     None,
//! )?;
//! persister.ready().await?;
//!
//! persister.load_table("users").await;
//! let users = persister.get_table("users", json!({}));
//!
//! let persisted = persister.set("users", &[Change::set(vec![], json!({"a": 1}))]);
//! persisted.await.expect("persist task")?;
//! # Ok(())
//! # }
//! ```

pub mod changes;
pub mod codec;
pub mod error;
pub mod persister;
pub mod types;

pub use changes::{Change, PathSegment, apply_changes};
pub use error::{PersistError, PersistResult};
pub use persister::{METADATA_SUFFIX, TablePersister, metadata_table};
pub use types::{DiagnosticSink, PersistOptions, TableState};
