//! End-to-end persistence tests.
//!
//! Runs a fake row service in-process behind real HTTP and drives
//! persisters against it through the REST client, covering table setup
//! races, value and metadata round trips across persister instances,
//! tombstones, and credential failures. A final scenario shares one
//! in-memory store between two persisters without the network.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::json;

use moorline::{Change, PersistError, PersistOptions, TablePersister};
use moorline_rowstore::types::{
    CreateTableRequest, DeleteRowRequest, QueryRowsRequest, QueryRowsResponse, ServiceErrorBody,
    UpsertRowRequest,
};
use moorline_rowstore::{MemoryRowStore, RowEntity, RowStore};

#[derive(Default)]
struct FakeRowService {
    tables: Mutex<HashSet<String>>,
    rows: Mutex<HashMap<(String, String, String), String>>,
    access_key: Option<String>,
}

impl FakeRowService {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.access_key {
            None => true,
            Some(key) => headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == format!("Bearer {key}")),
        }
    }

    fn row(&self, table: &str, partition: &str, row: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&(table.to_string(), partition.to_string(), row.to_string()))
            .cloned()
    }
}

fn denied() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ServiceErrorBody {
            code: Some("Unauthorized".to_string()),
            message: "bad access key".to_string(),
        }),
    )
        .into_response()
}

async fn create_table(
    State(svc): State<Arc<FakeRowService>>,
    headers: HeaderMap,
    Json(req): Json<CreateTableRequest>,
) -> axum::response::Response {
    if !svc.authorized(&headers) {
        return denied();
    }
    let mut tables = svc.tables.lock().unwrap();
    if !tables.insert(req.table.clone()) {
        return (
            StatusCode::CONFLICT,
            Json(ServiceErrorBody {
                code: Some("TableAlreadyExists".to_string()),
                message: format!("table `{}` already exists", req.table),
            }),
        )
            .into_response();
    }
    StatusCode::CREATED.into_response()
}

async fn query_rows(
    State(svc): State<Arc<FakeRowService>>,
    headers: HeaderMap,
    Json(req): Json<QueryRowsRequest>,
) -> axum::response::Response {
    if !svc.authorized(&headers) {
        return denied();
    }
    let rows = svc.rows.lock().unwrap();
    let matching: Vec<RowEntity> = rows
        .iter()
        .filter(|((t, p, r), _)| *t == req.table && *p == req.partition_key && *r == req.row_key)
        .map(|((_, p, r), content)| RowEntity::new(p.clone(), r.clone(), content.clone()))
        .collect();
    Json(QueryRowsResponse { rows: matching }).into_response()
}

async fn upsert_row(
    State(svc): State<Arc<FakeRowService>>,
    headers: HeaderMap,
    Json(req): Json<UpsertRowRequest>,
) -> axum::response::Response {
    if !svc.authorized(&headers) {
        return denied();
    }
    svc.rows.lock().unwrap().insert(
        (req.table, req.row.partition_key, req.row.row_key),
        req.row.content,
    );
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_row(
    State(svc): State<Arc<FakeRowService>>,
    headers: HeaderMap,
    Json(req): Json<DeleteRowRequest>,
) -> axum::response::Response {
    if !svc.authorized(&headers) {
        return denied();
    }
    svc.rows
        .lock()
        .unwrap()
        .remove(&(req.table, req.partition_key, req.row_key));
    StatusCode::NO_CONTENT.into_response()
}

async fn spawn_service(svc: Arc<FakeRowService>) -> String {
    let app = axum::Router::new()
        .route("/v1/tables", post(create_table))
        .route("/v1/rows/query", post(query_rows))
        .route("/v1/rows/upsert", post(upsert_row))
        .route("/v1/rows/delete", post(delete_row))
        .with_state(svc);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn options(base: &str) -> PersistOptions {
    PersistOptions::new(
        format!("endpoint={base};accesskey=swordfish"),
        "tenant-7",
        "state",
    )
}

#[tokio::test]
async fn values_round_trip_across_persister_instances() {
    let svc = Arc::new(FakeRowService {
        access_key: Some("swordfish".to_string()),
        ..FakeRowService::default()
    });
    let base = spawn_service(Arc::clone(&svc)).await;

    let writer = TablePersister::new(options(&base), None).unwrap();
    writer.ready().await.unwrap();
    writer
        .set("users", &[Change::set(vec![], json!({"a": 1}))])
        .await
        .unwrap()
        .unwrap();
    writer
        .set("users", &[Change::set(vec!["b".into()], json!([1, 2]))])
        .await
        .unwrap()
        .unwrap();

    // The service holds one row for the table, keyed partition-table.
    assert_eq!(
        svc.row("state", "tenant-7", "tenant-7-users"),
        Some(json!({"a": 1, "b": [1, 2]}).to_string())
    );

    // A second persister sees the merged value through a fresh load.
    let reader = TablePersister::new(options(&base), None).unwrap();
    reader.load_table("users").await;
    assert_eq!(
        reader.get_table("users", json!({})),
        json!({"a": 1, "b": [1, 2]})
    );
}

#[tokio::test]
async fn metadata_and_tombstones_survive_the_wire() {
    let svc = Arc::new(FakeRowService::default());
    let base = spawn_service(Arc::clone(&svc)).await;
    let cs = format!("endpoint={base}");

    let writer =
        TablePersister::new(PersistOptions::new(&cs, "tenant-7", "state"), None).unwrap();
    writer
        .set("users", &[Change::set(vec![], json!({"gone": true}))])
        .await
        .unwrap()
        .unwrap();
    writer
        .set_metadata("users", json!({"last_sync": 99}))
        .await
        .unwrap()
        .unwrap();
    writer
        .set("users", &[Change::delete(vec![])])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(svc.row("state", "tenant-7", "tenant-7-users"), None);
    assert!(svc.row("state", "tenant-7", "tenant-7-users__m").is_some());

    let reader =
        TablePersister::new(PersistOptions::new(&cs, "tenant-7", "state"), None).unwrap();
    reader.load_table("users").await;
    reader.load_metadata("users").await;
    assert_eq!(reader.get_table("users", json!({"d": 1})), json!({"d": 1}));
    assert_eq!(reader.get_metadata("users"), json!({"last_sync": 99}));
}

#[tokio::test]
async fn losing_the_table_creation_race_is_not_an_error() {
    let svc = Arc::new(FakeRowService::default());
    let base = spawn_service(svc).await;
    let cs = format!("endpoint={base}");

    let first = TablePersister::new(PersistOptions::new(&cs, "p", "state"), None).unwrap();
    first.ready().await.unwrap();

    // The table now exists; the second persister's create gets a 409 and
    // must still come up ready.
    let second = TablePersister::new(PersistOptions::new(&cs, "p", "state"), None).unwrap();
    second.ready().await.unwrap();
    second
        .set("users", &[Change::set(vec![], json!({"ok": true}))])
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn bad_access_key_fails_setup_and_writes() {
    let svc = Arc::new(FakeRowService {
        access_key: Some("swordfish".to_string()),
        ..FakeRowService::default()
    });
    let base = spawn_service(svc).await;
    let cs = format!("endpoint={base};accesskey=wrong");

    let persister =
        TablePersister::new(PersistOptions::new(&cs, "p", "state"), None).unwrap();
    assert!(matches!(
        persister.ready().await,
        Err(PersistError::Setup(_))
    ));
    let outcome = persister.set("users", &[Change::set(vec![], json!({"a": 1}))]);
    assert!(matches!(
        outcome.await.unwrap(),
        Err(PersistError::Setup(_))
    ));
}

#[tokio::test]
async fn persisters_sharing_a_store_share_rows() {
    let store = Arc::new(MemoryRowStore::new());

    let writer = TablePersister::with_store(
        Arc::clone(&store) as Arc<dyn RowStore>,
        "p",
        "state",
        None,
    )
    .unwrap();
    writer
        .set("cfg", &[Change::set(vec!["mode".into()], json!("dark"))])
        .await
        .unwrap()
        .unwrap();

    let reader = TablePersister::with_store(
        Arc::clone(&store) as Arc<dyn RowStore>,
        "p",
        "state",
        None,
    )
    .unwrap();
    reader.load_table("cfg").await;
    assert_eq!(
        reader.get_table("cfg", json!({})),
        json!({"mode": "dark"})
    );
}
