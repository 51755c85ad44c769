//! HTTP client for the row service.
//!
//! Speaks the service's `/v1` API: JSON request bodies, camelCase fields,
//! bearer authentication, row addressing in bodies rather than paths.
//! Connections are pooled through hyper's legacy client.
//!
//! A client is built from a connection string of the form
//!
//! ```text
//! endpoint=http://rows.internal:7420;accesskey=swordfish
//! ```
//!
//! Keys are case-insensitive, `accesskey` is optional, anything else is
//! rejected. The endpoint must be an absolute `http` URI (TLS terminates at
//! a gateway in front of the service, as with the rest of the mesh).

use bytes::Bytes;
use http::{Method, Request, StatusCode, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{RowStoreError, RowStoreResult};
use crate::store::{CreateOutcome, RowStore};
use crate::types::{
    CreateTableRequest, DeleteRowRequest, QueryRowsRequest, QueryRowsResponse, RowEntity,
    ServiceErrorBody, UpsertRowRequest,
};

const TABLES_PATH: &str = "/v1/tables";
const QUERY_PATH: &str = "/v1/rows/query";
const UPSERT_PATH: &str = "/v1/rows/upsert";
const DELETE_PATH: &str = "/v1/rows/delete";

/// Row-service client bound to one table.
#[derive(Clone)]
pub struct RestRowStore {
    client: Client<HttpConnector, Full<Bytes>>,
    /// Base URL, scheme through optional path prefix, no trailing slash.
    base: String,
    table: String,
    access_key: Option<String>,
}

impl std::fmt::Debug for RestRowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestRowStore")
            .field("base", &self.base)
            .field("table", &self.table)
            .field("has_access_key", &self.access_key.is_some())
            .finish()
    }
}

impl RestRowStore {
    /// Build a client from a connection string, bound to `table`.
    ///
    /// Fails synchronously on anything that cannot produce a usable
    /// handle: malformed pairs, unknown keys, a missing or non-http
    /// endpoint, or an empty table name.
    pub fn from_connection_string(connection_string: &str, table: &str) -> RowStoreResult<Self> {
        if table.is_empty() {
            return Err(RowStoreError::Config("empty table name".to_string()));
        }
        let (base, access_key) = parse_connection_string(connection_string)?;
        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            base,
            table: table.to_string(),
            access_key,
        })
    }

    /// The table this client is bound to.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> RowStoreResult<(StatusCode, Bytes)> {
        let uri = format!("{}{}", self.base, path);
        let payload =
            serde_json::to_vec(body).map_err(|e| RowStoreError::Decode(e.to_string()))?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "moorline-rowstore/0.1");
        if let Some(key) = &self.access_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let request = builder
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| RowStoreError::Transport(e.to_string()))?;

        let response = self.client.request(request).await.map_err(|e| {
            debug!(error = %e, %uri, "row service request failed");
            RowStoreError::Transport(e.to_string())
        })?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RowStoreError::Transport(e.to_string()))?
            .to_bytes();
        Ok((status, bytes))
    }

    /// POST and decode a 2xx JSON body; non-2xx becomes a `Service` error.
    async fn call<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> RowStoreResult<R> {
        let (status, bytes) = self.post_json(path, body).await?;
        if !status.is_success() {
            return Err(service_error(status, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|e| RowStoreError::Decode(e.to_string()))
    }

    /// POST where only the status matters; non-2xx becomes a `Service` error.
    async fn call_unit<T: Serialize>(&self, path: &str, body: &T) -> RowStoreResult<()> {
        let (status, bytes) = self.post_json(path, body).await?;
        if !status.is_success() {
            return Err(service_error(status, &bytes));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RowStore for RestRowStore {
    async fn create_table(&self) -> RowStoreResult<CreateOutcome> {
        let request = CreateTableRequest {
            table: self.table.clone(),
        };
        match self.call_unit(TABLES_PATH, &request).await {
            Ok(()) => {
                debug!(table = %self.table, "table created");
                Ok(CreateOutcome::Created)
            }
            Err(err) if err.is_conflict() => {
                debug!(table = %self.table, "table already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(err) => Err(err),
        }
    }

    async fn query_rows(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> RowStoreResult<Vec<RowEntity>> {
        let request = QueryRowsRequest {
            table: self.table.clone(),
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        };
        let response: QueryRowsResponse = self.call(QUERY_PATH, &request).await?;
        Ok(response.rows)
    }

    async fn upsert_row(&self, row: RowEntity) -> RowStoreResult<()> {
        let request = UpsertRowRequest {
            table: self.table.clone(),
            row,
        };
        self.call_unit(UPSERT_PATH, &request).await
    }

    async fn delete_row(&self, partition_key: &str, row_key: &str) -> RowStoreResult<()> {
        let request = DeleteRowRequest {
            table: self.table.clone(),
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        };
        self.call_unit(DELETE_PATH, &request).await
    }
}

/// Parse `key=value;key=value` into (base URL, access key).
fn parse_connection_string(connection_string: &str) -> RowStoreResult<(String, Option<String>)> {
    let mut endpoint: Option<String> = None;
    let mut access_key: Option<String> = None;

    for pair in connection_string.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            RowStoreError::Config(format!("malformed connection-string entry `{pair}`"))
        })?;
        match key.trim().to_ascii_lowercase().as_str() {
            "endpoint" => endpoint = Some(value.trim().to_string()),
            "accesskey" => access_key = Some(value.trim().to_string()),
            other => {
                return Err(RowStoreError::Config(format!(
                    "unknown connection-string key `{other}`"
                )));
            }
        }
    }

    let endpoint = endpoint
        .ok_or_else(|| RowStoreError::Config("connection string has no endpoint".to_string()))?;
    let uri: Uri = endpoint
        .parse()
        .map_err(|e| RowStoreError::Config(format!("endpoint `{endpoint}` is not a URI: {e}")))?;
    if uri.scheme_str() != Some("http") {
        return Err(RowStoreError::Config(format!(
            "endpoint `{endpoint}` must use the http scheme"
        )));
    }
    let authority = uri.authority().ok_or_else(|| {
        RowStoreError::Config(format!("endpoint `{endpoint}` has no host"))
    })?;

    let path = uri.path().trim_end_matches('/');
    Ok((format!("http://{authority}{path}"), access_key))
}

/// Turn a non-2xx answer into a `Service` error, preferring the structured
/// error body's message when the service sent one.
fn service_error(status: StatusCode, bytes: &Bytes) -> RowStoreError {
    let message = serde_json::from_slice::<ServiceErrorBody>(bytes)
        .map(|body| body.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
    RowStoreError::Service {
        status: status.as_u16(),
        message,
    }
}
