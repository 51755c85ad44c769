//! Wire types for the row service.
//!
//! Rows and request/response bodies are JSON with camelCase field names,
//! matching the service's entity layout. Row addressing always travels in
//! request bodies, never in URL paths, so keys need no percent-encoding.

use serde::{Deserialize, Serialize};

/// A single stored row.
///
/// `content` carries the serialized payload of one table; the row store
/// itself never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowEntity {
    pub partition_key: String,
    pub row_key: String,
    pub content: String,
}

impl RowEntity {
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            content: content.into(),
        }
    }
}

// ── Request/response bodies ────────────────────────────────────────

/// POST /v1/tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    pub table: String,
}

/// POST /v1/rows/query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRowsRequest {
    pub table: String,
    pub partition_key: String,
    pub row_key: String,
}

/// 200 body of /v1/rows/query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRowsResponse {
    pub rows: Vec<RowEntity>,
}

/// POST /v1/rows/upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRowRequest {
    pub table: String,
    pub row: RowEntity,
}

/// POST /v1/rows/delete
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowRequest {
    pub table: String,
    pub partition_key: String,
    pub row_key: String,
}

/// Error body the service sends with non-2xx answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_entity_wire_shape_is_camel_case() {
        let row = RowEntity::new("p", "p-users", r#"{"a":1}"#);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["partitionKey"], "p");
        assert_eq!(json["rowKey"], "p-users");
        assert_eq!(json["content"], r#"{"a":1}"#);
    }

    #[test]
    fn query_response_round_trips() {
        let body = r#"{"rows":[{"partitionKey":"p","rowKey":"p-t","content":"{}"}]}"#;
        let parsed: QueryRowsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].row_key, "p-t");
    }

    #[test]
    fn error_body_code_is_optional() {
        let bare: ServiceErrorBody = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(bare.code, None);
        assert_eq!(bare.message, "nope");

        let coded: ServiceErrorBody =
            serde_json::from_str(r#"{"code":"TableAlreadyExists","message":"exists"}"#).unwrap();
        assert_eq!(coded.code.as_deref(), Some("TableAlreadyExists"));
    }
}
