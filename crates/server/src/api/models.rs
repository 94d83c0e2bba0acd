//! Request and response data transfer objects for the REST API.
//!
//! Upsert and search bodies carry reserved fields next to free-form ones,
//! so they stay `serde_json::Value` and are validated field-by-field in the
//! handlers; the filter clause and the insert body are typed.

use serde::{Deserialize, Serialize};
use vexdb_core::{FilterOp, SearchFilter};

/// Filter clause of a search request: `{fieldName, op, value}`.
#[derive(Debug, Deserialize)]
pub struct FilterClause {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub op: String,
    pub value: i64,
}

impl FilterClause {
    /// Convert to the core filter, rejecting unknown operators.
    pub fn to_search_filter(&self) -> Result<SearchFilter, String> {
        let op = match self.op.as_str() {
            "=" => FilterOp::Equal,
            "!=" => FilterOp::NotEqual,
            other => return Err(format!("Unknown filter op: {other}")),
        };
        Ok(SearchFilter {
            field: self.field_name.clone(),
            op,
            value: self.value,
        })
    }
}

/// Request body for `POST /insert`. The `indexType` field is validated
/// separately against the raw body.
#[derive(Debug, Deserialize)]
pub struct InsertRequest {
    pub id: u64,
    pub vectors: Vec<f32>,
}

/// Response body for `POST /search`: matching ids and distances in parallel
/// arrays.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub vectors: Vec<i64>,
    pub distances: Vec<f32>,
    pub retcode: i32,
}

/// Generic success envelope.
#[derive(Debug, Serialize)]
pub struct RetcodeResponse {
    pub retcode: i32,
}

impl RetcodeResponse {
    pub fn ok() -> Self {
        Self { retcode: 0 }
    }
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}
