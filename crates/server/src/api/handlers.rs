//! HTTP request handlers and shared application state.

use crate::api::errors::ApiError;
use crate::api::models::*;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use vexdb_core::document;
use vexdb_core::index::flat::PAD_ID;
use vexdb_core::{config, IndexKind, VectorDatabase};

/// Shared application state passed to every handler.
///
/// The engine is single-threaded; the mutex serializes every request
/// against every other, snapshots included.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<VectorDatabase>>,
    pub start_time: Instant,
}

/// Unwrap the JSON body, mapping extractor rejections into the wire error
/// envelope, and require it to be an object.
fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(format!("Invalid JSON request: {e}")))?;
    if !body.is_object() {
        return Err(ApiError::BadRequest(
            "Request body must be a JSON object".into(),
        ));
    }
    Ok(body)
}

/// Parse and validate the `indexType` field.
fn parse_index_kind(body: &Value) -> Result<IndexKind, ApiError> {
    let name = body
        .get(config::INDEX_TYPE_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::BadRequest("Missing indexType parameter in the request".into())
        })?;
    match IndexKind::parse(name) {
        IndexKind::Unknown => Err(ApiError::BadRequest(format!("Unknown indexType: {name}"))),
        kind => Ok(kind),
    }
}

/// Extract a float array field.
fn parse_vectors(body: &Value) -> Result<Vec<f32>, ApiError> {
    let arr = body
        .get(config::VECTOR_FIELD)
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::BadRequest("Missing vectors parameter in the request".into()))?;
    arr.iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .ok_or_else(|| ApiError::BadRequest("vectors must be an array of numbers".into()))
}

/// `POST /upsert`: insert or update one record, then log it.
///
/// Unlike `search` and `insert`, a missing or unrecognized `indexType` is
/// accepted here: the record is still written, only the ANN step is
/// skipped.
pub async fn upsert(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RetcodeResponse>, ApiError> {
    let body = parse_body(body)?;
    let id = body
        .get(config::ID_FIELD)
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::BadRequest("Missing id parameter in the request".into()))?;
    parse_vectors(&body)?;
    let kind = document::index_kind(&body);

    let mut db = state.db.lock();
    db.upsert(id, &body, kind)?;
    db.write_wal("upsert", &body)?;
    tracing::debug!(id, "upsert complete");
    Ok(Json(RetcodeResponse::ok()))
}

/// `POST /query`: point lookup by record id.
///
/// A hit echoes the stored document with `retcode:0` merged in; a miss is
/// a bare `{retcode:0}`.
pub async fn query(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = parse_body(body)?;
    let id = body
        .get(config::ID_FIELD)
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::BadRequest("Missing id parameter in the request".into()))?;

    let document = state.db.lock().query(id)?;
    let mut response = match document {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    response.insert("retcode".into(), Value::from(0));
    Ok(Json(Value::Object(response)))
}

/// `POST /search`: k-NN search, optionally filtered.
pub async fn search(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let body = parse_body(body)?;
    let vectors = parse_vectors(&body)?;
    let k = body
        .get("k")
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::BadRequest("Missing k parameter in the request".into()))?
        as usize;
    if k == 0 || k > config::MAX_K {
        return Err(ApiError::BadRequest(format!(
            "k must be between 1 and {}",
            config::MAX_K
        )));
    }
    let kind = parse_index_kind(&body)?;

    let filter = match body.get("filter") {
        Some(value) if !value.is_null() => {
            let clause: FilterClause = serde_json::from_value(value.clone())
                .map_err(|e| ApiError::BadRequest(format!("Invalid filter clause: {e}")))?;
            Some(clause.to_search_filter().map_err(ApiError::BadRequest)?)
        }
        _ => None,
    };

    let (ids, distances) = state
        .db
        .lock()
        .search(&vectors, k, kind, filter.as_ref())?;

    // Drop the flat index's padding entries before surfacing results.
    let mut out_ids = Vec::with_capacity(ids.len());
    let mut out_distances = Vec::with_capacity(distances.len());
    for (id, dist) in ids.into_iter().zip(distances) {
        if id != PAD_ID {
            out_ids.push(id);
            out_distances.push(dist);
        }
    }

    Ok(Json(SearchResponse {
        vectors: out_ids,
        distances: out_distances,
        retcode: 0,
    }))
}

/// `POST /insert`: low-level vector insert into an ANN index, bypassing
/// the scalar store, filter index, and log.
pub async fn insert(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RetcodeResponse>, ApiError> {
    let body = parse_body(body)?;
    let request: InsertRequest = serde_json::from_value(body.clone())
        .map_err(|_| ApiError::BadRequest("Missing vectors or id parameter in the request".into()))?;
    let kind = parse_index_kind(&body)?;

    state
        .db
        .lock()
        .insert_vector(request.id, &request.vectors, kind)?;
    Ok(Json(RetcodeResponse::ok()))
}

/// `POST /admin/snapshot`: snapshot all indices.
///
/// Holding the state mutex quiesces writes for the duration.
pub async fn snapshot(
    State(state): State<AppState>,
) -> Result<Json<RetcodeResponse>, ApiError> {
    state.db.lock().take_snapshot()?;
    tracing::info!("snapshot complete");
    Ok(Json(RetcodeResponse::ok()))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
