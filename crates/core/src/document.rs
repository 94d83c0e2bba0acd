//! Record document helpers.
//!
//! A record is a JSON object keyed by a client-chosen 64-bit identifier.
//! The vector lives under the reserved `vectors` field; every other
//! integer-valued field participates in the filter index. The scalar store
//! holds the authoritative single-line JSON serialization; the ANN and
//! filter indices hold projections derived through the helpers here.

use crate::config;
use crate::index::IndexKind;
use serde_json::Value;

/// Extract the record's vector from the `vectors` field.
///
/// Returns `None` if the field is missing, not an array, or contains a
/// non-numeric element.
pub fn extract_vector(doc: &Value) -> Option<Vec<f32>> {
    let arr = doc.get(config::VECTOR_FIELD)?.as_array()?;
    let mut vector = Vec::with_capacity(arr.len());
    for v in arr {
        vector.push(v.as_f64()? as f32);
    }
    Some(vector)
}

/// Iterate the integer-valued scalar fields of a document, skipping the
/// reserved `id` field.
pub fn int_fields(doc: &Value) -> impl Iterator<Item = (&str, i64)> {
    doc.as_object()
        .into_iter()
        .flat_map(|obj| obj.iter())
        .filter(|(name, _)| name.as_str() != config::ID_FIELD)
        .filter_map(|(name, value)| value.as_i64().map(|v| (name.as_str(), v)))
}

/// Read an integer field from a document, if present and integral.
pub fn int_field(doc: &Value, name: &str) -> Option<i64> {
    doc.get(name)?.as_i64()
}

/// Parse the index kind named by the document's `indexType` field.
///
/// Absent or unrecognized values map to [`IndexKind::Unknown`].
pub fn index_kind(doc: &Value) -> IndexKind {
    doc.get(config::INDEX_TYPE_FIELD)
        .and_then(Value::as_str)
        .map_or(IndexKind::Unknown, IndexKind::parse)
}
