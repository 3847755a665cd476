//! Bulk request encoding and response decoding.

use serde_json::{json, Map, Value};

use crate::errors::{DocumentError, SearchError};
use crate::types::{BulkItemOutcome, IndexTarget, SerializedDocument};
use dump_indexer_shared::WriteMode;

/// Build the NDJSON action line that precedes a document source in a bulk body.
///
/// `{"create":{"_id":"..."}}` for create-only writes, `{"index":{"_id":"..."}}`
/// for upserts. The `_type` field is only sent when a legacy mapping type is
/// configured.
pub fn bulk_action_line(target: &IndexTarget, id: &str, mode: WriteMode) -> Value {
    let mut meta = json!({ "_id": id });
    if target.has_legacy_type() {
        meta["_type"] = json!(target.doc_type);
    }

    let mut action = Map::new();
    action.insert(mode.bulk_action().to_string(), meta);
    Value::Object(action)
}

/// Decode a bulk response into one outcome per submitted document.
///
/// Items are matched to documents by position, which is the order the search
/// engine guarantees for bulk responses.
pub fn parse_bulk_response(
    response: &Value,
    documents: &[SerializedDocument],
) -> Result<Vec<BulkItemOutcome>, SearchError> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::parse("Bulk response has no items array"))?;

    if items.len() != documents.len() {
        return Err(SearchError::parse(format!(
            "Bulk response has {} items for {} documents",
            items.len(),
            documents.len()
        )));
    }

    items
        .iter()
        .zip(documents)
        .map(|(item, document)| parse_item(item, &document.id))
        .collect()
}

fn parse_item(item: &Value, id: &str) -> Result<BulkItemOutcome, SearchError> {
    // Each item is keyed by its action name: {"create": {...}} or {"index": {...}}.
    let result = item
        .as_object()
        .and_then(|object| object.values().next())
        .ok_or_else(|| SearchError::parse(format!("Malformed bulk item for {}", id)))?;

    let status = result
        .get("status")
        .and_then(Value::as_u64)
        .ok_or_else(|| SearchError::parse(format!("Bulk item for {} has no status", id)))?;

    if (200..300).contains(&status) {
        return Ok(BulkItemOutcome::success(id));
    }

    let reason = result
        .get("error")
        .map(error_reason)
        .unwrap_or_else(|| format!("status {}", status));

    Ok(BulkItemOutcome::failure(
        id,
        DocumentError::from_status(status as u16, reason),
    ))
}

/// Render an error object as `type: reason`, falling back to the raw JSON.
pub(crate) fn error_reason(error: &Value) -> String {
    let kind = error.get("type").and_then(Value::as_str);
    let reason = error.get("reason").and_then(Value::as_str);

    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
        (Some(kind), None) => kind.to_string(),
        (None, Some(reason)) => reason.to_string(),
        (None, None) => error.to_string(),
    }
}
