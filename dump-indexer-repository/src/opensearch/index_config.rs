//! OpenSearch index settings bodies.
//!
//! The dump index is created without explicit mappings; only shard and replica
//! counts are fixed. During a bulk load the refresh interval is switched off and
//! restored once loading has finished.

use serde_json::{json, Value};

use crate::types::IndexSettings;

/// Refresh interval applied while bulk loading. `"0"` disables periodic refresh.
pub const BULK_REFRESH_INTERVAL: &str = "0";

/// Refresh interval restored after loading so new documents become searchable.
pub const NORMAL_REFRESH_INTERVAL: &str = "1s";

/// Body of the `PUT /{index}` request.
///
/// Counts are sent as strings, matching what the cluster reports back from
/// `GET /{index}/_settings`.
pub fn create_index_body(settings: &IndexSettings) -> Value {
    json!({
        "settings": {
            "index": {
                "number_of_shards": settings.number_of_shards.to_string(),
                "number_of_replicas": settings.number_of_replicas.to_string()
            }
        }
    })
}

/// Body of the `PUT /{index}/_settings` request that changes the refresh interval.
pub fn refresh_interval_body(interval: &str) -> Value {
    json!({
        "index": {
            "refresh_interval": interval
        }
    })
}
