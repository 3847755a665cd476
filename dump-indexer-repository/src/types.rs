//! Request and response types for index operations.

use crate::errors::DocumentError;

/// Type segment used in document paths when no legacy mapping type is configured.
pub const DEFAULT_DOC_TYPE: &str = "_doc";

/// Index and document type that documents are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    /// Name of the index.
    pub index: String,
    /// Mapping type used in single-document paths (`_doc` on current clusters).
    pub doc_type: String,
}

impl IndexTarget {
    /// Create a target for the given index using the default `_doc` type.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: DEFAULT_DOC_TYPE.to_string(),
        }
    }

    /// Use a custom mapping type (legacy Elasticsearch clusters).
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = doc_type.into();
        self
    }

    /// Whether a legacy mapping type is configured.
    pub fn has_legacy_type(&self) -> bool {
        self.doc_type != DEFAULT_DOC_TYPE
    }

    /// Path of a single document: `/{index}/{type}/{id}` with the id URL-encoded.
    pub fn document_path(&self, id: &str) -> String {
        format!(
            "/{}/{}/{}",
            self.index,
            self.doc_type,
            urlencoding::encode(id)
        )
    }
}

/// Shard and replica counts fixed at index creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    /// Number of primary shards.
    pub number_of_shards: u32,
    /// Number of replicas per shard.
    pub number_of_replicas: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 0,
        }
    }
}

/// A document whose source has already been serialized to JSON bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedDocument {
    /// Document identity, used as the `_id`.
    pub id: String,
    /// JSON-encoded document source.
    pub source: Vec<u8>,
}

impl SerializedDocument {
    /// Create a serialized document.
    pub fn new(id: impl Into<String>, source: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// Size of the serialized source in bytes.
    pub fn size(&self) -> usize {
        self.source.len()
    }
}

/// Outcome of one document within a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemOutcome {
    /// Document identity.
    pub id: String,
    /// `Ok` if the document was written, otherwise the failure cause.
    pub result: Result<(), DocumentError>,
}

impl BulkItemOutcome {
    /// A successful item.
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: Ok(()),
        }
    }

    /// A failed item.
    pub fn failure(id: impl Into<String>, error: DocumentError) -> Self {
        Self {
            id: id.into(),
            result: Err(error),
        }
    }
}
