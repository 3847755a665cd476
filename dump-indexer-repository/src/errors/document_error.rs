//! Per-document error types.
//!
//! A `DocumentError` is the terminal cause recorded for a single document that
//! could not be written. It is `Clone` so it can be kept in the outcome report.

use thiserror::Error;

/// HTTP status returned by the search engine when a create-only write hits an
/// existing document.
pub const CONFLICT_STATUS: u16 = 409;

/// Reasons a single document write can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// A document with the same identity already exists (create-only writes).
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// The search engine rejected the document.
    #[error("Rejected with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    /// The write never completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The document could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The bulk request carrying the document failed as a whole.
    #[error("Bulk request failed: {0}")]
    BulkRequest(String),
}

impl DocumentError {
    /// Create a conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a rejection error.
    pub fn rejected(status: u16, reason: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            reason: reason.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a bulk request error.
    pub fn bulk_request(msg: impl Into<String>) -> Self {
        Self::BulkRequest(msg.into())
    }

    /// Classify a non-success HTTP status returned for a document.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        if status == CONFLICT_STATUS {
            Self::Conflict(reason.into())
        } else {
            Self::rejected(status, reason)
        }
    }

    /// Whether the write may succeed if sent again.
    ///
    /// Transport failures and throttling (429, 503) are transient; conflicts and
    /// other rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => matches!(status, 429 | 503),
            Self::Conflict(_) | Self::Serialization(_) | Self::BulkRequest(_) => false,
        }
    }

    /// Whether the write may have been applied even though it reported failure.
    ///
    /// Only a transport failure leaves this open: the response was lost, not
    /// necessarily the request.
    pub fn may_have_applied(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this failure is a duplicate-identity conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
