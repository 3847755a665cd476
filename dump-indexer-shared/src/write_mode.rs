//! Write mode for document writes.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// How a document write treats an existing document with the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Fail if a document with the same identity already exists.
    ///
    /// Used against a freshly created index, where a duplicate identity means
    /// the producer emitted the same page twice.
    #[default]
    CreateOnly,
    /// Overwrite any existing document with the same identity.
    Upsert,
}

impl WriteMode {
    /// Name of the bulk action for this mode.
    pub fn bulk_action(self) -> &'static str {
        match self {
            WriteMode::CreateOnly => "create",
            WriteMode::Upsert => "index",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::CreateOnly => f.write_str("create"),
            WriteMode::Upsert => f.write_str("upsert"),
        }
    }
}

/// Error returned when a write mode string is not recognized.
#[derive(Debug, Clone, Error)]
#[error("Unknown write mode '{0}', expected 'create' or 'upsert'")]
pub struct ParseWriteModeError(String);

impl FromStr for WriteMode {
    type Err = ParseWriteModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "create-only" | "create_only" => Ok(WriteMode::CreateOnly),
            "upsert" | "index" => Ok(WriteMode::Upsert),
            other => Err(ParseWriteModeError(other.to_string())),
        }
    }
}
