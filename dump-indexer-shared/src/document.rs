//! Page document definition.
//!
//! A `PageDocument` is built once per dictionary page and never mutated after
//! it has been handed to a loader.

use serde::Serialize;

/// Separator placed between the namespace and the title in a document identity.
///
/// MediaWiki namespace names cannot contain a colon, so splitting an identity at
/// its first separator always recovers the original pair.
pub const IDENTITY_SEPARATOR: char = ':';

/// A dictionary page ready to be indexed.
///
/// The serialized form is the document source stored in the search index:
/// `{"namespace": "...", "title": "...", "text": ["...", ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDocument {
    /// Namespace name of the page (e.g. `Main`, `Talk`).
    pub namespace: String,
    /// Page title without the namespace prefix.
    pub title: String,
    /// Page text, one entry per line.
    pub text: Vec<String>,
    #[serde(skip)]
    identity: String,
}

impl PageDocument {
    /// Create a new page document.
    pub fn new(namespace: impl Into<String>, title: impl Into<String>, text: Vec<String>) -> Self {
        let namespace = namespace.into();
        let title = title.into();
        let identity = Self::identity_of(&namespace, &title);

        Self {
            namespace,
            title,
            text,
            identity,
        }
    }

    /// Create a page document from raw page text, splitting it into lines.
    pub fn from_text(namespace: impl Into<String>, title: impl Into<String>, text: &str) -> Self {
        let segments = text.lines().map(str::to_owned).collect();
        Self::new(namespace, title, segments)
    }

    /// Derive the identity for a namespace and title: `{namespace}:{title}`.
    pub fn identity_of(namespace: &str, title: &str) -> String {
        let mut identity = String::with_capacity(namespace.len() + title.len() + 1);
        identity.push_str(namespace);
        identity.push(IDENTITY_SEPARATOR);
        identity.push_str(title);
        identity
    }

    /// The stable key of this document within the index.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}
