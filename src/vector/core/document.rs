//! Document records stored alongside vectors.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Allocate a fresh, random identity.
    pub fn new() -> Self {
        DocumentId(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An opaque payload stored next to a vector.
///
/// Equality is identity-based: two documents built from the same text are
/// distinct records. Clones share the identity of their source, and the
/// identity is persisted, so a document read back from disk still equals the
/// one that was saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    /// Original text of the record.
    pub text: String,
    /// Where the text came from, if known.
    pub source_path: Option<String>,
    /// Line within `source_path`, if known.
    pub line_number: Option<u64>,
}

impl Document {
    /// Create a document with a fresh identity.
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            id: DocumentId::new(),
            text: text.into(),
            source_path: None,
            line_number: None,
        }
    }

    /// Create a document that records its provenance.
    pub fn with_source<S: Into<String>, P: Into<String>>(
        text: S,
        source_path: P,
        line_number: Option<u64>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            text: text.into(),
            source_path: Some(source_path.into()),
            line_number,
        }
    }

    /// The identity of this document.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The stored text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
