//! Textual snapshot format.
//!
//! The whole store is one JSON object mapping document id to document. On
//! load, every document's `id` is reset to its map key so the two can never
//! disagree.

use std::collections::BTreeMap;

use crate::document::{Document, DocumentId};
use crate::storage::traits::StorageError;

/// In-memory form of a snapshot, ordered by id.
pub type DocumentMap = BTreeMap<DocumentId, Document>;

/// Serializes the store state.
pub fn encode(documents: &DocumentMap) -> Result<String, StorageError> {
    serde_json::to_string(documents)
        .map_err(|e| StorageError::InvalidDocument(format!("serialization failed: {e}")))
}

/// Parses a snapshot previously produced by [`encode`] (or by a compatible writer).
pub fn decode(key: &str, text: &str) -> Result<DocumentMap, StorageError> {
    let corrupt = |reason: String| StorageError::CorruptSnapshot {
        key: key.to_string(),
        reason,
    };

    let raw: BTreeMap<String, Document> =
        serde_json::from_str(text).map_err(|e| corrupt(format!("deserialization failed: {e}")))?;

    let mut documents = DocumentMap::new();
    for (key, mut doc) in raw {
        let id = DocumentId::new(key).map_err(|e| corrupt(e.to_string()))?;
        doc.id = Some(id.clone());
        documents.insert(id, doc);
    }
    Ok(documents)
}
