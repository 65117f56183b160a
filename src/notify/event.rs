//! Change event types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{Document, DocumentId};

/// Unique identifier for a subscription.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which store operation produced an event.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    /// A single document was written (`put`, `update`, sync acknowledgment).
    Put { id: DocumentId },
    /// `bulk_insert` wrote these documents, in input order.
    BulkInsert { ids: Vec<DocumentId> },
    /// `seed_if_empty` populated an empty store.
    Seeded { ids: Vec<DocumentId> },
}

/// Emitted once per committed mutation.
///
/// Carries the changed ids and a snapshot of the full store state as it was
/// right after the mutation. The snapshot is shared between subscribers and
/// immutable; clone a document out of it to modify it.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Store-local mutation counter, starting at 1.
    pub sequence: u64,
    /// What changed.
    pub kind: ChangeKind,
    documents: Arc<[Document]>,
}

impl ChangeEvent {
    pub(crate) fn new(sequence: u64, kind: ChangeKind, documents: Arc<[Document]>) -> Self {
        Self {
            sequence,
            kind,
            documents,
        }
    }

    /// All documents in the store after the mutation, ordered by id.
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Ids touched by the mutation.
    #[must_use]
    pub fn changed_ids(&self) -> &[DocumentId] {
        match &self.kind {
            ChangeKind::Put { id } => std::slice::from_ref(id),
            ChangeKind::BulkInsert { ids } | ChangeKind::Seeded { ids } => ids,
        }
    }

    /// Looks up one document in the post-mutation snapshot.
    #[must_use]
    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.documents
            .binary_search_by(|doc| doc.id.as_ref().cmp(&Some(id)))
            .ok()
            .map(|idx| &self.documents[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Arc<[Document]> {
        vec![
            Document::new("A", "cow").with_id("animal_1"),
            Document::new("B", "cow").with_id("animal_2"),
        ]
        .into()
    }

    #[test]
    fn test_changed_ids_for_put() {
        let id = DocumentId::from("animal_2");
        let ev = ChangeEvent::new(1, ChangeKind::Put { id: id.clone() }, snapshot());
        assert_eq!(ev.changed_ids(), &[id.clone()]);
        assert_eq!(ev.document(&id).map(|d| d.tag.as_str()), Some("B"));
        assert!(ev.document(&DocumentId::from("animal_9")).is_none());
    }

    #[test]
    fn test_kind_serializes_tagged() {
        let kind = ChangeKind::Seeded {
            ids: vec![DocumentId::from("animal_1")],
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "seeded");
        assert_eq!(json["ids"][0], "animal_1");
    }
}
