//! The record store: a keyed document collection over a key-value backend.
//!
//! # Consistency
//! - Every value crossing the public API is a copy; callers never share
//!   state with the store.
//! - Mutations are serialized by a single write gate held across
//!   mutate → persist → notify, so subscribers see notifications in
//!   mutation order and one notification per mutating call.
//! - A failed backend write rolls the in-memory state back and emits no
//!   notification.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::config::StoreConfig;
use crate::document::{Document, DocumentId, HerdSummary};
use crate::error::VitalsResult;
use crate::notify::{ChangeEvent, ChangeKind, ChangeNotifier, ChangeStream, SubscriptionId};
use crate::storage::memory::InMemoryBackend;
use crate::storage::snapshot::{self, DocumentMap};
use crate::storage::traits::{KeyValueBackend, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::PersistenceUnavailable(format!("poisoned lock: {context}"))
}

/// Result of [`RecordStore::seed_if_empty`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The store was empty and now holds the seed set.
    Seeded {
        /// Effective ids, in seed order.
        ids: Vec<DocumentId>,
    },
    /// Nothing was written.
    Skipped {
        /// Documents already in the store.
        existing: usize,
    },
}

impl SeedOutcome {
    /// Returns true if documents were written.
    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        matches!(self, Self::Seeded { .. })
    }
}

/// Keyed document store with snapshot persistence and change notification.
#[derive(Debug)]
pub struct RecordStore {
    config: StoreConfig,
    backend: Box<dyn KeyValueBackend>,
    state: RwLock<DocumentMap>,
    write_gate: Mutex<()>,
    notifier: ChangeNotifier,
}

impl RecordStore {
    /// Opens a store, loading the snapshot found under the configured key.
    ///
    /// # Errors
    /// - `Validation` if the configuration is invalid
    /// - `PersistenceUnavailable` if the backend cannot be read
    /// - `CorruptSnapshot` if the snapshot does not decode and recovery is disabled
    pub fn open<B>(backend: B, config: StoreConfig) -> VitalsResult<Self>
    where
        B: KeyValueBackend + 'static,
    {
        let config = config.validate()?;
        let key = config.storage_key.as_str();

        let loaded = backend
            .load(key)
            .and_then(|text| text.map(|t| snapshot::decode(key, &t)).transpose());
        let documents = match loaded {
            Ok(docs) => docs.unwrap_or_default(),
            Err(err @ StorageError::CorruptSnapshot { .. }) if config.recover_corrupt_snapshot => {
                tracing::warn!(key, error = %err, "discarding corrupt snapshot; starting empty");
                DocumentMap::new()
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(key, documents = documents.len(), "record store opened");

        Ok(Self {
            config,
            backend: Box::new(backend),
            state: RwLock::new(documents),
            write_gate: Mutex::new(()),
            notifier: ChangeNotifier::new(),
        })
    }

    /// An empty store over a fresh [`InMemoryBackend`] with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            config: StoreConfig::default(),
            backend: Box::new(InMemoryBackend::new()),
            state: RwLock::new(DocumentMap::new()),
            write_gate: Mutex::new(()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The store's own observer registry.
    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    // ---- reads -----------------------------------------------------------

    /// All documents, ordered by id. Ordering for display is up to the caller.
    pub fn list(&self) -> Result<Vec<Document>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.list"))?;
        Ok(state.values().cloned().collect())
    }

    /// All documents ordered by tag, then id.
    pub fn list_by_tag(&self) -> Result<Vec<Document>, StorageError> {
        let mut docs = self.list()?;
        docs.sort_by(|a, b| a.tag.cmp(&b.tag).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }

    /// An independent copy of one document.
    ///
    /// # Errors
    /// - `NotFound` if `id` is absent
    pub fn get(&self, id: &DocumentId) -> Result<Document, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.get"))?;
        state
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    #[allow(missing_docs)]
    pub fn contains(&self, id: &DocumentId) -> Result<bool, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.contains"))?;
        Ok(state.contains_key(id))
    }

    /// Number of stored documents.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.len"))?;
        Ok(state.len())
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Herd-level counters over the current state.
    pub fn summary(&self) -> Result<HerdSummary, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("store.summary"))?;
        Ok(HerdSummary::from_documents(state.values()))
    }

    // ---- writes ----------------------------------------------------------

    /// Creates or overwrites a document, returning its effective id.
    ///
    /// A missing id is replaced by a freshly generated one. An existing id is
    /// overwritten in place.
    ///
    /// # Errors
    /// - `InvalidDocument` if the document cannot be stored faithfully
    /// - `PersistenceUnavailable` if the backend write fails (nothing changes)
    /// - `ReentrantMutation` when called from a change handler
    pub fn put(&self, document: Document) -> Result<DocumentId, StorageError> {
        let gate = self.begin_mutation()?;
        let doc = self.prepare(document, || DocumentId::generate(&self.config.id_prefix))?;
        let mut ids = self.apply(&gate, vec![doc], |ids| ChangeKind::Put { id: ids[0].clone() })?;
        ids.pop()
            .ok_or_else(|| StorageError::InvalidDocument("document id missing".to_string()))
    }

    /// Inserts many documents in one mutation.
    ///
    /// Later entries overwrite earlier ones sharing an id. Either every
    /// document is persisted or none is.
    pub fn bulk_insert(&self, documents: Vec<Document>) -> Result<Vec<DocumentId>, StorageError> {
        let gate = self.begin_mutation()?;
        let writes = documents
            .into_iter()
            .map(|doc| self.prepare(doc, || DocumentId::generate(&self.config.id_prefix)))
            .collect::<Result<Vec<_>, _>>()?;
        self.apply(&gate, writes, |ids| ChangeKind::BulkInsert { ids: ids.to_vec() })
    }

    /// Inserts `documents` only if the store holds no documents.
    ///
    /// Documents without an id get `<prefix>_<n>`, `n` being their 1-based
    /// position in the seed set. An empty seed set is always skipped.
    pub fn seed_if_empty(&self, documents: Vec<Document>) -> Result<SeedOutcome, StorageError> {
        let gate = self.begin_mutation()?;

        let existing = self.len()?;
        if existing > 0 || documents.is_empty() {
            tracing::info!(existing, offered = documents.len(), "seed skipped");
            return Ok(SeedOutcome::Skipped { existing });
        }

        let prefix = self.config.id_prefix.as_str();
        let writes = documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| self.prepare(doc, || DocumentId::seeded(prefix, i + 1)))
            .collect::<Result<Vec<_>, _>>()?;

        let ids = self.apply(&gate, writes, |ids| ChangeKind::Seeded { ids: ids.to_vec() })?;
        tracing::info!(documents = self.len()?, "store seeded");
        Ok(SeedOutcome::Seeded { ids })
    }

    /// Read-modify-write of one document under the write gate.
    ///
    /// `f` works on a copy; nothing is persisted if it fails. The id cannot
    /// be changed. `f` must not call back into this store's mutating methods.
    ///
    /// # Errors
    /// - `NotFound` if `id` is absent
    /// - whatever `f` returns
    /// - any error `put` can return
    pub fn update<F>(&self, id: &DocumentId, f: F) -> VitalsResult<Document>
    where
        F: FnOnce(&mut Document) -> VitalsResult<()>,
    {
        let gate = self.begin_mutation()?;

        let mut doc = self.get(id)?;
        f(&mut doc)?;
        doc.id = Some(id.clone());
        doc.validate()
            .map_err(|e| StorageError::InvalidDocument(e.to_string()))?;

        self.apply(&gate, vec![doc.clone()], |ids| ChangeKind::Put { id: ids[0].clone() })?;
        Ok(doc)
    }

    /// Marks a document as synced and re-persists it. No rule evaluation.
    pub fn acknowledge_sync(&self, id: &DocumentId) -> VitalsResult<Document> {
        self.update(id, |doc| {
            doc.synced = true;
            Ok(())
        })
    }

    // ---- subscriptions ---------------------------------------------------

    /// Registers a handler invoked after every committed mutation.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    /// Registers a channel subscription with the configured buffer size.
    pub fn subscribe_stream(&self) -> ChangeStream {
        self.notifier.subscribe_stream(self.config.stream_capacity)
    }

    /// Deregisters a handler. Idempotent.
    pub fn cancel(&self, id: SubscriptionId) -> bool {
        self.notifier.cancel(id)
    }

    // ---- internals -------------------------------------------------------

    fn begin_mutation(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        if self.notifier.is_dispatching_on_current_thread() {
            return Err(StorageError::ReentrantMutation);
        }
        self.write_gate.lock().map_err(|_| lock_err("store.write_gate"))
    }

    fn prepare(
        &self,
        mut document: Document,
        fallback_id: impl FnOnce() -> DocumentId,
    ) -> Result<Document, StorageError> {
        document
            .validate()
            .map_err(|e| StorageError::InvalidDocument(e.to_string()))?;
        if document.id.is_none() {
            document.id = Some(fallback_id());
        }
        Ok(document)
    }

    /// Commits `writes`, then notifies. The caller holds the write gate.
    fn apply(
        &self,
        _gate: &MutexGuard<'_, ()>,
        writes: Vec<Document>,
        kind: impl FnOnce(&[DocumentId]) -> ChangeKind,
    ) -> Result<Vec<DocumentId>, StorageError> {
        let (ids, documents) = self.commit(writes)?;
        let sequence = self.notifier.publish(kind(&ids), documents);
        tracing::debug!(sequence, documents = ids.len(), "store mutation committed");
        Ok(ids)
    }

    fn commit(
        &self,
        writes: Vec<Document>,
    ) -> Result<(Vec<DocumentId>, Arc<[Document]>), StorageError> {
        let ids = writes
            .iter()
            .map(|doc| doc.id.clone())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| StorageError::InvalidDocument("document id missing".to_string()))?;

        let mut state = self.state.write().map_err(|_| lock_err("store.commit"))?;
        let mut undo: Vec<(DocumentId, Option<Document>)> = Vec::with_capacity(writes.len());
        for (id, doc) in ids.iter().zip(writes) {
            let previous = state.insert(id.clone(), doc);
            undo.push((id.clone(), previous));
        }

        let persisted = snapshot::encode(&state)
            .and_then(|text| self.backend.store(&self.config.storage_key, &text));

        if let Err(err) = persisted {
            for (id, previous) in undo.into_iter().rev() {
                match previous {
                    Some(doc) => {
                        state.insert(id, doc);
                    }
                    None => {
                        state.remove(&id);
                    }
                }
            }
            tracing::warn!(error = %err, "store write failed; state rolled back");
            return Err(err);
        }

        let documents: Arc<[Document]> = state.values().cloned().collect();
        Ok((ids, documents))
    }
}
