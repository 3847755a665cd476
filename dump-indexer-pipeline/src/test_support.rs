//! In-memory search engine used by the pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use dump_indexer_repository::{
    BulkItemOutcome, DocumentError, IndexSettings, IndexTarget, SearchEngineClient, SearchError,
    SerializedDocument,
};
use dump_indexer_shared::WriteMode;

#[derive(Debug, Default)]
struct MockIndex {
    documents: HashMap<String, Value>,
    refresh_interval: Option<String>,
}

/// Mock search client keeping indices in memory.
#[derive(Default)]
pub struct MockSearchClient {
    indices: Mutex<HashMap<String, MockIndex>>,
    hang: AtomicBool,
    held: AtomicBool,
    released: Notify,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    fail_settings: AtomicBool,
    fail_flush: AtomicBool,
    fail_next_writes: AtomicU32,
    lose_next_acks: AtomicU32,
    delete_calls: AtomicUsize,
    create_calls: AtomicUsize,
    settings_calls: AtomicUsize,
    flush_calls: AtomicUsize,
    write_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes never complete.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Writes wait until `release_writes` is called.
    pub fn hold_writes(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_writes(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.released.notify_waiters();
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_settings(&self, fail: bool) {
        self.fail_settings.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// The next `count` write requests are throttled without being applied.
    pub fn fail_next_writes(&self, count: u32) {
        self.fail_next_writes.store(count, Ordering::SeqCst);
    }

    /// The next `count` write requests are applied but answered with a
    /// transport error, as if the response had been lost.
    pub fn lose_next_acks(&self, count: u32) {
        self.lose_next_acks.store(count, Ordering::SeqCst);
    }

    /// Seed an index as if left over from a previous run.
    pub fn insert_index(&self, index: &str, documents: &[(&str, Value)]) {
        let mut indices = self.indices.lock().unwrap();
        let entry = indices.entry(index.to_string()).or_default();
        for (id, source) in documents {
            entry.documents.insert(id.to_string(), source.clone());
        }
    }

    pub fn index_exists(&self, index: &str) -> bool {
        self.indices.lock().unwrap().contains_key(index)
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map_or(0, |i| i.documents.len())
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .and_then(|i| i.documents.get(id).cloned())
    }

    pub fn refresh_interval(&self, index: &str) -> Option<String> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .and_then(|i| i.refresh_interval.clone())
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn settings_calls(&self) -> usize {
        self.settings_calls.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    async fn maybe_hang(&self) {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        loop {
            let released = self.released.notified();
            if !self.held.load(Ordering::SeqCst) {
                return;
            }
            released.await;
        }
    }

    fn take_transient_failure(&self) -> bool {
        take_one(&self.fail_next_writes)
    }

    fn take_lost_ack(&self) -> bool {
        take_one(&self.lose_next_acks)
    }

    fn store(&self, index: &str, document: &SerializedDocument, mode: WriteMode) -> Result<(), DocumentError> {
        let source: Value = serde_json::from_slice(&document.source)
            .map_err(|e| DocumentError::rejected(400, e.to_string()))?;

        let mut indices = self.indices.lock().unwrap();
        let entry = indices.entry(index.to_string()).or_default();
        if mode == WriteMode::CreateOnly && entry.documents.contains_key(&document.id) {
            return Err(DocumentError::conflict(format!(
                "[{}]: version conflict, document already exists",
                document.id
            )));
        }
        entry.documents.insert(document.id.clone(), source);
        Ok(())
    }
}

#[async_trait]
impl SearchEngineClient for MockSearchClient {
    async fn delete_index(&self, index: &str) -> Result<bool, SearchError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SearchError::index_deletion("security_exception"));
        }
        Ok(self.indices.lock().unwrap().remove(index).is_some())
    }

    async fn create_index(&self, index: &str, _settings: &IndexSettings) -> Result<(), SearchError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SearchError::index_creation("cluster_block_exception"));
        }

        let mut indices = self.indices.lock().unwrap();
        if indices.contains_key(index) {
            return Err(SearchError::index_creation("resource_already_exists_exception"));
        }
        indices.insert(index.to_string(), MockIndex::default());
        Ok(())
    }

    async fn put_refresh_interval(&self, index: &str, interval: &str) -> Result<(), SearchError> {
        self.settings_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_settings.load(Ordering::SeqCst) {
            return Err(SearchError::settings("index_closed_exception"));
        }

        match self.indices.lock().unwrap().get_mut(index) {
            Some(entry) => {
                entry.refresh_interval = Some(interval.to_string());
                Ok(())
            }
            None => Err(SearchError::settings("index_not_found_exception")),
        }
    }

    async fn flush_index(&self, _index: &str) -> Result<(), SearchError> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(SearchError::flush("flush failed"));
        }
        Ok(())
    }

    async fn write_document(
        &self,
        target: &IndexTarget,
        document: &SerializedDocument,
        mode: WriteMode,
    ) -> Result<(), DocumentError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_hang().await;
        if self.take_transient_failure() {
            return Err(DocumentError::rejected(429, "es_rejected_execution_exception"));
        }
        let result = self.store(&target.index, document, mode);
        if self.take_lost_ack() {
            return Err(DocumentError::transport("operation timed out"));
        }
        result
    }

    async fn bulk_write(
        &self,
        target: &IndexTarget,
        documents: &[SerializedDocument],
        mode: WriteMode,
    ) -> Result<Vec<BulkItemOutcome>, SearchError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_hang().await;
        if self.take_transient_failure() {
            return Err(SearchError::Throttled {
                status: 429,
                body: "es_rejected_execution_exception".to_string(),
            });
        }

        let outcomes = documents
            .iter()
            .map(|document| BulkItemOutcome {
                id: document.id.clone(),
                result: self.store(&target.index, document, mode),
            })
            .collect();
        if self.take_lost_ack() {
            return Err(SearchError::transport("operation timed out"));
        }
        Ok(outcomes)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        Ok(true)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
