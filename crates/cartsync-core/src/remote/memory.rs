//! In-memory document store

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Document, DocumentRef, FieldMap, RemoteStore, WriteBatch, WriteOp};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    documents: BTreeMap<DocumentRef, Document>,
    reject_commits: bool,
    reject_writes: bool,
    server_time: Option<i64>,
    calls: usize,
    commits: usize,
}

/// Document store held in process memory; clones share the same state
///
/// Failure switches let callers simulate a network outage for batch commits
/// or for single-document writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<State>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `commit` fail without applying anything
    pub fn set_reject_commits(&self, reject: bool) {
        if let Ok(mut state) = self.lock() {
            state.reject_commits = reject;
        }
    }

    /// Make single-document `set`/`update`/`delete` calls fail
    pub fn set_reject_writes(&self, reject: bool) {
        if let Ok(mut state) = self.lock() {
            state.reject_writes = reject;
        }
    }

    /// Pin the server clock; `None` follows the system clock
    pub fn set_server_time(&self, server_time: Option<i64>) {
        if let Ok(mut state) = self.lock() {
            state.server_time = server_time;
        }
    }

    /// Number of store operations issued so far
    pub fn call_count(&self) -> usize {
        self.lock().map_or(0, |state| state.calls)
    }

    /// Number of successfully applied batches
    pub fn commit_count(&self) -> usize {
        self.lock().map_or(0, |state| state.commits)
    }

    /// Read a document without counting it as a store call
    pub fn document(&self, doc: &DocumentRef) -> Option<Document> {
        self.lock()
            .ok()
            .and_then(|state| state.documents.get(doc).cloned())
    }

    /// Seed a document without counting it as a store call
    pub fn insert_document(&self, doc: DocumentRef, document: Document) {
        if let Ok(mut state) = self.lock() {
            state.documents.insert(doc, document);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Remote("memory remote store lock poisoned".into()))
    }

    fn now(state: &State) -> i64 {
        state
            .server_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
    }

    fn write(&self, op: WriteOp) -> Result<()> {
        let mut state = self.lock()?;
        state.calls += 1;
        if state.reject_writes {
            return Err(Error::Remote(format!("write to {} rejected", op.doc())));
        }
        let now = Self::now(&state);
        let doc = op.doc().clone();
        let current = state.documents.get(&doc).cloned();
        match op.apply(current, now)? {
            Some(document) => state.documents.insert(doc, document),
            None => state.documents.remove(&doc),
        };
        Ok(())
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<Document>> {
        let mut state = self.lock()?;
        state.calls += 1;
        Ok(state.documents.get(doc).cloned())
    }

    async fn set_document(&self, doc: &DocumentRef, fields: FieldMap, merge: bool) -> Result<()> {
        self.write(WriteOp::Set {
            doc: doc.clone(),
            fields,
            merge,
        })
    }

    async fn update_document(&self, doc: &DocumentRef, fields: FieldMap) -> Result<()> {
        self.write(WriteOp::Update {
            doc: doc.clone(),
            fields,
        })
    }

    async fn delete_document(&self, doc: &DocumentRef) -> Result<()> {
        self.write(WriteOp::Delete { doc: doc.clone() })
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.lock()?;
        state.calls += 1;
        if state.reject_commits {
            return Err(Error::Remote("batch commit rejected".into()));
        }

        let now = Self::now(&state);
        let mut staged = state.documents.clone();
        for op in batch.into_ops() {
            let doc = op.doc().clone();
            let current = staged.get(&doc).cloned();
            match op.apply(current, now)? {
                Some(document) => staged.insert(doc, document),
                None => staged.remove(&doc),
            };
        }

        state.documents = staged;
        state.commits += 1;
        Ok(())
    }

    async fn server_time(&self) -> Result<i64> {
        let mut state = self.lock()?;
        state.calls += 1;
        Ok(Self::now(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FieldValue;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> FieldMap {
        super::super::fields_from_document(value.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryRemoteStore::new();
        let existing = DocumentRef::new("cart_items", "c1");
        store.insert_document(existing.clone(), json!({"quantity": 1}).as_object().cloned().unwrap());

        let mut batch = WriteBatch::new();
        batch.update(existing.clone(), fields(json!({"quantity": 5})));
        batch.update(DocumentRef::new("cart_items", "missing"), fields(json!({"quantity": 2})));

        assert!(store.commit(batch).await.is_err());
        assert_eq!(store.document(&existing).unwrap()["quantity"], 1);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_commit_counts_call() {
        let store = MemoryRemoteStore::new();
        store.set_reject_commits(true);
        assert!(store.commit(WriteBatch::new()).await.is_err());
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_server_time_resolves_sentinels() {
        let store = MemoryRemoteStore::new();
        store.set_server_time(Some(1_234));
        let doc = DocumentRef::new("cart_backups", "u1");
        let mut write = FieldMap::new();
        write.insert("at".into(), FieldValue::ServerTimestamp);
        store.set_document(&doc, write, true).await.unwrap();

        let stored = store.get_document(&doc).await.unwrap().unwrap();
        assert_eq!(stored["at"], 1_234);
        assert_eq!(store.server_time().await.unwrap(), 1_234);
    }

    #[tokio::test]
    async fn test_rejected_writes() {
        let store = MemoryRemoteStore::new();
        store.set_reject_writes(true);
        let doc = DocumentRef::new("cart_backups", "u1");
        assert!(store.set_document(&doc, FieldMap::new(), false).await.is_err());
        assert!(store.document(&doc).is_none());
    }
}
