//! Document store on `SQLite`
//!
//! Documents are JSON rows keyed by `(collection, id)`. A batch runs inside
//! one transaction, so a failing operation rolls back the whole batch.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::{Document, DocumentRef, FieldMap, RemoteStore, WriteBatch, WriteOp};
use crate::db::Database;
use crate::error::{Error, Result};

/// `SQLite` implementation of `RemoteStore`
pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    fn load(conn: &Connection, doc: &DocumentRef) -> Result<Option<Document>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ? AND id = ?",
                params![doc.collection, doc.id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|raw| {
            serde_json::from_str::<Document>(&raw)
                .map_err(|_| Error::CorruptData(format!("document {doc}")))
        })
        .transpose()
    }

    fn apply(conn: &Connection, op: WriteOp, now: i64) -> Result<()> {
        let doc = op.doc().clone();
        let current = Self::load(conn, &doc)?;
        match op.apply(current, now)? {
            Some(document) => {
                conn.execute(
                    "INSERT INTO documents (collection, id, data, updated_at) VALUES (?, ?, ?, ?)
                     ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                    params![doc.collection, doc.id, serde_json::to_string(&document)?, now],
                )?;
            }
            None => {
                conn.execute(
                    "DELETE FROM documents WHERE collection = ? AND id = ?",
                    params![doc.collection, doc.id],
                )?;
            }
        }
        Ok(())
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl RemoteStore for SqliteDocumentStore {
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<Document>> {
        let conn = self.db.connection()?;
        Self::load(&conn, doc)
    }

    async fn set_document(&self, doc: &DocumentRef, fields: FieldMap, merge: bool) -> Result<()> {
        let conn = self.db.connection()?;
        let op = WriteOp::Set {
            doc: doc.clone(),
            fields,
            merge,
        };
        Self::apply(&conn, op, Self::now())
    }

    async fn update_document(&self, doc: &DocumentRef, fields: FieldMap) -> Result<()> {
        let conn = self.db.connection()?;
        let op = WriteOp::Update {
            doc: doc.clone(),
            fields,
        };
        Self::apply(&conn, op, Self::now())
    }

    async fn delete_document(&self, doc: &DocumentRef) -> Result<()> {
        let conn = self.db.connection()?;
        Self::apply(&conn, WriteOp::Delete { doc: doc.clone() }, Self::now())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        let now = Self::now();
        for op in batch.into_ops() {
            Self::apply(&tx, op, now)?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn server_time(&self) -> Result<i64> {
        Ok(Self::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{fields_from_document, FieldValue};
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(value: serde_json::Value) -> FieldMap {
        fields_from_document(value.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let doc = DocumentRef::new("cart_items", "c1");

        store
            .set_document(&doc, fields(json!({"quantity": 1})), false)
            .await
            .unwrap();
        let mut update = fields(json!({"quantity": 3}));
        update.insert("updatedAt".into(), FieldValue::ServerTimestamp);
        store.update_document(&doc, update).await.unwrap();

        let stored = store.get_document(&doc).await.unwrap().unwrap();
        assert_eq!(stored["quantity"], 3);
        assert!(stored["updatedAt"].as_i64().is_some());

        store.delete_document(&doc).await.unwrap();
        assert!(store.get_document(&doc).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let existing = DocumentRef::new("cart_items", "c1");
        store
            .set_document(&existing, fields(json!({"quantity": 1})), false)
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(existing.clone());
        batch.update(DocumentRef::new("cart_items", "ghost"), fields(json!({"quantity": 2})));

        assert!(store.commit(batch).await.is_err());
        assert!(store.get_document(&existing).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("documents.db");
        let doc = DocumentRef::new("cart_backups", "u1");
        {
            let store = SqliteDocumentStore::open(&path).unwrap();
            store
                .set_document(&doc, fields(json!({"userId": "u1"})), true)
                .await
                .unwrap();
        }
        let store = SqliteDocumentStore::open(&path).unwrap();
        let stored = store.get_document(&doc).await.unwrap().unwrap();
        assert_eq!(stored["userId"], "u1");
    }
}
