//! Remote document store abstraction.
//!
//! The engine needs a generic document database: single-document
//! get/set/update/delete, an atomic multi-document batch, and a server-side
//! timestamp that can be embedded in written fields.

mod memory;
mod sqlite;

pub use memory::MemoryRemoteStore;
pub use sqlite::SqliteDocumentStore;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A stored document: a JSON object
pub type Document = Map<String, Value>;

/// Fields written to a document
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Address of one document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A field value as written, before the store resolves sentinels
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's clock (Unix ms) when the write is applied
    ServerTimestamp,
    /// Nested object; merged key by key on merge-writes
    Map(FieldMap),
}

impl FieldValue {
    fn resolve(self, server_now: i64) -> Value {
        match self {
            Self::Value(value) => value,
            Self::ServerTimestamp => Value::from(server_now),
            Self::Map(fields) => Value::Object(resolve_fields(fields, server_now)),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Convert a plain JSON object into write fields
pub fn fields_from_document(document: Document) -> FieldMap {
    document
        .into_iter()
        .map(|(key, value)| (key, FieldValue::Value(value)))
        .collect()
}

fn resolve_fields(fields: FieldMap, server_now: i64) -> Document {
    fields
        .into_iter()
        .map(|(key, value)| (key, value.resolve(server_now)))
        .collect()
}

fn merge_into(target: &mut Document, fields: FieldMap, server_now: i64) {
    for (key, value) in fields {
        match value {
            FieldValue::Map(nested) => {
                let slot = target
                    .entry(key)
                    .or_insert_with(|| Value::Object(Document::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Document::new());
                }
                if let Value::Object(existing) = slot {
                    merge_into(existing, nested, server_now);
                }
            }
            other => {
                target.insert(key, other.resolve(server_now));
            }
        }
    }
}

/// One operation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or overwrite; with `merge` existing fields not named are kept
    Set {
        doc: DocumentRef,
        fields: FieldMap,
        merge: bool,
    },
    /// Change named top-level fields; fails if the document does not exist
    Update { doc: DocumentRef, fields: FieldMap },
    /// Remove the document; deleting a missing document is not an error
    Delete { doc: DocumentRef },
}

impl WriteOp {
    pub const fn doc(&self) -> &DocumentRef {
        match self {
            Self::Set { doc, .. } | Self::Update { doc, .. } | Self::Delete { doc } => doc,
        }
    }

    /// Compute the document state after this write
    pub fn apply(self, current: Option<Document>, server_now: i64) -> Result<Option<Document>> {
        match self {
            Self::Set {
                fields,
                merge: false,
                ..
            } => Ok(Some(resolve_fields(fields, server_now))),
            Self::Set {
                fields,
                merge: true,
                ..
            } => {
                let mut document = current.unwrap_or_default();
                merge_into(&mut document, fields, server_now);
                Ok(Some(document))
            }
            Self::Update { doc, fields } => {
                let mut document =
                    current.ok_or_else(|| Error::NotFound(format!("no document to update: {doc}")))?;
                for (key, value) in fields {
                    document.insert(key, value.resolve(server_now));
                }
                Ok(Some(document))
            }
            Self::Delete { .. } => Ok(None),
        }
    }
}

/// Ordered multi-document write committed atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn set(&mut self, doc: DocumentRef, fields: FieldMap, merge: bool) -> &mut Self {
        self.ops.push(WriteOp::Set { doc, fields, merge });
        self
    }

    pub fn update(&mut self, doc: DocumentRef, fields: FieldMap) -> &mut Self {
        self.ops.push(WriteOp::Update { doc, fields });
        self
    }

    pub fn delete(&mut self, doc: DocumentRef) -> &mut Self {
        self.ops.push(WriteOp::Delete { doc });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Trait for remote document store operations (async)
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Fetch a document, `None` when it does not exist
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<Document>>;

    /// Create or overwrite a document (merging when `merge` is set)
    async fn set_document(&self, doc: &DocumentRef, fields: FieldMap, merge: bool) -> Result<()>;

    /// Change fields of an existing document
    async fn update_document(&self, doc: &DocumentRef, fields: FieldMap) -> Result<()>;

    /// Delete a document
    async fn delete_document(&self, doc: &DocumentRef) -> Result<()>;

    /// Apply every operation of `batch` or none of them
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Current server time (Unix ms)
    async fn server_time(&self) -> Result<i64>;
}
