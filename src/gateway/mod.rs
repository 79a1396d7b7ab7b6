// Document store boundary. Everything persistent goes through DocumentGateway.
mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::db::models::{CollectionId, ItemId, ReplyId, UserId};

pub use self::sqlite::SqliteGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Path of a collection of documents, e.g. `publicUploads` or
/// `publicUploads/abc/replies`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    pub fn public_uploads() -> Self {
        Self::new("publicUploads")
    }

    pub fn users() -> Self {
        Self::new("users")
    }

    pub fn replies(item: &ItemId) -> Self {
        Self(format!("publicUploads/{}/replies", item))
    }

    pub fn user_collections(user: &UserId) -> Self {
        Self(format!("users/{}/collections", user))
    }

    pub fn collection_images(user: &UserId, collection: &CollectionId) -> Self {
        Self(format!("users/{}/collections/{}/images", user, collection))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path of a single document: its collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

impl DocPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_upload(item: &ItemId) -> Self {
        CollectionPath::public_uploads().doc(item.as_str())
    }

    pub fn reply(item: &ItemId, reply: &ReplyId) -> Self {
        CollectionPath::replies(item).doc(reply.as_str())
    }

    pub fn user(user: &UserId) -> Self {
        CollectionPath::users().doc(user.as_str())
    }

    pub fn user_collection(user: &UserId, collection: &CollectionId) -> Self {
        CollectionPath::user_collections(user).doc(collection.as_str())
    }

    pub fn collection_image(user: &UserId, collection: &CollectionId, item: &ItemId) -> Self {
        CollectionPath::collection_images(user, collection).doc(item.as_str())
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as returned by a read: its id and its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub data: Value,
}

impl Snapshot {
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, GatewayError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// String value of a top-level field, if present.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Position of the last document of the previous page: its ordering key and
/// its id. The id breaks ties between documents with equal keys.
#[derive(Debug, Clone, PartialEq)]
pub struct StartAfter {
    pub key: Value,
    pub id: String,
}

/// Newest-first, cursor-paginated query over one collection. Documents are
/// ordered by `order_by` descending, then by id descending.
#[derive(Debug, Clone)]
pub struct OrderedQuery {
    pub order_by: String,
    pub start_after: Option<StartAfter>,
    pub limit: usize,
}

impl OrderedQuery {
    pub fn newest_first(order_by: impl Into<String>, limit: usize) -> Self {
        Self {
            order_by: order_by.into(),
            start_after: None,
            limit,
        }
    }

    pub fn start_after(mut self, position: Option<StartAfter>) -> Self {
        self.start_after = position;
        self
    }
}

/// Document store operations consumed by feeds, the social synchronizer,
/// uploads, collections and profiles.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    /// Get a document by path
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, GatewayError>;

    /// All documents of a collection, in insertion order
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Snapshot>, GatewayError>;

    /// Documents whose top-level `field` equals `value`
    async fn query_eq(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Snapshot>, GatewayError>;

    /// One page of documents ordered by a field, starting after a cursor key
    async fn query_ordered(
        &self,
        collection: &CollectionPath,
        query: &OrderedQuery,
    ) -> Result<Vec<Snapshot>, GatewayError>;

    /// Create a document with a generated id
    async fn create(&self, collection: &CollectionPath, data: Value)
        -> Result<DocPath, GatewayError>;

    /// Create or overwrite a document at a known path
    async fn set(&self, path: &DocPath, data: Value) -> Result<(), GatewayError>;

    /// Merge top-level fields into an existing document
    async fn update(&self, path: &DocPath, fields: Map<String, Value>)
        -> Result<(), GatewayError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, path: &DocPath) -> Result<(), GatewayError>;
}

/// Generate a 20-character document id.
pub fn generate_doc_id() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..20)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Field names are spliced into JSON paths, so only plain identifiers pass.
pub(crate) fn check_field(field: &str) -> Result<(), GatewayError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GatewayError::InvalidField(field.to_string()))
    }
}
