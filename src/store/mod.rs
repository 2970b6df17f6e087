//! Boundary to the document store.
//!
//! The service layer only talks to a store through [`Store`]. Every call completes
//! exactly once with either a result or an error; store errors are surfaced unchanged.

pub mod memory;

use crate::document::Document;
use crate::errors::DbError;
use crate::query::{PopulateSpec, Projection, Query};
use crate::registry::ModelRegistry;
use crate::types::DocumentId;
use async_trait::async_trait;
use bson::Document as BsonDocument;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Create the document when `id` does not exist.
    pub upsert: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Model registry used to resolve schemas and referenced models.
    fn registry(&self) -> &ModelRegistry;

    async fn find(&self, query: &Query) -> Result<Vec<Document>, DbError>;

    async fn find_by_id(
        &self,
        model: &str,
        id: &DocumentId,
        projection: Option<&Projection>,
    ) -> Result<Option<Document>, DbError>;

    /// Validates and persists a new document, assigning an identifier when absent.
    async fn insert(&self, model: &str, data: BsonDocument) -> Result<Document, DbError>;

    /// Merges top-level `data` fields into the document and returns it post-update.
    async fn find_by_id_and_update(
        &self,
        model: &str,
        id: &DocumentId,
        data: BsonDocument,
        opts: UpdateOptions,
    ) -> Result<Option<Document>, DbError>;

    async fn find_by_id_and_remove(
        &self,
        model: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, DbError>;

    /// Persists a whole document, replacing any stored version with the same id.
    async fn save(&self, model: &str, document: Document) -> Result<Document, DbError>;

    /// Replaces the identifiers of a referenced-array path by the documents they point
    /// at, optionally filtered and projected. Paths that are not referenced arrays are
    /// left untouched.
    async fn populate(
        &self,
        model: &str,
        document: Document,
        spec: &PopulateSpec,
    ) -> Result<Document, DbError>;
}
