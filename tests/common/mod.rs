#![allow(dead_code)]
//! Fixtures shared by the integration suites.

use async_trait::async_trait;
use bson::Document as BsonDocument;
use nexus_odm::query::{PopulateSpec, Projection, Query};
use nexus_odm::store::UpdateOptions;
use nexus_odm::{DbError, Document, DocumentId, MemoryStore, ModelRegistry, Store};
use parking_lot::Mutex;

/// Memory store that records every query and write handed to it.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub queries: Mutex<Vec<Query>>,
    pub writes: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Store for RecordingStore {
    fn registry(&self) -> &ModelRegistry {
        self.inner.registry()
    }

    async fn find(&self, query: &Query) -> Result<Vec<Document>, DbError> {
        self.queries.lock().push(query.clone());
        self.inner.find(query).await
    }

    async fn find_by_id(
        &self,
        model: &str,
        id: &DocumentId,
        projection: Option<&Projection>,
    ) -> Result<Option<Document>, DbError> {
        self.inner.find_by_id(model, id, projection).await
    }

    async fn insert(&self, model: &str, data: BsonDocument) -> Result<Document, DbError> {
        self.writes.lock().push("insert");
        self.inner.insert(model, data).await
    }

    async fn find_by_id_and_update(
        &self,
        model: &str,
        id: &DocumentId,
        data: BsonDocument,
        opts: UpdateOptions,
    ) -> Result<Option<Document>, DbError> {
        assert!(!opts.upsert, "update must never upsert");
        self.writes.lock().push("update");
        self.inner.find_by_id_and_update(model, id, data, opts).await
    }

    async fn find_by_id_and_remove(
        &self,
        model: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, DbError> {
        self.writes.lock().push("remove");
        self.inner.find_by_id_and_remove(model, id).await
    }

    async fn save(&self, model: &str, document: Document) -> Result<Document, DbError> {
        self.writes.lock().push("save");
        self.inner.save(model, document).await
    }

    async fn populate(
        &self,
        model: &str,
        document: Document,
        spec: &PopulateSpec,
    ) -> Result<Document, DbError> {
        self.inner.populate(model, document, spec).await
    }
}

impl RecordingStore {
    pub fn writes(&self) -> Vec<&'static str> {
        self.writes.lock().clone()
    }
}
