//! CRUD facade over a [`Store`].
//!
//! Each operation builds a query, strips and applies the reserved directives,
//! classifies nested collections where needed, runs against the store and returns
//! either a result or a classified [`DbError`].

mod collections;
mod core;

use crate::app::App;
use crate::config::ServiceConfig;
use crate::document::Document;
use crate::errors::{DbError, ErrorKind};
use crate::schema::Model;
use crate::store::Store;
use crate::types::{DocumentId, Params};
use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use std::sync::{Arc, OnceLock, Weak};

/// Operations a service exposes to the invoking framework.
#[async_trait]
pub trait CrudService: Send + Sync {
    /// Name of the model this service manages.
    fn model_name(&self) -> &str;

    /// Receives the hosting application when the service is registered on it.
    fn setup(&self, app: Weak<App>);

    async fn find(&self, params: Params) -> Result<Vec<Document>, DbError>;

    async fn get(&self, id: &str, params: Params) -> Result<Document, DbError>;

    async fn create(&self, data: BsonDocument, params: Params) -> Result<Document, DbError>;

    async fn update(&self, id: &str, data: BsonDocument, params: Params) -> Result<Document, DbError>;

    async fn remove(&self, id: &str, params: Params) -> Result<Option<Document>, DbError>;

    async fn find_in_collection(
        &self,
        id: &str,
        collection: &str,
        params: Params,
    ) -> Result<Vec<Bson>, DbError>;

    async fn add_to_collection(
        &self,
        id: &str,
        collection: &str,
        item: BsonDocument,
        params: Params,
    ) -> Result<BsonDocument, DbError>;

    async fn get_in_collection(
        &self,
        id: &str,
        collection: &str,
        item_id: &str,
        params: Params,
    ) -> Result<BsonDocument, DbError>;

    async fn remove_from_collection(
        &self,
        id: &str,
        collection: &str,
        item_id: &str,
        params: Params,
    ) -> Result<Document, DbError>;
}

/// Service for one model, backed by a shared store.
pub struct Service<S: Store> {
    store: Arc<S>,
    model: Arc<Model>,
    config: ServiceConfig,
    app: OnceLock<Weak<App>>,
}

impl<S: Store> std::fmt::Debug for Service<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").field("model", &self.model.name).field("config", &self.config).finish()
    }
}

impl<S: Store> Service<S> {
    /// # Errors
    /// `NotFound` if `model` is not registered with the store.
    pub fn new(store: Arc<S>, model: &str, config: ServiceConfig) -> Result<Self, DbError> {
        let model = store.registry().model(model)?;
        Ok(Self { store, model, config, app: OnceLock::new() })
    }

    /// Binds the hosting application at construction time.
    #[must_use]
    pub fn with_app(self, app: Weak<App>) -> Self {
        self.bind_app(app);
        self
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn bind_app(&self, app: Weak<App>) {
        if self.app.set(app).is_err() {
            log::debug!("service '{}' already bound to an application", self.model.name);
        }
    }

    fn app(&self) -> Option<Arc<App>> {
        self.app.get().and_then(Weak::upgrade)
    }

    fn not_found(id: &DocumentId) -> DbError {
        DbError::NotFound(format!("No record found for id {id}"))
    }

    fn logged<T>(&self, op: &str, result: Result<T, DbError>) -> Result<T, DbError> {
        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::NotFound | ErrorKind::Forbidden => {
                    log::debug!("{op} on '{}' failed: {e}", self.model.name);
                }
                ErrorKind::Store => log::warn!("{op} on '{}' failed: {e}", self.model.name),
            }
        }
        result
    }
}

#[async_trait]
impl<S: Store + 'static> CrudService for Service<S> {
    fn model_name(&self) -> &str {
        &self.model.name
    }

    fn setup(&self, app: Weak<App>) {
        self.bind_app(app);
    }

    async fn find(&self, params: Params) -> Result<Vec<Document>, DbError> {
        let res = self.find_documents(params).await;
        self.logged("find", res)
    }

    async fn get(&self, id: &str, params: Params) -> Result<Document, DbError> {
        let res = self.get_document(id, params).await;
        self.logged("get", res)
    }

    async fn create(&self, data: BsonDocument, _params: Params) -> Result<Document, DbError> {
        let res = self.create_document(data).await;
        self.logged("create", res)
    }

    async fn update(&self, id: &str, data: BsonDocument, _params: Params) -> Result<Document, DbError> {
        let res = self.update_document(id, data).await;
        self.logged("update", res)
    }

    async fn remove(&self, id: &str, _params: Params) -> Result<Option<Document>, DbError> {
        let res = self.remove_document(id).await;
        self.logged("remove", res)
    }

    async fn find_in_collection(
        &self,
        id: &str,
        collection: &str,
        params: Params,
    ) -> Result<Vec<Bson>, DbError> {
        let res = self.collection_items(id, collection, params).await;
        self.logged("find_in_collection", res)
    }

    async fn add_to_collection(
        &self,
        id: &str,
        collection: &str,
        item: BsonDocument,
        _params: Params,
    ) -> Result<BsonDocument, DbError> {
        let res = self.add_item(id, collection, item).await;
        self.logged("add_to_collection", res)
    }

    async fn get_in_collection(
        &self,
        id: &str,
        collection: &str,
        item_id: &str,
        params: Params,
    ) -> Result<BsonDocument, DbError> {
        let res = self.collection_item(id, collection, item_id, params).await;
        self.logged("get_in_collection", res)
    }

    async fn remove_from_collection(
        &self,
        id: &str,
        collection: &str,
        item_id: &str,
        _params: Params,
    ) -> Result<Document, DbError> {
        let res = self.pull_item(id, collection, item_id).await;
        self.logged("remove_from_collection", res)
    }
}
