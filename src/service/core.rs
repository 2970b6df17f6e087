use super::Service;
use crate::document::{Document, ID_FIELD};
use crate::errors::DbError;
use crate::query::{self, Query, Special};
use crate::store::{Store, UpdateOptions};
use crate::types::{DocumentId, Params};
use bson::Document as BsonDocument;

impl<S: Store> Service<S> {
    pub(super) async fn find_documents(&self, params: Params) -> Result<Vec<Document>, DbError> {
        let mut filter = params.query;
        let specials = query::extract_specials(&mut filter);
        let mut q = Query::find(&self.model.name, filter);
        query::prepare_query(&mut q, &specials)?;
        if let Some(max) = self.config.max_limit {
            q.cap_limit(max);
        }
        self.store.find(&q).await
    }

    /// Only `$select` and `$populate` apply to a single-document read.
    pub(super) async fn get_document(&self, id: &str, params: Params) -> Result<Document, DbError> {
        let id = DocumentId::parse_str(id)?;
        let mut filter = params.query;
        let specials =
            query::extract_specials(&mut filter).only(&[Special::Select, Special::Populate]);
        if !filter.is_empty() {
            log::debug!("get ignores non-directive keys: {:?}", filter.keys().collect::<Vec<_>>());
        }
        let mut q = Query::find(&self.model.name, BsonDocument::new());
        query::prepare_query(&mut q, &specials)?;

        // project in the store only when nothing has to be populated afterwards
        let projection = q.projection.as_ref().filter(|_| q.populate.is_empty());
        let mut doc = self
            .store
            .find_by_id(&self.model.name, &id, projection)
            .await?
            .ok_or_else(|| Self::not_found(&id))?;
        if q.populate.is_empty() {
            return Ok(doc);
        }
        for spec in &q.populate {
            doc = self.store.populate(&self.model.name, doc, spec).await?;
        }
        if let Some(p) = &q.projection {
            doc.data = query::project_fields(&doc.data, p);
        }
        Ok(doc)
    }

    pub(super) async fn create_document(&self, data: BsonDocument) -> Result<Document, DbError> {
        self.store.insert(&self.model.name, data).await
    }

    /// `id`, `_id` and the configured identifier fields in `data` are dropped; a missing
    /// document is never created.
    pub(super) async fn update_document(
        &self,
        id: &str,
        mut data: BsonDocument,
    ) -> Result<Document, DbError> {
        let id = DocumentId::parse_str(id)?;
        let configured = self.config.id_fields.iter().map(String::as_str);
        for field in ["id", ID_FIELD].into_iter().chain(configured) {
            data.remove(field);
        }
        self.store
            .find_by_id_and_update(&self.model.name, &id, data, UpdateOptions { upsert: false })
            .await?
            .ok_or_else(|| Self::not_found(&id))
    }

    pub(super) async fn remove_document(&self, id: &str) -> Result<Option<Document>, DbError> {
        let id = DocumentId::parse_str(id)?;
        self.store.find_by_id_and_remove(&self.model.name, &id).await
    }
}
