use super::Service;
use crate::document::{Document, ID_FIELD, item_id};
use crate::errors::DbError;
use crate::query::{self, PopulateSpec, Projection, Special};
use crate::resolver::{self, CollectionKind};
use crate::store::Store;
use crate::types::{DocumentId, Params};
use bson::{Bson, Document as BsonDocument, doc};

fn item_projection(params: Params) -> Result<Option<Projection>, DbError> {
    let mut filter = params.query;
    let specials = query::extract_specials(&mut filter);
    specials.get(Special::Select).map(query::parse_select).transpose()
}

fn project_item(item: Bson, projection: Option<&Projection>) -> Bson {
    match (item, projection) {
        (Bson::Document(d), Some(p)) => Bson::Document(query::project_fields(&d, p)),
        (item, _) => item,
    }
}

/// The array stored under `collection`, created empty when absent.
fn items_mut<'a>(owner: &'a mut Document, collection: &str) -> Result<&'a mut Vec<Bson>, DbError> {
    if matches!(owner.data.get(collection), None | Some(Bson::Null)) {
        owner.data.insert(collection, Bson::Array(Vec::new()));
    }
    match owner.data.get_mut(collection) {
        Some(Bson::Array(items)) => Ok(items),
        _ => Err(DbError::Validation(format!("'{collection}' does not hold an array"))),
    }
}

fn items(owner: &Document, collection: &str) -> Vec<Bson> {
    match owner.data.get(collection) {
        Some(Bson::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn contains_item(items: &[Bson], id: &DocumentId) -> bool {
    items.iter().any(|i| item_id(i).as_ref() == Some(id))
}

fn already_present(collection: &str, id: &DocumentId) -> DbError {
    DbError::Forbidden(format!("Item already in collection {collection}: {id}"))
}

impl<S: Store> Service<S> {
    /// Classifies `collection` on this model, before any store call.
    fn collection_kind(&self, collection: &str) -> Result<CollectionKind, DbError> {
        match resolver::classify(collection, &self.model) {
            CollectionKind::None => Err(DbError::NotFound(format!(
                "No collection '{collection}' on model '{}'",
                self.model.name
            ))),
            kind => Ok(kind),
        }
    }

    async fn owner(&self, id: &str) -> Result<Document, DbError> {
        let id = DocumentId::parse_str(id)?;
        self.store
            .find_by_id(&self.model.name, &id, None)
            .await?
            .ok_or_else(|| Self::not_found(&id))
    }

    pub(super) async fn collection_items(
        &self,
        id: &str,
        collection: &str,
        params: Params,
    ) -> Result<Vec<Bson>, DbError> {
        let kind = self.collection_kind(collection)?;
        let projection = item_projection(params)?;
        let mut owner = self.owner(id).await?;
        if let CollectionKind::Referenced { .. } = kind {
            let mut spec = PopulateSpec::path(collection);
            spec.select = projection.clone();
            owner = self.store.populate(&self.model.name, owner, &spec).await?;
        }
        Ok(items(&owner, collection)
            .into_iter()
            .map(|i| project_item(i, projection.as_ref()))
            .collect())
    }

    pub(super) async fn add_item(
        &self,
        id: &str,
        collection: &str,
        item: BsonDocument,
    ) -> Result<BsonDocument, DbError> {
        let kind = self.collection_kind(collection)?;
        let mut owner = self.owner(id).await?;
        if kind == CollectionKind::Embedded {
            return self.add_embedded(owner, collection, item).await;
        }
        let related = self.link_target(&owner, collection, item).await?;
        items_mut(&mut owner, collection)?.push(Bson::ObjectId(related.id.0));
        self.store.save(&self.model.name, owner).await?;
        Ok(related.to_bson())
    }

    async fn add_embedded(
        &self,
        mut owner: Document,
        collection: &str,
        mut item: BsonDocument,
    ) -> Result<BsonDocument, DbError> {
        let new_id = match item.get(ID_FIELD) {
            Some(v) => DocumentId::from_bson(v)
                .ok_or_else(|| DbError::InvalidDocumentId(format!("{v}")))?,
            None => DocumentId::new(),
        };
        let list = items_mut(&mut owner, collection)?;
        if contains_item(list, &new_id) {
            return Err(already_present(collection, &new_id));
        }
        item.insert(ID_FIELD, Bson::from(new_id));
        list.push(Bson::Document(item.clone()));
        let saved = self.store.save(&self.model.name, owner).await?;
        Ok(items(&saved, collection)
            .into_iter()
            .find_map(|i| match i {
                Bson::Document(d) if item_id_of(&d) == Some(new_id) => Some(d),
                _ => None,
            })
            .unwrap_or(item))
    }

    /// Resolves the document to link: an existing one when `item` carries an `_id`,
    /// otherwise a freshly created one of the associated model.
    async fn link_target(
        &self,
        owner: &Document,
        collection: &str,
        item: BsonDocument,
    ) -> Result<Document, DbError> {
        let associated =
            resolver::resolve_associated_model(self.store.registry(), &self.model, collection)?;
        let current = items(owner, collection);
        if let Some(raw) = item.get(ID_FIELD) {
            let linked = DocumentId::from_bson(raw)
                .ok_or_else(|| DbError::InvalidDocumentId(format!("{raw}")))?;
            if contains_item(&current, &linked) {
                return Err(already_present(collection, &linked));
            }
            return self
                .store
                .find_by_id(&associated.name, &linked, None)
                .await?
                .ok_or_else(|| {
                    DbError::NotFound(format!("No {} found for id {linked}", associated.name))
                });
        }
        match self.app().and_then(|app| app.service_for_model(&associated.name)) {
            Some(sibling) => sibling.create(item, Params::default()).await,
            None => self.store.insert(&associated.name, item).await,
        }
    }

    pub(super) async fn collection_item(
        &self,
        id: &str,
        collection: &str,
        item_ref: &str,
        params: Params,
    ) -> Result<BsonDocument, DbError> {
        let kind = self.collection_kind(collection)?;
        let projection = item_projection(params)?;
        let wanted = DocumentId::parse_str(item_ref)?;
        let mut owner = self.owner(id).await?;
        if let CollectionKind::Referenced { .. } = kind {
            let mut spec = PopulateSpec::path(collection).with_filter(doc! { "_id": wanted.0 });
            spec.select = projection.clone();
            owner = self.store.populate(&self.model.name, owner, &spec).await?;
        }
        items(&owner, collection)
            .into_iter()
            .find_map(|i| match i {
                Bson::Document(d) if item_id_of(&d) == Some(wanted) => Some(d),
                _ => None,
            })
            .map(|d| match &projection {
                Some(p) => query::project_fields(&d, p),
                None => d,
            })
            .ok_or_else(|| {
                DbError::NotFound(format!("No item {wanted} in collection {collection}"))
            })
    }

    /// Pulls `item_ref` from the collection; pulling an absent item still persists the owner.
    pub(super) async fn pull_item(
        &self,
        id: &str,
        collection: &str,
        item_ref: &str,
    ) -> Result<Document, DbError> {
        self.collection_kind(collection)?;
        let target = DocumentId::parse_str(item_ref)?;
        let mut owner = self.owner(id).await?;
        let list = items_mut(&mut owner, collection)?;
        let before = list.len();
        list.retain(|i| item_id(i) != Some(target));
        if list.len() == before {
            log::debug!("{target} not present in '{collection}'");
        }
        self.store.save(&self.model.name, owner).await
    }
}

fn item_id_of(doc: &BsonDocument) -> Option<DocumentId> {
    doc.get(ID_FIELD).and_then(DocumentId::from_bson)
}
