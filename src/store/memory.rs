use crate::document::{Document, ID_FIELD, item_id};
use crate::errors::DbError;
use crate::logger::log_audit;
use crate::query::{self, PopulateSpec, Projection, Query};
use crate::registry::ModelRegistry;
use crate::schema::{FieldKind, Model};
use crate::types::{DocumentId, ModelName};
use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{Store, UpdateOptions};

type Collection = BTreeMap<DocumentId, Document>;

/// Non-durable [`Store`] keeping every model's documents in memory.
///
/// Documents of a model are kept ordered by id, so unsorted finds return them in
/// insertion order. Locks are never held across an await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    registry: Arc<ModelRegistry>,
    collections: RwLock<HashMap<ModelName, Collection>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(registry: Arc<ModelRegistry>) -> Self {
        Self { registry, collections: RwLock::new(HashMap::new()) }
    }

    pub fn register_model(&self, model: Model) -> Arc<Model> {
        self.registry.register(model)
    }

    /// Number of stored documents of `model`.
    #[must_use]
    pub fn count(&self, model: &str) -> usize {
        self.collections.read().get(model).map_or(0, BTreeMap::len)
    }
}

fn cast_error(model: &Model, path: &str, expected: &str) -> DbError {
    DbError::Validation(format!("{} validation failed: cast to {expected} failed for path '{path}'", model.name))
}

/// Applies schema casts: embedded items get an `_id`, referenced items become ObjectIds.
fn cast_fields(model: &Model, data: &mut BsonDocument) -> Result<(), DbError> {
    for (name, def) in model.schema.paths() {
        let Some(value) = data.get_mut(name) else {
            continue;
        };
        if matches!(value, Bson::Null) && def.kind != FieldKind::Scalar {
            *value = Bson::Array(Vec::new());
            continue;
        }
        match &def.kind {
            FieldKind::Scalar => {}
            FieldKind::EmbeddedArray => {
                let Bson::Array(items) = value else {
                    return Err(cast_error(model, name, "[Embedded]"));
                };
                for item in items.iter_mut() {
                    let Bson::Document(sub) = item else {
                        return Err(cast_error(model, name, "[Embedded]"));
                    };
                    let id = sub.get(ID_FIELD).and_then(DocumentId::from_bson).unwrap_or_default();
                    sub.insert(ID_FIELD, Bson::from(id));
                }
            }
            FieldKind::ReferencedArray { .. } => {
                let Bson::Array(items) = value else {
                    return Err(cast_error(model, name, "[ObjectId]"));
                };
                for item in items.iter_mut() {
                    let id = item_id(item).ok_or_else(|| cast_error(model, name, "[ObjectId]"))?;
                    *item = Bson::from(id);
                }
            }
        }
    }
    Ok(())
}

fn check_required(model: &Model, data: &BsonDocument) -> Result<(), DbError> {
    let missing = model.schema.missing_required(data);
    if missing.is_empty() {
        return Ok(());
    }
    Err(DbError::Validation(format!(
        "{} validation failed: path(s) {} required",
        model.name,
        missing.join(", ")
    )))
}

fn project_document(mut doc: Document, projection: Option<&Projection>) -> Document {
    if let Some(p) = projection {
        doc.data = query::project_fields(&doc.data, p);
    }
    doc
}

fn populate_in(
    cols: &HashMap<ModelName, Collection>,
    registry: &ModelRegistry,
    model: &Model,
    mut doc: Document,
    spec: &PopulateSpec,
) -> Result<Document, DbError> {
    let target = match model.schema.path(&spec.path).map(|def| &def.kind) {
        Some(FieldKind::ReferencedArray { model: target }) => registry.model(target)?,
        _ => {
            log::debug!("populate: '{}' is not a referenced path of '{}'", spec.path, model.name);
            return Ok(doc);
        }
    };
    let filter = spec.filter.as_ref().map(query::parse_filter).transpose()?;
    let Some(Bson::Array(ids)) = doc.data.get(&spec.path) else {
        return Ok(doc);
    };
    let related = cols.get(&target.name);
    let populated: Vec<Bson> = ids
        .iter()
        .filter_map(item_id)
        .filter_map(|id| related.and_then(|c| c.get(&id)))
        .map(Document::to_bson)
        .filter(|b| filter.as_ref().is_none_or(|f| query::eval_filter(b, f)))
        .map(|b| Bson::Document(match &spec.select {
            Some(p) => query::project_fields(&b, p),
            None => b,
        }))
        .collect();
    doc.data.insert(spec.path.clone(), Bson::Array(populated));
    Ok(doc)
}

#[async_trait]
impl Store for MemoryStore {
    fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    async fn find(&self, query: &Query) -> Result<Vec<Document>, DbError> {
        let model = self.registry.model(&query.model)?;
        let filter = query::parse_filter(&query.filter)?;
        let cols = self.collections.read();
        let mut rows: Vec<(BsonDocument, &Document)> = cols
            .get(&query.model)
            .map(|c| {
                c.values()
                    .map(|d| (d.to_bson(), d))
                    .filter(|(b, _)| query::eval_filter(b, &filter))
                    .collect()
            })
            .unwrap_or_default();
        if !query.sort.is_empty() {
            rows.sort_by(|(a, _), (b, _)| query::compare_docs(a, b, &query.sort));
        }
        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(rows.len().min(limit));
        for (_, doc) in rows.into_iter().skip(skip).take(limit) {
            let mut doc = doc.clone();
            for spec in &query.populate {
                doc = populate_in(&cols, &self.registry, &model, doc, spec)?;
            }
            out.push(project_document(doc, query.projection.as_ref()));
        }
        log::debug!(
            "find {} matched {} (skip {:?}, limit {:?})",
            query.model,
            out.len(),
            query.skip,
            query.limit
        );
        Ok(out)
    }

    async fn find_by_id(
        &self,
        model: &str,
        id: &DocumentId,
        projection: Option<&Projection>,
    ) -> Result<Option<Document>, DbError> {
        self.registry.model(model)?;
        let found = self.collections.read().get(model).and_then(|c| c.get(id)).cloned();
        Ok(found.map(|d| project_document(d, projection)))
    }

    async fn insert(&self, model: &str, mut data: BsonDocument) -> Result<Document, DbError> {
        let model_def = self.registry.model(model)?;
        cast_fields(&model_def, &mut data)?;
        check_required(&model_def, &data)?;
        let doc = Document::new(data);
        {
            let mut cols = self.collections.write();
            let col = cols.entry(model.to_string()).or_default();
            if col.contains_key(&doc.id) {
                return Err(DbError::Validation(format!("duplicate key: {}", doc.id)));
            }
            col.insert(doc.id, doc.clone());
        }
        log_audit("insert", model, &doc.id.to_hex());
        Ok(doc)
    }

    async fn find_by_id_and_update(
        &self,
        model: &str,
        id: &DocumentId,
        mut data: BsonDocument,
        opts: UpdateOptions,
    ) -> Result<Option<Document>, DbError> {
        let model_def = self.registry.model(model)?;
        data.remove(ID_FIELD);
        cast_fields(&model_def, &mut data)?;
        let updated = {
            let mut cols = self.collections.write();
            let col = cols.entry(model.to_string()).or_default();
            if let Some(existing) = col.get_mut(id) {
                existing.merge(data);
                Some(existing.clone())
            } else if opts.upsert {
                check_required(&model_def, &data)?;
                let doc = Document::with_id(*id, data);
                col.insert(*id, doc.clone());
                Some(doc)
            } else {
                None
            }
        };
        if updated.is_some() {
            log_audit("update", model, &id.to_hex());
        }
        Ok(updated)
    }

    async fn find_by_id_and_remove(
        &self,
        model: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, DbError> {
        self.registry.model(model)?;
        let removed = self.collections.write().get_mut(model).and_then(|c| c.remove(id));
        if removed.is_some() {
            log_audit("delete", model, &id.to_hex());
        }
        Ok(removed)
    }

    async fn save(&self, model: &str, mut document: Document) -> Result<Document, DbError> {
        let model_def = self.registry.model(model)?;
        cast_fields(&model_def, &mut document.data)?;
        check_required(&model_def, &document.data)?;
        document.metadata.touch();
        self.collections
            .write()
            .entry(model.to_string())
            .or_default()
            .insert(document.id, document.clone());
        log_audit("save", model, &document.id.to_hex());
        Ok(document)
    }

    async fn populate(
        &self,
        model: &str,
        document: Document,
        spec: &PopulateSpec,
    ) -> Result<Document, DbError> {
        let model_def = self.registry.model(model)?;
        let cols = self.collections.read();
        populate_in(&cols, &self.registry, &model_def, document, spec)
    }
}
