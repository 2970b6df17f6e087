//! Classification of model fields as nested collections.
//!
//! A field is a collection when its schema declares either an array of embedded
//! sub-documents or an array of references to another model. Everything else
//! (scalars, undeclared names) is "no collection", which is not an error here.

use crate::errors::DbError;
use crate::registry::ModelRegistry;
use crate::schema::{FieldKind, Model};
use crate::types::ModelName;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionKind {
    None,
    Embedded,
    Referenced { model: ModelName },
}

#[must_use]
pub fn classify(field: &str, model: &Model) -> CollectionKind {
    match model.schema.path(field).map(|def| &def.kind) {
        Some(FieldKind::EmbeddedArray) => CollectionKind::Embedded,
        Some(FieldKind::ReferencedArray { model }) => {
            CollectionKind::Referenced { model: model.clone() }
        }
        Some(FieldKind::Scalar) | None => CollectionKind::None,
    }
}

#[must_use]
pub fn is_existing_collection(field: &str, model: &Model) -> bool {
    is_embedded_collection(field, model) || is_referenced_collection(field, model)
}

#[must_use]
pub fn is_embedded_collection(field: &str, model: &Model) -> bool {
    classify(field, model) == CollectionKind::Embedded
}

#[must_use]
pub fn is_referenced_collection(field: &str, model: &Model) -> bool {
    matches!(classify(field, model), CollectionKind::Referenced { .. })
}

/// Resolves the model targeted by a referenced-collection field.
///
/// # Errors
/// `NotFound` when `field` is not a referenced collection of `model`, or when the
/// declared target model is not registered.
pub fn resolve_associated_model(
    registry: &ModelRegistry,
    model: &Model,
    field: &str,
) -> Result<Arc<Model>, DbError> {
    match classify(field, model) {
        CollectionKind::Referenced { model: target } => registry.model(&target),
        _ => Err(DbError::NotFound(format!(
            "'{field}' is not a referenced collection of model '{}'",
            model.name
        ))),
    }
}
