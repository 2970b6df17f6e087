use crate::types::ModelName;
use bson::Document as BsonDocument;
use std::collections::BTreeMap;

/// Declared shape of one schema path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    /// Array of sub-documents stored inline in the owner.
    EmbeddedArray,
    /// Array of foreign identifiers pointing at documents of `model`.
    ReferencedArray { model: ModelName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub kind: FieldKind,
    pub required: bool,
}

/// Field descriptors of one model, keyed by top-level path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<String, FieldDef>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scalar(self, name: &str) -> Self {
        self.field(name, FieldKind::Scalar, false)
    }

    #[must_use]
    pub fn required(self, name: &str) -> Self {
        self.field(name, FieldKind::Scalar, true)
    }

    #[must_use]
    pub fn embedded(self, name: &str) -> Self {
        self.field(name, FieldKind::EmbeddedArray, false)
    }

    #[must_use]
    pub fn references(self, name: &str, model: &str) -> Self {
        self.field(name, FieldKind::ReferencedArray { model: model.to_string() }, false)
    }

    #[must_use]
    pub fn field(mut self, name: &str, kind: FieldKind, required: bool) -> Self {
        self.fields.insert(name.to_string(), FieldDef { kind, required });
        self
    }

    #[must_use]
    pub fn path(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn paths(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.fields.iter()
    }

    /// Names of referenced-array fields together with their target model.
    pub fn references_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(name, def)| match &def.kind {
            FieldKind::ReferencedArray { model } => Some((name.as_str(), model.as_str())),
            _ => None,
        })
    }

    /// Required fields missing from `data` (null counts as missing).
    #[must_use]
    pub fn missing_required(&self, data: &BsonDocument) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(name, def)| {
                def.required && matches!(data.get(name.as_str()), None | Some(bson::Bson::Null))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// A named model: the unit the store registers and the service operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub name: ModelName,
    pub schema: Schema,
}

impl Model {
    #[must_use]
    pub fn new(name: &str, schema: Schema) -> Self {
        Self { name: name.to_string(), schema }
    }
}
