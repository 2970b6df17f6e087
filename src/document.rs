use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ID_FIELD: &str = "_id";
/// Store-managed timestamps exposed in the flattened view of a document.
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn bson_time(t: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_millis(t.timestamp_millis()))
}

/// Identifier of an array item: a sub-document's `_id`, or the item itself when it is a
/// bare (or populated) reference.
#[must_use]
pub fn item_id(item: &Bson) -> Option<DocumentId> {
    match item {
        Bson::Document(d) => d.get(ID_FIELD).and_then(DocumentId::from_bson),
        other => DocumentId::from_bson(other),
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored record: identifier, field map and store-owned metadata.
///
/// `data` never carries the `_id` key; [`Document::to_bson`] adds it back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    /// Builds a document from a raw field map. A castable `_id` in `data` is kept as the
    /// identifier; otherwise a fresh one is assigned.
    #[must_use]
    pub fn new(mut data: BsonDocument) -> Self {
        let id = data
            .remove(ID_FIELD)
            .and_then(|v| DocumentId::from_bson(&v))
            .unwrap_or_default();
        Self { id, data, metadata: Metadata::new() }
    }

    #[must_use]
    pub fn with_id(id: DocumentId, mut data: BsonDocument) -> Self {
        data.remove(ID_FIELD);
        Self { id, data, metadata: Metadata::new() }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Bson> {
        if field == ID_FIELD {
            return None;
        }
        self.data.get(field)
    }

    /// Merge top-level fields into the document (`$set` semantics).
    pub fn merge(&mut self, fields: BsonDocument) {
        for (k, v) in fields {
            if k == ID_FIELD {
                continue;
            }
            self.data.insert(k, v);
        }
        self.metadata.touch();
    }

    /// Flattened view with `_id` as the first key and the store timestamps as
    /// `createdAt`/`updatedAt`, which take precedence over same-named data fields.
    #[must_use]
    pub fn to_bson(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        out.insert(ID_FIELD, Bson::ObjectId(self.id.0));
        for (k, v) in &self.data {
            out.insert(k.clone(), v.clone());
        }
        out.insert(CREATED_AT_FIELD, bson_time(self.metadata.created_at));
        out.insert(UPDATED_AT_FIELD, bson_time(self.metadata.updated_at));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn new_keeps_castable_id() {
        let id = DocumentId::new();
        let d = Document::new(doc! { "_id": id.to_hex(), "name": "a" });
        assert_eq!(d.id, id);
        assert!(!d.data.contains_key(ID_FIELD));
    }

    #[test]
    fn merge_ignores_id_and_touches() {
        let mut d = Document::new(doc! { "name": "a" });
        let before = d.metadata.updated_at;
        let original = d.id;
        d.merge(doc! { "_id": DocumentId::new().to_hex(), "name": "b", "age": 3 });
        assert_eq!(d.id, original);
        assert_eq!(d.data.get_str("name").unwrap(), "b");
        assert!(d.metadata.updated_at >= before);
    }

    #[test]
    fn to_bson_puts_id_first() {
        let d = Document::new(doc! { "name": "a" });
        let b = d.to_bson();
        assert_eq!(b.keys().next().map(String::as_str), Some(ID_FIELD));
    }

    #[test]
    fn to_bson_exposes_timestamps() {
        let mut d = Document::new(doc! { "name": "a", "createdAt": "forged" });
        d.metadata.touch();
        let b = d.to_bson();
        let created = b.get_datetime(CREATED_AT_FIELD).unwrap();
        assert_eq!(created.timestamp_millis(), d.metadata.created_at.timestamp_millis());
        let updated = b.get_datetime(UPDATED_AT_FIELD).unwrap();
        assert!(updated >= created);
    }
}
