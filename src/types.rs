use crate::errors::DbError;
use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ModelName = String;

/// Identifier assigned by the store to every document and embedded sub-document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub ObjectId);

impl DocumentId {
    #[must_use]
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// # Errors
    /// Returns `InvalidDocumentId` if `s` is not a 24-character hex ObjectId.
    pub fn parse_str(s: &str) -> Result<Self, DbError> {
        ObjectId::parse_str(s).map(Self).map_err(|_| DbError::InvalidDocumentId(s.to_string()))
    }

    /// Casts a BSON value to an id: native ObjectIds and their hex string form are accepted.
    #[must_use]
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::ObjectId(oid) => Some(Self(*oid)),
            Bson::String(s) => ObjectId::parse_str(s).ok().map(Self),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl FromStr for DocumentId {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl From<ObjectId> for DocumentId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl From<DocumentId> for Bson {
    fn from(id: DocumentId) -> Self {
        Self::ObjectId(id.0)
    }
}

/// Per-call parameters handed over by the invoking framework.
///
/// `query` holds the filter map: store-native predicates plus the reserved
/// `$sort`, `$limit`, `$skip`, `$select` and `$populate` directives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub query: BsonDocument,
}

impl Params {
    #[must_use]
    pub const fn new(query: BsonDocument) -> Self {
        Self { query }
    }

    /// # Errors
    /// Returns an error if `json` is not a JSON object convertible to BSON.
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        Ok(Self { query: crate::utils::json::parse_json_to_bson_document(json)? })
    }
}

impl From<BsonDocument> for Params {
    fn from(query: BsonDocument) -> Self {
        Self { query }
    }
}
