use crate::errors::DbError;

/// Convert a `serde_json::Value` that must be an object into a `bson::Document`.
///
/// # Errors
/// Returns `Validation` when the value is not an object or cannot be represented as BSON.
pub fn json_value_to_bson_document(val: &serde_json::Value) -> Result<bson::Document, DbError> {
    let obj = val
        .as_object()
        .ok_or_else(|| DbError::Validation("expected JSON object".into()))?;
    bson::Document::try_from(obj.clone()).map_err(|e| DbError::Validation(e.to_string()))
}

/// Parse a JSON string into a `bson::Document`. The JSON must be a top-level object.
///
/// # Errors
/// Returns `Json` on malformed input and `Validation` for non-object documents.
pub fn parse_json_to_bson_document(json: &str) -> Result<bson::Document, DbError> {
    let val: serde_json::Value = serde_json::from_str(json)?;
    json_value_to_bson_document(&val)
}
