//! Utility modules: JSON to BSON conversion.
pub mod json;
