use thiserror::Error;

/// Coarse classification of a [`DbError`], as seen by the invoking framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Id, field, collection, item or model absent.
    NotFound,
    /// Policy violation, e.g. a duplicate member in a set-like collection.
    Forbidden,
    /// Opaque store or validation failure, surfaced unchanged.
    Store,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid document ID: {0}")]
    InvalidDocumentId(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl DbError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            _ => ErrorKind::Store,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
