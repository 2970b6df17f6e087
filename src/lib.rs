pub mod app;
pub mod config;
pub mod document;
pub mod errors;
pub mod logger;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

pub use app::App;
pub use config::ServiceConfig;
pub use document::Document;
pub use errors::{DbError, ErrorKind};
pub use registry::ModelRegistry;
pub use schema::{FieldKind, Model, Schema};
pub use service::{CrudService, Service};
pub use store::{MemoryStore, Store};
pub use types::{DocumentId, Params};

/// Initializes the adapter.
///
/// Loads `log4rs.yaml` when present; otherwise logging stays unconfigured until
/// [`logger::configure_logging`] or [`ServiceConfig::apply_logging`] is called.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::init()?;
    Ok(())
}
