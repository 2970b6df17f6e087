use crate::errors::DbError;
use crate::schema::Model;
use crate::types::ModelName;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Name-indexed registry of models known to a store.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<ModelName, Arc<Model>>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a model and returns the shared handle.
    pub fn register(&self, model: Model) -> Arc<Model> {
        let model = Arc::new(model);
        let name = model.name.clone();
        log::debug!("registering model '{name}'");
        self.models.write().insert(name, model.clone());
        model
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.read().get(name).cloned()
    }

    /// # Errors
    /// Returns `NotFound` if no model named `name` is registered.
    pub fn model(&self, name: &str) -> Result<Arc<Model>, DbError> {
        self.get(name).ok_or_else(|| DbError::NotFound(format!("Model not registered: {name}")))
    }

    #[must_use]
    pub fn list_model_names(&self) -> Vec<ModelName> {
        let mut names: Vec<ModelName> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    #[test]
    fn register_and_lookup() {
        let reg = ModelRegistry::new();
        reg.register(Model::new("post", Schema::new().scalar("title")));
        reg.register(Model::new("tag", Schema::new()));
        assert!(reg.get("post").is_some());
        assert_eq!(reg.list_model_names(), vec!["post".to_string(), "tag".to_string()]);
        assert!(reg.model("nope").unwrap_err().is_not_found());
    }
}
