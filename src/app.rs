//! Hosting application: services registered by route path.

use crate::service::CrudService;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct App {
    services: RwLock<HashMap<String, Arc<dyn CrudService>>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").field("paths", &self.paths()).finish()
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

impl App {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mounts `service` at `path` and hands it a weak handle to this application.
    /// A service already mounted at the same path is replaced.
    pub fn register(self: &Arc<Self>, path: &str, service: Arc<dyn CrudService>) {
        service.setup(Arc::downgrade(self));
        let path = normalize(path).to_string();
        log::debug!("mounting '{}' service at /{path}", service.model_name());
        if self.services.write().insert(path.clone(), service).is_some() {
            log::warn!("service at /{path} replaced");
        }
    }

    #[must_use]
    pub fn service(&self, path: &str) -> Option<Arc<dyn CrudService>> {
        self.services.read().get(normalize(path)).cloned()
    }

    /// First service (by path) managing `model`.
    #[must_use]
    pub fn service_for_model(&self, model: &str) -> Option<Arc<dyn CrudService>> {
        let services = self.services.read();
        let mut paths: Vec<&String> =
            services.iter().filter(|(_, s)| s.model_name() == model).map(|(p, _)| p).collect();
        paths.sort();
        paths.first().and_then(|p| services.get(*p)).cloned()
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut v: Vec<String> = self.services.read().keys().cloned().collect();
        v.sort();
        v
    }
}
