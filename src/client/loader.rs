use std::collections::HashMap;
use std::sync::Arc;

use crate::interface::{ModuleLoader, RedirectionModule};

/// Loader over modules registered in the current process.
#[derive(Default, Clone)]
pub struct InProcessLoader {
    modules: HashMap<String, Arc<dyn RedirectionModule>>,
}

impl InProcessLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, module: Arc<dyn RedirectionModule>) {
        self.modules.insert(name.into(), module);
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn RedirectionModule>> {
        self.modules.remove(name)
    }

    pub fn with_module(mut self, name: impl Into<String>, module: Arc<dyn RedirectionModule>) -> Self {
        self.register(name, module);
        self
    }
}

impl ModuleLoader for InProcessLoader {
    fn acquire(&self, name: &str) -> Option<Arc<dyn RedirectionModule>> {
        self.modules.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::MockRedirectionModule;

    #[test]
    fn test_acquire_registered() {
        let loader = InProcessLoader::new().with_module("svc", Arc::new(MockRedirectionModule::new()));
        assert!(loader.acquire("svc").is_some());
        assert!(loader.acquire("other").is_none());
    }

    #[test]
    fn test_unregister() {
        let mut loader = InProcessLoader::new();
        loader.register("svc", Arc::new(MockRedirectionModule::new()));
        assert!(loader.unregister("svc").is_some());
        assert!(loader.acquire("svc").is_none());
    }
}
