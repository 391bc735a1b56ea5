//! Module registry: identifier → factory.

use std::collections::HashMap;
use std::sync::Arc;

use quire_core::{Module, ModuleError, ModuleInit};

use crate::modules;

/// Builds a module instance from its construction input.
pub type ModuleFactory =
    Arc<dyn Fn(ModuleInit) -> Result<Box<dyn Module>, ModuleError> + Send + Sync>;

/// Registry of available module implementations.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `text` and `remote` modules.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(modules::text::IDENTIFIER, modules::text::TextModule::create);
        registry.register(modules::remote::IDENTIFIER, modules::remote::RemoteModule::create);
        registry
    }

    /// Register a factory, replacing any previous one under `identifier`.
    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn(ModuleInit) -> Result<Box<dyn Module>, ModuleError> + Send + Sync + 'static,
    {
        let _ = self.factories.insert(identifier.into(), Arc::new(factory));
    }

    /// Remove a factory. Returns whether one was registered.
    pub fn unregister(&mut self, identifier: &str) -> bool {
        self.factories.remove(identifier).is_some()
    }

    /// Factory registered under `identifier`.
    pub fn get(&self, identifier: &str) -> Option<ModuleFactory> {
        self.factories.get(identifier).map(Arc::clone)
    }

    /// Whether `identifier` is registered.
    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// All identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered factories.
    pub fn count(&self) -> usize {
        self.factories.len()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use quire_core::{FetchResult, ModuleContext, ModuleData};

    use super::*;

    struct Dummy;

    impl Module for Dummy {
        fn get_data(&mut self, _: Option<FetchResult>, _: &mut ModuleContext<'_>) -> ModuleData {
            ModuleData::text("dummy")
        }
    }

    fn dummy(_: ModuleInit) -> Result<Box<dyn Module>, ModuleError> {
        Ok(Box::new(Dummy))
    }

    #[test]
    fn register_and_get() {
        let mut registry = ModuleRegistry::new();
        registry.register("dummy", dummy);
        assert!(registry.contains("dummy"));
        assert!(registry.get("dummy").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn unregister() {
        let mut registry = ModuleRegistry::new();
        registry.register("dummy", dummy);
        assert!(registry.unregister("dummy"));
        assert!(!registry.unregister("dummy"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn names_sorted() {
        let mut registry = ModuleRegistry::new();
        registry.register("zeta", dummy);
        registry.register("alpha", dummy);
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn closures_register() {
        let mut registry = ModuleRegistry::new();
        registry.register("failing", |init: ModuleInit| {
            Err(ModuleError::InvalidParams {
                module: init.name,
                reason: "nope".into(),
            })
        });
        let factory = registry.get("failing").unwrap();
        assert!(factory(ModuleInit::new("x", serde_json::Value::Null)).is_err());
    }

    #[test]
    fn builtins_present() {
        let registry = ModuleRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["remote", "text"]);
    }
}
