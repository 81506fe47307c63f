use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::{
    CheckPlugin, ContextPlugin, PluginKind, ResultorPlugin, SelectorPlugin,
};

pub type ContextFactory = Arc<dyn Fn() -> Arc<dyn ContextPlugin> + Send + Sync>;
pub type SelectorFactory = Arc<dyn Fn() -> Arc<dyn SelectorPlugin> + Send + Sync>;
pub type CheckFactory = Arc<dyn Fn() -> Arc<dyn CheckPlugin> + Send + Sync>;
pub type ResultorFactory = Arc<dyn Fn() -> Arc<dyn ResultorPlugin> + Send + Sync>;

/// Constructor for one plugin key, tagged with its stage role
#[derive(Clone)]
pub enum PluginFactory {
    Context(ContextFactory),
    Selector(SelectorFactory),
    Check(CheckFactory),
    Resultor(ResultorFactory),
}

impl PluginFactory {
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginFactory::Context(_) => PluginKind::Context,
            PluginFactory::Selector(_) => PluginKind::Selector,
            PluginFactory::Check(_) => PluginKind::Check,
            PluginFactory::Resultor(_) => PluginKind::Resultor,
        }
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginFactory").field(&self.kind()).finish()
    }
}

/// Registry mapping stable plugin keys to factories
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("PluginRegistry").field("plugins", &keys).finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under `name`
    pub fn register(&mut self, name: &str, factory: PluginFactory) -> Result<(), PluginSystemError> {
        if self.factories.contains_key(name) {
            return Err(PluginSystemError::AlreadyRegistered {
                name: name.to_string(),
            });
        }
        log::debug!("Registered {} plugin '{}'", factory.kind(), name);
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn register_context<P, F>(&mut self, name: &str, factory: F) -> Result<(), PluginSystemError>
    where
        P: ContextPlugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.register(
            name,
            PluginFactory::Context(Arc::new(move || Arc::new(factory()) as Arc<dyn ContextPlugin>)),
        )
    }

    pub fn register_selector<P, F>(&mut self, name: &str, factory: F) -> Result<(), PluginSystemError>
    where
        P: SelectorPlugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.register(
            name,
            PluginFactory::Selector(Arc::new(move || Arc::new(factory()) as Arc<dyn SelectorPlugin>)),
        )
    }

    pub fn register_check<P, F>(&mut self, name: &str, factory: F) -> Result<(), PluginSystemError>
    where
        P: CheckPlugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.register(
            name,
            PluginFactory::Check(Arc::new(move || Arc::new(factory()) as Arc<dyn CheckPlugin>)),
        )
    }

    pub fn register_resultor<P, F>(&mut self, name: &str, factory: F) -> Result<(), PluginSystemError>
    where
        P: ResultorPlugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.register(
            name,
            PluginFactory::Resultor(Arc::new(move || Arc::new(factory()) as Arc<dyn ResultorPlugin>)),
        )
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<PluginKind> {
        self.factories.get(name).map(PluginFactory::kind)
    }

    fn lookup(&self, name: &str, expected: PluginKind) -> Result<&PluginFactory, PluginSystemError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginSystemError::PluginNotFound {
                name: name.to_string(),
            })?;
        if factory.kind() != expected {
            return Err(PluginSystemError::KindMismatch {
                name: name.to_string(),
                expected,
                found: factory.kind(),
            });
        }
        Ok(factory)
    }

    pub fn create_context(&self, name: &str) -> Result<Arc<dyn ContextPlugin>, PluginSystemError> {
        match self.lookup(name, PluginKind::Context)? {
            PluginFactory::Context(factory) => Ok(factory()),
            other => Err(self.mismatch(name, PluginKind::Context, other)),
        }
    }

    pub fn create_selector(&self, name: &str) -> Result<Arc<dyn SelectorPlugin>, PluginSystemError> {
        match self.lookup(name, PluginKind::Selector)? {
            PluginFactory::Selector(factory) => Ok(factory()),
            other => Err(self.mismatch(name, PluginKind::Selector, other)),
        }
    }

    pub fn create_check(&self, name: &str) -> Result<Arc<dyn CheckPlugin>, PluginSystemError> {
        match self.lookup(name, PluginKind::Check)? {
            PluginFactory::Check(factory) => Ok(factory()),
            other => Err(self.mismatch(name, PluginKind::Check, other)),
        }
    }

    pub fn create_resultor(&self, name: &str) -> Result<Arc<dyn ResultorPlugin>, PluginSystemError> {
        match self.lookup(name, PluginKind::Resultor)? {
            PluginFactory::Resultor(factory) => Ok(factory()),
            other => Err(self.mismatch(name, PluginKind::Resultor, other)),
        }
    }

    fn mismatch(&self, name: &str, expected: PluginKind, found: &PluginFactory) -> PluginSystemError {
        PluginSystemError::KindMismatch {
            name: name.to_string(),
            expected,
            found: found.kind(),
        }
    }

    /// All registered keys with their kind, sorted by key
    pub fn entries(&self) -> Vec<(String, PluginKind)> {
        let mut entries: Vec<(String, PluginKind)> = self
            .factories
            .iter()
            .map(|(name, factory)| (name.clone(), factory.kind()))
            .collect();
        entries.sort();
        entries
    }

    pub fn count(&self) -> usize {
        self.factories.len()
    }
}
