// Plugin protocol and registry
//
// A plugin is run exactly once per KnowledgeMap, during construction and before the first render.
// Named plugins live in a process-wide registry; maps can also be built against their own
// registry so that tests do not depend on ambient state.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer};
use std::{collections::HashMap, fmt, rc::Rc, sync::Arc, time::Duration};

use crate::{
    error::Result,
    map::KnowledgeMap,
    plugins::{ClickEventsPlugin, HamburgerNodesPlugin, LinksPlugin},
};

/// Global singleton plugin registry with the built-in plugins
pub static PLUGINS: Lazy<PluginRegistry> = Lazy::new(PluginRegistry::create);

/// Add `plugin` to the global registry so configs can refer to it by name.
pub fn register_plugin(plugin: Arc<dyn Plugin>) {
    PLUGINS.register(plugin);
}

pub trait Plugin: Send + Sync {
    /// Registry name. An empty name marks an anonymous plugin that is never registered.
    fn name(&self) -> &str;

    /// Wire the plugin into `map`: subscribe to events, add or remove render callbacks.
    fn run(&self, map: &mut KnowledgeMap) -> Result<()>;
}

pub type InlinePlugin = Rc<dyn Fn(&mut KnowledgeMap) -> Result<()>>;

/// One entry of [`crate::config::MapConfig::plugins`].
#[derive(Clone)]
pub enum PluginSpec {
    /// Looked up in the registry at construction; unknown names are logged and skipped.
    ByName(String),
    /// Run directly, and registered under its name when it has one.
    Instance(Arc<dyn Plugin>),
    /// An anonymous function, run directly.
    Inline(InlinePlugin),
}

impl PluginSpec {
    pub fn inline<F: Fn(&mut KnowledgeMap) -> Result<()> + 'static>(f: F) -> Self {
        PluginSpec::Inline(Rc::new(f))
    }

    /// The name this entry is known by, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            PluginSpec::ByName(name) => Some(name),
            PluginSpec::Instance(plugin) if !plugin.name().is_empty() => Some(plugin.name()),
            PluginSpec::Instance(_) | PluginSpec::Inline(_) => None,
        }
    }
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSpec::ByName(name) => f.debug_tuple("ByName").field(name).finish(),
            PluginSpec::Instance(plugin) => f.debug_tuple("Instance").field(&plugin.name()).finish(),
            PluginSpec::Inline(_) => f.write_str("Inline"),
        }
    }
}

impl From<&str> for PluginSpec {
    fn from(name: &str) -> Self {
        PluginSpec::ByName(name.to_string())
    }
}

impl From<String> for PluginSpec {
    fn from(name: String) -> Self {
        PluginSpec::ByName(name)
    }
}

impl From<Arc<dyn Plugin>> for PluginSpec {
    fn from(plugin: Arc<dyn Plugin>) -> Self {
        PluginSpec::Instance(plugin)
    }
}

impl<'de> Deserialize<'de> for PluginSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(PluginSpec::ByName)
    }
}

/// Thread-safe registry of named plugins
///
/// Pattern matches the crate's other `Arc<RwLock<HashMap>>` registries: clones share state.
pub struct PluginRegistry(Arc<RwLock<HashMap<String, Arc<dyn Plugin>>>>);

impl Clone for PluginRegistry {
    fn clone(&self) -> Self {
        PluginRegistry(self.0.clone())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginRegistry").field(&self.list()).finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::create()
    }
}

impl PluginRegistry {
    /// Create registry with built-in plugins
    pub fn create() -> Self {
        let registry = Self::empty();
        registry.register(Arc::new(ClickEventsPlugin));
        registry.register(Arc::new(LinksPlugin));
        registry.register(Arc::new(HamburgerNodesPlugin));
        registry
    }

    pub fn empty() -> Self {
        PluginRegistry(Arc::new(RwLock::new(HashMap::new())))
    }

    /// Register a plugin under its own name
    ///
    /// If a plugin with this name already exists, it will be overwritten and a log message
    /// emitted. Anonymous plugins are ignored.
    pub fn register(&self, plugin: Arc<dyn Plugin>) {
        let name = plugin.name().to_string();
        if name.is_empty() {
            tracing::debug!("[PluginRegistry::register] Ignoring anonymous plugin");
            return;
        }

        while self.0.is_locked() {
            tracing::info!("[PluginRegistry::register] Waiting for write access to plugin registry");
            std::thread::sleep(Duration::from_millis(100));
        }

        let mut writer = self.0.write();
        if let Some(existing) = writer.get(&name) {
            if Arc::ptr_eq(existing, &plugin) {
                return;
            }
            tracing::info!(
                "[PluginRegistry::register] Overwriting existing plugin: {}",
                name
            );
        }
        writer.insert(name, plugin);
    }

    /// Retrieve a plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        while self.0.is_locked_exclusive() {
            tracing::info!("[PluginRegistry::get] Waiting for read access to plugin registry");
            std::thread::sleep(Duration::from_millis(100));
        }

        let reader = self.0.read();
        reader.get(name).cloned()
    }

    /// List all registered plugin names, sorted
    pub fn list(&self) -> Vec<String> {
        let reader = self.0.read();
        let mut names: Vec<String> = reader.keys().cloned().collect();
        names.sort();
        names
    }
}
