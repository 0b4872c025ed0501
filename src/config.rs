use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

use crate::{
    error::{KnowledgeMapError, Result},
    geometry::Transition,
    layout::LayoutConfig,
    plugin::PluginSpec,
    properties::{Concept, Resource},
};

/// The JSON graph format: `{"concepts": [...]}`, optionally followed by resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDocument {
    #[serde(default)]
    pub concepts: Vec<Concept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

impl MapDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        tracing::debug!("[MapDocument::from_path] Reading {:?}", path.as_ref());
        Self::from_json_str(&read_to_string(path)?)
    }
}

/// Construction options for [`crate::map::KnowledgeMap`].
///
/// Files (TOML or JSON) can only name plugins; plugin instances and inline functions are pushed
/// onto `plugins` in code.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapConfig {
    pub graph: Option<MapDocument>,
    pub resources: Option<Vec<Resource>>,
    pub plugins: Vec<PluginSpec>,
    pub held: bool,
    /// Mount point handed to [`crate::scene::Scene::attach`].
    pub inside: String,
    pub layout: LayoutConfig,
    /// Milliseconds. `0` or an explicit absence disables animation.
    pub transition_duration: Option<u64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            graph: None,
            resources: None,
            plugins: Vec::new(),
            held: false,
            inside: "body".to_string(),
            layout: LayoutConfig::default(),
            transition_duration: Some(Transition::DEFAULT_MILLIS),
        }
    }
}

impl MapConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: MapConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing the format by extension (`.json`, anything else is TOML).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("[MapConfig::from_path] Reading {:?}", path);
        let content = read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.graph.is_some() && self.resources.is_some() {
            return Err(KnowledgeMapError::Config(
                "'graph' and 'resources' are mutually exclusive initial loads".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transition(&self) -> Transition {
        Transition::from_millis(self.transition_duration)
    }

    pub fn with_graph(mut self, graph: MapDocument) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_plugin<P: Into<PluginSpec>>(mut self, plugin: P) -> Self {
        self.plugins.push(plugin.into());
        self
    }

    pub fn held(mut self, held: bool) -> Self {
        self.held = held;
        self
    }
}
