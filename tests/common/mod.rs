//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use knowledge_map::{
    config::{MapConfig, MapDocument},
    event::{EventKind, MapEvent},
    map::KnowledgeMap,
    plugin::PluginRegistry,
    scene::MemoryScene,
};

#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn calculus() -> MapDocument {
    MapDocument::from_path(fixture("calculus.json")).unwrap()
}

/// Build a map against a fresh registry holding only the built-in plugins.
#[allow(dead_code)]
pub fn build(config: MapConfig) -> (KnowledgeMap, MemoryScene) {
    build_with(config, &PluginRegistry::create())
}

#[allow(dead_code)]
pub fn build_with(config: MapConfig, registry: &PluginRegistry) -> (KnowledgeMap, MemoryScene) {
    let scene = MemoryScene::new();
    let map = KnowledgeMap::with_registry(config, Box::new(scene.clone()), registry).unwrap();
    (map, scene)
}

/// Records the kind of every lifecycle event a map emits.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

#[allow(dead_code)]
impl EventLog {
    pub fn attach(map: &mut KnowledgeMap) -> Self {
        let log = EventLog::default();
        for kind in [
            MapEvent::PRE_LAYOUT,
            MapEvent::POST_LAYOUT,
            MapEvent::RENDER_GRAPH,
        ] {
            let entries = log.0.clone();
            map.on_event(kind, move |_, event| {
                entries.borrow_mut().push(event.kind().to_string());
                Ok(())
            });
        }
        log
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}
