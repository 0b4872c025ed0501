//! # knowledge-map
//!
//! A library for laying out and incrementally rendering a directed graph of concepts and the
//! resources that teach them, with an event and plugin protocol for extending how nodes look and
//! behave.
//!
//! ## Overview
//!
//! A [`map::KnowledgeMap`] owns a string-keyed directed graph. Every change to the graph runs a
//! **render cycle**: nodes are reconciled against a [`scene::Scene`], measured, laid out in ranks,
//! positioned, and finally connected by edge paths. Reconciliation is keyed: an element created
//! for a node keeps its identity across cycles, so a scene can animate the change instead of
//! redrawing everything.
//!
//! ### Key Features
//!
//! - **Keyed reconciliation**: [`reconciler::Renderer`] splits each pass into enter, update and
//!   exit sets and runs layered callbacks over them
//! - **Deterministic layout**: [`layout::LayeredLayout`] gives identical coordinates for identical
//!   input
//! - **Lifecycle events**: `preLayout`, `postLayout` and `renderGraph`, with owned payloads that
//!   subscribers may edit
//! - **Plugins**: named, registered globally or per map, run once at construction
//! - **Batching**: hold the map, apply many changes, render once
//!
//! ## Architecture
//!
//! - **[`graph`]**: the graph store (`Digraph`, `MapGraph`)
//! - **[`properties`]**: concepts, resources, content items
//! - **[`layout`]**: the layout engine contract and default engine
//! - **[`scene`]**: the rendering surface and the headless `MemoryScene`
//! - **[`reconciler`]**: keyed enter/update/exit renderers
//! - **[`event`]**: the event dispatcher and `MapEvent`
//! - **[`plugin`]**, **[`plugins`]**: the plugin protocol, registry and built-ins
//! - **[`map`]**: the facade tying the above into the render cycle
//!
//! ## Quick Start
//!
//! ```rust
//! use knowledge_map::{
//!     config::{MapConfig, MapDocument},
//!     map::KnowledgeMap,
//!     scene::{Layer, MemoryScene},
//! };
//!
//! # fn main() -> Result<(), knowledge_map::KnowledgeMapError> {
//! let document = MapDocument::from_json_str(
//!     r#"{"concepts": [
//!         {"id": "A", "name": "A"},
//!         {"id": "B", "name": "B", "dependencies": ["A"]}
//!     ]}"#,
//! )?;
//!
//! let scene = MemoryScene::new();
//! let mut map = KnowledgeMap::create(
//!     MapConfig::default().with_graph(document),
//!     Box::new(scene.clone()),
//! )?;
//! assert!(map.has_dependency("B", "A"));
//! assert_eq!(scene.len(Layer::Nodes), 2);
//!
//! map.remove_concept("A")?;
//! assert!(!map.has_dependency("B", "A"));
//! assert_eq!(scene.len(Layer::Nodes), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ### Batching changes
//!
//! ```rust
//! # use knowledge_map::{config::MapConfig, map::KnowledgeMap, scene::MemoryScene};
//! # fn main() -> Result<(), knowledge_map::KnowledgeMapError> {
//! let mut map = KnowledgeMap::create(MapConfig::default(), Box::new(MemoryScene::new()))?;
//! map.hold();
//! for name in ["Sets", "Functions", "Limits"] {
//!     map.add_concept(name)?;
//! }
//! map.add_dependency("functions", "sets")?;
//! map.add_dependency("limits", "functions")?;
//! map.unhold()?; // one render for all five changes
//! # Ok(())
//! # }
//! ```
//!
//! ### Writing a plugin
//!
//! ```rust
//! use knowledge_map::{
//!     event::MapEvent, map::KnowledgeMap, plugin::Plugin, KnowledgeMapError,
//! };
//!
//! struct Spacious;
//!
//! impl Plugin for Spacious {
//!     fn name(&self) -> &str {
//!         "spacious"
//!     }
//!
//!     fn run(&self, map: &mut KnowledgeMap) -> Result<(), KnowledgeMapError> {
//!         map.on_event(MapEvent::PRE_LAYOUT, |_, event| {
//!             if let MapEvent::PreLayout { config, .. } = event {
//!                 config.vertical_space = 120.0;
//!             }
//!             Ok(())
//!         });
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! The library logs through `tracing` and never installs a subscriber. The `kmap` binary (feature
//! `bin`) installs `tracing-subscriber` with `RUST_LOG` filtering.

pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod graph;
pub mod layout;
pub mod map;
pub mod plugin;
pub mod plugins;
pub mod properties;
pub mod reconciler;
pub mod scene;

pub use error::*;
