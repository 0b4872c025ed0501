//! The [`KnowledgeMap`] facade: owns the graph store, the four renderers of the render cycle, the
//! event dispatcher and the plugins configured at construction.
//!
//! Every mutation updates the graph store and then, unless the map is held, runs one full render
//! cycle:
//!
//! 1. `preLayout` with the layout configuration and a working copy of the graph,
//! 2. the node renderer over the working copy's nodes, then a size measurement of each node,
//! 3. the layout engine,
//! 4. `postLayout` with the layout,
//! 5. the node-position renderer,
//! 6. the edge renderer and the edge-position renderer,
//! 7. `renderGraph` with the rendered graph and node elements.
//!
//! Subscribers may call back into the mutation API. Mutations made while a cycle is running do
//! not start a nested cycle; a single follow-up cycle runs once the current one finishes.

use std::{collections::BTreeMap, rc::Rc};

use crate::{
    config::{MapConfig, MapDocument},
    error::{KnowledgeMapError, Result},
    event::{deliver, EventDispatcher, EventKind, Handler, MapEvent},
    geometry::{intersect_rect, Point, Size, Transition},
    graph::{edge_key, MapGraph},
    layout::{LayeredLayout, Layout, LayoutConfig, LayoutEngine, NodeLayout},
    plugin::{PluginRegistry, PluginSpec, PLUGINS},
    properties::{
        slugify, Concept, ConceptRef, ContentEntry, ContentId, ContentItem, MapNode, NodeKind,
        Relation, RelationKind, Resource,
    },
    reconciler::{callback, Bound, Callback, Renderer},
    scene::{Layer, Scene},
};

pub const NODE_CLASS: &str = "node";
pub const EDGE_CLASS: &str = "edge";

pub type MapHandler = Handler<KnowledgeMap, MapEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    /// Mutations update the model only.
    Held,
    /// Every mutation runs a render cycle.
    #[default]
    Live,
}

/// Datum of the node-position pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub node: MapNode,
    pub layout: NodeLayout,
    pub transition: Transition,
}

/// Datum of the edge passes: an edge with its endpoints resolved against the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEdge {
    pub key: String,
    pub relation: Relation,
    pub source_id: String,
    pub target_id: String,
    pub source: NodeLayout,
    pub target: NodeLayout,
    pub points: Vec<Point>,
    pub transition: Transition,
}

impl RenderedEdge {
    /// Waypoints with the ends clipped to the borders of the source and target boxes.
    pub fn clipped_path(&self) -> Vec<Point> {
        let toward_source = self
            .points
            .first()
            .copied()
            .unwrap_or_else(|| self.target.center());
        let toward_target = self
            .points
            .last()
            .copied()
            .unwrap_or_else(|| self.source.center());

        let mut path = Vec::with_capacity(self.points.len() + 2);
        path.push(intersect_rect(&self.source, toward_source));
        path.extend(self.points.iter().copied());
        path.push(intersect_rect(&self.target, toward_target));
        path
    }
}

/// Argument of [`KnowledgeMap::add_concept`]: the concept plus ids of existing concepts that
/// should depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewConcept {
    pub concept: Concept,
    pub dependents: Vec<String>,
}

impl From<Concept> for NewConcept {
    fn from(concept: Concept) -> Self {
        NewConcept {
            concept,
            dependents: Vec::new(),
        }
    }
}

impl From<&str> for NewConcept {
    fn from(name: &str) -> Self {
        Concept::new("", name).into()
    }
}

struct DefaultCallbacks {
    new_nodes: Callback<MapNode>,
    update_nodes: Callback<MapNode>,
    update_node_positions: Callback<RenderedNode>,
    new_edges: Callback<RenderedEdge>,
    update_edge_positions: Callback<RenderedEdge>,
}

impl DefaultCallbacks {
    fn new() -> Self {
        DefaultCallbacks {
            new_nodes: callback(|scene: &mut dyn Scene, nodes: &[Bound<'_, MapNode>]| {
                for bound in nodes {
                    scene.set_attribute(bound.element, "class", bound.datum.kind.as_str());
                }
                Ok(())
            }),
            update_nodes: callback(|scene: &mut dyn Scene, nodes: &[Bound<'_, MapNode>]| {
                for bound in nodes {
                    scene.set_text(bound.element, &bound.datum.label);
                }
                Ok(())
            }),
            update_node_positions: callback(
                |scene: &mut dyn Scene, nodes: &[Bound<'_, RenderedNode>]| {
                    for bound in nodes {
                        scene.set_position(
                            bound.element,
                            bound.datum.layout.center(),
                            bound.datum.transition,
                        );
                    }
                    Ok(())
                },
            ),
            new_edges: callback(|scene: &mut dyn Scene, edges: &[Bound<'_, RenderedEdge>]| {
                for bound in edges {
                    let class = match bound.datum.relation.kind {
                        RelationKind::Dependency => "dependency",
                        RelationKind::Teaches => "teaches",
                    };
                    scene.set_attribute(bound.element, "class", class);
                }
                Ok(())
            }),
            update_edge_positions: callback(
                |scene: &mut dyn Scene, edges: &[Bound<'_, RenderedEdge>]| {
                    for bound in edges {
                        scene.set_path(
                            bound.element,
                            &bound.datum.clipped_path(),
                            bound.datum.transition,
                        );
                    }
                    Ok(())
                },
            ),
        }
    }
}

pub struct KnowledgeMap {
    graph: MapGraph,
    scene: Box<dyn Scene>,
    render_nodes: Renderer<MapNode>,
    position_nodes: Renderer<RenderedNode>,
    render_edges: Renderer<RenderedEdge>,
    position_edges: Renderer<RenderedEdge>,
    defaults: DefaultCallbacks,
    events: EventDispatcher<KnowledgeMap, MapEvent>,
    state: RenderState,
    layout_config: LayoutConfig,
    engine: Box<dyn LayoutEngine>,
    last_layout: Layout,
    plugins: Vec<PluginSpec>,
    transition: Transition,
    rendering: bool,
    pending: bool,
    render_count: usize,
}

impl std::fmt::Debug for KnowledgeMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeMap")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("state", &self.state)
            .field("layout_config", &self.layout_config)
            .field("plugins", &self.plugins)
            .field("events", &self.events)
            .field("render_count", &self.render_count)
            .finish()
    }
}

impl KnowledgeMap {
    /// Build a map resolving plugin names against the global registry.
    pub fn create(config: MapConfig, scene: Box<dyn Scene>) -> Result<Self> {
        Self::with_registry(config, scene, &PLUGINS)
    }

    pub fn with_registry(
        config: MapConfig,
        scene: Box<dyn Scene>,
        registry: &PluginRegistry,
    ) -> Result<Self> {
        Self::with_layout_engine(config, scene, registry, Box::new(LayeredLayout))
    }

    pub fn with_layout_engine(
        config: MapConfig,
        mut scene: Box<dyn Scene>,
        registry: &PluginRegistry,
        engine: Box<dyn LayoutEngine>,
    ) -> Result<Self> {
        config.validate()?;
        scene.attach(&config.inside);
        let transition = config.transition();
        let MapConfig {
            graph,
            resources,
            plugins,
            held,
            layout,
            ..
        } = config;

        let defaults = DefaultCallbacks::new();

        let mut render_nodes = Renderer::new()
            .inside(Layer::Nodes)
            .use_class(NODE_CLASS)
            .key(|node: &MapNode| node.id.clone())
            .make(|scene, layer, _| Some(scene.mount(layer)));
        render_nodes
            .on_new(defaults.new_nodes.clone())
            .on_update(defaults.update_nodes.clone());

        let mut position_nodes = Renderer::new()
            .inside(Layer::Nodes)
            .use_class(NODE_CLASS)
            .key(|rendered: &RenderedNode| rendered.node.id.clone());
        position_nodes.on_update(defaults.update_node_positions.clone());

        let mut render_edges = Renderer::new()
            .inside(Layer::Edges)
            .use_class(EDGE_CLASS)
            .key(|edge: &RenderedEdge| edge.key.clone())
            .make(|scene, layer, _| Some(scene.mount(layer)));
        render_edges.on_new(defaults.new_edges.clone());

        let mut position_edges = Renderer::new()
            .inside(Layer::Edges)
            .use_class(EDGE_CLASS)
            .key(|edge: &RenderedEdge| edge.key.clone());
        position_edges.on_update(defaults.update_edge_positions.clone());

        let mut map = KnowledgeMap {
            graph: MapGraph::new(),
            scene,
            render_nodes,
            position_nodes,
            render_edges,
            position_edges,
            defaults,
            events: EventDispatcher::new(),
            state: RenderState::Held,
            layout_config: layout,
            engine,
            last_layout: Layout::default(),
            plugins: plugins.clone(),
            transition,
            rendering: false,
            pending: false,
            render_count: 0,
        };

        if let Some(document) = graph {
            map.load_inner(document)?;
        }
        if let Some(resources) = resources {
            for resource in resources {
                map.add_resource_inner(resource)?;
            }
        }

        for spec in &plugins {
            map.run_plugin(spec, registry)?;
        }

        if held {
            tracing::debug!("[KnowledgeMap::create] starting held");
        } else {
            map.state = RenderState::Live;
            map.render()?;
        }
        Ok(map)
    }

    fn run_plugin(&mut self, spec: &PluginSpec, registry: &PluginRegistry) -> Result<()> {
        match spec {
            PluginSpec::ByName(name) => match registry.get(name) {
                Some(plugin) => {
                    tracing::debug!("[KnowledgeMap::run_plugin] running '{}'", name);
                    plugin.run(self)
                }
                None => {
                    tracing::error!(
                        "[KnowledgeMap::run_plugin] Plugin '{}' is not registered, skipping it",
                        name
                    );
                    Ok(())
                }
            },
            PluginSpec::Instance(plugin) => {
                registry.register(plugin.clone());
                plugin.run(self)
            }
            PluginSpec::Inline(run) => run(self),
        }
    }

    // --- render cycle ---

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state == RenderState::Held
    }

    /// Suspend rendering; later mutations only update the model.
    pub fn hold(&mut self) {
        self.state = RenderState::Held;
    }

    /// Resume rendering and render the accumulated changes once.
    pub fn unhold(&mut self) -> Result<()> {
        self.state = RenderState::Live;
        self.render()
    }

    /// Number of completed render cycles.
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    fn changed(&mut self) -> Result<()> {
        match self.state {
            RenderState::Held => Ok(()),
            RenderState::Live => self.render(),
        }
    }

    /// Run one render cycle now, whatever the state.
    pub fn render(&mut self) -> Result<()> {
        if self.rendering {
            self.pending = true;
            return Ok(());
        }

        self.rendering = true;
        let mut result = self.render_cycle();
        if result.is_ok() && std::mem::take(&mut self.pending) {
            tracing::debug!("[KnowledgeMap::render] model changed during the cycle, rendering again");
            result = self.render_cycle();
        }
        self.pending = false;
        self.rendering = false;
        result
    }

    fn emit(&mut self, event: &mut MapEvent) -> Result<usize> {
        let handlers = self.events.handlers(event.kind());
        deliver(&handlers, self, event)
    }

    fn render_cycle(&mut self) -> Result<()> {
        tracing::debug!(
            "[KnowledgeMap::render_cycle] {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );

        let mut event = MapEvent::PreLayout {
            config: self.layout_config,
            graph: self.graph.copy(),
        };
        self.emit(&mut event)?;
        let MapEvent::PreLayout {
            config,
            graph: working,
        } = event
        else {
            return Err(KnowledgeMapError::Contract(format!(
                "preLayout subscriber replaced the event with {event}"
            )));
        };
        self.layout_config = config;

        let nodes: Vec<MapNode> = working.node_entries().map(|(_, n)| n.clone()).collect();
        let rendered = self.render_nodes.run(&mut *self.scene, &nodes)?;
        let sizes: BTreeMap<String, Size> = rendered
            .bound
            .iter()
            .map(|(id, element)| (id.clone(), self.scene.measure(*element)))
            .collect();

        let layout = self.engine.layout(&working, &sizes, &self.layout_config);

        let mut event = MapEvent::PostLayout { layout };
        self.emit(&mut event)?;
        let MapEvent::PostLayout { layout } = event else {
            return Err(KnowledgeMapError::Contract(format!(
                "postLayout subscriber replaced the event with {event}"
            )));
        };

        let transition = self.transition;
        let positioned: Vec<RenderedNode> = nodes
            .into_iter()
            .filter_map(|node| {
                layout.node(&node.id).map(|rect| RenderedNode {
                    layout: *rect,
                    node,
                    transition,
                })
            })
            .collect();
        self.position_nodes.run(&mut *self.scene, &positioned)?;

        let edges = project_edges(&working, &layout, transition);
        self.render_edges.run(&mut *self.scene, &edges)?;
        self.position_edges.run(&mut *self.scene, &edges)?;
        self.last_layout = layout;

        let mut event = MapEvent::RenderGraph {
            graph: working,
            nodes: rendered.bound,
        };
        self.emit(&mut event)?;
        self.render_count += 1;
        Ok(())
    }

    // --- events ---

    /// Subscribe to `kind`. Keep the returned handle to unsubscribe later.
    pub fn on_event<S, F>(&mut self, kind: S, f: F) -> MapHandler
    where
        S: Into<String>,
        F: Fn(&mut KnowledgeMap, &mut MapEvent) -> Result<()> + 'static,
    {
        let handler: MapHandler = Rc::new(f);
        self.events.on_event(kind, handler.clone());
        handler
    }

    pub fn off_event(&mut self, kind: &str, handler: &MapHandler) -> bool {
        self.events.off_event(kind, handler)
    }

    /// Deliver `event` to its subscribers and hand it back as they left it.
    pub fn post_event(&mut self, mut event: MapEvent) -> Result<MapEvent> {
        self.emit(&mut event)?;
        Ok(event)
    }

    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.events.subscriber_count(kind)
    }

    // --- accessors ---

    pub fn graph(&self) -> &MapGraph {
        &self.graph
    }

    /// The layout computed by the last render cycle.
    pub fn layout(&self) -> &Layout {
        &self.last_layout
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout_config
    }

    pub fn set_layout_config(&mut self, config: LayoutConfig) {
        self.layout_config = config;
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn set_transition(&mut self, transition: Transition) {
        self.transition = transition;
    }

    /// The plugins this map was constructed with.
    pub fn plugins(&self) -> &[PluginSpec] {
        &self.plugins
    }

    pub fn scene(&self) -> &dyn Scene {
        &*self.scene
    }

    pub fn scene_mut(&mut self) -> &mut dyn Scene {
        &mut *self.scene
    }

    pub fn render_nodes(&self) -> &Renderer<MapNode> {
        &self.render_nodes
    }

    pub fn render_nodes_mut(&mut self) -> &mut Renderer<MapNode> {
        &mut self.render_nodes
    }

    pub fn position_nodes(&self) -> &Renderer<RenderedNode> {
        &self.position_nodes
    }

    pub fn position_nodes_mut(&mut self) -> &mut Renderer<RenderedNode> {
        &mut self.position_nodes
    }

    pub fn render_edges(&self) -> &Renderer<RenderedEdge> {
        &self.render_edges
    }

    pub fn render_edges_mut(&mut self) -> &mut Renderer<RenderedEdge> {
        &mut self.render_edges
    }

    pub fn position_edges(&self) -> &Renderer<RenderedEdge> {
        &self.position_edges
    }

    pub fn position_edges_mut(&mut self) -> &mut Renderer<RenderedEdge> {
        &mut self.position_edges
    }

    pub fn default_new_nodes(&self) -> Callback<MapNode> {
        self.defaults.new_nodes.clone()
    }

    pub fn default_update_nodes(&self) -> Callback<MapNode> {
        self.defaults.update_nodes.clone()
    }

    pub fn default_update_node_positions(&self) -> Callback<RenderedNode> {
        self.defaults.update_node_positions.clone()
    }

    pub fn default_new_edges(&self) -> Callback<RenderedEdge> {
        self.defaults.new_edges.clone()
    }

    pub fn default_update_edge_positions(&self) -> Callback<RenderedEdge> {
        self.defaults.update_edge_positions.clone()
    }

    /// Run a multi-step graph change. If any step fails the graph is restored as it was.
    fn transact<T>(&mut self, change: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.graph.copy();
        match change(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::debug!("[KnowledgeMap::transact] rolling back: {}", err);
                self.graph = snapshot;
                Err(err)
            }
        }
    }

    // --- concepts and dependencies ---

    /// Add (or replace) a concept and its dependency edges. Returns the concept id.
    ///
    /// Every named dependency and dependent must already exist; otherwise nothing changes and
    /// `NotFound` is returned.
    pub fn add_concept<C: Into<NewConcept>>(&mut self, concept: C) -> Result<String> {
        let id = self.transact(|map| map.add_concept_inner(concept.into()))?;
        self.changed()?;
        Ok(id)
    }

    fn add_concept_inner(&mut self, new: NewConcept) -> Result<String> {
        let NewConcept {
            concept,
            dependents,
        } = new;
        let id = concept.resolved_id();
        for other in concept.dependencies.iter().chain(dependents.iter()) {
            if *other != id && !self.graph.has_node(other) {
                return Err(KnowledgeMapError::NotFound(format!(
                    "concept '{other}' referenced by '{id}'"
                )));
            }
        }

        self.graph.add_node(
            id.clone(),
            MapNode {
                id: id.clone(),
                label: concept.name,
                kind: NodeKind::Concept,
                content: concept.content,
            },
        );
        for dependency in &concept.dependencies {
            self.graph
                .add_edge(None, dependency, &id, Relation::dependency())?;
        }
        for dependent in &dependents {
            self.graph
                .add_edge(None, &id, dependent, Relation::dependency())?;
        }
        Ok(id)
    }

    /// Record that `concept` depends on `dependency`. The edge runs `dependency -> concept` with
    /// key `"{dependency}-{concept}"`.
    pub fn add_dependency(&mut self, concept: &str, dependency: &str) -> Result<()> {
        for id in [concept, dependency] {
            if !self.graph.has_node(id) {
                return Err(KnowledgeMapError::NotFound(format!("concept '{id}'")));
            }
        }
        self.graph
            .add_edge(None, dependency, concept, Relation::dependency())?;
        self.changed()
    }

    pub fn remove_dependency(&mut self, concept: &str, dependency: &str) -> Result<()> {
        if !self.has_dependency(concept, dependency) {
            tracing::debug!(
                "[KnowledgeMap::remove_dependency] '{}' does not depend on '{}'",
                concept,
                dependency
            );
            return Ok(());
        }
        self.graph.del_edge(&edge_key(dependency, concept));
        self.changed()
    }

    pub fn has_dependency(&self, concept: &str, dependency: &str) -> bool {
        self.graph
            .edge(&edge_key(dependency, concept))
            .is_some_and(|edge| {
                edge.data.kind == RelationKind::Dependency
                    && edge.source == dependency
                    && edge.target == concept
            })
    }

    /// Ids `id` depends on, sorted.
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.graph
            .in_edges(id)
            .into_iter()
            .filter(|edge| edge.data.kind == RelationKind::Dependency)
            .map(|edge| edge.source.to_string())
            .collect()
    }

    /// Ids that depend on `id`, sorted.
    pub fn dependants(&self, id: &str) -> Vec<String> {
        self.graph
            .out_edges(id)
            .into_iter()
            .filter(|edge| edge.data.kind == RelationKind::Dependency)
            .map(|edge| edge.target.to_string())
            .collect()
    }

    /// Remove a concept together with every edge touching it.
    pub fn remove_concept(&mut self, id: &str) -> Result<()> {
        if !self.remove_node_inner(id)? {
            return Ok(());
        }
        self.changed()
    }

    fn remove_node_inner(&mut self, id: &str) -> Result<bool> {
        if !self.graph.has_node(id) {
            tracing::debug!("[KnowledgeMap::remove_node] no node '{}'", id);
            return Ok(false);
        }
        for key in self.graph.incident_edges(id) {
            self.graph.del_edge(&key);
        }
        self.graph.del_node(id)?;
        Ok(true)
    }

    /// Create the concept a reference names, if needed, and return its id.
    ///
    /// A bare label first matches an existing node id exactly, then by slug; it never touches an
    /// existing concept. A full record replaces the node data of an existing concept (its edges
    /// are kept) and adds edges for its dependencies.
    pub fn define_concept<C: Into<ConceptRef>>(&mut self, concept: C) -> Result<String> {
        let id = self.transact(|map| map.define_concept_inner(concept.into()))?;
        self.changed()?;
        Ok(id)
    }

    fn define_concept_inner(&mut self, concept: ConceptRef) -> Result<String> {
        match concept {
            ConceptRef::Id(label) => {
                if self.graph.has_node(&label) {
                    return Ok(label);
                }
                let id = slugify(&label);
                if !self.graph.has_node(&id) {
                    self.graph
                        .add_node(id.clone(), MapNode::concept(id.clone(), label));
                }
                Ok(id)
            }
            ConceptRef::Record(concept) => self.add_concept_inner(concept.into()),
        }
    }

    // --- content ---

    pub fn content(&self, id: &str) -> Option<&[ContentEntry]> {
        self.graph.node(id).map(|node| node.content.as_slice())
    }

    fn node_content_mut(&mut self, id: &str) -> Result<&mut Vec<ContentEntry>> {
        self.graph
            .node_mut(id)
            .map(|node| &mut node.content)
            .ok_or_else(|| KnowledgeMapError::NotFound(format!("node '{id}'")))
    }

    pub fn add_content(&mut self, id: &str, item: ContentItem) -> Result<ContentId> {
        let entry = ContentEntry::new(item);
        let content_id = entry.id;
        self.node_content_mut(id)?.push(entry);
        self.changed()?;
        Ok(content_id)
    }

    /// Replace the item at `index`, keeping its id. An index past the end appends instead.
    pub fn update_content(
        &mut self,
        id: &str,
        index: usize,
        item: ContentItem,
    ) -> Result<ContentId> {
        let content = self.node_content_mut(id)?;
        let content_id = match content.get_mut(index) {
            Some(entry) => {
                entry.item = item;
                entry.id
            }
            None => {
                tracing::debug!(
                    "[KnowledgeMap::update_content] index {} past the end of '{}', appending",
                    index,
                    id
                );
                let entry = ContentEntry::new(item);
                let content_id = entry.id;
                content.push(entry);
                content_id
            }
        };
        self.changed()?;
        Ok(content_id)
    }

    pub fn remove_content(&mut self, id: &str, index: usize) -> Result<Option<ContentEntry>> {
        let content = self.node_content_mut(id)?;
        if index >= content.len() {
            tracing::debug!(
                "[KnowledgeMap::remove_content] no content at {} in '{}'",
                index,
                id
            );
            return Ok(None);
        }
        let removed = content.remove(index);
        self.changed()?;
        Ok(Some(removed))
    }

    pub fn update_content_by_id(
        &mut self,
        id: &str,
        content_id: ContentId,
        item: ContentItem,
    ) -> Result<()> {
        let entry = self
            .node_content_mut(id)?
            .iter_mut()
            .find(|entry| entry.id == content_id)
            .ok_or_else(|| KnowledgeMapError::NotFound(format!("content {content_id} in '{id}'")))?;
        entry.item = item;
        self.changed()
    }

    pub fn remove_content_by_id(
        &mut self,
        id: &str,
        content_id: ContentId,
    ) -> Result<Option<ContentEntry>> {
        let content = self.node_content_mut(id)?;
        let Some(index) = content.iter().position(|entry| entry.id == content_id) else {
            tracing::debug!(
                "[KnowledgeMap::remove_content_by_id] no content {} in '{}'",
                content_id,
                id
            );
            return Ok(None);
        };
        let removed = content.remove(index);
        self.changed()?;
        Ok(Some(removed))
    }

    // --- resources ---

    /// Add a resource node, defining the concepts it teaches and requires on demand.
    /// Returns the resource id.
    pub fn add_resource<R: Into<Resource>>(&mut self, resource: R) -> Result<String> {
        let id = self.transact(|map| map.add_resource_inner(resource.into()))?;
        self.changed()?;
        Ok(id)
    }

    fn add_resource_inner(&mut self, resource: Resource) -> Result<String> {
        let id = self.insert_resource_node(&resource);
        self.link_resource(&id, resource)?;
        Ok(id)
    }

    fn insert_resource_node(&mut self, resource: &Resource) -> String {
        let id = resource.resolved_id();
        let mut node = MapNode::resource(id.clone(), resource.label.clone());
        node.content = resource.content.clone();
        self.graph.add_node(id.clone(), node);
        id
    }

    fn link_resource(&mut self, id: &str, resource: Resource) -> Result<()> {
        for concept in resource.requires {
            let concept_id = self.define_concept_inner(concept)?;
            self.graph
                .add_edge(None, &concept_id, id, Relation::dependency())?;
        }
        for concept in resource.teaches {
            let concept_id = self.define_concept_inner(concept)?;
            self.graph
                .add_edge(None, id, &concept_id, Relation::teaches())?;
        }
        Ok(())
    }

    /// Remove a resource and its edges. Ids that are not resources are left alone.
    pub fn remove_resource(&mut self, id: &str) -> Result<()> {
        match self.graph.node(id) {
            Some(node) if node.is_resource() => {
                self.remove_node_inner(id)?;
                self.changed()
            }
            Some(_) => {
                tracing::warn!(
                    "[KnowledgeMap::remove_resource] '{}' is a concept, not a resource",
                    id
                );
                Ok(())
            }
            None => {
                tracing::debug!("[KnowledgeMap::remove_resource] no node '{}'", id);
                Ok(())
            }
        }
    }

    // --- JSON ---

    /// Load a `{"concepts": [...]}` document into the map. Every node is inserted before any
    /// edge, so dependencies may refer forward within the document.
    pub fn load(&mut self, document: MapDocument) -> Result<()> {
        self.transact(|map| map.load_inner(document))?;
        self.changed()
    }

    fn load_inner(&mut self, document: MapDocument) -> Result<()> {
        let MapDocument {
            concepts,
            resources,
        } = document;

        let mut pending = Vec::with_capacity(concepts.len());
        for concept in concepts {
            let id = concept.resolved_id();
            self.graph.add_node(
                id.clone(),
                MapNode {
                    id: id.clone(),
                    label: concept.name,
                    kind: NodeKind::Concept,
                    content: concept.content,
                },
            );
            pending.push((id, concept.dependencies));
        }
        let resource_ids: Vec<String> = resources
            .iter()
            .map(|resource| self.insert_resource_node(resource))
            .collect();

        for (id, dependencies) in pending {
            for dependency in dependencies {
                if !self.graph.has_node(&dependency) {
                    return Err(KnowledgeMapError::NotFound(format!(
                        "concept '{dependency}' required by '{id}'"
                    )));
                }
                self.graph
                    .add_edge(None, &dependency, &id, Relation::dependency())?;
            }
        }
        for (id, resource) in resource_ids.iter().zip(resources) {
            self.link_resource(id, resource)?;
        }
        Ok(())
    }

    /// The concept stored at `id` as a record, with dependencies read from the edges.
    pub fn concept(&self, id: &str) -> Option<Concept> {
        self.graph
            .node(id)
            .filter(|node| node.kind == NodeKind::Concept)
            .map(|node| self.concept_record(id, node))
    }

    fn concept_record(&self, id: &str, node: &MapNode) -> Concept {
        Concept {
            id: id.to_string(),
            name: node.label.clone(),
            dependencies: self.dependencies(id),
            content: node.content.clone(),
        }
    }

    /// The current graph as a document. Concept order follows node id order.
    pub fn to_document(&self) -> MapDocument {
        let mut document = MapDocument::default();
        for (id, node) in self.graph.node_entries() {
            match node.kind {
                NodeKind::Concept => document.concepts.push(self.concept_record(id, node)),
                NodeKind::Resource => document.resources.push(Resource {
                    id: Some(id.to_string()),
                    label: node.label.clone(),
                    content: node.content.clone(),
                    teaches: self
                        .graph
                        .out_edges(id)
                        .into_iter()
                        .filter(|edge| edge.data.kind == RelationKind::Teaches)
                        .map(|edge| ConceptRef::Id(edge.target.to_string()))
                        .collect(),
                    requires: self
                        .dependencies(id)
                        .into_iter()
                        .map(ConceptRef::Id)
                        .collect(),
                }),
            }
        }
        document
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }
}

fn project_edges(graph: &MapGraph, layout: &Layout, transition: Transition) -> Vec<RenderedEdge> {
    graph
        .edge_entries()
        .filter_map(|edge| {
            let source = layout.node(edge.source)?;
            let target = layout.node(edge.target)?;
            Some(RenderedEdge {
                key: edge.key.to_string(),
                relation: *edge.data,
                source_id: edge.source.to_string(),
                target_id: edge.target.to_string(),
                source: *source,
                target: *target,
                points: layout
                    .edge(edge.key)
                    .map(|e| e.points.clone())
                    .unwrap_or_default(),
                transition,
            })
        })
        .collect()
}
