use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    rc::Rc,
};

use crate::{
    error::Result,
    graph::MapGraph,
    layout::{Layout, LayoutConfig},
    scene::ElementId,
};

/// Anything that can be routed by an [`EventDispatcher`]: the dispatcher only ever looks at the
/// event's kind string.
pub trait EventKind {
    fn kind(&self) -> &str;
}

/// A subscriber receives the dispatcher's owner and the event. Returning an error stops delivery
/// to the remaining subscribers of that event.
pub type Handler<C, E> = Rc<dyn Fn(&mut C, &mut E) -> Result<()>>;

/// Per-instance map from event kind to an ordered list of subscribers.
///
/// Delivery is synchronous and in registration order. There is no wildcard subscription:
/// subscribers registered for another kind never see the event.
pub struct EventDispatcher<C, E> {
    handlers: BTreeMap<String, Vec<Handler<C, E>>>,
}

impl<C, E> Default for EventDispatcher<C, E> {
    fn default() -> Self {
        EventDispatcher {
            handlers: BTreeMap::new(),
        }
    }
}

impl<C, E> std::fmt::Debug for EventDispatcher<C, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}

impl<C, E: EventKind> EventDispatcher<C, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event<S: Into<String>>(&mut self, kind: S, handler: Handler<C, E>) {
        self.handlers.entry(kind.into()).or_default().push(handler);
    }

    /// Remove the first registration of `handler` for `kind`, compared by pointer identity.
    /// Returns whether anything was removed.
    pub fn off_event(&mut self, kind: &str, handler: &Handler<C, E>) -> bool {
        let Some(list) = self.handlers.get_mut(kind) else {
            return false;
        };
        match list.iter().position(|h| Rc::ptr_eq(h, handler)) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// A snapshot of the subscribers for `kind`, in registration order.
    ///
    /// Owners that need to hand `&mut self` to their subscribers take this snapshot first and
    /// then call [`deliver`].
    pub fn handlers(&self, kind: &str) -> Vec<Handler<C, E>> {
        self.handlers.get(kind).cloned().unwrap_or_default()
    }

    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.handlers.get(kind).map(Vec::len).unwrap_or(0)
    }

    /// Deliver `event` to its subscribers with a context that is not the dispatcher's owner.
    pub fn post_event(&self, ctx: &mut C, event: &mut E) -> Result<usize> {
        deliver(&self.handlers(event.kind()), ctx, event)
    }
}

/// Call each handler in order, stopping at the first error. Returns how many handlers ran.
pub fn deliver<C, E: EventKind>(
    handlers: &[Handler<C, E>],
    ctx: &mut C,
    event: &mut E,
) -> Result<usize> {
    for (idx, handler) in handlers.iter().enumerate() {
        if let Err(e) = handler(ctx, event) {
            tracing::debug!(
                "[deliver] subscriber {} of '{}' failed, skipping {} more: {}",
                idx,
                event.kind(),
                handlers.len() - idx - 1,
                e
            );
            return Err(e);
        }
    }
    Ok(handlers.len())
}

/// Lifecycle and plugin events of a [`crate::map::KnowledgeMap`].
///
/// Payloads are owned: subscribers mutate them in place and the render cycle takes them back
/// once delivery finishes, so a `preLayout` subscriber can change the layout configuration or
/// the working graph the layout will see.
#[derive(Debug, Clone)]
pub enum MapEvent {
    /// Before layout: the layout configuration and a working copy of the graph.
    PreLayout { config: LayoutConfig, graph: MapGraph },
    /// After layout, before nodes are positioned.
    PostLayout { layout: Layout },
    /// After nodes and edges are drawn: the rendered graph and every node element by id.
    RenderGraph {
        graph: MapGraph,
        nodes: Vec<(String, ElementId)>,
    },
    /// Any other event, such as `clickConcept`, posted by plugins or the host application.
    Custom {
        kind: String,
        payload: serde_json::Value,
    },
}

impl MapEvent {
    pub const PRE_LAYOUT: &'static str = "preLayout";
    pub const POST_LAYOUT: &'static str = "postLayout";
    pub const RENDER_GRAPH: &'static str = "renderGraph";

    pub fn custom<S: Into<String>>(kind: S, payload: serde_json::Value) -> Self {
        MapEvent::Custom {
            kind: kind.into(),
            payload,
        }
    }
}

impl EventKind for MapEvent {
    fn kind(&self) -> &str {
        match self {
            MapEvent::PreLayout { .. } => MapEvent::PRE_LAYOUT,
            MapEvent::PostLayout { .. } => MapEvent::POST_LAYOUT,
            MapEvent::RenderGraph { .. } => MapEvent::RENDER_GRAPH,
            MapEvent::Custom { kind, .. } => kind,
        }
    }
}

impl Display for MapEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            MapEvent::PreLayout { graph, .. } => {
                write!(f, "PreLayout({} nodes)", graph.node_count())
            }
            MapEvent::PostLayout { layout } => write!(f, "PostLayout({} nodes)", layout.nodes.len()),
            MapEvent::RenderGraph { nodes, .. } => write!(f, "RenderGraph({} nodes)", nodes.len()),
            MapEvent::Custom { kind, .. } => write!(f, "Custom({kind})"),
        }
    }
}
