//! Built-in plugins, registered in [`crate::plugin::PLUGINS`] under their names.

use crate::{
    error::Result,
    event::MapEvent,
    geometry::{connector_point, Point},
    map::{KnowledgeMap, RenderedEdge, RenderedNode},
    plugin::Plugin,
    properties::MapNode,
    reconciler::{callback, Bound},
    scene::Scene,
};

/// Turns nodes whose content carries a link into anchors: after each render the node element
/// gets an `href` attribute with the first link.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinksPlugin;

impl LinksPlugin {
    pub const NAME: &'static str = "links";
}

impl Plugin for LinksPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, map: &mut KnowledgeMap) -> Result<()> {
        map.on_event(MapEvent::RENDER_GRAPH, |map, event| {
            let MapEvent::RenderGraph { graph, nodes } = event else {
                return Ok(());
            };
            for (id, element) in nodes.iter() {
                if let Some(link) = graph.node(id).and_then(MapNode::first_link) {
                    map.scene_mut().set_attribute(*element, "href", link);
                }
            }
            Ok(())
        });
        Ok(())
    }
}

/// Makes concept labels clickable. Hosts report a click with [`ClickEventsPlugin::click`], which
/// posts a `clickConcept` custom event whose payload is `{"concept": <concept record>}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickEventsPlugin;

impl ClickEventsPlugin {
    pub const NAME: &'static str = "click-events";
    pub const EVENT: &'static str = "clickConcept";

    /// Post a click on concept `id`. Returns the event as the subscribers left it, or `None` if
    /// `id` is not a concept.
    pub fn click(map: &mut KnowledgeMap, id: &str) -> Result<Option<MapEvent>> {
        let Some(concept) = map.concept(id) else {
            tracing::debug!("[ClickEventsPlugin::click] no concept '{}'", id);
            return Ok(None);
        };
        let payload = serde_json::json!({ "concept": serde_json::to_value(concept)? });
        map.post_event(MapEvent::custom(Self::EVENT, payload)).map(Some)
    }
}

impl Plugin for ClickEventsPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, map: &mut KnowledgeMap) -> Result<()> {
        map.on_event(MapEvent::RENDER_GRAPH, |map, event| {
            let MapEvent::RenderGraph { graph, nodes } = event else {
                return Ok(());
            };
            for (id, element) in nodes.iter() {
                if graph.node(id).is_some_and(|node| !node.is_resource()) {
                    map.scene_mut()
                        .set_attribute(*element, "data-click", Self::EVENT);
                }
            }
            Ok(())
        });
        Ok(())
    }
}

/// Radius of the connector handles drawn above and below resource nodes.
pub const CONNECTOR_RADIUS: f64 = 25.0;

/// Draws resource nodes with an entry handle above and an exit handle below, and routes every
/// edge into those handles instead of the node border.
#[derive(Debug, Clone, Copy, Default)]
pub struct HamburgerNodesPlugin;

impl HamburgerNodesPlugin {
    pub const NAME: &'static str = "hamburger-nodes";
}

impl Plugin for HamburgerNodesPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, map: &mut KnowledgeMap) -> Result<()> {
        map.render_nodes_mut().on_new(callback(
            |scene: &mut dyn Scene, nodes: &[Bound<'_, MapNode>]| {
                for bound in nodes.iter().filter(|b| b.datum.is_resource()) {
                    scene.set_attribute(bound.element, "class", "hamburger");
                }
                Ok(())
            },
        ));

        map.position_nodes_mut().on_update(callback(
            |scene: &mut dyn Scene, nodes: &[Bound<'_, RenderedNode>]| {
                for bound in nodes.iter().filter(|b| b.datum.node.is_resource()) {
                    let offset = bound.datum.layout.height / 2.0 + 2.0;
                    scene.set_attribute(bound.element, "data-enter", &format!("0,{}", -offset));
                    scene.set_attribute(bound.element, "data-exit", &format!("0,{offset}"));
                }
                Ok(())
            },
        ));

        let default = map.default_update_edge_positions();
        map.position_edges_mut()
            .off_update(&default)
            .on_update(callback(
                |scene: &mut dyn Scene, edges: &[Bound<'_, RenderedEdge>]| {
                    for bound in edges {
                        scene.set_path(
                            bound.element,
                            &connector_path(bound.datum),
                            bound.datum.transition,
                        );
                    }
                    Ok(())
                },
            ));
        Ok(())
    }
}

/// Waypoints of `edge` with both ends attached to connector handles.
pub fn connector_path(edge: &RenderedEdge) -> Vec<Point> {
    let toward_source = edge
        .points
        .first()
        .copied()
        .unwrap_or_else(|| edge.target.center());
    let toward_target = edge
        .points
        .last()
        .copied()
        .unwrap_or_else(|| edge.source.center());

    let mut path = Vec::with_capacity(edge.points.len() + 2);
    path.push(connector_point(&edge.source, toward_source, CONNECTOR_RADIUS));
    path.extend(edge.points.iter().copied());
    path.push(connector_point(&edge.target, toward_target, CONNECTOR_RADIUS));
    path
}
