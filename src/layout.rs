//! Layered graph layout.
//!
//! The render cycle depends only on the [`LayoutEngine`] contract: given a graph snapshot, the
//! measured size of every node, and a [`LayoutConfig`], return centre coordinates for every node
//! and waypoints for every edge. Identical inputs must give identical output.
//!
//! [`LayeredLayout`] is the built-in engine: cycle removal (a greedy feedback arc set), longest-path
//! ranking over a topological order, virtual nodes
//! for long edges, barycenter ordering, then coordinate assignment.

use petgraph::{
    algo::{greedy_feedback_arc_set, toposort},
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
    Direction,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::{
    geometry::{Point, Rect, Size},
    graph::MapGraph,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RankDir {
    /// Top to bottom
    #[default]
    TB,
    /// Bottom to top
    BT,
    /// Left to right
    LR,
    /// Right to left
    RL,
}

impl RankDir {
    fn is_horizontal(&self) -> bool {
        matches!(self, RankDir::LR | RankDir::RL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Gap between consecutive ranks.
    #[serde(alias = "vertical_space", alias = "rankSep")]
    pub vertical_space: f64,
    /// Gap between neighbouring nodes of one rank.
    #[serde(alias = "horizontal_space", alias = "nodeSep")]
    pub horizontal_space: f64,
    pub direction: RankDir,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            vertical_space: 50.0,
            horizontal_space: 50.0,
            direction: RankDir::TB,
        }
    }
}

/// Position of a laid-out node: centre coordinates plus the size it was laid out with.
pub type NodeLayout = Rect;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeLayout {
    pub key: String,
    pub source: String,
    pub target: String,
    /// Intermediate waypoints from source toward target. Empty for edges between adjacent ranks.
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub nodes: BTreeMap<String, NodeLayout>,
    pub edges: BTreeMap<String, EdgeLayout>,
    pub width: f64,
    pub height: f64,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.get(id)
    }

    pub fn edge(&self, key: &str) -> Option<&EdgeLayout> {
        self.edges.get(key)
    }
}

pub trait LayoutEngine {
    fn layout(
        &self,
        graph: &MapGraph,
        sizes: &BTreeMap<String, Size>,
        config: &LayoutConfig,
    ) -> Layout;
}

const BARYCENTER_SWEEPS: usize = 4;

/// The default deterministic layered layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayout;

/// Working graph where every edge spans exactly one rank.
#[derive(Debug, Default)]
struct Ranked {
    sizes: Vec<Size>,
    ranks: Vec<usize>,
    preds: Vec<Vec<usize>>,
    succs: Vec<Vec<usize>>,
}

impl Ranked {
    fn push(&mut self, size: Size, rank: usize) -> usize {
        self.sizes.push(size);
        self.ranks.push(rank);
        self.preds.push(Vec::new());
        self.succs.push(Vec::new());
        self.sizes.len() - 1
    }

    fn link(&mut self, from: usize, to: usize) {
        self.succs[from].push(to);
        self.preds[to].push(from);
    }
}

/// Index graph over `count` nodes. Edge `i` of the result is `edges[i]`.
fn index_graph(count: usize, edges: &[(usize, usize)]) -> DiGraph<(), ()> {
    let mut graph = DiGraph::with_capacity(count, edges.len());
    for _ in 0..count {
        graph.add_node(());
    }
    for (from, to) in edges {
        graph.add_edge(NodeIndex::new(*from), NodeIndex::new(*to), ());
    }
    graph
}

/// Positions in `edges` whose reversal leaves the graph acyclic.
fn feedback_edges(count: usize, edges: &[(usize, usize)]) -> HashSet<usize> {
    let graph = index_graph(count, edges);
    let feedback = greedy_feedback_arc_set(&graph)
        .map(|edge| edge.id().index())
        .collect();
    feedback
}

/// Longest-path ranks over `edges`, which must be acyclic.
fn longest_path_ranks(count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let graph = index_graph(count, edges);
    let order = match toposort(&graph, None) {
        Ok(order) => order,
        Err(cycle) => {
            tracing::warn!(
                "[LayeredLayout] cycle through node {} survived cycle removal, ranking in index order",
                cycle.node_id().index()
            );
            graph.node_indices().collect()
        }
    };
    let mut ranks = vec![0usize; count];
    for node in order {
        let rank = ranks[node.index()] + 1;
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            ranks[next.index()] = ranks[next.index()].max(rank);
        }
    }
    ranks
}

fn barycenter_order(layer: &mut Vec<usize>, neighbours: &[Vec<usize>], positions: &[f64]) {
    let mut scored: Vec<(usize, f64)> = layer
        .iter()
        .enumerate()
        .map(|(current, node)| {
            let adjacent = &neighbours[*node];
            let score = if adjacent.is_empty() {
                current as f64
            } else {
                adjacent.iter().map(|n| positions[*n]).sum::<f64>() / adjacent.len() as f64
            };
            (*node, score)
        })
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    *layer = scored.into_iter().map(|(node, _)| node).collect();
}

fn order_layers(ranked: &Ranked) -> Vec<Vec<usize>> {
    let rank_count = ranked.ranks.iter().max().map(|r| r + 1).unwrap_or(0);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (node, rank) in ranked.ranks.iter().enumerate() {
        layers[*rank].push(node);
    }

    let mut positions = vec![0.0; ranked.sizes.len()];
    let record = |layer: &Vec<usize>, positions: &mut Vec<f64>| {
        for (i, node) in layer.iter().enumerate() {
            positions[*node] = i as f64;
        }
    };
    for layer in &layers {
        record(layer, &mut positions);
    }

    for _ in 0..BARYCENTER_SWEEPS {
        for li in 1..layers.len() {
            barycenter_order(&mut layers[li], &ranked.preds, &positions);
            record(&layers[li], &mut positions);
        }
        for li in (0..layers.len().saturating_sub(1)).rev() {
            barycenter_order(&mut layers[li], &ranked.succs, &positions);
            record(&layers[li], &mut positions);
        }
    }
    layers
}

impl LayoutEngine for LayeredLayout {
    fn layout(
        &self,
        graph: &MapGraph,
        sizes: &BTreeMap<String, Size>,
        config: &LayoutConfig,
    ) -> Layout {
        if graph.is_empty() {
            return Layout::default();
        }
        let horizontal = config.direction.is_horizontal();
        let layout_size = |id: &str| {
            let size = sizes.get(id).copied().unwrap_or_default();
            if horizontal {
                Size::new(size.height, size.width)
            } else {
                size
            }
        };

        // Real nodes occupy indices 0..n in id order.
        let ids: Vec<&str> = graph.nodes().collect();
        let index: BTreeMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut keys: Vec<String> = Vec::new();
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for edge in graph.edge_entries() {
            if edge.source == edge.target {
                continue;
            }
            keys.push(edge.key.to_string());
            pairs.push((index[edge.source], index[edge.target]));
        }

        let feedback = feedback_edges(ids.len(), &pairs);
        let mut oriented: Vec<(String, usize, usize, bool)> = Vec::with_capacity(pairs.len());
        for (i, (key, (from, to))) in keys.into_iter().zip(pairs.iter().copied()).enumerate() {
            if feedback.contains(&i) {
                oriented.push((key, to, from, true));
            } else {
                oriented.push((key, from, to, false));
            }
        }

        let acyclic: Vec<(usize, usize)> = oriented.iter().map(|(_, f, t, _)| (*f, *t)).collect();
        let ranks = longest_path_ranks(ids.len(), &acyclic);

        let mut ranked = Ranked::default();
        for (i, id) in ids.iter().enumerate() {
            ranked.push(layout_size(*id), ranks[i]);
        }
        let mut chains: BTreeMap<String, (Vec<usize>, bool)> = BTreeMap::new();
        for (key, from, to, reversed) in &oriented {
            let mut chain = Vec::new();
            let mut prev = *from;
            for rank in ranks[*from] + 1..ranks[*to] {
                let dummy = ranked.push(Size::default(), rank);
                ranked.link(prev, dummy);
                chain.push(dummy);
                prev = dummy;
            }
            ranked.link(prev, *to);
            chains.insert(key.clone(), (chain, *reversed));
        }

        let layers = order_layers(&ranked);

        // Coordinates in top-to-bottom space.
        let mut centers = vec![Point::default(); ranked.sizes.len()];
        let mut rank_top = 0.0;
        let mut layer_widths = Vec::with_capacity(layers.len());
        for layer in &layers {
            let rank_height = layer
                .iter()
                .map(|n| ranked.sizes[*n].height)
                .fold(0.0, f64::max);
            let mut cursor = 0.0;
            for node in layer {
                let size = ranked.sizes[*node];
                centers[*node] = Point::new(cursor + size.width / 2.0, rank_top + rank_height / 2.0);
                cursor += size.width + config.horizontal_space;
            }
            layer_widths.push((cursor - config.horizontal_space).max(0.0));
            rank_top += rank_height + config.vertical_space;
        }
        let total_height = (rank_top - config.vertical_space).max(0.0);
        let max_width = layer_widths.iter().copied().fold(0.0, f64::max);
        for (layer, width) in layers.iter().zip(&layer_widths) {
            let shift = (max_width - width) / 2.0;
            for node in layer {
                centers[*node].x += shift;
            }
        }

        let place = |p: Point| match config.direction {
            RankDir::TB => p,
            RankDir::BT => Point::new(p.x, total_height - p.y),
            RankDir::LR => Point::new(p.y, p.x),
            RankDir::RL => Point::new(total_height - p.y, p.x),
        };

        let mut layout = Layout::default();
        for (i, id) in ids.iter().enumerate() {
            let at = place(centers[i]);
            let size = sizes.get(*id).copied().unwrap_or_default();
            layout.nodes.insert(
                id.to_string(),
                Rect {
                    x: at.x,
                    y: at.y,
                    width: size.width,
                    height: size.height,
                },
            );
        }
        for edge in graph.edge_entries() {
            let points = match chains.get(edge.key) {
                Some((chain, reversed)) => {
                    let mut points: Vec<Point> = chain.iter().map(|n| place(centers[*n])).collect();
                    if *reversed {
                        points.reverse();
                    }
                    points
                }
                None => Vec::new(),
            };
            layout.edges.insert(
                edge.key.to_string(),
                EdgeLayout {
                    key: edge.key.to_string(),
                    source: edge.source.to_string(),
                    target: edge.target.to_string(),
                    points,
                },
            );
        }

        normalize(&mut layout);
        layout
    }
}

/// Translate the drawing so its top-left corner sits at the origin and record its extent.
fn normalize(layout: &mut Layout) {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for rect in layout.nodes.values() {
        min.x = min.x.min(rect.x - rect.width / 2.0);
        min.y = min.y.min(rect.y - rect.height / 2.0);
        max.x = max.x.max(rect.x + rect.width / 2.0);
        max.y = max.y.max(rect.y + rect.height / 2.0);
    }
    for p in layout.edges.values().flat_map(|e| e.points.iter()) {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    if !min.x.is_finite() {
        return;
    }
    for rect in layout.nodes.values_mut() {
        rect.x -= min.x;
        rect.y -= min.y;
    }
    for p in layout.edges.values_mut().flat_map(|e| e.points.iter_mut()) {
        p.x -= min.x;
        p.y -= min.y;
    }
    layout.width = max.x - min.x;
    layout.height = max.y - min.y;
}
