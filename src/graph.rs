//! The directed graph store backing a knowledge map.
//!
//! [`Digraph`] wraps a `petgraph` [`StableDiGraph`] with two id indices so that nodes are
//! addressed by their string id and edges by a string key. Node and edge enumeration is ordered
//! by id/key, which keeps everything downstream (layout, reconciliation) deterministic.

use petgraph::{
    stable_graph::{EdgeIndex, NodeIndex, StableDiGraph},
    visit::EdgeRef,
    Direction,
};
use std::collections::BTreeMap;

use crate::{
    error::{KnowledgeMapError, Result},
    properties::{MapNode, Relation},
};

/// The graph type owned by a [`crate::map::KnowledgeMap`].
pub type MapGraph = Digraph<MapNode, Relation>;

/// Deterministic key of the edge `source -> target`.
pub fn edge_key(source: &str, target: &str) -> String {
    format!("{source}-{target}")
}

#[derive(Debug, Clone)]
struct NodeEntry<N> {
    id: String,
    data: N,
}

#[derive(Debug, Clone)]
struct EdgeEntry<E> {
    key: String,
    data: E,
}

/// Borrowed view of one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeView<'a, E> {
    pub key: &'a str,
    pub source: &'a str,
    pub target: &'a str,
    pub data: &'a E,
}

/// Directed graph keyed by string ids. Cloning produces a structurally independent copy.
#[derive(Debug, Clone)]
pub struct Digraph<N, E> {
    graph: StableDiGraph<NodeEntry<N>, EdgeEntry<E>>,
    node_index: BTreeMap<String, NodeIndex>,
    edge_index: BTreeMap<String, EdgeIndex>,
}

impl<N, E> Default for Digraph<N, E> {
    fn default() -> Self {
        Digraph {
            graph: StableDiGraph::default(),
            node_index: BTreeMap::new(),
            edge_index: BTreeMap::new(),
        }
    }
}

impl<N, E> Digraph<N, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` at `id`, replacing whatever was there. Edges of an existing node are kept.
    pub fn add_node<S: Into<String>>(&mut self, id: S, data: N) {
        let id = id.into();
        match self.node_index.get(&id) {
            Some(idx) => self.graph[*idx].data = data,
            None => {
                let idx = self.graph.add_node(NodeEntry {
                    id: id.clone(),
                    data,
                });
                self.node_index.insert(id, idx);
            }
        }
    }

    /// Insert the edge `source -> target`. When `key` is `None` it is derived with [`edge_key`].
    ///
    /// Adding a key that already exists between the same endpoints replaces its data and is
    /// otherwise a no-op. Returns the key used.
    pub fn add_edge(
        &mut self,
        key: Option<&str>,
        source: &str,
        target: &str,
        data: E,
    ) -> Result<String> {
        let key = key
            .map(str::to_string)
            .unwrap_or_else(|| edge_key(source, target));
        let source_idx = *self
            .node_index
            .get(source)
            .ok_or_else(|| KnowledgeMapError::NotFound(format!("edge source node '{source}'")))?;
        let target_idx = *self
            .node_index
            .get(target)
            .ok_or_else(|| KnowledgeMapError::NotFound(format!("edge target node '{target}'")))?;

        if let Some(edge_idx) = self.edge_index.get(&key) {
            let (existing_source, existing_target) =
                self.graph.edge_endpoints(*edge_idx).ok_or_else(|| {
                    KnowledgeMapError::NotFound(format!("stale index for edge '{key}'"))
                })?;
            if existing_source != source_idx || existing_target != target_idx {
                return Err(KnowledgeMapError::EdgeConflict {
                    key,
                    existing_source: self.graph[existing_source].id.clone(),
                    existing_target: self.graph[existing_target].id.clone(),
                    source_id: source.to_string(),
                    target_id: target.to_string(),
                });
            }
            self.graph[*edge_idx].data = data;
            return Ok(key);
        }

        let edge_idx = self.graph.add_edge(
            source_idx,
            target_idx,
            EdgeEntry {
                key: key.clone(),
                data,
            },
        );
        self.edge_index.insert(key.clone(), edge_idx);
        Ok(key)
    }

    /// Remove the node at `id`. Fails with [`KnowledgeMapError::HasIncidentEdges`] while any
    /// edge still touches it, and with [`KnowledgeMapError::NotFound`] if it does not exist.
    pub fn del_node(&mut self, id: &str) -> Result<N> {
        let idx = *self
            .node_index
            .get(id)
            .ok_or_else(|| KnowledgeMapError::NotFound(format!("node '{id}'")))?;
        let edges = self.incident_edges(id);
        if !edges.is_empty() {
            return Err(KnowledgeMapError::HasIncidentEdges {
                id: id.to_string(),
                edges,
            });
        }
        self.node_index.remove(id);
        self.graph
            .remove_node(idx)
            .map(|entry| entry.data)
            .ok_or_else(|| KnowledgeMapError::NotFound(format!("stale index for node '{id}'")))
    }

    /// Remove the edge at `key`, returning its data. Absent keys are ignored.
    pub fn del_edge(&mut self, key: &str) -> Option<E> {
        let idx = self.edge_index.remove(key)?;
        self.graph.remove_edge(idx).map(|entry| entry.data)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn has_edge(&self, key: &str) -> bool {
        self.edge_index.contains_key(key)
    }

    pub fn node(&self, id: &str) -> Option<&N> {
        self.node_index.get(id).map(|idx| &self.graph[*idx].data)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut N> {
        let idx = *self.node_index.get(id)?;
        Some(&mut self.graph[idx].data)
    }

    pub fn edge(&self, key: &str) -> Option<EdgeView<'_, E>> {
        let idx = *self.edge_index.get(key)?;
        self.edge_view(idx)
    }

    fn edge_view(&self, idx: EdgeIndex) -> Option<EdgeView<'_, E>> {
        let (source, target) = self.graph.edge_endpoints(idx)?;
        let entry = self.graph.edge_weight(idx)?;
        Some(EdgeView {
            key: &entry.key,
            source: &self.graph[source].id,
            target: &self.graph[target].id,
            data: &entry.data,
        })
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .graph
            .neighbors_directed(*idx, direction)
            .map(|n| self.graph[n].id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Ids of the targets of edges leaving `id`, sorted.
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Ids of the sources of edges entering `id`, sorted.
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    fn directed_edges(&self, id: &str, direction: Direction) -> Vec<EdgeView<'_, E>> {
        let Some(idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<EdgeView<'_, E>> = self
            .graph
            .edges_directed(*idx, direction)
            .filter_map(|edge| self.edge_view(edge.id()))
            .collect();
        edges.sort_by(|a, b| a.key.cmp(b.key));
        edges
    }

    pub fn in_edges(&self, id: &str) -> Vec<EdgeView<'_, E>> {
        self.directed_edges(id, Direction::Incoming)
    }

    pub fn out_edges(&self, id: &str) -> Vec<EdgeView<'_, E>> {
        self.directed_edges(id, Direction::Outgoing)
    }

    /// Keys of every edge touching `id` in either direction, sorted.
    pub fn incident_edges(&self, id: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .in_edges(id)
            .into_iter()
            .chain(self.out_edges(id))
            .map(|edge| edge.key.to_string())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self.node_index.keys().map(String::as_str)
    }

    /// `(id, data)` pairs in ascending id order.
    pub fn node_entries(&self) -> impl Iterator<Item = (&str, &N)> + '_ {
        self.node_index
            .iter()
            .map(|(id, idx)| (id.as_str(), &self.graph[*idx].data))
    }

    /// Edge keys in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = &str> + '_ {
        self.edge_index.keys().map(String::as_str)
    }

    /// Edge views in ascending key order.
    pub fn edge_entries(&self) -> impl Iterator<Item = EdgeView<'_, E>> + '_ {
        self.edge_index
            .values()
            .filter_map(|idx| self.edge_view(*idx))
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_index.is_empty()
    }
}

impl<N: Clone, E: Clone> Digraph<N, E> {
    /// A structurally independent snapshot; mutating it never affects `self`.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn abc() -> Digraph<&'static str, ()> {
        let mut g = Digraph::new();
        g.add_node("a", "A");
        g.add_node("b", "B");
        g.add_node("c", "C");
        g.add_edge(None, "a", "b", ()).unwrap();
        g.add_edge(None, "b", "c", ()).unwrap();
        g
    }

    #[test]
    fn add_node_is_upsert() {
        let mut g = abc();
        g.add_node("b", "B2");
        assert_eq!(g.node("b"), Some(&"B2"));
        assert_eq!(g.node_count(), 3);
        assert!(g.has_edge("a-b"), "replacing data keeps edges");
    }

    #[test]
    fn derived_edge_keys_are_idempotent() {
        let mut g = abc();
        assert_eq!(g.add_edge(None, "a", "b", ()).unwrap(), "a-b");
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.successors("a"), vec!["b"]);
    }

    #[test]
    fn explicit_keys_and_conflicts() {
        let mut g = abc();
        assert_eq!(g.add_edge(Some("shortcut"), "a", "c", ()).unwrap(), "shortcut");
        let edge = g.edge("shortcut").unwrap();
        assert_eq!((edge.source, edge.target), ("a", "c"));

        let err = g.add_edge(Some("shortcut"), "c", "a", ()).unwrap_err();
        assert!(matches!(err, KnowledgeMapError::EdgeConflict { .. }));
    }

    #[test]
    fn edges_require_both_endpoints() {
        let mut g = abc();
        let err = g.add_edge(None, "a", "zzz", ()).unwrap_err();
        assert!(matches!(err, KnowledgeMapError::NotFound(_)));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn del_node_is_strict() {
        let mut g = abc();
        let err = g.del_node("b").unwrap_err();
        assert_eq!(
            err,
            KnowledgeMapError::HasIncidentEdges {
                id: "b".to_string(),
                edges: vec!["a-b".to_string(), "b-c".to_string()],
            }
        );

        for key in g.incident_edges("b") {
            g.del_edge(&key);
        }
        assert_eq!(g.del_node("b").unwrap(), "B");
        assert!(!g.has_node("b"));
        assert!(matches!(g.del_node("b"), Err(KnowledgeMapError::NotFound(_))));
    }

    #[test]
    fn del_edge_ignores_missing_keys() {
        let mut g = abc();
        assert!(g.del_edge("c-a").is_none());
        assert!(g.del_edge("a-b").is_some());
        assert!(!g.has_edge("a-b"));
        assert!(g.predecessors("b").is_empty());
    }

    #[test]
    fn queries_are_ordered() {
        let mut g = abc();
        g.add_node("0", "zero");
        g.add_edge(None, "0", "b", ()).unwrap();
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec!["0", "a", "b", "c"]);
        assert_eq!(g.edges().collect::<Vec<_>>(), vec!["0-b", "a-b", "b-c"]);
        assert_eq!(g.predecessors("b"), vec!["0", "a"]);
        assert_eq!(g.incident_edges("b"), vec!["0-b", "a-b", "b-c"]);
        assert!(g.successors("missing").is_empty());
    }

    #[test]
    fn copy_is_independent() {
        let original = abc();
        let mut copy = original.copy();
        copy.add_node("d", "D");
        copy.add_edge(None, "c", "d", ()).unwrap();
        copy.del_edge("a-b");

        assert!(!original.has_node("d"));
        assert!(original.has_edge("a-b"));
        assert_eq!(copy.edge_count(), 2);
    }
}
