//! Story Graph - the store that owns every node and edge.

use std::collections::{HashMap, HashSet};

use crate::edge::{Edge, EdgeKey, EdgeKind};
use crate::error::{GraphError, GraphResult};
use crate::node::{keys, ActorId, Attributes, Node, NodeId, NodeKind};

/// The main story graph structure.
///
/// Nodes and edges are kept in insertion order alongside hash indexes so that
/// every query that walks the graph is deterministic.
#[derive(Debug, Clone, Default)]
pub struct StoryGraph {
    /// All nodes stored by ID.
    nodes: HashMap<NodeId, Node>,

    /// Node IDs in insertion order.
    order: Vec<NodeId>,

    /// All edges by identity.
    edges: HashMap<EdgeKey, Edge>,

    /// Adjacency: source -> outgoing edge keys, in insertion order.
    outgoing: HashMap<NodeId, Vec<EdgeKey>>,

    /// Reverse adjacency: target -> incoming edge keys, in insertion order.
    incoming: HashMap<NodeId, Vec<EdgeKey>>,

    next_sequence: u64,
}

impl StoryGraph {
    /// Create a new empty story graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph and return its ID.
    ///
    /// The store stamps the node with its insertion sequence. Re-adding an
    /// existing ID replaces the node but keeps its original position.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = node.id;
        node.sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.nodes.insert(id, node).is_none() {
            self.order.push(id);
        }
        tracing::trace!(node = %id, "node added");
        id
    }

    /// Add or overwrite an edge.
    ///
    /// Fails with [`GraphError::MissingEndpoint`] when either endpoint is absent.
    pub fn add_edge(&mut self, edge: Edge) -> GraphResult<()> {
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            return Err(GraphError::MissingEndpoint {
                from: edge.source,
                to: edge.target,
            });
        }

        let key = edge.key();
        if self.edges.insert(key, edge).is_none() {
            self.outgoing.entry(key.source).or_default().push(key);
            self.incoming.entry(key.target).or_default().push(key);
        }
        Ok(())
    }

    /// Get node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Merge attributes into an existing node. The rest of the node is immutable.
    pub fn merge_node_attributes(&mut self, id: NodeId, attributes: Attributes) -> GraphResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.attributes.merge(attributes);
        Ok(())
    }

    /// Merge attributes into an existing edge. Returns false if no such edge.
    pub fn merge_edge_attributes(
        &mut self,
        source: NodeId,
        target: NodeId,
        kind: EdgeKind,
        attributes: Attributes,
    ) -> bool {
        let key = EdgeKey {
            source,
            target,
            kind,
        };
        match self.edges.get_mut(&key) {
            Some(edge) => {
                edge.attributes.merge(attributes);
                true
            }
            None => false,
        }
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// All nodes of a kind, in insertion order.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.nodes().filter(|n| n.kind == kind).collect()
    }

    /// All nodes attributed to an actor, in insertion order.
    pub fn nodes_by_actor(&self, actor_id: ActorId) -> Vec<&Node> {
        self.nodes()
            .filter(|n| n.actor_id == Some(actor_id))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up one edge by its full identity.
    pub fn edge(&self, source: NodeId, target: NodeId, kind: EdgeKind) -> Option<&Edge> {
        self.edges.get(&EdgeKey {
            source,
            target,
            kind,
        })
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn outgoing_edges(&self, id: NodeId) -> Vec<&Edge> {
        self.collect_edges(self.outgoing.get(&id))
    }

    /// Incoming edges of a node, in insertion order.
    pub fn incoming_edges(&self, id: NodeId) -> Vec<&Edge> {
        self.collect_edges(self.incoming.get(&id))
    }

    fn collect_edges(&self, keys: Option<&Vec<EdgeKey>>) -> Vec<&Edge> {
        keys.map(|keys| keys.iter().filter_map(|k| self.edges.get(k)).collect())
            .unwrap_or_default()
    }

    /// Distinct targets of a node's outgoing edges.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.outgoing_edges(id)
            .into_iter()
            .map(|e| e.target)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Distinct sources of a node's incoming edges.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.incoming_edges(id)
            .into_iter()
            .map(|e| e.source)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// The first edge from `source` to `target`, whatever its kind.
    ///
    /// Callers that care about a specific kind should use [`StoryGraph::edge`].
    pub fn edges_between(&self, source: NodeId, target: NodeId) -> Option<&Edge> {
        self.outgoing_edges(source)
            .into_iter()
            .find(|e| e.target == target)
    }

    /// Every simple path from `source` to `target` with at most `max_depth` hops.
    ///
    /// Exhaustive depth-bounded DFS; paths include both endpoints and follow
    /// adjacency insertion order.
    pub fn find_paths(&self, source: NodeId, target: NodeId, max_depth: usize) -> Vec<Vec<NodeId>> {
        let mut paths = Vec::new();
        if !self.contains(source) || !self.contains(target) {
            return paths;
        }

        let mut path = vec![source];
        let mut on_path: HashSet<NodeId> = HashSet::from([source]);
        self.collect_paths(target, max_depth, &mut path, &mut on_path, &mut paths);
        paths
    }

    fn collect_paths(
        &self,
        target: NodeId,
        max_depth: usize,
        path: &mut Vec<NodeId>,
        on_path: &mut HashSet<NodeId>,
        paths: &mut Vec<Vec<NodeId>>,
    ) {
        let Some(&current) = path.last() else {
            return;
        };
        if current == target {
            paths.push(path.clone());
            return;
        }
        if path.len() > max_depth {
            return;
        }

        for next in self.successors(current) {
            if on_path.insert(next) {
                path.push(next);
                self.collect_paths(target, max_depth, path, on_path, paths);
                path.pop();
                on_path.remove(&next);
            }
        }
    }

    /// Clone a node under a new ID and link original -> clone with a divergence edge.
    ///
    /// The clone records its origin in the `forkedFrom` attribute.
    pub fn fork(&mut self, id: NodeId) -> GraphResult<NodeId> {
        let original = self.nodes.get(&id).ok_or(GraphError::UnknownNode(id))?;

        let mut clone = original.clone();
        clone.id = NodeId::new();
        clone.created_at = chrono::Utc::now();
        clone.attributes.insert(keys::FORKED_FROM, id.to_string());

        let clone_id = self.add_node(clone);
        self.add_edge(Edge::new(id, clone_id, EdgeKind::Divergence, 1.0))?;
        tracing::debug!(original = %id, fork = %clone_id, "node forked");
        Ok(clone_id)
    }

    /// The dominant storyline.
    ///
    /// Starts at the earliest node (timestamp, then insertion order) and
    /// greedily follows the heaviest edge to an unvisited successor. Equal
    /// weights resolve to the edge inserted first.
    pub fn canonical_path(&self) -> Vec<NodeId> {
        let Some(start) = self
            .nodes
            .values()
            .min_by_key(|n| (n.created_at, n.sequence))
            .map(|n| n.id)
        else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut visited: HashSet<NodeId> = HashSet::from([start]);
        let mut current = start;

        loop {
            let mut best: Option<&Edge> = None;
            for edge in self.outgoing_edges(current) {
                if visited.contains(&edge.target) {
                    continue;
                }
                if best.map_or(true, |b| edge.weight > b.weight) {
                    best = Some(edge);
                }
            }

            match best {
                Some(edge) => {
                    current = edge.target;
                    visited.insert(current);
                    path.push(current);
                }
                None => break,
            }
        }

        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn chain(graph: &mut StoryGraph, n: usize) -> Vec<NodeId> {
        let base = Utc::now();
        (0..n)
            .map(|i| {
                graph.add_node(
                    Node::stimulus(format!("n{i}"))
                        .with_created_at(base + Duration::seconds(i as i64)),
                )
            })
            .collect()
    }

    #[test]
    fn test_add_and_get_node() {
        let mut graph = StoryGraph::new();
        let id = graph.add_node(Node::stimulus("What happened to Elena?"));

        let node = graph.node(id).unwrap();
        assert_eq!(node.content, "What happened to Elena?");
        assert_eq!(node.kind, NodeKind::Stimulus);
    }

    #[test]
    fn test_edge_requires_both_endpoints() {
        let mut graph = StoryGraph::new();
        let a = graph.add_node(Node::stimulus("a"));
        let ghost = NodeId::new();

        let err = graph.add_edge(Edge::causal(a, ghost, 0.5)).unwrap_err();
        assert_eq!(err, GraphError::MissingEndpoint { from: a, to: ghost });

        let err = graph.add_edge(Edge::causal(ghost, a, 0.5)).unwrap_err();
        assert!(matches!(err, GraphError::MissingEndpoint { .. }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_same_triple_overwrites() {
        let mut graph = StoryGraph::new();
        let ids = chain(&mut graph, 2);

        graph.add_edge(Edge::causal(ids[0], ids[1], 0.2)).unwrap();
        graph.add_edge(Edge::causal(ids[0], ids[1], 0.9)).unwrap();
        graph
            .add_edge(Edge::new(ids[0], ids[1], EdgeKind::Affective, 0.4))
            .unwrap();

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.outgoing_edges(ids[0]).len(), 2);
        let causal = graph.edge(ids[0], ids[1], EdgeKind::Causal).unwrap();
        assert!((causal.weight - 0.9).abs() < 1e-9);
        assert_eq!(graph.successors(ids[0]), vec![ids[1]]);
        assert_eq!(graph.predecessors(ids[1]), vec![ids[0]]);
    }

    #[test]
    fn test_edges_between_returns_first_inserted() {
        let mut graph = StoryGraph::new();
        let ids = chain(&mut graph, 2);

        graph
            .add_edge(Edge::new(ids[0], ids[1], EdgeKind::Affective, 0.3))
            .unwrap();
        graph.add_edge(Edge::causal(ids[0], ids[1], 0.8)).unwrap();

        let edge = graph.edges_between(ids[0], ids[1]).unwrap();
        assert_eq!(edge.kind, EdgeKind::Affective);
        assert!(graph.edges_between(ids[1], ids[0]).is_none());
    }

    #[test]
    fn test_nodes_by_kind_and_actor() {
        let mut graph = StoryGraph::new();
        let actor = ActorId::new();

        graph.add_node(Node::stimulus("hello"));
        graph.add_node(Node::reaction("hi").with_actor(actor));
        graph.add_node(Node::memory("anchor").with_actor(actor));

        assert_eq!(graph.nodes_by_kind(NodeKind::Stimulus).len(), 1);
        assert_eq!(graph.nodes_by_actor(actor).len(), 2);
        assert!(graph.nodes_by_actor(ActorId::new()).is_empty());
    }

    #[test]
    fn test_find_paths_is_exhaustive_and_bounded() {
        let mut graph = StoryGraph::new();
        let ids = chain(&mut graph, 4);
        // 0 -> 1 -> 3, 0 -> 2 -> 3, 0 -> 3, plus a back edge 3 -> 0
        graph.add_edge(Edge::causal(ids[0], ids[1], 0.5)).unwrap();
        graph.add_edge(Edge::causal(ids[1], ids[3], 0.5)).unwrap();
        graph.add_edge(Edge::causal(ids[0], ids[2], 0.5)).unwrap();
        graph.add_edge(Edge::causal(ids[2], ids[3], 0.5)).unwrap();
        graph.add_edge(Edge::causal(ids[0], ids[3], 0.5)).unwrap();
        graph.add_edge(Edge::causal(ids[3], ids[0], 0.5)).unwrap();

        let paths = graph.find_paths(ids[0], ids[3], 2);
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&vec![ids[0], ids[3]]));
        assert!(paths.contains(&vec![ids[0], ids[1], ids[3]]));

        let short = graph.find_paths(ids[0], ids[3], 1);
        assert_eq!(short, vec![vec![ids[0], ids[3]]]);

        assert!(graph.find_paths(ids[0], NodeId::new(), 5).is_empty());
    }

    #[test]
    fn test_fork_stamps_provenance_and_divergence() {
        let mut graph = StoryGraph::new();
        let original = graph.add_node(Node::stimulus("Where is the key?"));

        let fork = graph.fork(original).unwrap();
        let clone = graph.node(fork).unwrap();

        assert_ne!(fork, original);
        assert_eq!(clone.content, "Where is the key?");
        assert_eq!(
            clone.attributes.get_str(keys::FORKED_FROM),
            Some(original.to_string().as_str())
        );
        assert!(graph.edge(original, fork, EdgeKind::Divergence).is_some());

        let missing = NodeId::new();
        assert_eq!(graph.fork(missing), Err(GraphError::UnknownNode(missing)));
    }

    #[test]
    fn test_canonical_path_empty_and_single() {
        let mut graph = StoryGraph::new();
        assert!(graph.canonical_path().is_empty());

        let only = graph.add_node(Node::stimulus("alone"));
        assert_eq!(graph.canonical_path(), vec![only]);
    }

    #[test]
    fn test_canonical_path_follows_heaviest_edge() {
        let mut graph = StoryGraph::new();
        let ids = chain(&mut graph, 4);
        graph.add_edge(Edge::causal(ids[0], ids[1], 0.3)).unwrap();
        graph.add_edge(Edge::causal(ids[0], ids[2], 0.9)).unwrap();
        graph.add_edge(Edge::causal(ids[2], ids[0], 1.0)).unwrap();
        graph.add_edge(Edge::causal(ids[2], ids[3], 0.1)).unwrap();

        assert_eq!(graph.canonical_path(), vec![ids[0], ids[2], ids[3]]);
    }

    #[test]
    fn test_canonical_path_ties_prefer_first_inserted_edge() {
        let mut graph = StoryGraph::new();
        let ids = chain(&mut graph, 3);
        graph.add_edge(Edge::causal(ids[0], ids[2], 0.5)).unwrap();
        graph.add_edge(Edge::causal(ids[0], ids[1], 0.5)).unwrap();

        assert_eq!(graph.canonical_path(), vec![ids[0], ids[2]]);
    }

    #[test]
    fn test_merge_node_attributes() {
        let mut graph = StoryGraph::new();
        let id = graph.add_node(Node::reaction("r"));

        graph
            .merge_node_attributes(id, Attributes::new().with(keys::DEFERRED, true))
            .unwrap();
        assert_eq!(graph.node(id).unwrap().attributes.get_bool(keys::DEFERRED), Some(true));

        let missing = NodeId::new();
        assert_eq!(
            graph.merge_node_attributes(missing, Attributes::new()),
            Err(GraphError::UnknownNode(missing))
        );
    }
}
