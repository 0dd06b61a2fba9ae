//! Graph Model - grid nodes, edges and validated snapshots.
//!
//! A [`GridSnapshot`] is an immutable, fully-formed view of the grid at one
//! lifecycle point. The only ways to obtain one are the validated factory
//! [`GridSnapshot::from_topology`] and the inference adapter, which derives a
//! new snapshot from an existing one. Node structure and edges never change
//! within a run, so derived snapshots share the edge list and id index.

use gridlab_env::NodeLayer;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::StatusThresholds;
use crate::error::LabError;

/// Clamps an anomaly score or confidence into [0, 1]. NaN maps to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

// =============================================================================
// ENUMS
// =============================================================================

/// Health status of a node, derived from its anomaly score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Normal,
    Warning,
    Critical,
}

impl NodeStatus {
    /// True for `warning` and `critical`.
    pub fn is_flagged(&self) -> bool {
        !matches!(self, NodeStatus::Normal)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeStatus::Normal => "normal",
            NodeStatus::Warning => "warning",
            NodeStatus::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Equipment class of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Generator,
    Bus,
    Load,
    Transformer,
    Pmu,
    Plc,
    Router,
    Hmi,
}

/// Relation carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Intra-domain link in the physical layer
    Physical,
    /// Intra-domain link in the cyber layer
    Cyber,
    /// Cross-domain cyber-physical link
    Coupling,
}

// =============================================================================
// TOPOLOGY DESCRIPTOR (loader input)
// =============================================================================

fn default_weight() -> f64 {
    1.0
}

/// A node as supplied by a topology loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub layer: NodeLayer,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub anomaly_score: f64,
}

impl NodeSpec {
    /// Creates a node at the origin with a zero score.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind, layer: NodeLayer) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            layer,
            x: 0.0,
            y: 0.0,
            anomaly_score: 0.0,
        }
    }

    /// Sets the normalized render position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Sets the initial anomaly score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.anomaly_score = score;
        self
    }
}

/// An edge as supplied by a topology loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl EdgeSpec {
    /// Creates an edge with unit weight.
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            weight: default_weight(),
        }
    }

    /// Sets the edge weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Ordered node and edge lists describing a grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl TopologyDescriptor {
    /// Creates a descriptor from node and edge lists.
    pub fn new(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Self {
        Self {
            name: String::new(),
            nodes,
            edges,
        }
    }

    /// Sets the topology name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// =============================================================================
// SNAPSHOT TYPES
// =============================================================================

/// One grid entity inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridNode {
    id: String,
    label: String,
    #[serde(rename = "type")]
    kind: NodeKind,
    layer: NodeLayer,
    x: f64,
    y: f64,
    status: NodeStatus,
    anomaly_score: f64,
}

impl GridNode {
    fn from_spec(spec: &NodeSpec, thresholds: &StatusThresholds) -> Self {
        let anomaly_score = clamp_score(spec.anomaly_score);
        Self {
            id: spec.id.clone(),
            label: spec.label.clone(),
            kind: spec.kind,
            layer: spec.layer,
            x: spec.x,
            y: spec.y,
            status: thresholds.classify(anomaly_score),
            anomaly_score,
        }
    }

    /// Copy of this node with a new score and its derived status.
    pub(crate) fn rescored(&self, score: f64, thresholds: &StatusThresholds) -> Self {
        let anomaly_score = clamp_score(score);
        Self {
            anomaly_score,
            status: thresholds.classify(anomaly_score),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn layer(&self) -> NodeLayer {
        self.layer
    }

    /// Normalized render position.
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn anomaly_score(&self) -> f64 {
        self.anomaly_score
    }
}

/// A validated edge between two nodes of the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridEdge {
    source: String,
    target: String,
    #[serde(rename = "type")]
    kind: EdgeKind,
    weight: f64,
}

impl GridEdge {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_coupling(&self) -> bool {
        self.kind == EdgeKind::Coupling
    }

    /// Returns the opposite endpoint if this edge touches `node_id`.
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.source == node_id {
            Some(&self.target)
        } else if self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Immutable grid state captured at one lifecycle point.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    nodes: Vec<GridNode>,
    edges: Arc<Vec<GridEdge>>,
    index: Arc<HashMap<String, usize>>,
}

impl GridSnapshot {
    /// Validates a topology and builds the snapshot.
    ///
    /// # Errors
    /// * `DuplicateNodeId` - two nodes share an id
    /// * `DanglingEdgeReference` - an edge endpoint is not in the node list
    pub fn from_topology(
        topology: &TopologyDescriptor,
        thresholds: &StatusThresholds,
    ) -> Result<Self, LabError> {
        let mut index = HashMap::with_capacity(topology.nodes.len());
        for (i, spec) in topology.nodes.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(LabError::DuplicateNodeId { id: spec.id.clone() });
            }
        }

        let mut edges = Vec::with_capacity(topology.edges.len());
        for (edge_index, spec) in topology.edges.iter().enumerate() {
            for endpoint in [&spec.source, &spec.target] {
                if !index.contains_key(endpoint.as_str()) {
                    return Err(LabError::DanglingEdgeReference {
                        edge_index,
                        from_node: spec.source.clone(),
                        to_node: spec.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            edges.push(GridEdge {
                source: spec.source.clone(),
                target: spec.target.clone(),
                kind: spec.kind,
                weight: spec.weight.max(0.0),
            });
        }

        let nodes = topology
            .nodes
            .iter()
            .map(|spec| GridNode::from_spec(spec, thresholds))
            .collect();

        Ok(Self {
            nodes,
            edges: Arc::new(edges),
            index: Arc::new(index),
        })
    }

    /// Derives a snapshot with replaced nodes and the same structure.
    ///
    /// Callers must keep node ids and order unchanged.
    pub(crate) fn with_nodes(&self, nodes: Vec<GridNode>) -> Self {
        debug_assert_eq!(nodes.len(), self.nodes.len());
        Self {
            nodes,
            edges: Arc::clone(&self.edges),
            index: Arc::clone(&self.index),
        }
    }

    /// Nodes in topology order.
    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    /// Edges in topology order.
    pub fn edges(&self) -> &[GridEdge] {
        &self.edges
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&GridNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Neighbours of `id`, in edge order, either direction.
    pub fn neighbors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges.iter().filter_map(move |e| e.other_end(id))
    }

    /// True if any coupling edge touches the node.
    pub fn is_coupled(&self, id: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.is_coupling() && e.other_end(id).is_some())
    }
}

impl Serialize for GridSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            nodes: &'a [GridNode],
            edges: &'a [GridEdge],
        }

        Wire {
            nodes: &self.nodes,
            edges: &self.edges,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(id: &str) -> NodeSpec {
        NodeSpec::new(id, id.to_uppercase(), NodeKind::Bus, NodeLayer::Physical)
    }

    fn three_bus() -> TopologyDescriptor {
        TopologyDescriptor::new(
            vec![bus("b1"), bus("b2"), bus("b3").with_score(0.75)],
            vec![
                EdgeSpec::new("b1", "b2", EdgeKind::Physical),
                EdgeSpec::new("b2", "b3", EdgeKind::Physical),
                EdgeSpec::new("b3", "b1", EdgeKind::Coupling).with_weight(0.5),
            ],
        )
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let topo = three_bus();
        let snap = GridSnapshot::from_topology(&topo, &StatusThresholds::default()).unwrap();

        let ids: Vec<&str> = snap.nodes().iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);

        assert_eq!(snap.edges().len(), 3);
        for (edge, spec) in snap.edges().iter().zip(&topo.edges) {
            assert_eq!(edge.source(), spec.source);
            assert_eq!(edge.target(), spec.target);
            assert_eq!(edge.kind(), spec.kind);
            assert_eq!(edge.weight(), spec.weight);
        }
    }

    #[test]
    fn test_snapshot_derives_status_from_score() {
        let snap = GridSnapshot::from_topology(&three_bus(), &StatusThresholds::default()).unwrap();
        assert_eq!(snap.node("b1").map(|n| n.status()), Some(NodeStatus::Normal));
        assert_eq!(snap.node("b3").map(|n| n.status()), Some(NodeStatus::Critical));
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut topo = three_bus();
        topo.edges.push(EdgeSpec::new("b2", "ghost", EdgeKind::Physical));

        let err = GridSnapshot::from_topology(&topo, &StatusThresholds::default()).unwrap_err();
        match err {
            LabError::DanglingEdgeReference { edge_index, missing, .. } => {
                assert_eq!(edge_index, 3);
                assert_eq!(missing, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dangling_source_rejected() {
        let topo = TopologyDescriptor::new(
            vec![bus("b1")],
            vec![EdgeSpec::new("nope", "b1", EdgeKind::Physical)],
        );
        let err = GridSnapshot::from_topology(&topo, &StatusThresholds::default()).unwrap_err();
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let topo = TopologyDescriptor::new(vec![bus("b1"), bus("b1")], vec![]);
        assert!(matches!(
            GridSnapshot::from_topology(&topo, &StatusThresholds::default()),
            Err(LabError::DuplicateNodeId { .. })
        ));
    }

    #[test]
    fn test_scores_are_clamped() {
        let topo = TopologyDescriptor::new(
            vec![bus("hi").with_score(4.0), bus("lo").with_score(-1.0), bus("nan").with_score(f64::NAN)],
            vec![],
        );
        let snap = GridSnapshot::from_topology(&topo, &StatusThresholds::default()).unwrap();
        assert_eq!(snap.node("hi").map(|n| n.anomaly_score()), Some(1.0));
        assert_eq!(snap.node("lo").map(|n| n.anomaly_score()), Some(0.0));
        assert_eq!(snap.node("nan").map(|n| n.anomaly_score()), Some(0.0));
    }

    #[test]
    fn test_neighbors_in_edge_order() {
        let snap = GridSnapshot::from_topology(&three_bus(), &StatusThresholds::default()).unwrap();
        let n: Vec<&str> = snap.neighbors("b1").collect();
        assert_eq!(n, vec!["b2", "b3"]);
        assert!(snap.is_coupled("b3"));
        assert!(!snap.is_coupled("b2"));
    }

    #[test]
    fn test_descriptor_json_shape() {
        let json = r#"{
            "name": "tiny",
            "nodes": [
                { "id": "g1", "label": "Gen 1", "type": "generator", "layer": "physical", "x": 0.1, "y": 0.2 },
                { "id": "p1", "label": "PLC 1", "type": "plc", "layer": "cyber" }
            ],
            "edges": [ { "source": "g1", "target": "p1", "type": "coupling", "weight": 0.5 } ]
        }"#;
        let topo: TopologyDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(topo.name, "tiny");
        assert_eq!(topo.nodes[1].kind, NodeKind::Plc);
        assert_eq!(topo.nodes[1].anomaly_score, 0.0);
        assert_eq!(topo.edges[0].kind, EdgeKind::Coupling);

        let snap = GridSnapshot::from_topology(&topo, &StatusThresholds::default()).unwrap();
        let out = serde_json::to_value(&snap).unwrap();
        assert_eq!(out["nodes"][0]["anomalyScore"], 0.0);
        assert_eq!(out["nodes"][0]["status"], "normal");
        assert_eq!(out["edges"][0]["type"], "coupling");
    }
}
