//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed acyclic graphs where:
//! - Nodes are typed marketing steps (trigger, email, delay, condition, action)
//! - Edges point to the next step, labeled `yes`/`no` out of Condition nodes
//!
//! Graphs serialize as a flat `{ nodes, edges }` document; the petgraph index
//! is rebuilt on load.

use crate::edge::{Edge, EdgeRef, NO, YES};
use crate::error::GraphError;
use crate::node::{EnrollmentTrigger, MAX_DELAY_DAYS, Node, NodeId, NodeKind, NodeType};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct WorkflowGraph {
    graph: DiGraph<Node, Edge>,
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Adds a node to the graph.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateNode` if a node with the same ID exists.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.node_index_map.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode { node_id: node.id });
        }
        let node_id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id.clone(), index);
        Ok(node_id)
    }

    /// Adds an edge between two nodes.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if either endpoint doesn't exist.
    pub fn add_edge(
        &mut self,
        source_id: &NodeId,
        target_id: &NodeId,
        edge: Edge,
    ) -> Result<(), GraphError> {
        let source = self.index_of(source_id)?;
        let target = self.index_of(target_id)?;
        self.graph.add_edge(source, target, edge);
        Ok(())
    }

    fn index_of(&self, node_id: &NodeId) -> Result<NodeIndex, GraphError> {
        self.node_index_map
            .get(node_id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: node_id.clone(),
            })
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: &NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns all edges as references, in insertion order.
    #[must_use]
    pub fn edges(&self) -> Vec<EdgeRef> {
        self.graph
            .edge_references()
            .filter_map(|e| {
                let source = self.graph.node_weight(e.source())?;
                let target = self.graph.node_weight(e.target())?;
                Some(EdgeRef::new(
                    source.id.clone(),
                    target.id.clone(),
                    e.weight().clone(),
                ))
            })
            .collect()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the Trigger node, if the graph has one.
    ///
    /// On a validated graph this is the unique entry point.
    #[must_use]
    pub fn trigger_node(&self) -> Option<&Node> {
        self.nodes().find(|n| n.node_type() == NodeType::Trigger)
    }

    /// Returns the enrollment trigger carried by the Trigger node.
    #[must_use]
    pub fn enrollment_trigger(&self) -> Option<&EnrollmentTrigger> {
        self.trigger_node().and_then(|node| match &node.kind {
            NodeKind::Trigger(trigger) => Some(trigger),
            _ => None,
        })
    }

    /// Returns the successors (downstream nodes) of a given node.
    #[must_use]
    pub fn successors(&self, node_id: &NodeId) -> Vec<(&Node, &Edge)> {
        let Some(&index) = self.node_index_map.get(node_id) else {
            return Vec::new();
        };

        let mut found: Vec<(&Node, &Edge)> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .filter_map(|edge| {
                let target = self.graph.node_weight(edge.target())?;
                Some((target, edge.weight()))
            })
            .collect();
        // petgraph yields outgoing edges newest first
        found.reverse();
        found
    }

    /// Returns the node reached by following the unlabeled outbound edge.
    ///
    /// `None` means the node is terminal.
    #[must_use]
    pub fn next(&self, node_id: &NodeId) -> Option<&Node> {
        self.successors(node_id).into_iter().next().map(|(n, _)| n)
    }

    /// Returns the node reached by following the branch labeled `handle`.
    #[must_use]
    pub fn branch(&self, node_id: &NodeId, handle: &str) -> Option<&Node> {
        self.successors(node_id)
            .into_iter()
            .find(|(_, edge)| edge.handle() == Some(handle))
            .map(|(n, _)| n)
    }

    fn inbound_count(&self, index: NodeIndex) -> usize {
        self.graph.edges_directed(index, Direction::Incoming).count()
    }

    /// Validates the workflow graph.
    ///
    /// Checks:
    /// - Exactly one Trigger node, with no inbound edges
    /// - No cycles (DAG validation)
    /// - Every non-Trigger node has at least one inbound edge
    /// - Every Condition node has exactly two outbound edges, `yes` and `no`
    /// - Every other node has at most one outbound edge
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<(), GraphError> {
        let triggers: Vec<&Node> = self
            .nodes()
            .filter(|n| n.node_type() == NodeType::Trigger)
            .collect();
        match triggers.len() {
            0 => return Err(GraphError::MissingTrigger),
            1 => {}
            count => return Err(GraphError::MultipleTriggers { count }),
        }

        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(GraphError::CycleDetected);
        }

        for index in self.graph.node_indices() {
            let Some(node) = self.graph.node_weight(index) else {
                continue;
            };
            let inbound = self.inbound_count(index);
            match node.node_type() {
                NodeType::Trigger if inbound > 0 => {
                    return Err(GraphError::TriggerHasInbound {
                        node_id: node.id.clone(),
                    });
                }
                NodeType::Trigger => {}
                _ if inbound == 0 => {
                    return Err(GraphError::Unreachable {
                        node_id: node.id.clone(),
                    });
                }
                _ => {}
            }

            if let NodeKind::Delay(delay) = &node.kind
                && !delay.is_within_limit()
            {
                return Err(GraphError::DelayOutOfRange {
                    node_id: node.id.clone(),
                    max_days: MAX_DELAY_DAYS,
                });
            }

            let outbound = self.successors(&node.id);
            if node.node_type() == NodeType::Condition {
                let has_yes = outbound.iter().any(|(_, e)| e.handle() == Some(YES));
                let has_no = outbound.iter().any(|(_, e)| e.handle() == Some(NO));
                if outbound.len() != 2 || !has_yes || !has_no {
                    return Err(GraphError::InvalidBranchArity {
                        node_id: node.id.clone(),
                        outbound: outbound.len(),
                    });
                }
            } else if outbound.len() > 1 {
                return Err(GraphError::AmbiguousSuccessor {
                    node_id: node.id.clone(),
                    outbound: outbound.len(),
                });
            }
        }

        Ok(())
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized form of a workflow graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Nodes in insertion order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges in insertion order.
    #[serde(default)]
    pub edges: Vec<EdgeRef>,
}

impl TryFrom<GraphDocument> for WorkflowGraph {
    type Error = GraphError;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = Self::new();
        for node in document.nodes {
            graph.add_node(node)?;
        }
        for edge in document.edges {
            let weight = edge.edge();
            graph.add_edge(&edge.source, &edge.target, weight)?;
        }
        Ok(graph)
    }
}

impl From<WorkflowGraph> for GraphDocument {
    fn from(graph: WorkflowGraph) -> Self {
        Self {
            edges: graph.edges(),
            nodes: graph.nodes().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DelayNode, Predicate, TagOperation};

    fn trigger(id: &str) -> Node {
        Node::trigger(id, EnrollmentTrigger::LeadSignup)
    }

    fn email(id: &str) -> Node {
        Node::email(id, "Email", "Hi {{firstName}}", "<p>Hello</p>")
    }

    fn linear() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger("t")).unwrap();
        graph.add_node(email("e")).unwrap();
        graph.add_node(Node::delay("d", DelayNode::days(2))).unwrap();
        graph
            .add_node(Node::action("a", TagOperation::AddTag, "done"))
            .unwrap();
        graph.add_edge(&"t".into(), &"e".into(), Edge::plain()).unwrap();
        graph.add_edge(&"e".into(), &"d".into(), Edge::plain()).unwrap();
        graph.add_edge(&"d".into(), &"a".into(), Edge::plain()).unwrap();
        graph
    }

    fn branching() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger("t")).unwrap();
        graph
            .add_node(Node::condition(
                "c",
                Predicate::HasTag {
                    tag: "vip".to_string(),
                },
            ))
            .unwrap();
        graph
            .add_node(Node::action("y", TagOperation::RemoveTag, "inactive"))
            .unwrap();
        graph.add_node(email("n")).unwrap();
        graph.add_edge(&"t".into(), &"c".into(), Edge::plain()).unwrap();
        graph.add_edge(&"c".into(), &"y".into(), Edge::yes()).unwrap();
        graph.add_edge(&"c".into(), &"n".into(), Edge::no()).unwrap();
        graph
    }

    #[test]
    fn valid_linear_graph_passes() {
        let graph = linear();
        assert!(graph.validate().is_ok());
        assert_eq!(graph.next(&"e".into()).map(|n| n.id.as_str()), Some("d"));
        assert!(graph.next(&"a".into()).is_none());
    }

    #[test]
    fn valid_branching_graph_passes() {
        let graph = branching();
        assert!(graph.validate().is_ok());
        assert_eq!(
            graph.branch(&"c".into(), YES).map(|n| n.id.as_str()),
            Some("y")
        );
        assert_eq!(
            graph.branch(&"c".into(), NO).map(|n| n.id.as_str()),
            Some("n")
        );
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger("t")).unwrap();
        let result = graph.add_node(email("t"));
        assert!(matches!(result, Err(GraphError::DuplicateNode { .. })));
    }

    #[test]
    fn edge_to_missing_node_is_rejected() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger("t")).unwrap();
        let result = graph.add_edge(&"t".into(), &"missing".into(), Edge::plain());
        assert!(matches!(result, Err(GraphError::NodeNotFound { .. })));
    }

    #[test]
    fn validate_rejects_two_triggers() {
        let mut graph = linear();
        graph.add_node(trigger("t2")).unwrap();
        assert_eq!(
            graph.validate(),
            Err(GraphError::MultipleTriggers { count: 2 })
        );
    }

    #[test]
    fn validate_rejects_missing_trigger() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(email("e")).unwrap();
        assert_eq!(graph.validate(), Err(GraphError::MissingTrigger));
    }

    #[test]
    fn validate_rejects_cycle() {
        let mut graph = linear();
        graph.add_edge(&"a".into(), &"e".into(), Edge::plain()).unwrap();
        assert_eq!(graph.validate(), Err(GraphError::CycleDetected));
    }

    #[test]
    fn validate_rejects_single_branch_condition() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger("t")).unwrap();
        graph
            .add_node(Node::condition("c", Predicate::OpenedEmail { email: None }))
            .unwrap();
        graph.add_node(email("y")).unwrap();
        graph.add_edge(&"t".into(), &"c".into(), Edge::plain()).unwrap();
        graph.add_edge(&"c".into(), &"y".into(), Edge::yes()).unwrap();

        assert!(matches!(
            graph.validate(),
            Err(GraphError::InvalidBranchArity { outbound: 1, .. })
        ));
    }

    #[test]
    fn validate_rejects_condition_with_duplicate_labels() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger("t")).unwrap();
        graph
            .add_node(Node::condition("c", Predicate::OpenedEmail { email: None }))
            .unwrap();
        graph.add_node(email("a")).unwrap();
        graph.add_node(email("b")).unwrap();
        graph.add_edge(&"t".into(), &"c".into(), Edge::plain()).unwrap();
        graph.add_edge(&"c".into(), &"a".into(), Edge::yes()).unwrap();
        graph.add_edge(&"c".into(), &"b".into(), Edge::yes()).unwrap();

        assert!(matches!(
            graph.validate(),
            Err(GraphError::InvalidBranchArity { outbound: 2, .. })
        ));
    }

    #[test]
    fn validate_rejects_isolated_node() {
        let mut graph = linear();
        graph.add_node(email("orphan")).unwrap();
        assert_eq!(
            graph.validate(),
            Err(GraphError::Unreachable {
                node_id: "orphan".into()
            })
        );
    }

    #[test]
    fn validate_rejects_fan_out_from_plain_node() {
        let mut graph = linear();
        graph.add_node(email("other")).unwrap();
        graph.add_edge(&"e".into(), &"other".into(), Edge::plain()).unwrap();
        assert!(matches!(
            graph.validate(),
            Err(GraphError::AmbiguousSuccessor { outbound: 2, .. })
        ));
    }

    #[test]
    fn validate_rejects_overlong_delay() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger("t")).unwrap();
        graph
            .add_node(Node::delay("d", DelayNode::days(u32::MAX)))
            .unwrap();
        graph.add_edge(&"t".into(), &"d".into(), Edge::plain()).unwrap();
        assert_eq!(
            graph.validate(),
            Err(GraphError::DelayOutOfRange {
                node_id: "d".into(),
                max_days: MAX_DELAY_DAYS,
            })
        );
    }

    #[test]
    fn graph_serde_roundtrip_rebuilds_index() {
        let graph = branching();
        let json = serde_json::to_string(&graph).expect("serialize");
        let parsed: WorkflowGraph = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.node_count(), 4);
        assert_eq!(parsed.edge_count(), 3);
        assert!(parsed.validate().is_ok());
        assert_eq!(
            parsed.branch(&"c".into(), NO).map(|n| n.id.as_str()),
            Some("n")
        );
    }

    #[test]
    fn deserializing_dangling_edge_fails() {
        let json = r#"{"nodes": [], "edges": [{"source": "a", "target": "b"}]}"#;
        let result: Result<WorkflowGraph, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
