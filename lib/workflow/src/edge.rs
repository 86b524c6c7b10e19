//! Edge types for workflow graphs.
//!
//! An edge points from one node to the next. Condition nodes label their two
//! outbound edges with a handle (`"yes"` / `"no"`); every other edge is
//! unlabeled.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Handle for the branch taken when a condition holds.
pub const YES: &str = "yes";

/// Handle for the branch taken when a condition does not hold.
pub const NO: &str = "no";

/// The weight stored on a graph edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Named output handle, used by Condition nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl Edge {
    /// Creates an unlabeled edge.
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    /// Creates an edge with a named output handle.
    #[must_use]
    pub fn labeled(handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
        }
    }

    /// Creates the `"yes"` branch of a condition.
    #[must_use]
    pub fn yes() -> Self {
        Self::labeled(YES)
    }

    /// Creates the `"no"` branch of a condition.
    #[must_use]
    pub fn no() -> Self {
        Self::labeled(NO)
    }

    /// Returns the handle as a string slice, if any.
    #[must_use]
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }
}

/// A complete edge reference including source and target node IDs.
///
/// This is the serialized form of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    /// The source node ID.
    pub source: NodeId,
    /// The target node ID.
    pub target: NodeId,
    /// Named output handle on the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl EdgeRef {
    /// Creates a new edge reference.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId, edge: Edge) -> Self {
        Self {
            source,
            target,
            handle: edge.handle,
        }
    }

    /// Returns the edge weight.
    #[must_use]
    pub fn edge(&self) -> Edge {
        Edge {
            handle: self.handle.clone(),
        }
    }
}
