//! Edges between diagram nodes
//!
//! Edges are used for two things in the store: scoping the node list to the
//! nodes attached to the current application, and finding the nodes that must
//! be deleted together with the focused one.

use serde::{Deserialize, Serialize};

/// What an edge means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    Configures,
    Includes,
    PartOf,
    Deployment,
}

/// One end of an edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vertex {
    /// Node id
    pub id: String,
    pub socket: String,
    pub type_name: String,
}

impl Vertex {
    pub fn new(
        id: impl Into<String>,
        socket: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            socket: socket.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub tail_vertex: Vertex,
    pub head_vertex: Vertex,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_kind: Option<EdgeKind>,
}

impl Edge {
    /// Whether either end is the given node
    pub fn touches(&self, node_id: &str) -> bool {
        self.tail_vertex.id == node_id || self.head_vertex.id == node_id
    }

    /// The end opposite to `node_id`, if the edge touches it
    pub fn other_end(&self, node_id: &str) -> Option<&Vertex> {
        if self.tail_vertex.id == node_id {
            Some(&self.head_vertex)
        } else if self.head_vertex.id == node_id {
            Some(&self.tail_vertex)
        } else {
            None
        }
    }
}
