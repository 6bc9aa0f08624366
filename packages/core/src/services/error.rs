//! Service Layer Error Types
//!
//! This module defines the error types of the registry, the node store and the
//! node service. Every error is raised synchronously to the immediate caller;
//! nothing here is retried.

use crate::models::path::PathError;
use crate::projection::ProjectionError;
use crate::transport::TransportError;
use thiserror::Error;

/// Schema registry and property resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No schema registered under the type name
    #[error("Schema not found: {type_name}")]
    NotFound { type_name: String },

    /// A type name was registered twice
    #[error("Schema already registered: {type_name}")]
    DuplicateType { type_name: String },

    /// A property cannot be resolved to a concrete kind
    #[error("Malformed schema {type_name}: {reason}")]
    MalformedSchema { type_name: String, reason: String },

    /// A schema document could not be parsed
    #[error("Invalid schema document: {0}")]
    InvalidJson(String),
}

impl RegistryError {
    pub fn not_found(type_name: impl Into<String>) -> Self {
        Self::NotFound {
            type_name: type_name.into(),
        }
    }

    pub fn malformed(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSchema {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Node store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The operation needs a focused node
    #[error("Cannot get current node; it is not set")]
    NoCurrentNode,

    /// A node that cannot be focused or projected
    #[error("Invalid node {id}: {reason}")]
    InvalidNode { id: String, reason: String },

    /// Node not found by id
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// No node carries the entity id
    #[error("No node found for entity: {entity_id}")]
    EntityNodeNotFound { entity_id: String },

    /// An edge points at a node the store does not hold
    #[error("Broken edge {edge_id}: node {node_id} is not in the node list")]
    BrokenEdge { edge_id: String, node_id: String },

    /// A field write that does not fit the entry's current shape
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl StoreError {
    pub fn invalid_node(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn entity_node_not_found(entity_id: impl Into<String>) -> Self {
        Self::EntityNodeNotFound {
            entity_id: entity_id.into(),
        }
    }

    pub fn broken_edge(edge_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self::BrokenEdge {
            edge_id: edge_id.into(),
            node_id: node_id.into(),
        }
    }
}

/// Node service errors
///
/// Wraps the lower layers with `#[from]` so service code can use `?`
/// throughout. Transport failures are passed through unchanged.
#[derive(Error, Debug)]
pub enum NodeServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A transport response did not have the expected shape
    #[error("Unexpected response from {context}: {reason}")]
    UnexpectedResponse { context: String, reason: String },
}

impl NodeServiceError {
    pub fn unexpected_response(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
