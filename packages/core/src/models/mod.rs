//! Data Models
//!
//! This module contains the data structures used throughout NodeStage:
//!
//! - `Schema` / `Property` - declarative entity type descriptions
//! - `ResolvedField` - flattened edit-form fields
//! - `Node` / `Snapshot` - diagram nodes and their versioned entity values
//! - `Edge` - connections between nodes
//!
//! Entity bodies stay as JSON; schemas give them shape when a form is rendered
//! or two snapshots are compared.

pub mod core_schemas;
mod edge;
mod node;
pub mod path;
pub mod schema;

pub use core_schemas::{builtin_schema, get_core_schemas, BuiltinType};
pub use edge::{Edge, EdgeKind, Vertex};
pub use node::{Node, NodeKind, Position, Snapshot, Storable};
pub use path::PathError;
pub use schema::{
    FieldKind, FieldPath, LinkTarget, NumberKind, PathSegment, Property, PropertyKind,
    ResolvedField, Schema,
};
