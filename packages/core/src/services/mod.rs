//! Business Services
//!
//! This module contains the core services:
//!
//! - `SchemaRegistry` - frozen type name -> schema table
//! - `PropertyResolver` - flattens schemas into edit-form fields
//! - `NodeStore` - in-memory nodes, focus, selection and edges
//! - `NodeService` - async actions against the backend transport
//!
//! Services are plain values passed by reference; there is no global state.

pub mod error;
pub mod node_service;
pub mod node_store;
pub mod property_resolver;
pub mod schema_registry;

pub use error::{NodeServiceError, RegistryError, StoreError};
pub use node_service::{ChangeSet, Item, NodeService, SessionContext};
pub use node_store::{field_path, NodeStore};
pub use property_resolver::{code_field, PropertyResolver};
pub use schema_registry::{SchemaRegistry, SchemaRegistryBuilder};
