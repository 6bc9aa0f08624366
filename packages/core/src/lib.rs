//! NodeStage Core
//!
//! View-model core of a diagram editor whose nodes carry versioned entity
//! snapshots grouped by change-set.
//!
//! # Architecture
//!
//! - **Schemas as data**: entity types are declarative property lists held in a
//!   frozen registry; forms and diffs are derived from them
//! - **Projection over history**: a node's stack is never edited, the display
//!   projection is recomputed from it on every change
//! - **Transport seam**: the backend is reached only through an async trait
//!
//! # Modules
//!
//! - [`models`] - Schemas, nodes, snapshots and edges
//! - [`projection`] - Change-set projection and diffs
//! - [`services`] - Registry, resolver, node store and node service
//! - [`transport`] - Backend request abstraction and in-memory implementation
//! - [`config`] - Service configuration
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod logging;
pub mod models;
pub mod projection;
pub mod services;
pub mod transport;

// Re-export commonly used types
pub use config::NodeStageConfig;
pub use models::*;
pub use projection::{DiffEntry, DiffResult, DisplayKey, DisplayProjection, ProjectionError};
pub use services::*;
pub use transport::{MemoryTransport, MethodRequest, Transport, TransportError};
