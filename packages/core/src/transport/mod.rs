//! Transport Abstraction Layer
//!
//! The node service never talks to the backend API directly. It issues
//! method requests through the [`Transport`] trait, which keeps the service
//! independent of the wire protocol and lets tests run against
//! [`MemoryTransport`].
//!
//! Responses are opaque JSON. Mutation results carry the created or changed
//! record under `item`.

mod error;
mod memory;

pub use error::TransportError;
pub use memory::MemoryTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named method call on a backend type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRequest {
    pub type_name: String,
    pub method_name: String,
    #[serde(default)]
    pub variables: Value,
}

impl MethodRequest {
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>, variables: Value) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
            variables,
        }
    }

    /// Read a string variable
    pub fn variable_str(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(Value::as_str)
    }
}

/// Backend API seam
///
/// Implementations must be `Send + Sync` so the service can be shared across
/// tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a state-changing request
    async fn mutation(&self, request: MethodRequest) -> Result<Value, TransportError>;

    /// Issue a read-only request
    async fn query(&self, request: MethodRequest) -> Result<Value, TransportError>;

    /// Fetch every record of a type
    async fn list_all(&self, type_name: &str) -> Result<Vec<Value>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_request_wire_format() {
        let request = MethodRequest::new("node", "create", json!({"name": "web"}));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["typeName"], "node");
        assert_eq!(json["methodName"], "create");
        assert_eq!(request.variable_str("name"), Some("web"));
        assert_eq!(request.variable_str("missing"), None);
    }
}
