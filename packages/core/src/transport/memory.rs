//! In-memory Transport
//!
//! Answers requests the way the backend would for the handful of methods the
//! node service uses, records every request for assertions, and can be told to
//! fail specific methods.

use super::{MethodRequest, Transport, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

type MethodKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    requests: Vec<MethodRequest>,
    records: HashMap<String, Vec<Value>>,
    responses: HashMap<MethodKey, Value>,
    failures: HashMap<MethodKey, String>,
}

/// In-memory [`Transport`] for tests and offline use
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the records returned by `list_all(type_name)`
    pub fn with_records(mut self, type_name: impl Into<String>, records: Vec<Value>) -> Self {
        self.state
            .get_mut()
            .records
            .entry(type_name.into())
            .or_default()
            .extend(records);
        self
    }

    /// Answer a method with a fixed response instead of the default one
    pub fn with_response(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        response: Value,
    ) -> Self {
        self.state
            .get_mut()
            .responses
            .insert((type_name.into(), method_name.into()), response);
        self
    }

    /// Make a method fail with `RequestFailed`
    pub fn failing(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.state
            .get_mut()
            .failures
            .insert((type_name.into(), method_name.into()), message.into());
        self
    }

    /// Every request received so far, in order
    pub async fn requests(&self) -> Vec<MethodRequest> {
        self.state.lock().await.requests.clone()
    }

    /// Requests received for one method
    pub async fn requests_for(&self, type_name: &str, method_name: &str) -> Vec<MethodRequest> {
        self.state
            .lock()
            .await
            .requests
            .iter()
            .filter(|r| r.type_name == type_name && r.method_name == method_name)
            .cloned()
            .collect()
    }

    /// Record a request and return the canned answer for it, if any
    fn intercept(
        state: &mut MemoryState,
        request: &MethodRequest,
    ) -> Result<Option<Value>, TransportError> {
        state.requests.push(request.clone());

        let key = (request.type_name.clone(), request.method_name.clone());
        if let Some(message) = state.failures.get(&key) {
            tracing::debug!(
                "Memory transport failing {}.{}",
                request.type_name,
                request.method_name
            );
            return Err(TransportError::request_failed(
                &request.type_name,
                &request.method_name,
                message,
            ));
        }
        Ok(state.responses.get(&key).cloned())
    }
}

fn new_id(type_name: &str) -> String {
    format!("{}:{}", type_name, Uuid::new_v4())
}

fn with_id(variables: &Value, id: &str) -> Value {
    let mut record = match variables {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    record.insert("id".to_string(), json!(id));
    Value::Object(record)
}

fn create_node(state: &mut MemoryState, request: &MethodRequest) -> Value {
    let vars = &request.variables;
    let node = json!({
        "id": new_id("node"),
        "entityId": vars.get("entityId").cloned().unwrap_or(Value::Null),
        "name": vars.get("name").cloned().unwrap_or_else(|| json!("")),
        "nodeKind": vars.get("nodeKind").cloned().unwrap_or_else(|| json!("ENTITY")),
        "position": vars.get("position").cloned().unwrap_or_else(|| json!({"x": 0.0, "y": 0.0})),
        "stack": [],
    });
    state.records.entry("node".into()).or_default().push(node.clone());
    json!({ "item": node })
}

/// Creating an entity also creates the node that displays it
fn create_entity(state: &mut MemoryState, request: &MethodRequest) -> Value {
    let type_name = &request.type_name;
    let id = new_id(type_name);
    let name = request
        .variable_str("name")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", type_name, state.records.get(type_name).map_or(0, Vec::len)));

    let mut storable = json!({ "typeName": type_name, "itemId": id });
    if let Some(change_set_id) = request.variable_str("changeSetId") {
        storable["changeSetId"] = json!(change_set_id);
        storable["changeSetEntryCount"] = json!("1");
    }
    let entity = json!({ "id": id, "name": name, "siStorable": storable });
    let node = json!({
        "id": new_id("node"),
        "entityId": id,
        "name": name,
        "nodeKind": "ENTITY",
        "position": {"x": 0.0, "y": 0.0},
        "stack": [entity.clone()],
    });

    state.records.entry(type_name.clone()).or_default().push(entity.clone());
    state.records.entry("node".into()).or_default().push(node.clone());
    json!({ "item": entity, "node": node })
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn mutation(&self, request: MethodRequest) -> Result<Value, TransportError> {
        let mut state = self.state.lock().await;
        if let Some(response) = Self::intercept(&mut state, &request)? {
            return Ok(response);
        }

        let response = match (request.type_name.as_str(), request.method_name.as_str()) {
            ("node", "create") => create_node(&mut state, &request),
            ("edge", "create") => {
                let edge = with_id(&request.variables, &new_id("edge"));
                state.records.entry("edge".into()).or_default().push(edge.clone());
                json!({ "item": edge })
            }
            ("changeSet", "create") => {
                let mut change_set = with_id(&request.variables, &new_id("changeSet"));
                change_set["createTime"] = json!(Utc::now().to_rfc3339());
                state
                    .records
                    .entry("changeSet".into())
                    .or_default()
                    .push(change_set.clone());
                json!({ "item": change_set })
            }
            (_, "create") => create_entity(&mut state, &request),
            (_, "delete") => {
                let id = request
                    .variable_str("id")
                    .ok_or_else(|| TransportError::invalid_request("delete requires an id"))?;
                json!({ "item": { "id": id, "deleted": true } })
            }
            _ => json!({ "item": request.variables }),
        };
        Ok(response)
    }

    async fn query(&self, request: MethodRequest) -> Result<Value, TransportError> {
        let mut state = self.state.lock().await;
        if let Some(response) = Self::intercept(&mut state, &request)? {
            return Ok(response);
        }

        let item = request.variable_str("id").and_then(|id| {
            state
                .records
                .get(&request.type_name)?
                .iter()
                .find(|record| record.get("id").and_then(Value::as_str) == Some(id))
                .cloned()
        });
        Ok(json!({ "item": item }))
    }

    async fn list_all(&self, type_name: &str) -> Result<Vec<Value>, TransportError> {
        let mut state = self.state.lock().await;
        let request = MethodRequest::new(type_name, "list", Value::Null);
        if let Some(response) = Self::intercept(&mut state, &request)? {
            return Ok(response.as_array().cloned().unwrap_or_default());
        }
        Ok(state.records.get(type_name).cloned().unwrap_or_default())
    }
}
