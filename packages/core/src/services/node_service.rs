//! Node Service - Action Layer for Diagram Nodes
//!
//! Wraps a [`NodeStore`] with the operations that talk to the backend through
//! a [`Transport`]: loading, creating and adding nodes, deleting entities,
//! sending entity actions and editing fields.
//!
//! # Session
//!
//! Every call runs under a [`SessionContext`] holding the active change-set and
//! the workspace, system and application the editor is scoped to. Operations
//! that need a change-set create one through the transport when the session
//! has none.
//!
//! # Failure Model
//!
//! Transport failures surface unchanged as `NodeServiceError::Transport`.
//! Nothing is retried and nothing already committed to the store is rolled
//! back.

use crate::config::NodeStageConfig;
use crate::models::{Edge, EdgeKind, Node, NodeKind, PathSegment, Position, Snapshot, Vertex};
use crate::projection::{self, DiffResult};
use crate::services::error::{NodeServiceError, StoreError};
use crate::services::node_store::NodeStore;
use crate::services::schema_registry::SchemaRegistry;
use crate::transport::{MethodRequest, Transport};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// The ids a service call runs under
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub change_set_id: Option<String>,
    pub workspace_id: Option<String>,
    pub billing_account_id: Option<String>,
    pub organization_id: Option<String>,
    /// Node id of the current system
    pub system_id: Option<String>,
    pub application_entity_id: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_change_set(mut self, change_set_id: impl Into<String>) -> Self {
        self.change_set_id = Some(change_set_id.into());
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_system(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    pub fn with_application(mut self, application_entity_id: impl Into<String>) -> Self {
        self.application_entity_id = Some(application_entity_id.into());
        self
    }

    fn si_properties(&self) -> Value {
        json!({
            "workspaceId": self.workspace_id,
            "billingAccountId": self.billing_account_id,
            "organizationId": self.organization_id,
        })
    }
}

/// An entity snapshot to place on the diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub entity_id: String,
    pub name: String,
    pub object: Snapshot,
}

impl Item {
    /// Item named after its entity body, falling back to the entity id
    pub fn from_snapshot(object: Snapshot) -> Self {
        let name = object
            .body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(object.item_id())
            .to_string();
        Self {
            entity_id: object.item_id().to_string(),
            name,
            object,
        }
    }
}

/// A change-set record as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

/// Deserialize the `item` of a transport response
fn response_item<T: DeserializeOwned>(response: &Value, context: &str) -> Result<T, NodeServiceError> {
    let item = response
        .get("item")
        .filter(|item| !item.is_null())
        .cloned()
        .ok_or_else(|| NodeServiceError::unexpected_response(context, "response has no item"))?;
    serde_json::from_value(item)
        .map_err(|e| NodeServiceError::unexpected_response(context, e.to_string()))
}

pub struct NodeService {
    store: NodeStore,
    registry: Arc<SchemaRegistry>,
    transport: Arc<dyn Transport>,
    session: SessionContext,
    config: NodeStageConfig,
    change_set: Option<ChangeSet>,
}

impl NodeService {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        transport: Arc<dyn Transport>,
        session: SessionContext,
    ) -> Self {
        Self {
            store: NodeStore::new(),
            registry,
            transport,
            session,
            config: NodeStageConfig::default(),
            change_set: None,
        }
    }

    pub fn with_config(mut self, config: NodeStageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NodeStore {
        &mut self.store
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Switch the active change-set; `None` returns to the saved view
    pub fn set_change_set(&mut self, change_set_id: Option<String>) {
        if self.session.change_set_id != change_set_id {
            self.change_set = None;
        }
        self.session.change_set_id = change_set_id;
    }

    /// The change-set record last created or fetched
    pub fn change_set(&self) -> Option<&ChangeSet> {
        self.change_set.as_ref()
    }

    fn active(&self) -> Option<&str> {
        self.session.change_set_id.as_deref()
    }

    /// Nodes visible in the session, scoped to its application if it has one
    pub fn list(&self) -> Result<Vec<&Node>, StoreError> {
        match &self.session.application_entity_id {
            Some(application) => self.store.list_for_application(self.active(), application),
            None => Ok(self.store.list(self.active())),
        }
    }

    /// Pending changes of the focused node under the session's change-set
    pub fn diff_current(&self) -> Result<DiffResult, StoreError> {
        self.store.diff_current(&self.registry, self.active())
    }

    /// Fetch every node and edge and merge them into the store
    ///
    /// Returns the number of nodes received.
    pub async fn load(&mut self) -> Result<usize, NodeServiceError> {
        let records = self.transport.list_all(&self.config.node_type_name).await?;
        let nodes = records
            .into_iter()
            .map(serde_json::from_value::<Node>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| NodeServiceError::unexpected_response("node list", e.to_string()))?;

        let records = self.transport.list_all("edge").await?;
        let edges = records
            .into_iter()
            .map(serde_json::from_value::<Edge>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| NodeServiceError::unexpected_response("edge list", e.to_string()))?;

        let count = nodes.len();
        tracing::info!("Loaded {} nodes and {} edges", count, edges.len());
        self.store.upsert_snapshots(nodes);
        self.store.upsert_edges(edges);
        Ok(count)
    }

    /// Create an entity and focus the node displaying it
    ///
    /// Only entity nodes are created this way; for other kinds nothing happens
    /// and `None` is returned.
    pub async fn create(
        &mut self,
        node_kind: NodeKind,
        type_name: &str,
    ) -> Result<Option<String>, NodeServiceError> {
        if node_kind != NodeKind::Entity {
            tracing::debug!("Ignoring create of {:?} node '{}'", node_kind, type_name);
            return Ok(None);
        }

        let response = self
            .transport
            .mutation(MethodRequest::new(
                type_name,
                "create",
                json!({
                    "changeSetId": self.session.change_set_id,
                    "siProperties": self.session.si_properties(),
                }),
            ))
            .await?;

        let entity: Snapshot = response_item(&response, "entity create")?;
        if let Some(record) = response.get("node").filter(|n| !n.is_null()) {
            let node: Node = serde_json::from_value(record.clone())
                .map_err(|e| NodeServiceError::unexpected_response("entity create", e.to_string()))?;
            self.store.upsert_snapshots([node]);
        }

        let node = self
            .store
            .get_node_by_entity_id(entity.item_id())
            .cloned()
            .ok_or_else(|| StoreError::entity_node_not_found(entity.item_id()))?;
        let node_id = node.id.clone();
        self.store.set_current(node)?;
        self.store.set_mouse_track_selection(&node_id);

        tracing::info!("Created {} '{}' on node '{}'", type_name, entity.id, node_id);
        Ok(Some(node_id))
    }

    /// Place entity snapshots on the diagram
    ///
    /// A known entity gets the snapshot merged into its node's stack. An
    /// unknown one gets a new node, attached to the session's system and
    /// application.
    pub async fn add(&mut self, items: Vec<Item>) -> Result<(), NodeServiceError> {
        for item in items {
            match self.store.get_node_by_entity_id(&item.entity_id).cloned() {
                Some(mut node) => {
                    node.merge_snapshot(item.object);
                    node.name = item.name;
                    let node_id = node.id.clone();
                    self.store.upsert_snapshots([node]);
                    if self.is_focused_entity(&item.entity_id) {
                        self.store.set_current_by_id(&node_id)?;
                    }
                    tracing::debug!("Merged entity '{}' into node '{}'", item.entity_id, node_id);
                }
                None => self.add_new_node(item).await?,
            }
        }
        Ok(())
    }

    fn is_focused_entity(&self, entity_id: &str) -> bool {
        self.store
            .current()
            .map_or(false, |node| node.entity_id.as_deref() == Some(entity_id))
    }

    async fn add_new_node(&mut self, item: Item) -> Result<(), NodeServiceError> {
        let response = self
            .transport
            .mutation(MethodRequest::new(
                &self.config.node_type_name,
                "create",
                json!({
                    "name": item.name,
                    "displayName": item.name,
                    "siProperties": self.session.si_properties(),
                    "entityId": item.entity_id,
                    "position": Position::default(),
                    "sockets": self.config.default_sockets,
                    "nodeKind": NodeKind::Entity,
                }),
            ))
            .await?;

        let mut node: Node = response_item(&response, "node create")?;
        let type_name = item.object.type_name().to_string();
        node.stack = vec![item.object];
        let node_id = node.id.clone();
        self.store.upsert_snapshots([node]);
        if self.is_focused_entity(&item.entity_id) {
            self.store.set_current_by_id(&node_id)?;
        }
        tracing::info!("Created node '{}' for entity '{}'", node_id, item.entity_id);

        let head = Vertex::new(&node_id, &self.config.input_socket, &type_name);

        if let Some(system_id) = self.session.system_id.clone() {
            if type_name != self.config.system_type_name {
                let tail = Vertex::new(
                    system_id,
                    &self.config.output_socket,
                    &self.config.system_type_name,
                );
                self.create_edge(tail, head.clone(), Some(EdgeKind::PartOf))
                    .await?;
            }
        }

        if type_name == self.config.application_type_name {
            return Ok(());
        }
        let application_tail = self
            .session
            .application_entity_id
            .as_deref()
            .and_then(|id| self.store.get_node_by_entity_id(id))
            .map(|app| {
                let app_type = app.stack.first().map_or("", |s| s.type_name());
                Vertex::new(&app.id, &self.config.output_socket, app_type)
            });
        if let Some(tail) = application_tail {
            self.create_edge(tail, head, None).await?;
        }
        Ok(())
    }

    async fn create_edge(
        &mut self,
        tail_vertex: Vertex,
        head_vertex: Vertex,
        edge_kind: Option<EdgeKind>,
    ) -> Result<(), NodeServiceError> {
        let response = self
            .transport
            .mutation(MethodRequest::new(
                "edge",
                "create",
                json!({
                    "tailVertex": tail_vertex,
                    "headVertex": head_vertex,
                    "bidirectional": true,
                    "edgeKind": edge_kind,
                }),
            ))
            .await?;

        let edge: Edge = response_item(&response, "edge create")?;
        tracing::debug!(
            "Created edge '{}' from '{}' to '{}'",
            edge.id,
            edge.tail_vertex.id,
            edge.head_vertex.id
        );
        self.store.upsert_edges([edge]);
        Ok(())
    }

    /// Edit a field of the focused node
    ///
    /// Writes the change-set's entry when the node has one, otherwise the
    /// saved entry.
    pub fn set_field_value(
        &mut self,
        path: &[PathSegment],
        value: Value,
    ) -> Result<(), NodeServiceError> {
        let node = self.store.current_or_throw()?;
        let target = projection::active_key(&node.display, self.active());
        self.store.set_field_value(None, &target, path, value)?;
        Ok(())
    }

    /// Edit a field of a stored node
    pub fn set_field_value_by_node(
        &mut self,
        node_id: &str,
        path: &[PathSegment],
        value: Value,
    ) -> Result<(), NodeServiceError> {
        let node = self
            .store
            .get_node_by_id(node_id)
            .ok_or_else(|| StoreError::node_not_found(node_id))?;
        let target = projection::active_key(&node.display, self.active());
        self.store.set_field_value(Some(node_id), &target, path, value)?;
        Ok(())
    }

    pub fn set_node_position(&mut self, node_id: &str, position: Position) {
        self.store.set_position(node_id, position);
    }

    /// The session's change-set, created through the transport if absent
    pub async fn ensure_change_set(&mut self) -> Result<String, NodeServiceError> {
        if let Some(id) = &self.session.change_set_id {
            return Ok(id.clone());
        }

        let response = self
            .transport
            .mutation(MethodRequest::new(
                &self.config.change_set_type_name,
                "create",
                json!({
                    "name": self.config.default_change_set_name,
                    "siProperties": self.session.si_properties(),
                }),
            ))
            .await?;
        let change_set: ChangeSet = response_item(&response, "change-set create")?;

        tracing::info!("Created change-set '{}' ({})", change_set.name, change_set.id);
        let id = change_set.id.clone();
        self.session.change_set_id = Some(id.clone());
        self.change_set = Some(change_set);
        Ok(id)
    }

    /// Run an entity action on the focused node
    ///
    /// `delete` is handled by [`NodeService::delete`]. Any other action is sent
    /// as a mutation on the entity's type, after which the change-set is
    /// fetched again.
    pub async fn send_action(&mut self, action: &str) -> Result<(), NodeServiceError> {
        if action == "delete" {
            self.delete().await?;
            return Ok(());
        }

        let node = self.store.current_or_throw()?.clone();
        let change_set_id = self.ensure_change_set().await?;
        let entity = projection::select_active(&node.display, Some(&change_set_id))?;

        self.transport
            .mutation(MethodRequest::new(
                entity.type_name(),
                action,
                json!({ "id": entity.id, "changeSetId": change_set_id }),
            ))
            .await?;
        tracing::info!("Sent action '{}' to '{}'", action, entity.id);

        let response = self
            .transport
            .query(MethodRequest::new(
                &self.config.change_set_type_name,
                "get",
                json!({ "id": change_set_id }),
            ))
            .await?;
        match response_item::<ChangeSet>(&response, "change-set get") {
            Ok(change_set) => self.change_set = Some(change_set),
            Err(e) => tracing::warn!("Could not refresh change-set '{}': {}", change_set_id, e),
        }
        Ok(())
    }

    /// Delete the focused node's entity and the entities of its related nodes
    ///
    /// Returns the ids of the entities a delete was issued for.
    pub async fn delete(&mut self) -> Result<Vec<String>, NodeServiceError> {
        let node = self.store.current_or_throw()?.clone();
        let change_set_id = self.ensure_change_set().await?;

        let mut targets = vec![node.clone()];
        for related_id in self.store.all_related_nodes(&node.id) {
            if let Some(related) = self.store.get_node_by_id(&related_id) {
                targets.push(related.clone());
            }
        }

        let mut deleted = Vec::new();
        for target in targets.iter().filter(|n| n.node_kind == NodeKind::Entity) {
            let entity = projection::select_active(&target.display, Some(&change_set_id))?;
            self.transport
                .mutation(MethodRequest::new(
                    entity.type_name(),
                    "delete",
                    json!({ "id": entity.id, "changeSetId": change_set_id }),
                ))
                .await?;
            deleted.push(entity.id.clone());
        }

        tracing::info!(
            "Deleted {} entities for node '{}' in change-set '{}'",
            deleted.len(),
            node.id,
            change_set_id
        );
        Ok(deleted)
    }
}
