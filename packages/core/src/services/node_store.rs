//! Node Store
//!
//! The in-memory view-model of the diagram: every node record, the focused
//! node, the mouse-track selection and the edges between nodes.
//!
//! # Invariants
//!
//! - every node's display projection is recomputed in the same call that
//!   changes its stack
//! - nodes keep their insertion order; an upsert of a known id replaces the
//!   record in place
//! - the focused node is a copy. Changes made through the map are not visible
//!   on it until it is focused again (positions are the exception)
//!
//! The active change-set is always passed in by the caller; the store itself
//! has no notion of a session.

use crate::models::{Edge, FieldPath, Node, PathSegment, Position, ResolvedField};
use crate::projection::{self, DiffResult, DisplayKey, ProjectionError};
use crate::services::error::StoreError;
use crate::services::property_resolver::{code_field, PropertyResolver};
use crate::services::schema_registry::SchemaRegistry;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    current: Option<Node>,
    mouse_track_selection: Option<String>,
    edges: Vec<Edge>,
}

/// Visibility of a node under the active change-set
///
/// A node touched by the change-set is shown unless its entry there is
/// deleted and it has no saved baseline. Any other node is shown if it has a
/// live saved snapshot.
fn is_visible(node: &Node, active: Option<&str>) -> bool {
    match active {
        Some(change_set_id) if node.has_change_set(change_set_id) => {
            let deleted = node
                .display
                .change_set(change_set_id)
                .map_or(false, |entry| entry.is_deleted());
            !(deleted && node.display.saved().is_none())
        }
        _ => node.has_live_saved(),
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace node records, recomputing their projections
    pub fn upsert_snapshots(&mut self, nodes: impl IntoIterator<Item = Node>) {
        for mut node in nodes {
            node.refresh_display();
            match self.index.get(&node.id) {
                Some(&position) => {
                    tracing::debug!("Replacing node '{}'", node.id);
                    self.nodes[position] = node;
                }
                None => {
                    tracing::debug!("Adding node '{}'", node.id);
                    self.index.insert(node.id.clone(), self.nodes.len());
                    self.nodes.push(node);
                }
            }
        }
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_node_by_id(&self, node_id: &str) -> Option<&Node> {
        self.index.get(node_id).map(|&position| &self.nodes[position])
    }

    /// First node displaying the entity
    pub fn get_node_by_entity_id(&self, entity_id: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| node.entity_id.as_deref() == Some(entity_id))
    }

    /// Focus a node
    ///
    /// # Errors
    ///
    /// `InvalidNode` if the node has no snapshots, since there is nothing to
    /// display.
    pub fn set_current(&mut self, mut node: Node) -> Result<(), StoreError> {
        if node.stack.is_empty() {
            return Err(StoreError::invalid_node(&node.id, "node has an empty stack"));
        }
        node.refresh_display();
        tracing::debug!("Focused node '{}'", node.id);
        self.current = Some(node);
        Ok(())
    }

    /// Focus the stored copy of a node
    pub fn set_current_by_id(&mut self, node_id: &str) -> Result<(), StoreError> {
        let node = self
            .get_node_by_id(node_id)
            .cloned()
            .ok_or_else(|| StoreError::node_not_found(node_id))?;
        self.set_current(node)
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&Node> {
        self.current.as_ref()
    }

    pub fn current_or_throw(&self) -> Result<&Node, StoreError> {
        self.current.as_ref().ok_or(StoreError::NoCurrentNode)
    }

    /// Write a value into one projection entry
    ///
    /// With a `node_id` the stored node is edited, otherwise the focused copy.
    /// Only the cached projection changes; the stack is left alone, so the
    /// edit disappears when the node is projected again.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` for an unknown `node_id`
    /// - `NoCurrentNode` without `node_id` and without a focused node
    /// - `NoSavedState` if the projection has no entry under `target`
    pub fn set_field_value(
        &mut self,
        node_id: Option<&str>,
        target: &DisplayKey,
        path: &[PathSegment],
        value: Value,
    ) -> Result<(), StoreError> {
        let node = match node_id {
            Some(id) => {
                let position = *self
                    .index
                    .get(id)
                    .ok_or_else(|| StoreError::node_not_found(id))?;
                &mut self.nodes[position]
            }
            None => self.current.as_mut().ok_or(StoreError::NoCurrentNode)?,
        };

        let entry = node
            .display
            .get_mut(target)
            .ok_or(ProjectionError::NoSavedState)?;
        entry.set_value(path, value)?;
        tracing::debug!("Set field on node '{}' entry '{}'", node.id, target);
        Ok(())
    }

    /// Read a field of the focused node's active entry
    pub fn get_field_value(
        &self,
        path: &[PathSegment],
        active: Option<&str>,
    ) -> Result<Option<&Value>, StoreError> {
        let node = self.current_or_throw()?;
        let entry = projection::select_active(&node.display, active)?;
        Ok(entry.get_value(path))
    }

    /// Move a node, keeping the focused copy in step
    pub fn set_position(&mut self, node_id: &str, position: Position) {
        if let Some(&index) = self.index.get(node_id) {
            self.nodes[index].position = position;
        }
        if let Some(current) = self.current.as_mut().filter(|node| node.id == node_id) {
            current.position = position;
        }
    }

    /// Nodes visible under the active change-set, in insertion order
    pub fn list(&self, active: Option<&str>) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|node| is_visible(node, active))
            .collect()
    }

    /// Visible nodes attached to an application
    ///
    /// Candidates are the head vertices of every edge touching the
    /// application's node, deduplicated in edge order.
    ///
    /// # Errors
    ///
    /// - `EntityNodeNotFound` if no node displays the application
    /// - `BrokenEdge` if an edge points at a node the store does not hold
    pub fn list_for_application(
        &self,
        active: Option<&str>,
        application_entity_id: &str,
    ) -> Result<Vec<&Node>, StoreError> {
        let application_node = self
            .get_node_by_entity_id(application_entity_id)
            .ok_or_else(|| StoreError::entity_node_not_found(application_entity_id))?;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for edge in self.all_related_edges(&application_node.id) {
            let head_id = edge.head_vertex.id.as_str();
            if !seen.insert(head_id) {
                continue;
            }
            let node = self
                .get_node_by_id(head_id)
                .ok_or_else(|| StoreError::broken_edge(&edge.id, head_id))?;
            candidates.push(node);
        }

        Ok(candidates
            .into_iter()
            .filter(|node| is_visible(node, active))
            .collect())
    }

    /// Edit-form fields for the focused node's active entry
    pub fn properties_list(
        &self,
        registry: &SchemaRegistry,
        active: Option<&str>,
    ) -> Result<Vec<ResolvedField>, StoreError> {
        let node = self.current_or_throw()?;
        let entry = projection::select_active(&node.display, active)?;
        Ok(PropertyResolver::new(registry).resolve_fields(entry.type_name())?)
    }

    /// The first code field of the focused node's form
    pub fn code_property(
        &self,
        registry: &SchemaRegistry,
        active: Option<&str>,
    ) -> Result<Option<ResolvedField>, StoreError> {
        let fields = self.properties_list(registry, active)?;
        Ok(code_field(&fields).cloned())
    }

    /// Pending changes of the focused node; empty when nothing is focused
    pub fn diff_current(
        &self,
        registry: &SchemaRegistry,
        active: Option<&str>,
    ) -> Result<DiffResult, StoreError> {
        match &self.current {
            Some(node) => Ok(projection::diff(node, active, registry)?),
            None => Ok(DiffResult::default()),
        }
    }

    pub fn set_mouse_track_selection(&mut self, node_id: impl Into<String>) {
        self.mouse_track_selection = Some(node_id.into());
    }

    pub fn unset_mouse_track_selection(&mut self) {
        self.mouse_track_selection = None;
    }

    pub fn mouse_track_selection(&self) -> Option<&str> {
        self.mouse_track_selection.as_deref()
    }

    /// Insert or replace edges by id
    pub fn upsert_edges(&mut self, edges: impl IntoIterator<Item = Edge>) {
        for edge in edges {
            match self.edges.iter_mut().find(|e| e.id == edge.id) {
                Some(existing) => *existing = edge,
                None => self.edges.push(edge),
            }
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges with either end at the node
    pub fn all_related_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.touches(node_id)).collect()
    }

    /// Ids of the nodes at the other end of the node's edges, deduplicated
    pub fn all_related_nodes(&self, node_id: &str) -> Vec<String> {
        let mut related: Vec<String> = Vec::new();
        for vertex in self.edges.iter().filter_map(|e| e.other_end(node_id)) {
            if !related.contains(&vertex.id) {
                related.push(vertex.id.clone());
            }
        }
        related
    }
}

/// Path of a top-level field
pub fn field_path(name: &str) -> FieldPath {
    vec![PathSegment::from(name)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::path::PathError;
    use crate::models::{EdgeKind, NodeKind, Snapshot, Vertex};
    use serde_json::json;

    const DEPLOYMENT: &str = "kubernetesDeploymentEntity";

    fn saved_node(id: &str) -> Node {
        Node::new(id, NodeKind::Entity)
            .with_entity(format!("entity-{}", id))
            .with_snapshot(Snapshot::saved(
                format!("entity-{}", id),
                DEPLOYMENT,
                json!({"name": id}),
            ))
    }

    fn edge(id: &str, tail: &str, head: &str) -> Edge {
        Edge {
            id: id.to_string(),
            tail_vertex: Vertex::new(tail, "output", "system"),
            head_vertex: Vertex::new(head, "input", DEPLOYMENT),
            bidirectional: true,
            edge_kind: Some(EdgeKind::PartOf),
        }
    }

    #[test]
    fn test_upsert_replaces_in_place_and_appends() {
        let mut store = NodeStore::new();
        store.upsert_snapshots(vec![saved_node("a"), saved_node("b")]);

        let replacement = saved_node("a").with_name("renamed");
        store.upsert_snapshots(vec![replacement, saved_node("c")]);

        let ids: Vec<&str> = store.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.get_node_by_id("a").unwrap().name, "renamed");
    }

    #[test]
    fn test_upsert_recomputes_projection() {
        let mut node = saved_node("a");
        node.stack.push(Snapshot::in_change_set("x", DEPLOYMENT, "cs1", 1, json!({})));
        // the stale projection is ignored
        node.display = Default::default();

        let mut store = NodeStore::new();
        store.upsert_snapshots(vec![node]);
        let stored = store.get_node_by_id("a").unwrap();
        assert!(stored.display.saved().is_some());
        assert!(stored.display.change_set("cs1").is_some());
    }

    #[test]
    fn test_set_current_rejects_empty_stack() {
        let mut store = NodeStore::new();
        let err = store
            .set_current(Node::new("empty", NodeKind::Entity))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidNode { .. }));
        assert_eq!(store.current_or_throw().unwrap_err(), StoreError::NoCurrentNode);
    }

    #[test]
    fn test_set_field_value_without_change_set_writes_saved_entry() {
        let mut store = NodeStore::new();
        store.set_current(saved_node("a")).unwrap();

        let target = projection::active_key(&store.current().unwrap().display, None);
        store
            .set_field_value(None, &target, &field_path("name"), json!("edited"))
            .unwrap();

        let current = store.current().unwrap();
        assert_eq!(current.display.saved().unwrap().body["name"], "edited");
        // the stack is untouched
        assert_eq!(current.stack[0].body["name"], "a");
        assert_eq!(
            store.get_field_value(&field_path("name"), None).unwrap(),
            Some(&json!("edited"))
        );
    }

    #[test]
    fn test_set_field_value_errors() {
        let mut store = NodeStore::new();
        let err = store
            .set_field_value(None, &DisplayKey::Saved, &field_path("name"), json!(1))
            .unwrap_err();
        assert_eq!(err, StoreError::NoCurrentNode);

        let err = store
            .set_field_value(Some("ghost"), &DisplayKey::Saved, &field_path("name"), json!(1))
            .unwrap_err();
        assert_eq!(err, StoreError::node_not_found("ghost"));

        store.upsert_snapshots(vec![saved_node("a")]);
        let err = store
            .set_field_value(
                Some("a"),
                &DisplayKey::ChangeSet("cs1".into()),
                &field_path("name"),
                json!(1),
            )
            .unwrap_err();
        assert_eq!(err, StoreError::Projection(ProjectionError::NoSavedState));
    }

    #[test]
    fn test_set_field_value_through_list_is_rejected() {
        let mut store = NodeStore::new();
        store
            .set_current(Node::new("a", NodeKind::Entity).with_snapshot(Snapshot::saved(
                "a-saved",
                DEPLOYMENT,
                json!({"ports": [{"containerPort": 80}]}),
            )))
            .unwrap();

        let path = vec![PathSegment::from("ports"), PathSegment::from("protocol")];
        let err = store
            .set_field_value(None, &DisplayKey::Saved, &path, json!("TCP"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(PathError::KeyOnArray { .. })));
        assert_eq!(
            store.current().unwrap().display.saved().unwrap().body["ports"],
            json!([{"containerPort": 80}])
        );
    }

    #[test]
    fn test_set_position_updates_map_and_focused_copy() {
        let mut store = NodeStore::new();
        store.upsert_snapshots(vec![saved_node("a")]);
        store.set_current_by_id("a").unwrap();

        store.set_position("a", Position::new(5.0, 7.5));
        assert_eq!(store.get_node_by_id("a").unwrap().position, Position::new(5.0, 7.5));
        assert_eq!(store.current().unwrap().position, Position::new(5.0, 7.5));

        // Unknown ids are ignored
        store.set_position("ghost", Position::new(1.0, 1.0));
    }

    #[test]
    fn test_list_without_change_set_requires_live_saved() {
        let mut store = NodeStore::new();
        let deleted = Node::new("deleted", NodeKind::Entity).with_snapshot(
            Snapshot::saved("e-deleted", DEPLOYMENT, json!({})).mark_deleted(),
        );
        let pending = Node::new("pending", NodeKind::Entity)
            .with_snapshot(Snapshot::in_change_set("e-pending", DEPLOYMENT, "cs1", 1, json!({})));
        store.upsert_snapshots(vec![saved_node("a"), deleted, pending]);

        let ids: Vec<&str> = store.list(None).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_list_with_change_set() {
        let mut store = NodeStore::new();
        let pending = Node::new("pending", NodeKind::Entity)
            .with_snapshot(Snapshot::in_change_set("e-p", DEPLOYMENT, "cs1", 1, json!({})));
        let created_then_deleted = Node::new("gone", NodeKind::Entity).with_snapshot(
            Snapshot::in_change_set("e-g", DEPLOYMENT, "cs1", 1, json!({})).mark_deleted(),
        );
        let saved_then_deleted = saved_node("kept").with_snapshot(
            Snapshot::in_change_set("e-k", DEPLOYMENT, "cs1", 2, json!({})).mark_deleted(),
        );
        let other_change_set = Node::new("other", NodeKind::Entity)
            .with_snapshot(Snapshot::in_change_set("e-o", DEPLOYMENT, "cs2", 1, json!({})));
        store.upsert_snapshots(vec![
            saved_node("a"),
            pending,
            created_then_deleted,
            saved_then_deleted,
            other_change_set,
        ]);

        let ids: Vec<&str> = store.list(Some("cs1")).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "pending", "kept"]);
    }

    #[test]
    fn test_list_for_application() {
        let mut store = NodeStore::new();
        let application = saved_node("app");
        store.upsert_snapshots(vec![application, saved_node("a"), saved_node("b"), saved_node("c")]);
        store.upsert_edges(vec![
            edge("e1", "app", "b"),
            edge("e2", "app", "a"),
            edge("e3", "app", "b"),
            edge("e4", "sys", "c"),
        ]);

        let nodes = store.list_for_application(None, "entity-app").unwrap();
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_list_for_application_broken_edge() {
        let mut store = NodeStore::new();
        store.upsert_snapshots(vec![saved_node("app")]);
        store.upsert_edges(vec![edge("e1", "app", "missing")]);

        let err = store.list_for_application(None, "entity-app").unwrap_err();
        assert_eq!(err, StoreError::broken_edge("e1", "missing"));

        let err = store.list_for_application(None, "entity-nope").unwrap_err();
        assert_eq!(err, StoreError::entity_node_not_found("entity-nope"));
    }

    #[test]
    fn test_related_nodes_are_deduplicated() {
        let mut store = NodeStore::new();
        store.upsert_edges(vec![
            edge("e1", "a", "b"),
            edge("e2", "c", "a"),
            edge("e3", "a", "b"),
        ]);
        store.upsert_edges(vec![edge("e1", "a", "d")]);

        assert_eq!(store.edges().len(), 3);
        assert_eq!(store.all_related_edges("a").len(), 3);
        assert_eq!(store.all_related_nodes("a"), vec!["d", "c", "b"]);
    }

    #[test]
    fn test_properties_list_and_code_property() {
        let registry = SchemaRegistry::with_builtins();
        let mut store = NodeStore::new();
        assert_eq!(
            store.properties_list(&registry, None).unwrap_err(),
            StoreError::NoCurrentNode
        );

        store.set_current(saved_node("a")).unwrap();
        let fields = store.properties_list(&registry, None).unwrap();
        assert_eq!(fields[0].name, "name");

        let code = store.code_property(&registry, None).unwrap().unwrap();
        assert_eq!(code.name, "kubernetesObjectYaml");
    }

    #[test]
    fn test_diff_current_without_focus_is_empty() {
        let registry = SchemaRegistry::with_builtins();
        let store = NodeStore::new();
        assert!(store.diff_current(&registry, Some("cs1")).unwrap().is_empty());
    }

    #[test]
    fn test_mouse_track_selection() {
        let mut store = NodeStore::new();
        assert_eq!(store.mouse_track_selection(), None);
        store.set_mouse_track_selection("node:1");
        assert_eq!(store.mouse_track_selection(), Some("node:1"));
        store.unset_mouse_track_selection();
        assert_eq!(store.mouse_track_selection(), None);
    }
}
