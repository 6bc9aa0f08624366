//! Node Data Structures
//!
//! This module defines the records the store keeps for every diagram node:
//!
//! - [`Snapshot`]: one versioned value of the node's entity, tagged with the
//!   change-set it was written under (untagged snapshots are the saved state)
//! - [`Node`]: identity, placement and the stack of snapshots, plus the derived
//!   [`DisplayProjection`]
//!
//! # Wire Format
//!
//! Node records arrive from the transport as camelCase JSON. Entry counts are
//! serialized as strings by the backend and accepted either way:
//!
//! ```json
//! {
//!   "id": "node:1",
//!   "entityId": "entity:1",
//!   "name": "web",
//!   "nodeKind": "ENTITY",
//!   "position": { "x": 10.0, "y": 20.0 },
//!   "stack": [
//!     {
//!       "id": "entity:1",
//!       "siStorable": {
//!         "typeName": "kubernetesDeploymentEntity",
//!         "changeSetId": "changeSet:1",
//!         "changeSetEntryCount": "2",
//!         "deleted": false
//!       },
//!       "name": "web"
//!     }
//!   ]
//! }
//! ```

use crate::models::path::{get_path, set_path, PathError};
use crate::models::schema::PathSegment;
use crate::projection::{self, DisplayProjection};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Storage metadata carried by every snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storable {
    /// Registered schema type of the entity
    pub type_name: String,

    /// Id of the item this snapshot is a version of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_set_id: Option<String>,

    /// Monotonic counter within the change-set
    #[serde(
        default,
        deserialize_with = "deserialize_entry_count",
        serialize_with = "serialize_entry_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub change_set_entry_count: Option<u64>,

    #[serde(default)]
    pub deleted: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryCount {
    Number(u64),
    Text(String),
}

fn deserialize_entry_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Option::<EntryCount>::deserialize(deserializer)? {
        None => None,
        Some(EntryCount::Number(count)) => Some(count),
        Some(EntryCount::Text(text)) => match text.trim().parse::<u64>() {
            Ok(count) => Some(count),
            Err(_) => {
                tracing::warn!("Ignoring unparsable changeSetEntryCount '{}'", text);
                None
            }
        },
    };
    Ok(count)
}

fn serialize_entry_count<S>(count: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match count {
        Some(count) => serializer.serialize_str(&count.to_string()),
        None => serializer.serialize_none(),
    }
}

/// One versioned value of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,

    #[serde(rename = "siStorable")]
    pub storable: Storable,

    /// Entity fields addressed by resolved field paths
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Snapshot {
    /// Create a saved (untagged) snapshot
    pub fn saved(id: impl Into<String>, type_name: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            storable: Storable {
                type_name: type_name.into(),
                ..Storable::default()
            },
            body: into_map(body),
        }
    }

    /// Create a snapshot written under a change-set
    pub fn in_change_set(
        id: impl Into<String>,
        type_name: impl Into<String>,
        change_set_id: impl Into<String>,
        entry_count: u64,
        body: Value,
    ) -> Self {
        Self {
            id: id.into(),
            storable: Storable {
                type_name: type_name.into(),
                change_set_id: Some(change_set_id.into()),
                change_set_entry_count: Some(entry_count),
                ..Storable::default()
            },
            body: into_map(body),
        }
    }

    pub fn mark_deleted(mut self) -> Self {
        self.storable.deleted = true;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.storable.type_name
    }

    /// Change-set this snapshot belongs to; an empty id counts as untagged
    pub fn change_set_id(&self) -> Option<&str> {
        self.storable
            .change_set_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }

    pub fn entry_count(&self) -> Option<u64> {
        self.storable.change_set_entry_count
    }

    pub fn is_deleted(&self) -> bool {
        self.storable.deleted
    }

    /// Id of the entity this snapshot versions
    pub fn item_id(&self) -> &str {
        self.storable.item_id.as_deref().unwrap_or(&self.id)
    }

    pub fn get_value(&self, path: &[PathSegment]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let value = self.body.get(&first.to_string())?;
        get_path(value, rest)
    }

    /// Write a value into the body, creating intermediate containers
    ///
    /// The body is left unchanged when the path cannot be written.
    pub fn set_value(&mut self, path: &[PathSegment], value: Value) -> Result<(), PathError> {
        let mut body = Value::Object(std::mem::take(&mut self.body));
        let result = set_path(&mut body, path, value);
        self.body = into_map(body);
        result
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// What a node stands for on the diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Entity,
    System,
}

/// Diagram placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A diagram node and the history of its entity
///
/// `display` is derived from `stack` and is never read from the wire; call
/// [`Node::refresh_display`] after changing the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    #[serde(default)]
    pub name: String,

    pub node_kind: NodeKind,

    #[serde(default)]
    pub position: Position,

    /// Snapshots in arrival order
    #[serde(default)]
    pub stack: Vec<Snapshot>,

    #[serde(default, skip_deserializing)]
    pub display: DisplayProjection,
}

impl Node {
    /// Create a node with an empty stack
    pub fn new(id: impl Into<String>, node_kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            entity_id: None,
            name: String::new(),
            node_kind,
            position: Position::default(),
            stack: Vec::new(),
            display: DisplayProjection::default(),
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Append a snapshot and refresh the projection
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.stack.push(snapshot);
        self.refresh_display();
        self
    }

    /// Recompute the display projection from the stack
    pub fn refresh_display(&mut self) {
        self.display = projection::project(&self.stack);
    }

    /// Merge a snapshot into the stack by snapshot id
    ///
    /// A snapshot with a known id replaces the old one in place, a new id is
    /// appended. The projection is refreshed either way.
    pub fn merge_snapshot(&mut self, snapshot: Snapshot) {
        match self.stack.iter_mut().find(|s| s.id == snapshot.id) {
            Some(existing) => *existing = snapshot,
            None => self.stack.push(snapshot),
        }
        self.refresh_display();
    }

    /// Whether any snapshot was written under the change-set
    pub fn has_change_set(&self, change_set_id: &str) -> bool {
        self.stack
            .iter()
            .any(|s| s.change_set_id() == Some(change_set_id))
    }

    /// Whether the stack holds a saved snapshot that is not deleted
    pub fn has_live_saved(&self) -> bool {
        self.stack
            .iter()
            .any(|s| s.change_set_id().is_none() && !s.is_deleted())
    }
}
