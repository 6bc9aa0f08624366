//! Change-Set Projection
//!
//! A node's stack holds every snapshot the backend returned for it, across
//! change-sets. This module folds a stack into a [`DisplayProjection`], the
//! one snapshot per change-set (plus the saved baseline) that the editor
//! displays, and compares snapshots field by field.
//!
//! # Projection Rules
//!
//! - tagged snapshots: the highest entry count wins per change-set; on equal
//!   counts the one seen first stays
//! - untagged snapshots: the last one in stack order is the saved baseline
//!
//! # Diff Rules
//!
//! For the active change-set:
//!
//! - saved baseline present: saved vs the change-set's entry
//! - never saved: the lowest vs the highest entry count written under the
//!   change-set (the node was created inside it, so there is no baseline)
//! - otherwise nothing to compare

use crate::models::{FieldPath, Node, Snapshot};
use crate::services::error::RegistryError;
use crate::services::property_resolver::PropertyResolver;
use crate::services::schema_registry::SchemaRegistry;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Key of the saved baseline in a serialized projection
pub const SAVED_KEY: &str = "saved";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// Neither the active change-set nor the saved baseline has an entry
    #[error("No saved state: projection has neither an active change-set entry nor a saved entry")]
    NoSavedState,
}

/// Slot of a display projection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DisplayKey {
    Saved,
    ChangeSet(String),
}

impl fmt::Display for DisplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayKey::Saved => f.write_str(SAVED_KEY),
            DisplayKey::ChangeSet(id) => f.write_str(id),
        }
    }
}

impl Serialize for DisplayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The current snapshot per change-set, plus the saved baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayProjection {
    #[serde(rename = "saved", skip_serializing_if = "Option::is_none")]
    saved: Option<Snapshot>,

    #[serde(flatten)]
    change_sets: BTreeMap<String, Snapshot>,
}

impl DisplayProjection {
    pub fn get(&self, key: &DisplayKey) -> Option<&Snapshot> {
        match key {
            DisplayKey::Saved => self.saved.as_ref(),
            DisplayKey::ChangeSet(id) => self.change_sets.get(id),
        }
    }

    pub fn get_mut(&mut self, key: &DisplayKey) -> Option<&mut Snapshot> {
        match key {
            DisplayKey::Saved => self.saved.as_mut(),
            DisplayKey::ChangeSet(id) => self.change_sets.get_mut(id),
        }
    }

    pub fn saved(&self) -> Option<&Snapshot> {
        self.saved.as_ref()
    }

    pub fn change_set(&self, change_set_id: &str) -> Option<&Snapshot> {
        self.change_sets.get(change_set_id)
    }

    /// Change-set ids with an entry, sorted
    pub fn change_set_ids(&self) -> impl Iterator<Item = &str> {
        self.change_sets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.change_sets.len() + usize::from(self.saved.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_none() && self.change_sets.is_empty()
    }
}

/// Whether `candidate` replaces `existing` as a change-set's entry
///
/// Snapshots without a readable entry count never replace anything.
fn supersedes(candidate: &Snapshot, existing: &Snapshot) -> bool {
    match (candidate.entry_count(), existing.entry_count()) {
        (Some(candidate), Some(existing)) => candidate > existing,
        _ => false,
    }
}

/// Fold a stack into its display projection
pub fn project(stack: &[Snapshot]) -> DisplayProjection {
    let mut display = DisplayProjection::default();

    for snapshot in stack {
        match snapshot.change_set_id() {
            Some(change_set_id) => {
                let replace = display
                    .change_sets
                    .get(change_set_id)
                    .map_or(true, |existing| supersedes(snapshot, existing));
                if replace {
                    display
                        .change_sets
                        .insert(change_set_id.to_string(), snapshot.clone());
                }
            }
            None => display.saved = Some(snapshot.clone()),
        }
    }

    display
}

/// The slot the active view reads: the change-set's entry if present, else saved
pub fn active_key(display: &DisplayProjection, active: Option<&str>) -> DisplayKey {
    match active {
        Some(id) if display.change_sets.contains_key(id) => DisplayKey::ChangeSet(id.to_string()),
        _ => DisplayKey::Saved,
    }
}

/// The snapshot the active view shows
pub fn select_active<'d>(
    display: &'d DisplayProjection,
    active: Option<&str>,
) -> Result<&'d Snapshot, ProjectionError> {
    display
        .get(&active_key(display, active))
        .ok_or(ProjectionError::NoSavedState)
}

/// One changed field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    pub path: FieldPath,
    pub label: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    pub entries: Vec<DiffEntry>,
    pub count: usize,
}

impl DiffResult {
    fn from_entries(entries: Vec<DiffEntry>) -> Self {
        let count = entries.len();
        Self { entries, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Pending changes of a node under the active change-set
pub fn diff(
    node: &Node,
    active: Option<&str>,
    registry: &SchemaRegistry,
) -> Result<DiffResult, RegistryError> {
    let Some(change_set_id) = active else {
        return Ok(DiffResult::default());
    };

    match (node.display.change_set(change_set_id), node.display.saved()) {
        (Some(pending), Some(saved)) => diff_snapshots(saved, pending, registry),
        (Some(_), None) => match change_set_bounds(&node.stack, change_set_id) {
            Some((start, end)) => diff_snapshots(start, end, registry),
            None => Ok(DiffResult::default()),
        },
        _ => Ok(DiffResult::default()),
    }
}

/// Lowest and highest entry-count snapshots written under a change-set
///
/// Both start at the first tagged snapshot; snapshots without a readable
/// entry count never displace either end.
pub fn change_set_bounds<'s>(
    stack: &'s [Snapshot],
    change_set_id: &str,
) -> Option<(&'s Snapshot, &'s Snapshot)> {
    let mut tagged = stack
        .iter()
        .filter(|s| s.change_set_id() == Some(change_set_id));
    let first = tagged.next()?;

    let (mut start, mut end) = (first, first);
    for snapshot in tagged {
        if let (Some(count), Some(start_count)) = (snapshot.entry_count(), start.entry_count()) {
            if count < start_count {
                start = snapshot;
            }
        }
        if let (Some(count), Some(end_count)) = (snapshot.entry_count(), end.entry_count()) {
            if count > end_count {
                end = snapshot;
            }
        }
    }
    Some((start, end))
}

/// Compare two snapshots over the resolved fields of the newer one's type
///
/// Expanded object containers are skipped (their children are compared);
/// repeated fields compare the whole collection.
pub fn diff_snapshots(
    before: &Snapshot,
    after: &Snapshot,
    registry: &SchemaRegistry,
) -> Result<DiffResult, RegistryError> {
    let fields = PropertyResolver::new(registry).resolve_fields(after.type_name())?;

    let entries: Vec<DiffEntry> = fields
        .into_iter()
        .filter(|field| !field.is_expanded_container())
        .filter_map(|field| {
            let old = before.get_value(&field.path);
            let new = after.get_value(&field.path);
            (old != new).then(|| DiffEntry {
                before: old.cloned(),
                after: new.cloned(),
                path: field.path,
                label: field.label,
            })
        })
        .collect();

    tracing::debug!(
        "Diffed '{}' against '{}': {} changed fields",
        before.id,
        after.id,
        entries.len()
    );
    Ok(DiffResult::from_entries(entries))
}
