//! Schema Types
//!
//! This module contains the declarative description of entity types: the
//! [`Schema`] registered under a type name, the [`Property`] descriptors it is
//! made of, and the [`ResolvedField`] records the property resolver flattens
//! them into.
//!
//! ## Property Kinds
//!
//! - `text`, `number`, `map`, `enum`, `code`: leaf properties
//! - `object`: nested property list, possibly repeated
//! - `link`: indirect reference to another registered schema (optionally
//!   narrowed to one of its nested properties), possibly repeated
//!
//! ## Example Schema Document
//!
//! ```json
//! {
//!   "typeName": "kubernetesContainerPort",
//!   "displayTypeName": "Kubernetes Container Port Definition",
//!   "serviceName": "kubernetes",
//!   "properties": [
//!     { "name": "containerPort", "label": "Container Port", "kind": "number", "numberKind": "int32" },
//!     { "name": "hostIp", "label": "Host IP", "kind": "text", "hidden": true },
//!     { "name": "protocol", "label": "Protocol", "kind": "text" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One step of a [`FieldPath`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(index) => write!(f, "{}", index),
            PathSegment::Key(key) => write!(f, "{}", key),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Keys and indices leading to a value inside a snapshot body.
pub type FieldPath = Vec<PathSegment>;

/// Storage width of a number property
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberKind {
    Int32,
    #[default]
    Int64,
    Uint32,
    Uint64,
    Float,
}

/// Target of a link property
///
/// `names` narrows the link to a nested property of the target schema; an
/// empty list links to the whole schema (resolved as an object).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTarget {
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

/// Kind-specific part of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PropertyKind {
    Text,
    Number {
        #[serde(rename = "numberKind", default)]
        number_kind: NumberKind,
    },
    Object {
        properties: Vec<Property>,
    },
    Map,
    Link {
        lookup: LinkTarget,
    },
    Enum {
        #[serde(default)]
        variants: Vec<String>,
    },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl PropertyKind {
    /// The field kind this property renders as, `None` for unresolved links
    pub fn field_kind(&self) -> Option<FieldKind> {
        match self {
            PropertyKind::Text => Some(FieldKind::Text),
            PropertyKind::Number { .. } => Some(FieldKind::Number),
            PropertyKind::Object { .. } => Some(FieldKind::Object),
            PropertyKind::Map => Some(FieldKind::Map),
            PropertyKind::Enum { .. } => Some(FieldKind::Enum),
            PropertyKind::Code { .. } => Some(FieldKind::Code),
            PropertyKind::Link { .. } => None,
        }
    }
}

/// A single property of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Property name (must be unique within its property list)
    pub name: String,

    /// Human-readable label for edit forms
    pub label: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub repeated: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(flatten)]
    pub kind: PropertyKind,
}

impl Property {
    fn with_kind(name: impl Into<String>, label: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            required: false,
            repeated: false,
            hidden: false,
            kind,
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(name, label, PropertyKind::Text)
    }

    pub fn number(name: impl Into<String>, label: impl Into<String>, number_kind: NumberKind) -> Self {
        Self::with_kind(name, label, PropertyKind::Number { number_kind })
    }

    pub fn object(
        name: impl Into<String>,
        label: impl Into<String>,
        properties: Vec<Property>,
    ) -> Self {
        Self::with_kind(name, label, PropertyKind::Object { properties })
    }

    pub fn map(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(name, label, PropertyKind::Map)
    }

    /// Link to a whole registered schema
    pub fn link(
        name: impl Into<String>,
        label: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            name,
            label,
            PropertyKind::Link {
                lookup: LinkTarget {
                    type_name: type_name.into(),
                    names: Vec::new(),
                },
            },
        )
    }

    /// Link to a nested property of a registered schema
    pub fn link_to_property(
        name: impl Into<String>,
        label: impl Into<String>,
        type_name: impl Into<String>,
        names: Vec<String>,
    ) -> Self {
        Self::with_kind(
            name,
            label,
            PropertyKind::Link {
                lookup: LinkTarget {
                    type_name: type_name.into(),
                    names,
                },
            },
        )
    }

    pub fn enumeration(
        name: impl Into<String>,
        label: impl Into<String>,
        variants: Vec<String>,
    ) -> Self {
        Self::with_kind(name, label, PropertyKind::Enum { variants })
    }

    pub fn code(
        name: impl Into<String>,
        label: impl Into<String>,
        language: Option<String>,
    ) -> Self {
        Self::with_kind(name, label, PropertyKind::Code { language })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Child properties when this is an object property
    pub fn children(&self) -> Option<&[Property]> {
        match &self.kind {
            PropertyKind::Object { properties } => Some(properties),
            _ => None,
        }
    }
}

/// Complete schema for an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub type_name: String,

    pub display_type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Edit-form properties, in declaration order
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Schema {
    pub fn new(type_name: impl Into<String>, display_type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            display_type_name: display_type_name.into(),
            service_name: None,
            properties: Vec::new(),
        }
    }

    pub fn with_service(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Get a top-level property by name
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Check that property names are unique in every property list
    ///
    /// Returns the dotted location of the first duplicate on failure.
    pub fn check_unique_names(&self) -> Result<(), String> {
        fn check(properties: &[Property], location: &str) -> Result<(), String> {
            let mut seen = HashSet::new();
            for property in properties {
                if !seen.insert(property.name.as_str()) {
                    return Err(format!(
                        "duplicate property '{}' in {}",
                        property.name, location
                    ));
                }
                if let Some(children) = property.children() {
                    check(children, &format!("{}.{}", location, property.name))?;
                }
            }
            Ok(())
        }

        check(&self.properties, &self.type_name)
    }
}

/// Rendered kind of a resolved field (links are always resolved away)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Object,
    Map,
    Enum,
    Code,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Object => "object",
            FieldKind::Map => "map",
            FieldKind::Enum => "enum",
            FieldKind::Code => "code",
        };
        f.write_str(name)
    }
}

/// A flattened edit-form field
///
/// `name`, `label` and the flags come from the declaring property (the link,
/// for linked fields); `kind` and `property` describe the resolved target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedField {
    pub path: FieldPath,
    pub name: String,
    pub label: String,
    pub required: bool,
    pub repeated: bool,
    pub kind: FieldKind,
    pub hidden: bool,
    pub property: Property,
}

impl ResolvedField {
    /// Key the field is grouped under when ordering a field list
    ///
    /// Object fields head the group of their own path; every other field
    /// belongs to the group of its parent path.
    pub fn group_key(&self) -> &[PathSegment] {
        if self.kind == FieldKind::Object {
            &self.path
        } else {
            &self.path[..self.path.len().saturating_sub(1)]
        }
    }

    /// Whether the resolver expanded this field into child fields
    pub fn is_expanded_container(&self) -> bool {
        self.kind == FieldKind::Object && !self.repeated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_deserialization() {
        let json = json!({
            "name": "containerPort",
            "label": "Container Port",
            "kind": "number",
            "numberKind": "int32"
        });

        let property: Property = serde_json::from_value(json).unwrap();
        assert_eq!(property.name, "containerPort");
        assert!(!property.repeated);
        assert_eq!(
            property.kind,
            PropertyKind::Number {
                number_kind: NumberKind::Int32
            }
        );
    }

    #[test]
    fn test_link_serialization() {
        let property = Property::link("ports", "Ports", "kubernetesContainerPort").repeated();
        let json = serde_json::to_value(&property).unwrap();

        assert_eq!(json["kind"], "link");
        assert_eq!(json["repeated"], true);
        assert_eq!(json["lookup"]["typeName"], "kubernetesContainerPort");
        assert!(json["lookup"].get("names").is_none());
    }

    #[test]
    fn test_path_segments_deserialize_mixed() {
        let path: FieldPath = serde_json::from_value(json!(["spec", 0, "name"])).unwrap();
        assert_eq!(
            path,
            vec![
                PathSegment::from("spec"),
                PathSegment::Index(0),
                PathSegment::from("name")
            ]
        );
    }

    #[test]
    fn test_duplicate_names_detected_in_nested_object() {
        let schema = Schema::new("thing", "Thing").with_property(Property::object(
            "spec",
            "Spec",
            vec![Property::text("name", "Name"), Property::text("name", "Name")],
        ));

        let err = schema.check_unique_names().unwrap_err();
        assert!(err.contains("thing.spec"));
    }

    #[test]
    fn test_group_key() {
        let field = ResolvedField {
            path: vec!["metadata".into(), "name".into()],
            name: "name".to_string(),
            label: "Name".to_string(),
            required: true,
            repeated: false,
            kind: FieldKind::Text,
            hidden: false,
            property: Property::text("name", "Name"),
        };
        assert_eq!(field.group_key(), &[PathSegment::from("metadata")]);
    }
}
