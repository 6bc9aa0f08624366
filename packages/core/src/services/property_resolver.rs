//! Property Resolver
//!
//! Flattens a registered schema into the ordered field list an edit form
//! renders. The traversal is breadth-first over an explicit work queue: each
//! visited property emits at most one [`ResolvedField`] and returns the child
//! entries to enqueue.
//!
//! # Expansion Rules
//!
//! - `link` properties are resolved through the registry; the field keeps the
//!   link's name, label and flags and takes the target's kind
//! - non-repeated objects (declared or linked) are expanded one level per
//!   visit, their children queued under the object's path
//! - repeated objects and repeated links are emitted as a single collection
//!   field; [`PropertyResolver::resolve_repeated_fields`] expands one element
//! - a non-repeated link may not expand a schema (or linked property) that is
//!   already being expanded above it; that is reported as `MalformedSchema`
//!
//! # Ordering
//!
//! Emitted fields are grouped by container path (object fields head their own
//! group, everything else joins its parent's group), groups ordered by first
//! appearance, then flattened. Nested groups therefore stay contiguous.

use crate::models::{
    FieldKind, FieldPath, LinkTarget, PathSegment, Property, PropertyKind, ResolvedField, Schema,
};
use crate::services::error::RegistryError;
use crate::services::schema_registry::SchemaRegistry;
use std::collections::VecDeque;

/// Upper bound on link-to-link hops before a chain is treated as a cycle
const MAX_LINK_HOPS: usize = 32;

/// Link target identity: type name plus the nested property names
type LinkKey = (String, Vec<String>);

/// A property waiting to be visited, with the path of its container
#[derive(Debug, Clone)]
struct WorkItem {
    property: Property,
    prefix: FieldPath,
    /// Link targets already expanded between the root and this item
    ancestors: Vec<LinkKey>,
}

impl WorkItem {
    fn children_of(
        properties: &[Property],
        prefix: &[PathSegment],
        ancestors: &[LinkKey],
    ) -> Vec<WorkItem> {
        properties
            .iter()
            .map(|property| WorkItem {
                property: property.clone(),
                prefix: prefix.to_vec(),
                ancestors: ancestors.to_vec(),
            })
            .collect()
    }
}

/// Resolves schema properties against a registry
pub struct PropertyResolver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> PropertyResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Flatten the schema registered under `type_name`
    ///
    /// # Errors
    ///
    /// - `NotFound` if `type_name` or a linked type is not registered
    /// - `MalformedSchema` if a link cannot be resolved to a concrete property,
    ///   or a non-repeated link would expand one of its own containers again
    pub fn resolve_fields(&self, type_name: &str) -> Result<Vec<ResolvedField>, RegistryError> {
        let schema = self.registry.get(type_name)?;
        let root: LinkKey = (type_name.to_string(), Vec::new());
        let seed = WorkItem::children_of(&schema.properties, &[], &[root]);
        let fields = self.expand(seed, type_name)?;

        tracing::debug!(
            "Resolved {} fields for schema '{}'",
            fields.len(),
            type_name
        );
        Ok(fields)
    }

    /// Expand one element of a repeated field
    ///
    /// For a repeated object (declared or linked) the element's children are
    /// flattened under `field.path + [index]`. Any other field comes back as a
    /// single field addressing the element.
    pub fn resolve_repeated_fields(
        &self,
        field: &ResolvedField,
        index: usize,
    ) -> Result<Vec<ResolvedField>, RegistryError> {
        let mut element_path = field.path.clone();
        element_path.push(PathSegment::Index(index));

        match field.property.children() {
            Some(children) if field.kind == FieldKind::Object => {
                let seed = WorkItem::children_of(children, &element_path, &[]);
                self.expand(seed, &field.name)
            }
            _ => {
                let mut element = field.clone();
                element.path = element_path;
                Ok(vec![element])
            }
        }
    }

    fn expand(
        &self,
        seed: Vec<WorkItem>,
        context: &str,
    ) -> Result<Vec<ResolvedField>, RegistryError> {
        let mut queue: VecDeque<WorkItem> = seed.into();
        let mut emitted = Vec::new();

        while let Some(item) = queue.pop_front() {
            let follow_ups = self.visit(item, context, &mut emitted)?;
            queue.extend(follow_ups);
        }

        Ok(group_by_container(emitted))
    }

    /// Emit the field for one property and return its children to visit
    fn visit(
        &self,
        item: WorkItem,
        context: &str,
        emitted: &mut Vec<ResolvedField>,
    ) -> Result<Vec<WorkItem>, RegistryError> {
        let WorkItem {
            property,
            prefix,
            ancestors,
        } = item;
        let mut path = prefix;
        path.push(PathSegment::Key(property.name.clone()));

        let (target, chain) = match &property.kind {
            PropertyKind::Link { .. } => self.resolve_link(&property, context)?,
            _ => (property.clone(), Vec::new()),
        };
        let kind = target.kind.field_kind().ok_or_else(|| {
            RegistryError::malformed(
                context,
                format!("property '{}' has no resolvable kind", property.name),
            )
        })?;

        let follow_ups = match target.children() {
            Some(children) if !property.repeated => {
                if let Some((type_name, _)) = chain.iter().find(|key| ancestors.contains(key)) {
                    return Err(RegistryError::malformed(
                        context,
                        format!(
                            "link '{}' expands '{}' inside itself",
                            property.name, type_name
                        ),
                    ));
                }
                let mut inner = ancestors;
                inner.extend(chain);
                WorkItem::children_of(children, &path, &inner)
            }
            _ => Vec::new(),
        };

        emitted.push(ResolvedField {
            path,
            name: property.name,
            label: property.label,
            required: property.required,
            repeated: property.repeated,
            kind,
            hidden: property.hidden,
            property: target,
        });

        Ok(follow_ups)
    }

    /// Follow a link (and any links it lands on) to a concrete property
    ///
    /// A link to a whole schema resolves to an object property carrying the
    /// schema's properties and the link's own name and flags. The targets
    /// followed along the way are returned with it.
    fn resolve_link(
        &self,
        link: &Property,
        context: &str,
    ) -> Result<(Property, Vec<LinkKey>), RegistryError> {
        let mut current = link.clone();
        let mut chain: Vec<LinkKey> = Vec::new();

        for _ in 0..MAX_LINK_HOPS {
            let Some(lookup) = link_target(&current) else {
                return Ok((current, chain));
            };
            let key = (lookup.type_name.clone(), lookup.names.clone());
            if chain.contains(&key) {
                return Err(RegistryError::malformed(
                    context,
                    format!(
                        "link '{}' cycles through '{}'",
                        link.name, lookup.type_name
                    ),
                ));
            }
            chain.push(key);

            let schema = self.registry.get(&lookup.type_name)?;
            current = if lookup.names.is_empty() {
                schema_as_object(schema, &current)
            } else {
                find_nested(schema, &lookup.names).cloned().ok_or_else(|| {
                    RegistryError::malformed(
                        context,
                        format!(
                            "link '{}' points at missing property '{}' of '{}'",
                            link.name,
                            lookup.names.join("."),
                            lookup.type_name
                        ),
                    )
                })?
            };
        }

        Err(RegistryError::malformed(
            context,
            format!("link '{}' exceeds {} hops", link.name, MAX_LINK_HOPS),
        ))
    }
}

fn link_target(property: &Property) -> Option<LinkTarget> {
    match &property.kind {
        PropertyKind::Link { lookup } => Some(lookup.clone()),
        _ => None,
    }
}

fn schema_as_object(schema: &Schema, link: &Property) -> Property {
    Property {
        kind: PropertyKind::Object {
            properties: schema.properties.clone(),
        },
        ..link.clone()
    }
}

/// Walk a name path through nested object properties
fn find_nested<'s>(schema: &'s Schema, names: &[String]) -> Option<&'s Property> {
    let (first, rest) = names.split_first()?;
    let mut current = schema.get_property(first)?;
    for name in rest {
        current = current.children()?.iter().find(|p| &p.name == name)?;
    }
    Some(current)
}

/// Group fields by container path, keeping first-appearance order
fn group_by_container(fields: Vec<ResolvedField>) -> Vec<ResolvedField> {
    let mut groups: Vec<(FieldPath, Vec<ResolvedField>)> = Vec::new();

    for field in fields {
        let key = field.group_key();
        match groups.iter_mut().find(|(group, _)| group.as_slice() == key) {
            Some((_, members)) => members.push(field),
            None => {
                let key = key.to_vec();
                groups.push((key, vec![field]));
            }
        }
    }

    groups
        .into_iter()
        .flat_map(|(_, members)| members)
        .collect()
}

/// First field rendered with a code editor
pub fn code_field(fields: &[ResolvedField]) -> Option<&ResolvedField> {
    fields.iter().find(|f| f.kind == FieldKind::Code)
}
