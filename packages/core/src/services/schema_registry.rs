//! Schema Registry
//!
//! A read-only lookup table from type name to [`Schema`]. Registries are
//! assembled once at startup through [`SchemaRegistryBuilder`] and frozen by
//! `build()`; afterwards they are shared by reference (usually in an `Arc`).
//!
//! Built-in schemas are addressed through the [`BuiltinType`] enum, while
//! types that only become known at load time (JSON documents from the
//! backend) go through the same string-keyed table.

use crate::models::{get_core_schemas, BuiltinType, Schema};
use crate::services::error::RegistryError;
use std::collections::HashMap;

/// Frozen type name -> schema table
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    /// Registry holding only the built-in catalogue
    pub fn with_builtins() -> Self {
        let mut builder = SchemaRegistryBuilder::new();
        for schema in get_core_schemas() {
            // Built-in names are distinct and checked by the catalogue tests
            builder.insert_unchecked(schema);
        }
        builder.build()
    }

    /// Look up a schema by type name
    pub fn get(&self, type_name: &str) -> Result<&Schema, RegistryError> {
        self.schemas
            .get(type_name)
            .ok_or_else(|| RegistryError::not_found(type_name))
    }

    /// Look up a built-in schema
    ///
    /// Fails only if the registry was built without the built-in catalogue.
    pub fn get_builtin(&self, builtin: BuiltinType) -> Result<&Schema, RegistryError> {
        self.get(builtin.as_str())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    /// All registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Mutable registry used during startup
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the built-in catalogue
    pub fn with_builtins(mut self) -> Self {
        for schema in get_core_schemas() {
            self.insert_unchecked(schema);
        }
        self
    }

    /// Register a schema
    ///
    /// # Errors
    ///
    /// - `DuplicateType` if the type name is already registered
    /// - `MalformedSchema` if a property list repeats a name
    pub fn register(&mut self, schema: Schema) -> Result<&mut Self, RegistryError> {
        if self.schemas.contains_key(&schema.type_name) {
            return Err(RegistryError::DuplicateType {
                type_name: schema.type_name,
            });
        }
        schema
            .check_unique_names()
            .map_err(|reason| RegistryError::malformed(&schema.type_name, reason))?;

        tracing::debug!("Registered schema '{}'", schema.type_name);
        self.schemas.insert(schema.type_name.clone(), schema);
        Ok(self)
    }

    /// Register a schema from its JSON document
    pub fn register_json(&mut self, document: serde_json::Value) -> Result<&mut Self, RegistryError> {
        let schema: Schema = serde_json::from_value(document)
            .map_err(|e| RegistryError::InvalidJson(e.to_string()))?;
        self.register(schema)
    }

    /// Register every schema of a JSON array document
    pub fn register_json_str(&mut self, documents: &str) -> Result<&mut Self, RegistryError> {
        let schemas: Vec<Schema> = serde_json::from_str(documents)
            .map_err(|e| RegistryError::InvalidJson(e.to_string()))?;
        for schema in schemas {
            self.register(schema)?;
        }
        Ok(self)
    }

    fn insert_unchecked(&mut self, schema: Schema) {
        self.schemas.insert(schema.type_name.clone(), schema);
    }

    /// Freeze the registry
    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            schemas: self.schemas,
        }
    }
}
