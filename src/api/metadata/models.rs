//! Dynamics 365 metadata models

use serde::Deserialize;
use std::collections::BTreeMap;

/// One entry of the `Metadata/DataEntities` catalogue
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EntityCollection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub public_entity_name: Option<String>,
    #[serde(default)]
    pub public_collection_name: Option<String>,
}

impl EntityCollection {
    /// Collection name, ignoring entities that are not exposed as an entity set
    pub fn collection_name(&self) -> Option<&str> {
        self.public_collection_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// A property of an entity type
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub edm_type: Option<String>,
    pub nullable: bool,
    pub is_primary_key: bool,
}

/// Columns and key of one entity collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySchema {
    pub entity_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
}

impl EntitySchema {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Schemas keyed by public collection name
pub type EntityMetadata = BTreeMap<String, EntitySchema>;
