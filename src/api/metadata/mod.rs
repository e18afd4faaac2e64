//! Metadata parsing and models for Dynamics 365
//!
//! The entity catalogue (`Metadata/DataEntities`) maps public entity names to
//! collection names; the EDMX `$metadata` document describes each entity
//! type's properties and key. Joining the two yields an [`EntitySchema`] per
//! collection.

pub mod models;

pub use models::{ColumnDescriptor, EntityCollection, EntityMetadata, EntitySchema};

use super::constants::edm::EDM_NS;
use crate::error::{ExtractorError, Result};
use roxmltree::{Document, Node};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize)]
struct CollectionEnvelope {
    value: Vec<EntityCollection>,
}

/// Parse the JSON body of `Metadata/DataEntities`
pub fn parse_entity_collections(body: &str) -> Result<Vec<EntityCollection>> {
    let envelope: CollectionEnvelope = serde_json::from_str(body)
        .map_err(|e| ExtractorError::Metadata(format!("Invalid DataEntities response: {}", e)))?;
    Ok(envelope.value)
}

/// Parse the EDMX document and build schemas for every entity type that is
/// exposed as a public collection.
pub fn parse_schema(metadata_xml: &str, collections: &[EntityCollection]) -> Result<EntityMetadata> {
    log::debug!("Parsing metadata XML, {} bytes", metadata_xml.len());

    let doc = Document::parse(metadata_xml)
        .map_err(|e| ExtractorError::Metadata(format!("Failed to parse metadata XML: {}", e)))?;

    let collections_by_entity: HashMap<&str, &str> = collections
        .iter()
        .filter_map(|c| Some((c.public_entity_name.as_deref()?, c.collection_name()?)))
        .collect();

    let mut schemas = EntityMetadata::new();

    for entity_type in doc.descendants().filter(|n| n.has_tag_name((EDM_NS, "EntityType"))) {
        let Some(entity_name) = entity_type.attribute("Name") else {
            continue;
        };
        let Some(collection) = collections_by_entity.get(entity_name) else {
            continue;
        };

        let primary_key = parse_key(entity_type);
        let columns = entity_type
            .children()
            .filter(|n| n.has_tag_name((EDM_NS, "Property")))
            .filter_map(|property| {
                let name = property.attribute("Name")?;
                Some(ColumnDescriptor {
                    name: name.to_string(),
                    edm_type: property.attribute("Type").map(str::to_string),
                    nullable: property.attribute("Nullable").map(|v| v != "false").unwrap_or(true),
                    is_primary_key: primary_key.iter().any(|key| key == name),
                })
            })
            .collect();

        schemas.insert(
            collection.to_string(),
            EntitySchema {
                entity_name: entity_name.to_string(),
                columns,
                primary_key,
            },
        );
    }

    log::info!("Parsed schemas for {} collections", schemas.len());
    Ok(schemas)
}

/// Key property names; an entity type without a `Key` element has none
fn parse_key(entity_type: Node) -> Vec<String> {
    entity_type
        .children()
        .find(|n| n.has_tag_name((EDM_NS, "Key")))
        .map(|key| {
            key.children()
                .filter(|n| n.has_tag_name((EDM_NS, "PropertyRef")))
                .filter_map(|r| r.attribute("Name").map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
