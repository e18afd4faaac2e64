//! Synchronous actions: short calls whose result is printed as JSON on stdout

use crate::api::HttpTransport;
use crate::config::Config;
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// One option of a UI select box
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SelectElement {
    pub value: String,
    pub label: String,
}

impl SelectElement {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value).context("Failed to serialize action result")?;
    println!("{}", json);
    Ok(())
}

pub async fn endpoint_elements(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<Vec<SelectElement>> {
    let mut client = super::build_client(config, transport)?;
    let collections = client.list_entity_collections().await?;

    Ok(collections
        .iter()
        .filter_map(|c| c.collection_name())
        .map(SelectElement::new)
        .collect())
}

pub async fn column_elements(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<Vec<SelectElement>> {
    let endpoint = config.endpoint()?.to_string();
    let mut client = super::build_client(config, transport)?;
    let columns = client.list_columns(&endpoint).await?;

    Ok(columns.into_iter().map(SelectElement::new).collect())
}

/// Print `[{"value", "label"}]` for every entity collection
pub async fn list_endpoints_command(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<()> {
    let elements = endpoint_elements(config, transport).await?;
    info!("Found {} endpoints", elements.len());
    print_json(&elements)
}

/// Print `[{"value", "label"}]` for every column of the configured endpoint
pub async fn list_columns_command(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<()> {
    let elements = column_elements(config, transport).await?;
    info!("Found {} columns", elements.len());
    print_json(&elements)
}

pub async fn test_connection_command(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<()> {
    let mut client = super::build_client(config, transport)?;
    client.test_connection().await?;
    print_json(&serde_json::json!({"status": "success"}))
}
