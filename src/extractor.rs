//! Paged extraction of one collection into an output table

use crate::api::client::unknown_endpoint;
use crate::api::{DataQuery, DataQueryBuilder, ODataClient};
use crate::config::ExtractionSettings;
use crate::error::Result;
use crate::output::{TableManifest, TableWriter, map_column_name};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Output tables live under `<data_dir>/out/tables`
pub fn tables_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("out").join("tables")
}

pub fn table_path(data_dir: &Path, table_name: &str) -> PathBuf {
    tables_dir(data_dir).join(format!("{}.csv", table_name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub path: PathBuf,
    pub manifest_path: PathBuf,
    pub columns: Vec<String>,
    pub primary_key: Vec<String>,
    pub incremental: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub requests: u32,
    pub pages: u32,
    pub rows: u64,
    /// `None` when the collection returned no rows
    pub output: Option<OutputTable>,
}

#[derive(Debug)]
enum PageState {
    Start,
    Fetching(Option<String>),
    Done,
}

pub struct Extractor<'a> {
    client: &'a mut ODataClient,
    settings: ExtractionSettings,
    data_dir: PathBuf,
}

impl<'a> Extractor<'a> {
    pub fn new(client: &'a mut ODataClient, settings: ExtractionSettings, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            settings,
            data_dir: data_dir.into(),
        }
    }

    /// Download every page of the configured collection and write the table
    pub async fn run(self) -> Result<RunSummary> {
        let Extractor {
            client,
            settings,
            data_dir,
        } = self;

        let primary_key = resolve_primary_key(client, &settings).await?;
        let query = build_query(&settings, &primary_key);
        let path = table_path(&data_dir, &settings.table_name);
        info!("Downloading \"{}\" into {}", settings.endpoint, path.display());

        let mut writer = TableWriter::new(&path);
        let mut pages = 0u32;
        let mut state = PageState::Start;

        loop {
            state = match state {
                PageState::Start => PageState::Fetching(None),
                PageState::Fetching(continuation) => {
                    let page = client.download_page(&query, continuation.as_deref()).await?;
                    pages += 1;

                    if page.is_empty() {
                        debug!("Page {} is empty, stopping", pages);
                        PageState::Done
                    } else {
                        writer.write_page(&page.rows)?;
                        info!(
                            "Downloaded page {} with {} rows ({} total)",
                            pages,
                            page.len(),
                            writer.rows_written()
                        );
                        match page.next_link {
                            Some(next_link) => PageState::Fetching(Some(next_link)),
                            None => PageState::Done,
                        }
                    }
                }
                PageState::Done => break,
            };
        }

        let rows = writer.rows_written();
        let columns = writer.finalize()?;
        info!("Made {} requests to the endpoint. Downloaded total {} rows.", pages, rows);
        debug!("Made {} API calls in total", client.request_count());

        let output = match columns {
            Some(columns) => Some(write_manifest(path, columns, &primary_key, &settings)?),
            None => {
                info!("No rows returned for \"{}\", no table written", settings.endpoint);
                None
            }
        };

        Ok(RunSummary {
            requests: client.request_count(),
            pages,
            rows,
            output,
        })
    }
}

async fn resolve_primary_key(client: &mut ODataClient, settings: &ExtractionSettings) -> Result<Vec<String>> {
    let schemas = client.list_schema().await?;
    let schema = schemas
        .get(&settings.endpoint)
        .ok_or_else(|| unknown_endpoint(&settings.endpoint))?;

    if !settings.primary_key.is_empty() {
        debug!("Using configured primary key {:?}", settings.primary_key);
        return Ok(settings.primary_key.clone());
    }

    if schema.primary_key.is_empty() {
        warn!("Entity \"{}\" declares no key, the table will have no primary key", schema.entity_name);
    }
    Ok(schema.primary_key.clone())
}

fn build_query(settings: &ExtractionSettings, primary_key: &[String]) -> DataQuery {
    let mut builder = DataQueryBuilder::new(&settings.endpoint)
        .select(&settings.columns)
        .raw_query(settings.query.as_deref());

    if settings.include_primary_key {
        for column in primary_key {
            builder = builder.ensure_selected(column);
        }
    }

    builder.build()
}

fn write_manifest(
    path: PathBuf,
    columns: Vec<String>,
    primary_key: &[String],
    settings: &ExtractionSettings,
) -> Result<OutputTable> {
    let mut manifest_key = Vec::new();
    for key in primary_key {
        let mapped = map_column_name(key).unwrap_or_else(|| key.clone());
        if columns.contains(&mapped) {
            manifest_key.push(mapped);
        } else {
            warn!(
                "Primary key column \"{}\" is not part of the output, leaving it out of the manifest",
                mapped
            );
        }
    }

    let manifest = TableManifest {
        columns: columns.clone(),
        primary_key: manifest_key.clone(),
        incremental: settings.incremental,
    };
    let manifest_path = manifest.write(&path)?;

    Ok(OutputTable {
        path,
        manifest_path,
        columns,
        primary_key: manifest_key,
        incremental: settings.incremental,
    })
}
