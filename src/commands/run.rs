use crate::api::HttpTransport;
use crate::config::Config;
use crate::extractor::{Extractor, RunSummary};
use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Download the configured endpoint into `<data_dir>/out/tables`
///
/// # Returns
/// * `Ok(RunSummary)` - Counters and the written table, if any
/// * `Err(anyhow::Error)` - Configuration, authentication, API or output error
pub async fn run_command(config: &Config, data_dir: &Path, transport: Arc<dyn HttpTransport>) -> Result<RunSummary> {
    let settings = config.extraction_settings()?;
    info!("Extracting endpoint \"{}\"", settings.endpoint);

    let mut client = super::build_client(config, transport)?;
    let endpoint = settings.endpoint.clone();

    let summary = Extractor::new(&mut client, settings, data_dir)
        .run()
        .await
        .with_context(|| format!("Extraction of \"{}\" failed", endpoint))?;

    if let Some(output) = &summary.output {
        info!("Table written to {}", output.path.display());
    }
    Ok(summary)
}
