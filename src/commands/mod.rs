//! Command handlers shared by the CLI subcommands and configuration actions

pub mod run;
pub mod sync;

use crate::api::{HttpTransport, ODataClient, RetryPolicy, TokenManager};
use crate::config::{Action, Config};
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

pub use run::run_command;
pub use sync::{SelectElement, list_columns_command, list_endpoints_command, test_connection_command};

/// Build an authenticated client from the configuration
pub fn build_client(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<ODataClient> {
    let credentials = config.credentials()?;
    let retry_policy = RetryPolicy::new(config.retry_config()?);

    let tokens = TokenManager::new(credentials, Arc::clone(&transport))
        .with_token_url(config.token_url())
        .with_retry_policy(retry_policy.clone());

    Ok(ODataClient::new(tokens, transport)
        .with_retry_policy(retry_policy)
        .with_page_size(config.page_size()?)
        .with_formatted_values(config.parameters.include_formatted_values))
}

/// Execute one action end to end
pub async fn dispatch(
    action: Action,
    config: &Config,
    data_dir: &Path,
    transport: Arc<dyn HttpTransport>,
) -> anyhow::Result<()> {
    match action {
        Action::Run => run_command(config, data_dir, transport).await.map(|_| ()),
        Action::ListEndpoints => list_endpoints_command(config, transport).await,
        Action::ListColumns => list_columns_command(config, transport).await,
        Action::TestConnection => test_connection_command(config, transport).await,
    }
}
