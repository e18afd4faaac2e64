use dynamics_extractor::api::{ODataClient, ReqwestTransport, TokenManager};
use dynamics_extractor::auth::Credentials;
use std::sync::Arc;

#[tokio::test]
#[ignore] // Requires real credentials in .env
async fn test_connection_with_real_credentials() -> anyhow::Result<()> {
    let credentials = Credentials::from_env_file(".env", None)?;
    let transport = Arc::new(ReqwestTransport::new()?);

    let tokens = TokenManager::new(credentials, transport.clone());
    let mut client = ODataClient::new(tokens, transport);

    client.test_connection().await?;
    Ok(())
}
