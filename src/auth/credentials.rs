use crate::error::{ExtractorError, Result};
use log::info;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// OAuth application credentials plus the current refresh token.
///
/// The refresh token is replaced whenever the identity provider rotates it,
/// so a `Credentials` value is owned by exactly one token manager per run.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub organization_url: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("organization_url", &self.organization_url)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// OAuth broker payload (`#data`), a JSON document holding the refresh token
#[derive(Debug, Deserialize)]
struct OAuthData {
    refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        organization_url: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            organization_url: organization_url.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Build credentials from an OAuth app key/secret and the serialized `#data` payload
    pub fn from_oauth(
        organization_url: &str,
        app_key: &str,
        app_secret: &str,
        data: &str,
    ) -> Result<Credentials> {
        let parsed: OAuthData = serde_json::from_str(data).map_err(|e| {
            ExtractorError::config(format!("Authorization data is not valid JSON: {}", e))
        })?;

        let refresh_token = parsed
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ExtractorError::config("The configuration is not authorized. Please authorize it first.")
            })?;

        let credentials = Credentials::new(app_key, app_secret, organization_url, refresh_token);
        credentials.validate()?;
        Ok(credentials)
    }

    /// Read credentials from `DYNAMICS_*` environment variables
    pub fn from_env(organization_url: Option<&str>) -> Result<Credentials> {
        info!("Importing credentials from environment variables");

        let organization_url = match organization_url {
            Some(url) => url.to_string(),
            None => env_var("DYNAMICS_ORGANIZATION_URL")?,
        };

        let credentials = Credentials {
            client_id: env_var("DYNAMICS_CLIENT_ID")?,
            client_secret: env_var("DYNAMICS_CLIENT_SECRET")?,
            organization_url,
            refresh_token: env_var("DYNAMICS_REFRESH_TOKEN")?,
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Load a specific `.env` file and read credentials from it
    pub fn from_env_file(path: &str, organization_url: Option<&str>) -> Result<Credentials> {
        info!("Importing credentials from .env file: {}", path);

        if !Path::new(path).exists() {
            return Err(ExtractorError::config(format!("Environment file not found: {}", path)));
        }

        dotenvy::from_path(path).map_err(|e| {
            ExtractorError::config(format!("Failed to load .env file '{}': {}", path, e))
        })?;

        Self::from_env(organization_url)
    }

    pub fn validate(&self) -> Result<()> {
        if self.organization_url.trim().is_empty() {
            return Err(ExtractorError::config("You must fill in the Organization URL"));
        }
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(ExtractorError::config(
                "OAuth client id and client secret must both be provided",
            ));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(ExtractorError::config(
                "The configuration is not authorized. Please authorize it first.",
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ExtractorError::config(format!("{} environment variable not set", name)))
}
