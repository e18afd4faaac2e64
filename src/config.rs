use crate::api::constants;
use crate::api::resilience::RetryConfig;
use crate::auth::Credentials;
use crate::error::{ExtractorError, Result};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Largest page the Dynamics Web API will honor
pub const MAX_PAGE_SIZE: u32 = 5000;

/// Upper bound for `max_retries`
pub const MAX_RETRIES: u32 = 20;

const NOT_AUTHORIZED: &str = "The configuration is not authorized. Please authorize it first.";

/// OAuth app credentials as stored by the platform's OAuth broker
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCredentials {
    #[serde(rename = "appKey")]
    pub app_key: String,
    #[serde(rename = "#appSecret")]
    pub app_secret: String,
    /// JSON document holding the refresh token
    #[serde(rename = "#data")]
    pub data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthApi {
    #[serde(default)]
    pub credentials: Option<OAuthCredentials>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub oauth_api: Option<OAuthApi>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Destination {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default = "default_true")]
    pub incremental: bool,
    /// Append primary-key columns to an explicit column selection
    #[serde(default = "default_true")]
    pub include_primary_key: bool,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            primary_key: Vec::new(),
            incremental: true,
            include_primary_key: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub organization_url: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub include_formatted_values: bool,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub custom_credentials: Option<OAuthCredentials>,
    #[serde(default)]
    pub token_url: Option<String>,
}

fn default_page_size() -> u32 {
    constants::DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            organization_url: None,
            endpoint: None,
            columns: Vec::new(),
            query: None,
            page_size: default_page_size(),
            include_formatted_values: false,
            max_retries: None,
            debug: false,
            destination: Destination::default(),
            custom_credentials: None,
            token_url: None,
        }
    }
}

/// Which operation a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    ListEndpoints,
    ListColumns,
    TestConnection,
}

impl Action {
    pub fn parse(name: &str) -> Result<Action> {
        match name {
            "" | "run" => Ok(Action::Run),
            "list_endpoints" => Ok(Action::ListEndpoints),
            "list_columns" => Ok(Action::ListColumns),
            "testConnection" | "test_connection" => Ok(Action::TestConnection),
            other => Err(ExtractorError::config(format!("Unknown action \"{}\"", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub authorization: Option<Authorization>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Everything the extraction loop needs from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub endpoint: String,
    pub columns: Vec<String>,
    pub query: Option<String>,
    pub table_name: String,
    pub primary_key: Vec<String>,
    pub incremental: bool,
    pub include_primary_key: bool,
}

impl Config {
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE_NAME)
    }

    /// Load a JSON or TOML (by extension) configuration file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| {
            ExtractorError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml(&content)?
        } else {
            Self::from_json(&content)?
        };

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ExtractorError::config(format!("Failed to parse config file: {}", e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ExtractorError::config(format!("Failed to parse config file: {}", e)))
    }

    pub fn action(&self) -> Result<Action> {
        Action::parse(self.action.as_deref().unwrap_or(""))
    }

    pub fn debug(&self) -> bool {
        self.parameters.debug
    }

    /// Organization URL from the parameters, falling back to `DYNAMICS_ORGANIZATION_URL`
    pub fn organization_url(&self) -> Result<String> {
        self.parameters
            .organization_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| std::env::var("DYNAMICS_ORGANIZATION_URL").ok().filter(|u| !u.trim().is_empty()))
            .ok_or_else(|| ExtractorError::config("You must fill in the Organization URL"))
    }

    /// Resolve credentials: custom credentials first, then the OAuth broker,
    /// then `DYNAMICS_*` environment variables.
    pub fn credentials(&self) -> Result<Credentials> {
        let organization_url = self.organization_url()?;

        let oauth = self.parameters.custom_credentials.as_ref().or_else(|| {
            self.authorization
                .as_ref()
                .and_then(|a| a.oauth_api.as_ref())
                .and_then(|o| o.credentials.as_ref())
        });

        if let Some(oauth) = oauth {
            return Credentials::from_oauth(&organization_url, &oauth.app_key, &oauth.app_secret, &oauth.data);
        }

        if std::env::var_os("DYNAMICS_REFRESH_TOKEN").is_some() {
            return Credentials::from_env(Some(&organization_url));
        }

        Err(ExtractorError::config(NOT_AUTHORIZED))
    }

    pub fn token_url(&self) -> &str {
        self.parameters
            .token_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(constants::TOKEN_URL)
    }

    pub fn retry_config(&self) -> Result<RetryConfig> {
        match self.parameters.max_retries {
            Some(retries) if retries > MAX_RETRIES => Err(ExtractorError::config(format!(
                "max_retries must be between 0 and {}, got {}",
                MAX_RETRIES, retries
            ))),
            Some(retries) => Ok(RetryConfig::with_max_retries(retries)),
            None => Ok(RetryConfig::default()),
        }
    }

    pub fn page_size(&self) -> Result<u32> {
        let size = self.parameters.page_size;
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ExtractorError::config(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, size
            )));
        }
        Ok(size)
    }

    /// The configured collection, required for `run` and `list_columns`
    pub fn endpoint(&self) -> Result<&str> {
        self.parameters
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ExtractorError::config(
                    "Missing required parameter: endpoint. The configuration is invalid. \
                     Please check that you added a configuration row.",
                )
            })
    }

    pub fn extraction_settings(&self) -> Result<ExtractionSettings> {
        let endpoint = self.endpoint()?.to_string();
        let destination = &self.parameters.destination;

        let table_name = match destination.table_name.trim() {
            "" => endpoint.clone(),
            name => name.to_string(),
        };

        Ok(ExtractionSettings {
            columns: self
                .parameters
                .columns
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            query: self.parameters.query.clone().filter(|q| !q.trim().is_empty()),
            table_name,
            primary_key: destination.primary_key.clone(),
            incremental: destination.incremental,
            include_primary_key: destination.include_primary_key,
            endpoint,
        })
    }
}
