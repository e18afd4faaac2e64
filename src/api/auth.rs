use super::constants::{self, headers};
use super::resilience::RetryPolicy;
use super::transport::{HttpRequest, HttpTransport};
use crate::auth::Credentials;
use crate::error::{AuthError, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tokens are treated as stale this long before the provider says they expire
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    /// Azure AD v1 returns this as a string, v2 as a number
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    fn expires_in(&self) -> Option<Duration> {
        let seconds = match self.expires_in.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64()?,
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        Some(Duration::from_secs(seconds))
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() + EXPIRY_SKEW < expires_at,
            None => true,
        }
    }
}

/// Exchanges the refresh token for bearer access tokens.
///
/// Owns the credentials for the lifetime of a run; when the identity provider
/// rotates the refresh token the new one replaces the stored value and is used
/// for every later refresh.
pub struct TokenManager {
    credentials: Credentials,
    token_url: String,
    transport: Arc<dyn HttpTransport>,
    retry_policy: RetryPolicy,
    cached: Option<CachedToken>,
    refresh_count: u32,
}

impl TokenManager {
    pub fn new(credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            token_url: constants::TOKEN_URL.to_string(),
            transport,
            retry_policy: RetryPolicy::default(),
            cached: None,
            refresh_count: 0,
        }
    }

    /// Use a different identity endpoint (sovereign clouds, tests)
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The refresh token that will be used for the next exchange
    pub fn refresh_token(&self) -> &str {
        &self.credentials.refresh_token
    }

    /// Number of successful token exchanges performed so far
    pub fn refresh_count(&self) -> u32 {
        self.refresh_count
    }

    /// Drop the cached access token, forcing the next call to re-authenticate
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Return a valid access token, refreshing it when none is cached
    pub async fn get_access_token(&mut self) -> Result<String> {
        if let Some(cached) = &self.cached {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
            log::debug!("Cached access token is about to expire, refreshing");
        }

        self.refresh().await
    }

    async fn refresh(&mut self) -> Result<String> {
        let resource = constants::normalize_base_url(&self.credentials.organization_url);
        let form = vec![
            ("client_id".to_string(), self.credentials.client_id.clone()),
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("client_secret".to_string(), self.credentials.client_secret.clone()),
            ("resource".to_string(), resource),
            ("refresh_token".to_string(), self.credentials.refresh_token.clone()),
        ];
        let request = HttpRequest::post_form(self.token_url.clone(), form)
            .header("Accept", headers::CONTENT_TYPE_JSON);

        log::info!("Refreshing access token for {}", self.credentials.organization_url);

        let transport = Arc::clone(&self.transport);
        let response = self
            .retry_policy
            .execute(|| transport.send(&request))
            .await?;

        log::debug!("Token request status: {}", response.status);

        if response.status != 200 {
            return Err(AuthError::TokenRefresh {
                status: response.status,
                body: response.body,
            }
            .into());
        }

        let token: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|_| AuthError::TokenRefresh { status: response.status, body: response.body.clone() })?;

        let access_token = token
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;

        if let Some(rotated) = token.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            if rotated != self.credentials.refresh_token {
                log::debug!("Identity provider rotated the refresh token");
                self.credentials.refresh_token = rotated.to_string();
            }
        }

        self.cached = Some(CachedToken {
            value: access_token.clone(),
            expires_at: token.expires_in().map(|ttl| Instant::now() + ttl),
        });
        self.refresh_count += 1;

        log::debug!("Access token refreshed successfully.");
        Ok(access_token)
    }
}
