//! Retry policies with exponential backoff
//!
//! Provides bounded retry logic for transient failures in Dynamics 365 API calls.
//! Both transport failures (timeouts, refused connections) and retryable HTTP
//! statuses (408, 429, 5xx) are retried; everything else is handed back to the
//! caller on the first attempt.

use crate::api::transport::HttpResponse;
use crate::error::TransportError;
use log::{debug, info, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Default backoff with a custom number of retries after the first attempt
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            ..Self::default()
        }
    }

    /// Single attempt, no waiting
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Types of errors and their retry behavior
#[derive(Debug, Clone, PartialEq)]
pub enum RetryableError {
    /// Network-level errors (connection refused, DNS, etc)
    Network,
    /// HTTP 5xx server errors
    ServerError(u16),
    /// HTTP 429 Too Many Requests
    RateLimited,
    /// HTTP 408 or a client-side timeout
    Timeout,
    /// Non-retryable client errors (4xx except 401, 403, 408, 429)
    ClientError(u16),
    /// Authentication/authorization errors, handled by re-authentication instead
    AuthError,
    /// Unknown/other errors
    Unknown,
}

impl RetryableError {
    /// Determine if this error type should be retried
    pub fn should_retry(&self) -> bool {
        match self {
            RetryableError::Network => true,
            RetryableError::ServerError(_) => true,
            RetryableError::RateLimited => true,
            RetryableError::Timeout => true,
            RetryableError::ClientError(_) => false,
            RetryableError::AuthError => false,
            RetryableError::Unknown => false,
        }
    }

    /// Classify an HTTP status code into retry behavior
    pub fn from_status_code(status: u16) -> Self {
        match status {
            401 | 403 => RetryableError::AuthError,
            408 => RetryableError::Timeout,
            429 => RetryableError::RateLimited,
            400..=499 => RetryableError::ClientError(status),
            500..=599 => RetryableError::ServerError(status),
            _ => RetryableError::Unknown,
        }
    }

    /// Classify a transport failure
    pub fn from_transport_error(error: &TransportError) -> Self {
        match error {
            TransportError::Timeout(_) => RetryableError::Timeout,
            TransportError::Connect(_) => RetryableError::Network,
            TransportError::Other(_) => RetryableError::Unknown,
        }
    }
}

/// Retry policy that implements exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a request with retry logic.
    ///
    /// A response with a non-retryable status is returned as-is, so the caller
    /// decides what a 401 or 404 means. A retryable status that survives every
    /// attempt is also returned as the final response.
    pub async fn execute<F, Fut>(&self, operation: F) -> Result<HttpResponse, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<HttpResponse, TransportError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("Executing request (attempt {}/{})", attempt, max_attempts);

            let (classification, retry_after) = match operation().await {
                Ok(response) => {
                    if response.is_success() {
                        if attempt > 1 {
                            info!("Request succeeded after {} attempts", attempt);
                        }
                        return Ok(response);
                    }

                    let classification = RetryableError::from_status_code(response.status);
                    if !classification.should_retry() || attempt >= max_attempts {
                        if classification.should_retry() {
                            warn!("Giving up after {} attempts, last status {}", attempt, response.status);
                        }
                        return Ok(response);
                    }

                    warn!("Request returned status {} on attempt {} (retryable)", response.status, attempt);
                    let retry_after = response.retry_after();
                    (classification, retry_after)
                }
                Err(error) => {
                    let classification = RetryableError::from_transport_error(&error);
                    let should_retry = classification.should_retry();

                    if !should_retry || attempt >= max_attempts {
                        warn!(
                            "Request failed permanently on attempt {} (should_retry: {}): {}",
                            attempt, should_retry, error
                        );
                        return Err(error);
                    }

                    warn!("Request failed on attempt {} (retryable): {}", attempt, error);
                    (classification, None)
                }
            };

            let mut delay = self.calculate_delay(attempt);
            if let Some(server_delay) = retry_after {
                delay = delay.max(server_delay.min(self.config.max_delay));
            }
            debug!("Waiting {:?} before retry ({:?})", delay, classification);
            tokio::time::sleep(delay).await;

            attempt += 1;
        }
    }

    /// Calculate exponential backoff delay with optional jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let mut delay = Duration::from_millis(delay_ms as u64);

        if delay > self.config.max_delay {
            delay = self.config.max_delay;
        }

        if self.config.jitter {
            let jitter_factor = rand::rng().random_range(0.5..=1.5);
            let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
            delay = Duration::from_millis(jittered_ms);
        }

        delay
    }
}
