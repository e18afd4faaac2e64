//! Resilience for Dynamics 365 API calls
//!
//! Bounded retry with exponential backoff for transient failures.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, RetryableError};
