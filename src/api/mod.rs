//! Dynamics 365 OData API access
//!
//! Token refresh, the retrying/re-authenticating HTTP layer, entity metadata
//! and paged data downloads.

pub mod auth;
pub mod client;
pub mod constants;
pub mod metadata;
pub mod query;
pub mod resilience;
pub mod transport;

pub use auth::TokenManager;
pub use client::ODataClient;
pub use metadata::{ColumnDescriptor, EntityCollection, EntityMetadata, EntitySchema};
pub use query::{DataQuery, DataQueryBuilder, Page};
pub use resilience::{RetryConfig, RetryPolicy, RetryableError};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
