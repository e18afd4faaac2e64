use super::auth::TokenManager;
use super::constants::{self, headers};
use super::metadata::{self, EntityCollection, EntityMetadata};
use super::query::{DataQuery, Page};
use super::resilience::RetryPolicy;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{AuthError, ExtractorError, Result, TransportError};
use serde_json::Value;
use std::sync::Arc;

/// Marker Dynamics puts in the error message of a `$select` on an unknown column
const UNKNOWN_PROPERTY_MARKER: &str = "Could not find a property named";

const NAVIGATION_PROPERTY_HINT: &str = "When querying foreign key fields, do not forget to omit the \"fk\" part \
     of the field, e.g. \"fk_accountid\" -> \"_accountid\". Please refer to the documentation for more information.";

/// Longest raw error body carried into an error message
const MAX_ERROR_BODY: usize = 1000;

/// Dynamics 365 OData client
///
/// Owns the [`TokenManager`] for the run. Every request goes through
/// [`send_authorized`](Self::send_authorized): bounded retries for transient
/// failures, and a single refresh-and-replay when the service answers 401.
pub struct ODataClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenManager,
    retry_policy: RetryPolicy,
    page_size: u32,
    include_formatted_values: bool,
    request_count: u32,
}

impl ODataClient {
    pub fn new(tokens: TokenManager, transport: Arc<dyn HttpTransport>) -> Self {
        let base_url = constants::normalize_base_url(&tokens.credentials().organization_url);
        Self {
            base_url,
            transport,
            tokens,
            retry_policy: RetryPolicy::default(),
            page_size: constants::DEFAULT_PAGE_SIZE,
            include_formatted_values: false,
            request_count: 0,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Ask the service to annotate option sets and lookups with display values
    pub fn with_formatted_values(mut self, include: bool) -> Self {
        self.include_formatted_values = include;
        self
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Logical requests issued so far (retries and replays not counted)
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Authenticate and hit the entity catalogue
    pub async fn test_connection(&mut self) -> Result<()> {
        let collections = self.list_entity_collections().await?;
        log::info!("Connection OK, {} entities available", collections.len());
        Ok(())
    }

    /// List the entity catalogue from `Metadata/DataEntities`
    pub async fn list_entity_collections(&mut self) -> Result<Vec<EntityCollection>> {
        let url = constants::data_entities_endpoint(&self.base_url);
        let request = self.json_request(&url);

        let response = self.send_authorized(request).await?;
        if !response.is_success() {
            return Err(api_error(&url, &response));
        }

        metadata::parse_entity_collections(&response.body)
    }

    /// Fetch `$metadata` and build schemas keyed by public collection name
    pub async fn list_schema(&mut self) -> Result<EntityMetadata> {
        let collections = self.list_entity_collections().await?;

        let url = constants::metadata_endpoint(&self.base_url);
        let request = self.base_request(&url).header("Accept", headers::ACCEPT_XML);

        let response = self.send_authorized(request).await?;
        if !response.is_success() {
            return Err(api_error(&url, &response));
        }

        metadata::parse_schema(&response.body, &collections)
    }

    /// Column names of one collection
    pub async fn list_columns(&mut self, endpoint: &str) -> Result<Vec<String>> {
        let schemas = self.list_schema().await?;
        schemas
            .get(endpoint)
            .map(|schema| schema.column_names())
            .ok_or_else(|| unknown_endpoint(endpoint))
    }

    /// Download one page of a collection.
    ///
    /// With a continuation URL the request goes there verbatim; it already
    /// carries the original selection and paging state.
    pub async fn download_page(&mut self, query: &DataQuery, continuation_url: Option<&str>) -> Result<Page> {
        let url = match continuation_url {
            Some(next_link) => next_link.to_string(),
            None => query.to_url(&self.base_url),
        };

        let mut prefer = headers::prefer_max_page_size(self.page_size);
        if self.include_formatted_values {
            prefer = format!("{},{}", prefer, headers::PREFER_FORMATTED_VALUES);
        }
        let request = self.json_request(&url).header("Prefer", prefer);

        let response = self.send_authorized(request).await?;
        if !response.is_success() {
            return Err(query_error(&query.collection, &response));
        }

        let json: Value = serde_json::from_str(&response.body)
            .map_err(|e| ExtractorError::Metadata(format!("Invalid JSON page from {}: {}", url, e)))?;
        Page::from_json(json)
    }

    /// Send a request with bearer auth, replaying it once after a 401.
    ///
    /// The first 401 invalidates the cached token and fetches a fresh one; a
    /// second 401 on the replay is fatal.
    async fn send_authorized(&mut self, mut request: HttpRequest) -> Result<HttpResponse> {
        self.request_count += 1;

        let token = self.tokens.get_access_token().await?;
        request.set_header("Authorization", format!("Bearer {}", token));

        let response = self.send_with_retry(&request).await?;
        if response.status != 401 {
            return Ok(response);
        }

        log::warn!("Received 401 from {}, refreshing access token and replaying the request", request.url);
        self.tokens.invalidate();
        let token = self.tokens.get_access_token().await?;
        request.set_header("Authorization", format!("Bearer {}", token));

        let replay = self.send_with_retry(&request).await?;
        if replay.status == 401 {
            return Err(AuthError::Unauthorized { url: request.url }.into());
        }

        Ok(replay)
    }

    async fn send_with_retry(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        log::debug!(
            "GET {} ({}: {})",
            request.url,
            headers::CLIENT_REQUEST_ID,
            request.header_value(headers::CLIENT_REQUEST_ID).unwrap_or("-")
        );

        let transport = Arc::clone(&self.transport);
        let response = self.retry_policy.execute(|| transport.send(request)).await?;

        log::debug!("Response status {} ({} bytes)", response.status, response.body.len());
        Ok(response)
    }

    fn base_request(&self, url: &str) -> HttpRequest {
        HttpRequest::get(url)
            .header("OData-Version", headers::ODATA_VERSION)
            .header("OData-MaxVersion", headers::ODATA_VERSION)
            .header(headers::CLIENT_REQUEST_ID, uuid::Uuid::new_v4().to_string())
    }

    fn json_request(&self, url: &str) -> HttpRequest {
        self.base_request(url).header("Accept", headers::CONTENT_TYPE_JSON)
    }
}

pub(crate) fn unknown_endpoint(endpoint: &str) -> ExtractorError {
    ExtractorError::config(format!(
        "Endpoint \"{}\" was not found in the Dynamics 365 metadata. Check the endpoint name or run list-endpoints.",
        endpoint
    ))
}

/// Pull the provider message out of an OData error body, falling back to the raw text
pub fn provider_error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("error_description"))
            .and_then(|m| m.as_str())
    });

    match message {
        Some(message) => message.to_string(),
        None => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "No error details returned".to_string()
            } else {
                trimmed.chars().take(MAX_ERROR_BODY).collect()
            }
        }
    }
}

fn api_error(url: &str, response: &HttpResponse) -> ExtractorError {
    ExtractorError::Api {
        url: url.to_string(),
        status: response.status,
        message: provider_error_message(&response.body),
    }
}

fn query_error(endpoint: &str, response: &HttpResponse) -> ExtractorError {
    let message = provider_error_message(&response.body);
    let hint = message
        .contains(UNKNOWN_PROPERTY_MARKER)
        .then(|| NAVIGATION_PROPERTY_HINT.to_string());

    ExtractorError::Query {
        endpoint: endpoint.to_string(),
        status: response.status,
        message,
        hint,
    }
}
