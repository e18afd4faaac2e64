//! API Constants for the Dynamics 365 OData endpoints

/// Azure AD v1 token endpoint used for the refresh-token grant
pub const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/token";

/// Path of the OData service root below the organization URL
pub const DATA_PATH: &str = "data";

/// Entity catalogue listing public collection names
pub const DATA_ENTITIES_PATH: &str = "Metadata/DataEntities";

/// Format requested from the `$metadata` document
pub const METADATA_FORMAT: &str = "application/atom;odata.metadata=minimal";

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 2000;

/// Annotation suffix Dynamics appends to formatted (display) values
pub const FORMATTED_VALUE_ANNOTATION: &str = "@OData.Community.Display.V1.FormattedValue";

/// Key of the continuation link in a page response
pub const NEXT_LINK_KEY: &str = "@odata.nextLink";

/// Standard headers for Dynamics 365 requests
pub mod headers {
    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Accept value for the EDMX metadata document
    pub const ACCEPT_XML: &str = "application/xml";

    /// OData version header
    pub const ODATA_VERSION: &str = "4.0";

    /// Correlation header echoed by Dynamics in its telemetry
    pub const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

    /// Prefer header asking only for formatted value annotations
    pub const PREFER_FORMATTED_VALUES: &str =
        "odata.include-annotations=\"OData.Community.Display.V1.FormattedValue\"";

    /// Prefer header for the server page size
    pub fn prefer_max_page_size(page_size: u32) -> String {
        format!("odata.maxpagesize={}", page_size)
    }
}

/// Namespace of the EDM elements in the `$metadata` document
pub mod edm {
    pub const EDM_NS: &str = "http://docs.oasis-open.org/odata/ns/edm";
}

/// Normalize an organization URL so it always ends with a single slash
pub fn normalize_base_url(organization_url: &str) -> String {
    format!("{}/", organization_url.trim().trim_end_matches('/'))
}

/// Build the OData service root, e.g. `https://org.example.com/data`
pub fn data_root(base_url: &str) -> String {
    format!("{}{}", normalize_base_url(base_url), DATA_PATH)
}

/// Build the collection endpoint URL for an entity set
pub fn entity_endpoint(base_url: &str, collection: &str) -> String {
    format!("{}/{}", data_root(base_url), collection.trim_matches('/'))
}

/// Build the DataEntities catalogue URL
pub fn data_entities_endpoint(base_url: &str) -> String {
    format!("{}{}", normalize_base_url(base_url), DATA_ENTITIES_PATH)
}

/// Build the `$metadata` URL
pub fn metadata_endpoint(base_url: &str) -> String {
    format!("{}/$metadata?$format={}", data_root(base_url), METADATA_FORMAT)
}
