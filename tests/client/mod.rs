use crate::support::*;
use dynamics_extractor::api::{DataQueryBuilder, HttpResponse};
use dynamics_extractor::error::{AuthError, ExtractorError, TransportError};
use serde_json::json;

fn bearer(request: &dynamics_extractor::api::HttpRequest) -> Option<&str> {
    request.header_value("Authorization")
}

#[tokio::test]
async fn test_unauthorized_triggers_one_refresh_and_replay() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(401, "")
        .respond(200, token_body("access-2", "refresh-2"))
        .respond(200, entities_body());

    let mut client = client(&transport);
    let collections = client.list_entity_collections().await.unwrap();
    assert_eq!(collections.len(), 3);

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(bearer(&requests[1]), Some("Bearer access-1"));
    assert_eq!(bearer(&requests[3]), Some("Bearer access-2"));
    assert_eq!(requests[1].url, requests[3].url);

    assert_eq!(client.token_manager().refresh_count(), 2);
    assert_eq!(client.token_manager().refresh_token(), "refresh-2");
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_second_unauthorized_is_fatal_without_third_attempt() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(401, "")
        .respond(200, token_body("access-2", "refresh-2"))
        .respond(401, "");

    let mut client = client(&transport);
    let error = client.list_entity_collections().await.unwrap_err();

    assert!(matches!(error, ExtractorError::Auth(AuthError::Unauthorized { .. })));
    assert_eq!(error.exit_code(), 1);
    assert_eq!(transport.requests().len(), 4);
    assert_eq!(transport.pending(), 0);
}

#[tokio::test]
async fn test_server_errors_are_retried_up_to_the_bound() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(503, "Service Unavailable")
        .respond(503, "Service Unavailable")
        .respond(503, "Service Unavailable");

    let mut client = client(&transport).with_retry_policy(fast_retry(3));
    let error = client.list_entity_collections().await.unwrap_err();

    match &error {
        ExtractorError::Api { status, message, .. } => {
            assert_eq!(*status, 503);
            assert_eq!(message, "Service Unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(error.exit_code(), 2);
    assert_eq!(transport.requests().len(), 4);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(404, odata_error("Resource not found for the segment 'Metadata'."));

    let mut client = client(&transport).with_retry_policy(fast_retry(5));
    let error = client.list_entity_collections().await.unwrap_err();

    assert!(matches!(error, ExtractorError::Api { status: 404, .. }));
    assert_eq!(error.exit_code(), 1);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_throttling_and_network_failures_recover() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond_with(HttpResponse::new(429, "").with_header("Retry-After", "0"))
        .fail(TransportError::Connect("connection reset".to_string()))
        .respond(200, entities_body());

    let mut client = client(&transport).with_retry_policy(fast_retry(4));
    let collections = client.list_entity_collections().await.unwrap();

    assert_eq!(collections.len(), 3);
    assert_eq!(transport.requests().len(), 4);
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_exhausted_timeouts_surface_as_transport_error() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .fail(TransportError::Timeout("read timed out".to_string()))
        .fail(TransportError::Timeout("read timed out".to_string()));

    let mut client = client(&transport).with_retry_policy(fast_retry(2));
    let error = client.list_entity_collections().await.unwrap_err();

    assert!(matches!(error, ExtractorError::Transport(TransportError::Timeout(_))));
    assert_eq!(error.exit_code(), 2);
}

#[tokio::test]
async fn test_page_request_headers() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(200, page_body(json!([{"accountid": "1"}]), None));

    let mut client = client(&transport).with_page_size(500).with_formatted_values(true);
    let query = DataQueryBuilder::new("accounts").select(&["accountid", "name"]).build();
    let page = client.download_page(&query, None).await.unwrap();
    assert_eq!(page.len(), 1);
    assert!(!page.has_more());

    let request = &transport.data_requests()[0];
    assert_eq!(request.url, "https://org.example.com/data/accounts?$select=accountid,name");
    assert_eq!(
        request.header_value("Prefer"),
        Some("odata.maxpagesize=500,odata.include-annotations=\"OData.Community.Display.V1.FormattedValue\"")
    );
    assert_eq!(request.header_value("OData-Version"), Some("4.0"));
    assert!(request.header_value("x-ms-client-request-id").is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_unknown_property_error_carries_hint() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(
            400,
            odata_error("Could not find a property named 'fk_parentaccountid' on type 'Microsoft.Dynamics.CRM.account'."),
        );

    let mut client = client(&transport);
    let query = DataQueryBuilder::new("accounts").select(&["fk_parentaccountid"]).build();
    let error = client.download_page(&query, None).await.unwrap_err();

    let message = error.to_string();
    assert!(message.starts_with("Could not query endpoint \"accounts\". Received: 400 - Could not find a property named"));
    assert!(message.contains("\"fk_accountid\" -> \"_accountid\""));
    assert_eq!(error.exit_code(), 1);
}

#[tokio::test]
async fn test_list_columns_of_unknown_endpoint_is_config_error() {
    let transport = ScriptedTransport::new();
    script_preamble(&transport);

    let mut client = client(&transport);
    let error = client.list_columns("invoices").await.unwrap_err();

    assert!(matches!(error, ExtractorError::Config(_)));
    assert!(error.to_string().contains("invoices"));
}

#[tokio::test]
async fn test_list_columns_from_metadata() {
    let transport = ScriptedTransport::new();
    script_preamble(&transport);

    let mut client = client(&transport);
    let columns = client.list_columns("accounts").await.unwrap();

    assert_eq!(columns, vec!["accountid", "name", "revenue", "_parentaccountid_value"]);
}

#[tokio::test]
async fn test_unauthorized_continuation_page_is_replayed_to_same_link() {
    let next_link = "https://org.example.com/data/accounts?$skiptoken=%3Ccookie%20pagenumber=%222%22%20/%3E";
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(200, page_body(json!([{"accountid": "a1"}]), Some(next_link)))
        .respond(401, "")
        .respond(200, token_body("access-2", "refresh-2"))
        .respond(200, page_body(json!([{"accountid": "a2"}]), None));

    let mut client = client(&transport);
    let query = DataQueryBuilder::new("accounts").select(&["accountid"]).build();

    let first = client.download_page(&query, None).await.unwrap();
    let link = first.next_link.unwrap();
    let second = client.download_page(&query, Some(&link)).await.unwrap();
    assert_eq!(second.len(), 1);
    assert!(!second.has_more());

    let pages = transport.data_requests();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[1].url, next_link);
    assert_eq!(pages[2].url, next_link);
    assert_eq!(bearer(&pages[1]), Some("Bearer access-1"));
    assert_eq!(bearer(&pages[2]), Some("Bearer access-2"));
    assert_eq!(pages[2].header_value("Prefer"), Some("odata.maxpagesize=2000"));
    assert_eq!(transport.token_requests().len(), 2);
    assert_eq!(client.request_count(), 2);
}
