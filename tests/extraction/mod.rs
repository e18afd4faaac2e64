use crate::support::*;
use dynamics_extractor::commands::{self, SelectElement};
use dynamics_extractor::config::Config;
use dynamics_extractor::error::{ExtractorError, exit_code_for};
use dynamics_extractor::output::TableManifest;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

const NEXT_LINK: &str = "https://org.example.com/data/accounts?$select=name,accountid&$skiptoken=%3Ccookie%20pagenumber=%222%22%20/%3E";

fn config(overrides: Value) -> Config {
    let mut parameters = json!({
        "organization_url": ORG_URL,
        "endpoint": "accounts",
        "token_url": TOKEN_URL,
        "max_retries": 0,
        "custom_credentials": {
            "appKey": "client-id",
            "#appSecret": "client-secret",
            "#data": "{\"refresh_token\": \"refresh-0\"}"
        }
    });
    if let (Some(target), Some(extra)) = (parameters.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    Config::from_json(&json!({ "parameters": parameters }).to_string()).unwrap()
}

fn read_manifest(table: &Path) -> TableManifest {
    let content = fs::read_to_string(TableManifest::path_for(table)).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn test_accounts_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    transport
        .respond(
            200,
            page_body(
                json!([
                    {"@odata.etag": "W/\"1001\"", "accountid": "a1", "name": "Contoso"},
                    {"@odata.etag": "W/\"1002\"", "accountid": "a2", "name": "Fabrikam, Inc.", "_parentaccountid_value": "a1"}
                ]),
                Some(NEXT_LINK),
            ),
        )
        .respond(200, page_body(json!([{"accountid": "a3", "name": "Northwind \"NW\""}]), None));

    let summary = commands::run_command(&config(json!({})), dir.path(), transport.clone())
        .await
        .unwrap();

    assert_eq!(summary.rows, 3);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.requests, 4);

    let output = summary.output.unwrap();
    assert_eq!(output.path, dir.path().join("out/tables/accounts.csv"));
    assert_eq!(output.columns, vec!["fk_parentaccountid_value", "accountid", "name"]);

    let content = fs::read_to_string(&output.path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            r#""fk_parentaccountid_value","accountid","name""#,
            r#""","a1","Contoso""#,
            r#""a1","a2","Fabrikam, Inc.""#,
            r#""","a3","Northwind ""NW""""#,
        ]
    );

    let manifest = read_manifest(&output.path);
    assert_eq!(manifest.columns, output.columns);
    assert_eq!(manifest.primary_key, vec!["accountid"]);
    assert!(manifest.incremental);
    assert_eq!(transport.pending(), 0);
}

#[tokio::test]
async fn test_empty_first_page_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    transport.respond(200, page_body(json!([]), Some(NEXT_LINK)));

    let summary = commands::run_command(&config(json!({})), dir.path(), transport.clone())
        .await
        .unwrap();

    assert_eq!(summary.rows, 0);
    assert!(summary.output.is_none());
    assert_eq!(transport.data_requests().len(), 1);
    assert!(!dir.path().join("out/tables/accounts.csv").exists());
    assert!(!dir.path().join("out/tables/accounts.csv.manifest").exists());
}

#[tokio::test]
async fn test_empty_terminal_page_stops_despite_link() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    transport
        .respond(200, page_body(json!([{"accountid": "a1"}]), Some(NEXT_LINK)))
        .respond(200, page_body(json!([{"accountid": "a2"}]), Some(NEXT_LINK)))
        .respond(200, page_body(json!([]), Some(NEXT_LINK)));

    let summary = commands::run_command(&config(json!({})), dir.path(), transport.clone())
        .await
        .unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(summary.pages, 3);
    assert_eq!(transport.data_requests().len(), 3);
    assert_eq!(transport.pending(), 0);
}

#[tokio::test]
async fn test_continuation_link_used_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    transport
        .respond(200, page_body(json!([{"name": "Contoso", "accountid": "a1"}]), Some(NEXT_LINK)))
        .respond(200, page_body(json!([{"name": "Fabrikam", "accountid": "a2"}]), None));

    let overrides = json!({"columns": ["name"], "query": "$filter=statecode eq 0"});
    commands::run_command(&config(overrides), dir.path(), transport.clone())
        .await
        .unwrap();

    let requests = transport.data_requests();
    assert_eq!(
        requests[0].url,
        "https://org.example.com/data/accounts?$select=name,accountid&$filter=statecode eq 0"
    );
    assert_eq!(requests[1].url, NEXT_LINK);
    assert_eq!(requests[1].header_value("Prefer"), Some("odata.maxpagesize=2000"));
}

#[tokio::test]
async fn test_configured_primary_key_and_table_name() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    transport.respond(200, page_body(json!([{"accountid": "a1", "name": "Contoso"}]), None));

    let overrides = json!({
        "destination": {"table_name": "crm_accounts", "primary_key": ["name"], "incremental": false}
    });
    let summary = commands::run_command(&config(overrides), dir.path(), transport.clone())
        .await
        .unwrap();

    let output = summary.output.unwrap();
    assert_eq!(output.path, dir.path().join("out/tables/crm_accounts.csv"));

    let manifest = read_manifest(&output.path);
    assert_eq!(manifest.primary_key, vec!["name"]);
    assert!(!manifest.incremental);
}

#[tokio::test]
async fn test_primary_key_left_out_when_not_selected() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    transport.respond(200, page_body(json!([{"name": "Contoso"}]), None));

    let overrides = json!({
        "columns": ["name"],
        "destination": {"include_primary_key": false}
    });
    let summary = commands::run_command(&config(overrides), dir.path(), transport.clone())
        .await
        .unwrap();

    assert_eq!(
        transport.data_requests()[0].url,
        "https://org.example.com/data/accounts?$select=name"
    );
    let manifest = read_manifest(&summary.output.unwrap().path);
    assert!(manifest.primary_key.is_empty());
}

#[tokio::test]
async fn test_unknown_endpoint_fails_as_user_error() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);

    let error = commands::run_command(&config(json!({"endpoint": "invoices"})), dir.path(), transport.clone())
        .await
        .unwrap_err();

    assert!(matches!(error.downcast_ref::<ExtractorError>(), Some(ExtractorError::Config(_))));
    assert_eq!(exit_code_for(&error), 1);
    assert!(transport.data_requests().is_empty());
}

#[tokio::test]
async fn test_query_error_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    transport
        .respond(200, page_body(json!([{"accountid": "a1"}]), Some(NEXT_LINK)))
        .respond(403, odata_error("Principal user is missing prvReadAccount privilege"));

    let error = commands::run_command(&config(json!({})), dir.path(), transport.clone())
        .await
        .unwrap_err();

    assert!(matches!(error.downcast_ref::<ExtractorError>(), Some(ExtractorError::Query { status: 403, .. })));
    assert_eq!(exit_code_for(&error), 1);
    assert!(!dir.path().join("out/tables/accounts.csv.manifest").exists());
}

#[tokio::test]
async fn test_sync_actions_list_endpoints_and_columns() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, token_body("access-1", "refresh-1"))
        .respond(200, entities_body());

    let endpoints = commands::sync::endpoint_elements(&config(json!({})), transport.clone())
        .await
        .unwrap();
    assert_eq!(endpoints, vec![SelectElement::new("accounts"), SelectElement::new("contacts")]);

    let transport = ScriptedTransport::new();
    script_preamble(&transport);
    let columns = commands::sync::column_elements(&config(json!({"endpoint": "contacts"})), transport.clone())
        .await
        .unwrap();
    assert_eq!(columns, vec![SelectElement::new("fullname")]);
}

#[tokio::test]
async fn test_missing_credentials_is_user_error() {
    let transport = ScriptedTransport::new();
    let config = Config::from_json(
        &json!({"parameters": {"organization_url": ORG_URL, "endpoint": "accounts"}}).to_string(),
    )
    .unwrap();

    // Only meaningful when the environment does not provide a refresh token
    if std::env::var_os("DYNAMICS_REFRESH_TOKEN").is_some() {
        return;
    }

    let error = commands::test_connection_command(&config, transport.clone())
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&error), 1);
    assert!(error.to_string().contains("not authorized"));
    assert!(transport.requests().is_empty());
}
