//! Wire-level tests of the HTTP gateways against a mock registry.

use std::time::Duration;

use minion_core::{
    AspectDefinition, EventId, GatewayError, RecordsQuery, RegistryGateway, RetryPolicy,
    TenantGateway, TenantId, WebHookAcknowledgement,
};
use minion_gateway::{HttpRegistryClient, HttpTenantClient, SESSION_HEADER, TENANT_HEADER};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry(server: &MockServer, retries: u32) -> HttpRegistryClient {
    HttpRegistryClient::new(
        server.uri(),
        "session-token",
        TenantId(0),
        RetryPolicy {
            max_retries: retries,
            delay: Duration::from_millis(1),
            backoff_factor: 1.0,
        },
    )
    .expect("client")
}

fn hook_json() -> serde_json::Value {
    json!({
        "id": "indexer",
        "name": "indexer",
        "url": "http://indexer:6123/hook",
        "active": true,
        "enabled": true,
        "eventTypes": ["CreateRecord", "PatchRecord"],
        "config": {
            "aspects": ["x"],
            "optionalAspects": [],
            "includeEvents": false,
            "includeAspectDefinitions": false,
            "dereference": true,
            "includeRecords": true
        },
        "lastEvent": 12,
        "retryCount": 0
    })
}

// ---------------------------------------------------------------------------
// 1. Webhooks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_webhook_is_none_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hooks/indexer"))
        .and(header(SESSION_HEADER, "session-token"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let hook = registry(&server, 0).get_webhook("indexer").await.expect("lookup");
    assert!(hook.is_none());
}

#[tokio::test]
async fn existing_webhook_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hooks/indexer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hook_json()))
        .mount(&server)
        .await;

    let hook = registry(&server, 0)
        .get_webhook("indexer")
        .await
        .expect("lookup")
        .expect("hook present");
    assert_eq!(hook.last_event_id_received, Some(EventId(12)));
    assert_eq!(hook.config.aspects, vec!["x"]);
}

#[tokio::test]
async fn webhook_id_is_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hooks/my%20minion"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    registry(&server, 0).get_webhook("my minion").await.expect("lookup");
}

#[tokio::test]
async fn resume_ack_posts_null_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/indexer/ack"))
        .and(body_json(json!({ "succeeded": false, "lastEventIdReceived": null })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "lastEventIdReceived": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let response = registry(&server, 0)
        .ack_webhook("indexer", &WebHookAcknowledgement::resume())
        .await
        .expect("ack");
    assert_eq!(response.last_event_id_received, Some(EventId(1)));
}

// ---------------------------------------------------------------------------
// 2. Records and aspects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn records_page_request_carries_filters_and_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/records"))
        .and(query_param("aspect", "x"))
        .and(query_param("optionalAspect", "y"))
        .and(query_param("dereference", "true"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": 3,
            "hasMore": true,
            "nextPageToken": "abc",
            "records": [{ "id": "r1", "name": "one", "aspects": { "x": {} } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/records"))
        .and(query_param("pageToken", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": 3,
            "hasMore": false,
            "records": [{ "id": "r2" }, { "id": "r3" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = registry(&server, 0);
    let mut query = RecordsQuery {
        aspects: vec!["x".to_string()],
        optional_aspects: vec!["y".to_string()],
        dereference: true,
        page_token: None,
        limit: None,
    };
    let first = client.get_records(&query).await.expect("first page");
    assert_eq!(first.records.len(), 1);
    query.page_token = first.next_cursor().map(str::to_string);

    let second = client.get_records(&query).await.expect("second page");
    assert_eq!(second.records.len(), 2);
    assert_eq!(second.next_cursor(), None);
}

#[tokio::test]
async fn aspect_definition_is_written_with_target_tenant_header() {
    let server = MockServer::start().await;
    let definition = AspectDefinition {
        id: "quality".to_string(),
        name: "Quality".to_string(),
        json_schema: json!({ "type": "object" }),
    };
    Mock::given(method("PUT"))
        .and(path("/aspects/quality"))
        .and(header(TENANT_HEADER, "7"))
        .and(body_json(json!({
            "id": "quality",
            "name": "Quality",
            "jsonSchema": { "type": "object" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "quality",
            "name": "Quality",
            "jsonSchema": { "type": "object" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let written = registry(&server, 0)
        .put_aspect_definition(&definition, TenantId(7))
        .await
        .expect("write");
    assert_eq!(written, definition);
}

// ---------------------------------------------------------------------------
// 3. Failures and retries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hooks/indexer"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hooks/indexer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hook_json()))
        .expect(1)
        .mount(&server)
        .await;

    let hook = registry(&server, 2).get_webhook("indexer").await.expect("lookup");
    assert!(hook.is_some());
}

#[tokio::test]
async fn bad_request_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/hooks/indexer"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid hook"))
        .expect(1)
        .mount(&server)
        .await;

    let hook = serde_json::from_value(hook_json()).expect("hook");
    let err = registry(&server, 3).put_webhook(&hook).await.unwrap_err();
    match err {
        GatewayError::Status { status, body, .. } => {
            assert_eq!(status, 400);
            assert_eq!(body, "invalid hook");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_registry_is_a_transient_transport_error() {
    let client = HttpRegistryClient::new(
        "http://127.0.0.1:9",
        "session-token",
        TenantId(0),
        RetryPolicy::none(),
    )
    .expect("client");
    let err = client.get_webhook("indexer").await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }), "got: {err}");
    assert!(err.is_transient());
}

// ---------------------------------------------------------------------------
// 4. Tenants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tenant_list_is_cached_for_the_refresh_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tenants"))
        .and(header(SESSION_HEADER, "session-token"))
        .and(header(TENANT_HEADER, "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "domainname": "one.example", "enabled": true },
            { "id": 2, "domainname": "two.example", "enabled": true }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpTenantClient::new(
        server.uri(),
        "session-token",
        RetryPolicy::none(),
        Duration::from_secs(3600),
    )
    .expect("client");

    let first = client.get_tenants().await.expect("tenants");
    let second = client.get_tenants().await.expect("cached tenants");
    assert_eq!(first, second);
    assert_eq!(first[1].id, TenantId(2));
    assert_eq!(first[0].domain_name, "one.example");
}

#[tokio::test]
async fn zero_refresh_interval_always_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tenants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let client =
        HttpTenantClient::new(server.uri(), "session-token", RetryPolicy::none(), Duration::ZERO)
            .expect("client");
    client.get_tenants().await.expect("first");
    client.get_tenants().await.expect("second");
}
