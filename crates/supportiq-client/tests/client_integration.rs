//! End-to-end client behavior against a mock backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::json;
use supportiq_client::{
    ApiClient, ApiRequest, ApiResponse, Error, ListItem, ListQuery, Method, accessor_fn,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> supportiq_client::ClientBuilder {
    ApiClient::builder().base_url(format!("{}/prod", server.uri()))
}

#[tokio::test]
async fn sends_api_key_and_bearer_from_accessor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prod/users"))
        .and(header("x-api-key", "K"))
        .and(header("authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server)
        .api_key("K")
        .token_accessor(accessor_fn(|| async { Ok(Some("Bearer T".to_string())) }))
        .build()
        .unwrap();

    let response = client.get("users").await.unwrap();
    assert_eq!(response, ApiResponse::Json(json!([{ "id": 1 }])));
}

#[tokio::test]
async fn unauthorized_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prod/list"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Unauthorized" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server)
        .token_accessor(accessor_fn(|| async { Ok(Some("Bearer expired".to_string())) }))
        .build()
        .unwrap();

    let err = client.get("list").await.unwrap_err();
    match &err {
        Error::RequestFailed {
            status,
            status_text,
            body,
        } => {
            assert_eq!(*status, 401);
            assert_eq!(status_text, "Unauthorized");
            assert!(body.contains("Unauthorized"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn no_credentials_means_no_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let client = client_for(&server)
        .token_accessor(accessor_fn(|| async { Ok(None) }))
        .build()
        .unwrap();
    let response = client.get("ping").await.unwrap();
    assert_eq!(response.as_text(), Some("pong"));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("authorization").is_none());
    assert!(received[0].headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn accessor_consulted_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let client = client_for(&server)
        .token_accessor(accessor_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(Some(format!("Bearer t{n}"))) }
        }))
        .build()
        .unwrap();

    client.get("a").await.unwrap();
    client.get("b").await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].headers.get("authorization").unwrap(), "Bearer t1");
    assert_eq!(received[1].headers.get("authorization").unwrap(), "Bearer t2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn accessor_failure_aborts_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server)
        .token_accessor(accessor_fn(|| async {
            Err(Error::Credentials("refresh rejected".to_string()))
        }))
        .build()
        .unwrap();

    let err = client.get("list").await.unwrap_err();
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn json_body_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prod/list"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "jobName": "call-9" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "id": "9", "jobName": "call-9" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).build().unwrap();
    let created: serde_json::Value = client
        .post_json("list", &json!({ "jobName": "call-9" }))
        .await
        .unwrap();
    assert_eq!(created["id"], "9");
}

#[tokio::test]
async fn caller_content_type_overrides_default() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(header("content-type", "application/merge-patch+json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).build().unwrap();
    let request = ApiRequest::new(Method::Put, "list/1")
        .body(json!({ "name": "x" }))
        .header("Content-Type", "application/merge-patch+json")
        .unwrap();
    client.request(request).await.unwrap();
}

#[tokio::test]
async fn empty_json_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server).build().unwrap();
    let response = client.delete("list/1").await.unwrap();
    assert_eq!(response, ApiResponse::Json(serde_json::Value::Null));
}

#[tokio::test]
async fn absolute_url_bypasses_base() {
    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&other)
        .await;

    let client = ApiClient::builder()
        .base_url("https://api.invalid/prod")
        .build()
        .unwrap();
    let response = client
        .get(&format!("{}/health", other.uri()))
        .await
        .unwrap();
    assert_eq!(response.as_text(), Some("ok"));
}

#[tokio::test]
async fn list_calls_with_query_and_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prod/list"))
        .and(query_param("pageSize", "2"))
        .and(query_param("filter", "agent=Sam"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "jobName": "call-1" },
            { "jobName": "call-2" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).build().unwrap();
    let page = client
        .calls()
        .list(ListQuery {
            page_size: Some(2),
            filter: Some("agent=Sam".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.total_count, 2);
    assert_eq!(page.items[1].label(), "call-2");
}

#[tokio::test]
async fn get_call_and_entities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prod/list/abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "abc", "confidence": 0.8 })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/prod/entities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "PERSON": 3 })))
        .mount(&server)
        .await;

    let client = client_for(&server).build().unwrap();
    let item = client.calls().get("abc").await.unwrap();
    assert_eq!(item.confidence, Some(0.8));

    let entities = client.calls().entities().await.unwrap();
    assert_eq!(entities["PERSON"], 3);
}

#[tokio::test]
async fn missing_call_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such item"))
        .mount(&server)
        .await;

    let client = client_for(&server).build().unwrap();
    let err = client.calls().get("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_update_and_delete_call_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prod/list"))
        .and(body_partial_json(json!({ "jobName": "refund-call" })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id": "c-1", "jobName": "refund-call" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/prod/list/c-1"))
        .and(body_partial_json(json!({ "description": "escalated" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c-1",
            "jobName": "refund-call",
            "description": "escalated"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/prod/list/c-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let calls = client_for(&server).build().unwrap().calls();

    let created = calls
        .create(&ListItem {
            job_name: Some("refund-call".to_string()),
            ..ListItem::default()
        })
        .await
        .unwrap();
    assert_eq!(created.id.as_deref(), Some("c-1"));

    let updated = calls
        .update(
            "c-1",
            &ListItem {
                description: Some("escalated".to_string()),
                ..ListItem::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("escalated"));

    calls.delete("c-1").await.unwrap();
}

#[tokio::test]
async fn call_id_stays_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prod/list/a%2Fb%3Fc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "a/b?c" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).build().unwrap();
    let item = client.calls().get("a/b?c").await.unwrap();
    assert_eq!(item.id.as_deref(), Some("a/b?c"));
}
