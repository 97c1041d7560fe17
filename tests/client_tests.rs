use leo_setup::remote::{list_brokers, upsert, ApiConnector, CirconusConnector};
use leo_setup::SetupError;
use mockito::Matcher;
use pretty_assertions::assert_eq;
use serde_json::json;

mod common;
use common::test_helpers::*;

#[tokio::test]
async fn test_requests_carry_auth_headers() {
    let mut server = setup_test_server().await;
    let mock = server
        .mock("GET", "/broker")
        .match_header("x-circonus-auth-token", "abc123")
        .match_header("x-circonus-app-name", "leo-setup")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"_cid": "/broker/42", "_name": "Chicago"}, {"_cid": "/broker/abc"}]"#)
        .create_async()
        .await;

    let api = CirconusConnector::new(server.url()).connect("abc123").unwrap();
    let brokers = list_brokers(api.as_ref()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(brokers.len(), 2);
    assert_eq!(brokers[0].name, "Chicago");
    assert_eq!(brokers[0].id, Some(42));
    assert_eq!(brokers[1].name, "abc");
    assert_eq!(brokers[1].id, None);
}

#[tokio::test]
async fn test_custom_app_name() {
    let mut server = setup_test_server().await;
    let mock = server
        .mock("GET", "/user/current")
        .match_header("x-circonus-app-name", "provisioner")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let api = CirconusConnector::new(server.url())
        .with_app_name("provisioner")
        .connect("abc123")
        .unwrap();
    api.get("/user/current").await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_becomes_api_error() {
    let mut server = setup_test_server().await;
    let _m = server
        .mock("GET", "/broker")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code": 403, "message": "Invalid token"}"#)
        .create_async()
        .await;

    let api = CirconusConnector::new(server.url()).connect("bad").unwrap();
    let result = api.get("/broker").await;

    match result {
        Err(SetupError::Api { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "Invalid token");
        }
        other => panic!("expected an API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upsert_over_http_creates_then_updates() {
    let mut server = setup_test_server().await;
    let lookup = Matcher::AllOf(vec![
        Matcher::UrlEncoded("f_title".into(), "10.0.0.5".into()),
        Matcher::UrlEncoded("f_tags_has".into(), "created-by:leo".into()),
    ]);
    let payload = json!({"title": "10.0.0.5", "tags": ["created-by:leo"], "graphs": []});

    let empty = server
        .mock("GET", "/worksheet")
        .match_query(lookup.clone())
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/worksheet")
        .match_body(Matcher::Json(payload.clone()))
        .with_status(200)
        .with_body(r#"{"_cid": "/worksheet/9f2"}"#)
        .create_async()
        .await;

    let api = CirconusConnector::new(server.url()).connect("abc123").unwrap();
    let filters = [("f_title", "10.0.0.5"), ("f_tags_has", "created-by:leo")];
    let created = upsert(api.as_ref(), "worksheet", &filters, &payload).await.unwrap();

    empty.assert_async().await;
    create.assert_async().await;
    assert!(created.created);
    assert_eq!(created.cid, "/worksheet/9f2");

    empty.remove_async().await;
    let _found = server
        .mock("GET", "/worksheet")
        .match_query(lookup)
        .with_status(200)
        .with_body(r#"[{"_cid": "/worksheet/9f2"}, {"_cid": "/worksheet/old"}]"#)
        .create_async()
        .await;
    let update = server
        .mock("PUT", "/worksheet/9f2")
        .match_body(Matcher::Json(payload.clone()))
        .with_status(200)
        .with_body(r#"{"_cid": "/worksheet/9f2"}"#)
        .create_async()
        .await;

    let updated = upsert(api.as_ref(), "worksheet", &filters, &payload).await.unwrap();

    update.assert_async().await;
    assert!(!updated.created);
    assert_eq!(updated.stale, vec!["/worksheet/old".to_string()]);
}

#[test]
fn test_connect_requires_token() {
    let result = CirconusConnector::default().connect("");
    assert!(matches!(result, Err(SetupError::Validation(_))));
}
