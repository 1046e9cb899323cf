//! Payload REST client tests against a mock CMS.

use std::io::Write;

use serde_json::json;
use vpress_models::DocumentId;
use vpress_store::{
    Collection, ContentStore, Filter, MediaUpload, PayloadClient, PayloadConfig, RetryConfig,
    StoreError,
};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> PayloadClient {
    let config = PayloadConfig::new(server.uri())
        .with_api_key("secret-key")
        .with_page_size(2)
        .with_retry(RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        });
    PayloadClient::new(config).unwrap()
}

#[tokio::test]
async fn test_find_walks_every_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/videos"))
        .and(query_param("where[author][equals]", "7"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "2"))
        .and(header("authorization", "users API-Key secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{"id": 1, "videoId": "a"}, {"id": 2, "videoId": "b"}],
            "hasNextPage": true,
            "nextPage": 2,
            "totalDocs": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/videos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{"id": 3, "videoId": "c"}],
            "hasNextPage": false,
            "nextPage": null,
            "totalDocs": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let docs = client(&server)
        .find(Collection::Videos, &Filter::all().equals("author", "7"))
        .await
        .unwrap();

    let ids: Vec<_> = docs.iter().map(|d| d["videoId"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_find_without_next_page_number_advances_by_one() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{"id": 1}, {"id": 2}],
            "hasNextPage": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{"id": 3}],
            "hasNextPage": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let docs = client(&server)
        .find(Collection::Articles, &Filter::all())
        .await
        .unwrap();
    assert_eq!(docs.len(), 3);
}

#[tokio::test]
async fn test_find_rejects_next_page_that_does_not_advance() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{"id": 1}],
            "hasNextPage": true,
            "nextPage": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .find(Collection::Articles, &Filter::all())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_find_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/authors"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/authors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{"id": 1, "name": "A", "channelId": "UC1"}],
            "hasNextPage": false
        })))
        .mount(&server)
        .await;

    let docs = client(&server)
        .find(Collection::Authors, &Filter::all())
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn test_create_returns_document() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/videos"))
        .and(body_partial_json(json!({"videoId": "abc", "status": "fetched"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Video successfully created.",
            "doc": {"id": 41, "videoId": "abc", "status": "fetched"}
        })))
        .mount(&server)
        .await;

    let doc = client(&server)
        .create(Collection::Videos, json!({"videoId": "abc", "status": "fetched"}))
        .await
        .unwrap();
    assert_eq!(doc["id"], 41);
}

#[tokio::test]
async fn test_create_maps_unique_violation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/videos"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{
                "name": "ValidationError",
                "message": "The following field is invalid: videoId",
                "data": {"errors": [{"path": "videoId", "message": "Value must be unique"}]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .create(Collection::Videos, json!({"videoId": "abc"}))
        .await
        .unwrap_err();
    assert!(err.is_already_exists(), "got {err:?}");
}

#[tokio::test]
async fn test_writes_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/videos/9"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .update(Collection::Videos, &DocumentId::from("9"), json!({"status": "failed"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ServerError(500, _)));
}

#[tokio::test]
async fn test_delete_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/videos/5"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let err = client(&server)
        .delete(Collection::Videos, &DocumentId::from("5"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_upload_media_multipart() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/media"))
        .and(header("authorization", "users API-Key secret-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "doc": {"id": "m-1", "filename": "yt-clip.jpg"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"\xff\xd8\xff").unwrap();

    let id = client(&server)
        .upload_media(MediaUpload {
            path: file.path().to_path_buf(),
            filename: "yt-clip.jpg".into(),
            mime_type: "image/jpeg".into(),
            alt: "Clip".into(),
        })
        .await
        .unwrap();
    assert_eq!(id.as_str(), "m-1");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"_payload\""));
    assert!(body.contains("{\"alt\":\"Clip\"}"));
    assert!(body.contains("filename=\"yt-clip.jpg\""));
}

#[tokio::test]
async fn test_health_check_reports_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/authors"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server).health_check().await.unwrap_err();
    assert!(matches!(err, StoreError::AuthError(_)));
}
