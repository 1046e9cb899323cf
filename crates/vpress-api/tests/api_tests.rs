//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;
use vpress_api::{create_router, ApiConfig, AppState};
use vpress_models::{BodyBlock, DocumentId, GeneratedArticle, VideoId};
use vpress_store::{Collection, ContentStore, MemoryStore};
use vpress_worker::video_source::{RawVideo, VideoPage};
use vpress_worker::{
    ArticleRequest, ArticleWriter, MediaImporter, Pipeline, PipelineConfig, PipelineDeps,
    PipelineRunner, Transcript, TranscriptSource, VideoProvider, VideoSourceClient, WorkerResult,
    WorkerServices,
};

const SECRET: &str = "trigger-secret";

// =============================================================================
// Fakes
// =============================================================================

struct Feed(Vec<&'static str>);

#[async_trait]
impl VideoProvider for Feed {
    async fn fetch_page(&self, _channel_id: &str, _cursor: Option<&str>) -> WorkerResult<VideoPage> {
        Ok(VideoPage {
            items: self
                .0
                .iter()
                .map(|id| RawVideo {
                    video_id: id.to_string(),
                    title: format!("Video {}", id),
                    description: String::new(),
                    thumbnail_url: None,
                    published_at: None,
                    duration: None,
                    view_count: None,
                })
                .collect(),
            next_cursor: None,
        })
    }
}

struct Transcripts;

#[async_trait]
impl TranscriptSource for Transcripts {
    async fn extract(&self, video_id: &VideoId, language: &str) -> WorkerResult<Option<Transcript>> {
        Ok(Some(Transcript {
            text: format!("Spoken words of {}", video_id),
            language: language.to_string(),
        }))
    }
}

/// Writer that optionally waits on a gate before answering.
struct Writer {
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl ArticleWriter for Writer {
    async fn generate(&self, request: &ArticleRequest<'_>) -> WorkerResult<GeneratedArticle> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(GeneratedArticle {
            title: request.title.to_string(),
            excerpt: "Summary".to_string(),
            body: vec![BodyBlock::paragraph("Body.")],
            tags: vec!["news".to_string()],
        })
    }
}

struct NoMedia;

#[async_trait]
impl MediaImporter for NoMedia {
    async fn import_thumbnail(&self, _url: &str, _alt: &str) -> Option<DocumentId> {
        None
    }
}

// =============================================================================
// Harness
// =============================================================================

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    runner: Arc<PipelineRunner>,
}

fn test_app(secret: &str, videos: Vec<&'static str>, gate: Option<Arc<Notify>>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let deps = PipelineDeps {
        store: store.clone(),
        discovery: Arc::new(VideoSourceClient::new(Arc::new(Feed(videos)), 5)),
        transcripts: Arc::new(Transcripts),
        writer: Some(Arc::new(Writer { gate }) as Arc<dyn ArticleWriter>),
        media: Arc::new(NoMedia),
    };
    let runner = Arc::new(PipelineRunner::new(
        Pipeline::new(deps, PipelineConfig::default()),
        Duration::from_secs(30),
    ));

    let config = ApiConfig {
        trigger_secret: secret.to_string(),
        trigger_rate_limit_rps: 100,
        ..Default::default()
    };
    let services = WorkerServices {
        store: store.clone(),
        runner: runner.clone(),
    };
    let router = create_router(AppState::new(config, services), None);

    TestApp { router, store, runner }
}

async fn add_source(store: &MemoryStore) {
    store
        .create(
            Collection::Authors,
            json!({"name": "Channel", "channelId": "UC1", "active": true}),
        )
        .await
        .unwrap();
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", SECRET))
        .body(Body::empty())
        .unwrap()
}

fn anonymous(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = test_app(SECRET, vec![], None);

    for path in ["/health", "/healthz"] {
        let (status, body) = send(&app.router, anonymous("GET", path)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["version"].is_string());
    }
}

#[tokio::test]
async fn test_ready_reflects_store_reachability() {
    let app = test_app(SECRET, vec![], None);

    let (status, body) = send(&app.router, anonymous("GET", "/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    app.store.set_unavailable(Collection::Authors, true).await;
    let (status, body) = send(&app.router, anonymous("GET", "/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["store"], "unavailable");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = test_app(SECRET, vec![], None);
    let request = Request::builder()
        .uri("/health")
        .header("X-Request-ID", "req-42")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["X-Request-ID"], "req-42");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_trigger_requires_credentials() {
    let app = test_app(SECRET, vec!["v1"], None);
    add_source(&app.store).await;

    let (status, body) = send(&app.router, anonymous("POST", "/api/pipeline/run")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/pipeline/run")
        .header("Authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, anonymous("GET", "/api/pipeline/run?secret=nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing ran
    assert_eq!(app.store.count(Collection::Videos).await, 0);
}

#[tokio::test]
async fn test_empty_configured_secret_rejects_everything() {
    let app = test_app("", vec!["v1"], None);

    let (status, _) = send(&app.router, anonymous("GET", "/api/pipeline/run?secret=")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, anonymous("GET", "/api/pipeline/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Pipeline routes
// =============================================================================

#[tokio::test]
async fn test_trigger_with_bearer_returns_summary() {
    let app = test_app(SECRET, vec!["v1", "v2"], None);
    add_source(&app.store).await;

    let (status, body) = send(&app.router, authed("POST", "/api/pipeline/run")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 2);
    assert_eq!(body["articles"], 2);
    assert_eq!(body["errors"], 0);
    assert!(body["message"].as_str().unwrap().contains("2 processed"));
}

#[tokio::test]
async fn test_trigger_with_query_secret() {
    let app = test_app(SECRET, vec!["v1"], None);
    add_source(&app.store).await;

    let uri = format!("/api/pipeline/run?secret={}", SECRET);
    let (status, body) = send(&app.router, anonymous("GET", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);

    // Second run finds nothing new
    let (_, body) = send(&app.router, anonymous("GET", &uri)).await;
    assert_eq!(body["processed"], 0);
    assert_eq!(body["articles"], 0);
}

#[tokio::test]
async fn test_total_failure_is_500() {
    let app = test_app(SECRET, vec!["v1"], None);
    app.store.set_unavailable(Collection::Authors, true).await;

    let (status, body) = send(&app.router, authed("POST", "/api/pipeline/run")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "pipeline_failed");
}

#[tokio::test]
async fn test_status_reports_last_run() {
    let app = test_app(SECRET, vec!["v1"], None);
    add_source(&app.store).await;

    let (status, body) = send(&app.router, authed("GET", "/api/pipeline/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert!(body["lastRun"].is_null());

    send(&app.router, authed("POST", "/api/pipeline/run")).await;

    let (_, body) = send(&app.router, authed("GET", "/api/pipeline/status")).await;
    assert_eq!(body["lastRun"]["summary"]["processed"], 1);
    assert_eq!(body["lastRun"]["timedOut"], false);
}

#[tokio::test]
async fn test_reprocess_deletes_and_reruns() {
    let app = test_app(SECRET, vec!["v1", "v2"], None);
    add_source(&app.store).await;
    let source_id = vpress_store::document_id(&app.store.documents(Collection::Authors).await[0]).unwrap();

    for (id, status) in [("v1", "failed"), ("v2", "no_transcript")] {
        app.store
            .create(
                Collection::Videos,
                json!({
                    "videoId": id,
                    "title": id,
                    "youtubeUrl": format!("https://www.youtube.com/watch?v={}", id),
                    "author": source_id.as_str(),
                    "publishedAt": "2024-03-01T10:00:00Z",
                    "status": status,
                }),
            )
            .await
            .unwrap();
    }

    let (status, body) = send(&app.router, authed("POST", "/api/pipeline/reprocess")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted"], 2);
    assert_eq!(body["pipeline"], json!({"processed": 2, "articles": 2, "errors": 0}));
}

#[tokio::test]
async fn test_trigger_while_running_is_409() {
    let gate = Arc::new(Notify::new());
    let app = test_app(SECRET, vec!["v1"], Some(gate.clone()));
    add_source(&app.store).await;

    let runner = app.runner.clone();
    let background = tokio::spawn(async move { runner.try_run().await });

    while !app.runner.is_running() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, body) = send(&app.router, authed("POST", "/api/pipeline/run")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_running");

    let (status, _) = send(&app.router, authed("POST", "/api/pipeline/reprocess")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app.router, authed("GET", "/api/pipeline/status")).await;
    assert_eq!(body["running"], true);

    gate.notify_one();
    assert!(background.await.unwrap().unwrap().is_completed());
    assert!(!app.runner.is_running());
}

#[tokio::test]
async fn test_trigger_rate_limit() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app(SECRET, vec![], None);
    let config = ApiConfig {
        trigger_secret: SECRET.to_string(),
        trigger_rate_limit_rps: 1,
        ..Default::default()
    };
    let services = WorkerServices {
        store,
        runner: app.runner.clone(),
    };
    let router = create_router(AppState::new(config, services), None);

    let (status, _) = send(&router, authed("GET", "/api/pipeline/status")).await;
    assert_eq!(status, StatusCode::OK);

    let response = router.clone().oneshot(authed("GET", "/api/pipeline/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["Retry-After"], "1");

    // Health routes are not limited
    let (status, _) = send(&router, anonymous("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
}
