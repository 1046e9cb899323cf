//! External service clients against mock HTTP servers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vpress_models::{BlockKind, VideoId};
use vpress_store::{Collection, MemoryStore};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vpress_worker::generator::{GeminiBackend, OpenAiBackend};
use vpress_worker::retry::RetryConfig;
use vpress_worker::thumbnail::ThumbnailConfig;
use vpress_worker::transcript::{CaptionMode, CaptionStrategy, YoutubeCaptions};
use vpress_worker::video_source::{YoutubeConfig, YoutubeDataApi};
use vpress_worker::{
    ArticleGenerator, ArticleRequest, ArticleWriter, GeneratorConfig, MediaImporter,
    ThumbnailImporter, TranscriptExtractor, TranscriptSource, VideoDiscovery, VideoSourceClient,
    WorkerError,
};

// =============================================================================
// YouTube Data API
// =============================================================================

fn youtube(server: &MockServer) -> YoutubeDataApi {
    YoutubeDataApi::new(YoutubeConfig {
        api_key: Some("yt-key".to_string()),
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn playlist_item(id: &str, title: &str) -> serde_json::Value {
    json!({
        "snippet": {
            "title": title,
            "description": "about it",
            "publishedAt": "2024-05-01T08:00:00Z",
            "thumbnails": {
                "high": {"url": format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id)}
            },
            "resourceId": {"videoId": id}
        },
        "contentDetails": {"videoId": id, "videoPublishedAt": "2024-05-01T07:00:00Z"}
    })
}

#[tokio::test]
async fn test_youtube_discovery_filters_known_and_enriches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .and(query_param("playlistId", "UUabc"))
        .and(query_param("key", "yt-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [playlist_item("old1", "Old"), playlist_item("new1", "Fresh")],
            "nextPageToken": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("part", "contentDetails,statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "new1", "contentDetails": {"duration": "PT1H2M3S"}, "statistics": {"viewCount": "1234"}},
                {"id": "old1", "contentDetails": {"duration": "PT30S"}}
            ]
        })))
        .mount(&server)
        .await;

    let client = VideoSourceClient::new(Arc::new(youtube(&server)), 3);
    let known = HashSet::from([VideoId::from("old1")]);

    let videos = client.list_new_videos("UCabc", 5, &known).await.unwrap();

    assert_eq!(videos.len(), 1);
    let video = &videos[0];
    assert_eq!(video.video_id, VideoId::from("new1"));
    assert_eq!(video.title, "Fresh");
    assert_eq!(video.duration, "1:02:03");
    assert_eq!(video.view_count, 1234);
    assert_eq!(video.thumbnail_url, "https://i.ytimg.com/vi/new1/hqdefault.jpg");
    assert_eq!(video.youtube_url, "https://www.youtube.com/watch?v=new1");
    assert_eq!(video.published_at.to_rfc3339(), "2024-05-01T07:00:00+00:00");
}

#[tokio::test]
async fn test_youtube_resolves_handles_and_follows_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/channels"))
        .and(query_param("forHandle", "newsroom"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"contentDetails": {"relatedPlaylists": {"uploads": "UUxyz"}}}]
        })))
        // Resolved once, then reused for the second page
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [playlist_item("b", "Second page")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .and(query_param("playlistId", "UUxyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [playlist_item("a", "First page")],
            "nextPageToken": "p2"
        })))
        .mount(&server)
        .await;

    // Enrichment failures are not fatal
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = VideoSourceClient::new(Arc::new(youtube(&server)), 3);
    let videos = client.list_new_videos("@newsroom", 2, &HashSet::new()).await.unwrap();

    let ids: Vec<_> = videos.iter().map(|v| v.video_id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(videos[0].view_count, 0);
}

#[tokio::test]
async fn test_youtube_quota_error_fails_discovery() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
        .mount(&server)
        .await;

    let client = VideoSourceClient::new(Arc::new(youtube(&server)), 3);
    let err = client
        .list_new_videos("UCabc", 5, &HashSet::new())
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), Some(403));
}

#[test]
fn test_youtube_requires_api_key() {
    let err = YoutubeDataApi::new(YoutubeConfig::default()).err().unwrap();
    assert!(matches!(err, WorkerError::ConfigError(_)));
}

// =============================================================================
// Captions
// =============================================================================

fn watch_page(server: &MockServer) -> String {
    format!(
        r#"<html><script>var ytInitialPlayerResponse = {{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{uri}/api/timedtext?lang=en&kind=asr","languageCode":"en","kind":"asr","name":{{"simpleText":"English [auto]"}}}},{{"baseUrl":"{uri}/api/timedtext?lang=ar","languageCode":"ar","name":{{"simpleText":"Arabic"}}}}]}}}}}};</script></html>"#,
        uri = server.uri()
    )
}

async fn mount_captions(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", "vid1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(watch_page(server)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .and(query_param("lang", "ar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<transcript><text start="0" dur="2">مرحبا &amp; أهلا</text><text start="2" dur="2">بكم</text></transcript>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<transcript><text start="0">Hello &#39;world&#39;</text><text start="1">Hello &#39;world&#39;</text><text start="2">again</text></transcript>"#,
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_captions_in_requested_language() {
    let server = MockServer::start().await;
    mount_captions(&server).await;

    let captions = YoutubeCaptions::new(reqwest::Client::new(), server.uri(), CaptionMode::Requested);
    let transcript = captions
        .fetch(&VideoId::from("vid1"), "ar")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(transcript.text, "مرحبا & أهلا بكم");
    assert_eq!(transcript.language, "ar");
}

#[tokio::test]
async fn test_requested_language_missing_falls_through_to_any_language() {
    let server = MockServer::start().await;
    mount_captions(&server).await;

    let requested = YoutubeCaptions::new(reqwest::Client::new(), server.uri(), CaptionMode::Requested);
    assert!(requested
        .fetch(&VideoId::from("vid1"), "fr")
        .await
        .unwrap()
        .is_none());

    let extractor = TranscriptExtractor::new(
        vec![
            Arc::new(requested) as Arc<dyn CaptionStrategy>,
            Arc::new(YoutubeCaptions::new(
                reqwest::Client::new(),
                server.uri(),
                CaptionMode::AnyAvailable,
            )),
        ],
        RetryConfig::new("transcript").with_max_retries(0),
    );

    let transcript = extractor
        .extract(&VideoId::from("vid1"), "fr")
        .await
        .unwrap()
        .unwrap();
    // Manual Arabic track beats the auto-generated English one
    assert_eq!(transcript.language, "ar");
}

#[tokio::test]
async fn test_video_without_captions_yields_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no player</html>"))
        .mount(&server)
        .await;

    let captions = YoutubeCaptions::new(reqwest::Client::new(), server.uri(), CaptionMode::AnyAvailable);
    assert!(captions
        .fetch(&VideoId::from("vid2"), "en")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_rate_limited_watch_page_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let captions = YoutubeCaptions::new(reqwest::Client::new(), server.uri(), CaptionMode::Requested);
    let err = captions.fetch(&VideoId::from("vid3"), "en").await.unwrap_err();
    assert!(err.is_transient_network_error());
}

// =============================================================================
// Generators
// =============================================================================

fn article_json() -> String {
    json!({
        "title": "Storm reaches the coast",
        "excerpt": "Heavy rain expected.",
        "paragraphs": [
            {"type": "heading", "text": "What happened"},
            {"type": "paragraph", "text": "The storm arrived overnight."}
        ],
        "tags": ["weather", "storm"]
    })
    .to_string()
}

fn request<'a>() -> ArticleRequest<'a> {
    ArticleRequest {
        transcript: "the storm arrived overnight and heavy rain is expected",
        title: "Storm live",
        source_name: "News Channel",
        source_url: "https://www.youtube.com/watch?v=vid1",
        language: "en",
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new("article_generation")
        .with_max_retries(2)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(2))
}

#[tokio::test]
async fn test_openai_backend_generates_article() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": article_json()}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-test", "gpt-4o-mini", server.uri(), Duration::from_secs(5)).unwrap();
    let generator = ArticleGenerator::new(Arc::new(backend), &GeneratorConfig::default());

    let article = generator.generate(&request()).await.unwrap();
    assert_eq!(article.title, "Storm reaches the coast");
    assert_eq!(article.body.len(), 2);
    assert_eq!(article.body[0].kind, BlockKind::Heading);
    assert_eq!(article.tags, vec!["weather", "storm"]);
}

#[tokio::test]
async fn test_openai_retries_rate_limits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": article_json()}}]
        })))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-test", "gpt-4o-mini", server.uri(), Duration::from_secs(5)).unwrap();
    let generator =
        ArticleGenerator::new(Arc::new(backend), &GeneratorConfig::default()).with_retry(fast_retry());

    assert!(generator.generate(&request()).await.is_ok());
}

#[tokio::test]
async fn test_openai_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-test", "gpt-4o-mini", server.uri(), Duration::from_secs(5)).unwrap();
    let generator =
        ArticleGenerator::new(Arc::new(backend), &GeneratorConfig::default()).with_retry(fast_retry());

    let err = generator.generate(&request()).await.unwrap_err();
    assert_eq!(err.http_status(), Some(400));
}

#[tokio::test]
async fn test_gemini_backend_generates_article() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": format!("```json\n{}\n```", article_json())}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new("g-key", "gemini-2.5-flash", server.uri(), Duration::from_secs(5)).unwrap();
    let generator = ArticleGenerator::new(Arc::new(backend), &GeneratorConfig::default());

    let article = generator.generate(&request()).await.unwrap();
    assert_eq!(article.excerpt, "Heavy rain expected.");
}

#[tokio::test]
async fn test_gemini_server_errors_exhaust_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new("g-key", "gemini-2.5-flash", server.uri(), Duration::from_secs(5)).unwrap();
    let generator =
        ArticleGenerator::new(Arc::new(backend), &GeneratorConfig::default()).with_retry(fast_retry());

    let err = generator.generate(&request()).await.unwrap_err();
    assert!(err.is_transient_service_error());
}

// =============================================================================
// Thumbnails
// =============================================================================

#[tokio::test]
async fn test_thumbnail_imported_into_store() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/thumb.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G', 1, 2, 3]),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let importer = ThumbnailImporter::new(store.clone(), ThumbnailConfig::default()).unwrap();

    let id = importer
        .import_thumbnail(&format!("{}/thumb.png", server.uri()), "Storm coverage")
        .await;

    assert!(id.is_some());
    let media = store.documents(Collection::Media).await;
    assert_eq!(media.len(), 1);
    assert_eq!(media[0]["alt"], json!("Storm coverage"));
    assert_eq!(media[0]["mimeType"], json!("image/png"));
    assert!(media[0]["filename"]
        .as_str()
        .is_some_and(|f| f.starts_with("yt-Storm-coverage-") && f.ends_with(".png")));
}

#[tokio::test]
async fn test_thumbnail_failures_are_swallowed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/huge.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let importer = ThumbnailImporter::new(
        store.clone(),
        ThumbnailConfig {
            timeout: Duration::from_secs(5),
            max_bytes: 16,
        },
    )
    .unwrap();

    assert!(importer
        .import_thumbnail(&format!("{}/missing.jpg", server.uri()), "x")
        .await
        .is_none());
    assert!(importer
        .import_thumbnail(&format!("{}/huge.jpg", server.uri()), "x")
        .await
        .is_none());
    assert!(importer.import_thumbnail("", "x").await.is_none());
    assert_eq!(store.count(Collection::Media).await, 0);
}
