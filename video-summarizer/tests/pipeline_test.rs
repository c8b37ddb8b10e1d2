//! End-to-end pipeline tests against mocked Gemini and DuckDuckGo APIs.
//!
//! Run with: `cargo test --package video-summarizer --test pipeline_test`

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use video_summarizer::agent::{AgentConfig, Analyzer, VideoAgent};
use video_summarizer::files::{FileService, FileState, GeminiFilesClient, PollPolicy, RemoteFile};
use video_summarizer::handler::{AgentFactory, AnalysisHandler};
use video_summarizer::search::DuckDuckGoProvider;
use video_summarizer::session::{BannerLevel, Session};
use video_summarizer::upload::VideoUpload;
use video_summarizer_common::error::{Error, ErrorKind};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const API_KEY: &str = "test-key";
const MODEL: &str = "gemini-2.0-flash-exp";

fn file_json(server: &MockServer, state: &str) -> Value {
    json!({
        "name": "files/abc",
        "displayName": "clip.mp4",
        "mimeType": "video/mp4",
        "sizeBytes": "11",
        "uri": format!("{}/v1beta/files/abc", server.uri()),
        "state": state
    })
}

/// Mount the resumable upload and a status endpoint that reports `final_state`.
async fn mount_files_api(server: &MockServer, final_state: &str) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("x-goog-api-key", API_KEY))
        .and(header("X-Goog-Upload-Protocol", "resumable"))
        .and(header("X-Goog-Upload-Command", "start"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-goog-upload-url", format!("{}/upload-session/abc", server.uri())),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload-session/abc"))
        .and(header("X-Goog-Upload-Offset", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "file": file_json(server, "PROCESSING") })),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc"))
        .and(header("x-goog-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(server, final_state)))
        .mount(server)
        .await;
}

fn generate_path() -> String {
    format!("/v1beta/models/{}:generateContent", MODEL)
}

fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

/// First call asks for a search, the call carrying the search result gets text.
async fn mount_generate_with_search(server: &MockServer, query: &str, answer: &str) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .and(body_string_contains("functionResponse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(answer)))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "duckduckgo_search", "args": { "query": query } } }]
                }
            }]
        })))
        .with_priority(2)
        .mount(server)
        .await;
}

fn pipeline(gemini: &MockServer, ddg: &MockServer, temp_dir: &std::path::Path) -> AnalysisHandler {
    let files: Arc<dyn FileService> =
        Arc::new(GeminiFilesClient::with_base_url(API_KEY, gemini.uri()));

    let search = Arc::new(DuckDuckGoProvider::with_base_url(ddg.uri()));
    let base = gemini.uri();
    let factory: AgentFactory = Arc::new(move || {
        Arc::new(VideoAgent::new(
            AgentConfig::default(),
            search.clone(),
            API_KEY,
            base.clone(),
        )) as Arc<dyn Analyzer>
    });

    let poll = PollPolicy {
        initial_interval: Duration::from_millis(5),
        backoff_multiplier: 1.0,
        max_interval: Duration::from_millis(5),
        max_wait: Duration::from_secs(5),
    };
    AnalysisHandler::with_deps(files, factory, poll).with_temp_dir(temp_dir)
}

fn video() -> VideoUpload {
    VideoUpload::new("clip.mp4", b"fake video!".to_vec())
}

fn dir_is_empty(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

async fn request_bodies(server: &MockServer, request_path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .filter_map(|r| serde_json::from_slice(&r.body).ok())
        .collect()
}

#[tokio::test]
async fn analysis_with_web_search_succeeds() {
    let gemini = MockServer::start().await;
    let ddg = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    mount_files_api(&gemini, "ACTIVE").await;
    mount_generate_with_search(&gemini, "red panda habitat", "The video shows a **red panda**.").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "red panda habitat"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"Heading": "Red panda", "AbstractText": "Small mammal of the eastern Himalayas.",
                "AbstractURL": "https://en.wikipedia.org/wiki/Red_panda", "RelatedTopics": []}"#,
        ))
        .expect(1)
        .mount(&ddg)
        .await;

    let handler = pipeline(&gemini, &ddg, temp.path());
    let report = handler
        .analyze(&video(), "What animal is this and where does it live?")
        .await
        .unwrap();

    assert_eq!(report.response.content, "The video shows a **red panda**.");
    assert_eq!(report.response.search_queries, vec!["red panda habitat"]);
    assert_eq!(report.file.name, "files/abc");
    assert!(report.cleanup_warning.is_none());
    assert!(dir_is_empty(temp.path()), "temp file must be removed");

    let bodies = request_bodies(&gemini, &generate_path()).await;
    assert_eq!(bodies.len(), 2);

    let first = &bodies[0];
    let parts = &first["contents"][0]["parts"];
    assert_eq!(parts[0]["fileData"]["fileUri"], format!("{}/v1beta/files/abc", gemini.uri()));
    assert!(
        parts[1]["text"]
            .as_str()
            .unwrap()
            .contains("What animal is this and where does it live?")
    );
    assert_eq!(first["tools"][0]["functionDeclarations"][0]["name"], "duckduckgo_search");
    assert!(
        first["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("markdown")
    );

    let second = &bodies[1];
    let response = &second["contents"][2]["parts"][0]["functionResponse"];
    assert_eq!(response["name"], "duckduckgo_search");
    assert_eq!(response["response"]["results"][0]["title"], "Red panda");
}

#[tokio::test]
async fn search_failure_is_reported_to_model() {
    let gemini = MockServer::start().await;
    let ddg = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    mount_files_api(&gemini, "ACTIVE").await;
    mount_generate_with_search(&gemini, "anything", "Answer from the video alone.").await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&ddg)
        .await;

    let handler = pipeline(&gemini, &ddg, temp.path());
    let report = handler.analyze(&video(), "Summarize").await.unwrap();
    assert_eq!(report.response.content, "Answer from the video alone.");

    let bodies = request_bodies(&gemini, &generate_path()).await;
    let response = &bodies[1]["contents"][2]["parts"][0]["functionResponse"]["response"];
    assert!(response["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn model_failure_surfaces_in_session_and_cleans_up() {
    let gemini = MockServer::start().await;
    let ddg = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    mount_files_api(&gemini, "ACTIVE").await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(429).set_body_string("Resource has been exhausted"))
        .mount(&gemini)
        .await;

    let handler = pipeline(&gemini, &ddg, temp.path());
    let session = Session::new();
    session.load_video(video()).unwrap();

    let view = session.analyze(&handler, "What happens?").await.unwrap();

    assert_eq!(view.status, "error");
    let banner = view.banner.unwrap();
    assert_eq!(banner.level, BannerLevel::Error);
    assert!(banner.message.starts_with("An error occurred during video analysis: "));
    assert!(banner.message.contains("429"));
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn failed_processing_never_reaches_model() {
    let gemini = MockServer::start().await;
    let ddg = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    mount_files_api(&gemini, "FAILED").await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("unused")))
        .expect(0)
        .mount(&gemini)
        .await;

    let handler = pipeline(&gemini, &ddg, temp.path());
    let err = handler.analyze(&video(), "What happens?").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalService);
    assert!(matches!(err, Error::Api { .. }));
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn upload_rejection_is_api_error() {
    let gemini = MockServer::start().await;
    let ddg = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&gemini)
        .await;

    let handler = pipeline(&gemini, &ddg, temp.path());
    let err = handler.analyze(&video(), "Summarize").await.unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("403") && msg.contains("API key not valid"), "{}", msg);
    assert!(dir_is_empty(temp.path()));
    assert!(handler.agent_initialized());
}

#[tokio::test]
async fn sequential_requests_reuse_agent() {
    let gemini = MockServer::start().await;
    let ddg = MockServer::start().await;
    let temp = tempfile::tempdir().unwrap();

    mount_files_api_repeatable(&gemini).await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("ok")))
        .mount(&gemini)
        .await;

    let handler = pipeline(&gemini, &ddg, temp.path());
    handler.analyze(&video(), "first").await.unwrap();
    let first = handler.agent();
    handler.analyze(&video(), "second").await.unwrap();
    let second = handler.agent();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(dir_is_empty(temp.path()));
}

/// Same as `mount_files_api` with ACTIVE, without per-mock call expectations.
async fn mount_files_api_repeatable(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-goog-upload-url", format!("{}/upload-session/abc", server.uri())),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload-session/abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "file": file_json(server, "ACTIVE") })),
        )
        .mount(server)
        .await;
}

/// Matches generateContent requests that offer no tools.
struct WithoutTools;

impl Match for WithoutTools {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .map(|body| body.get("tools").is_none())
            .unwrap_or(false)
    }
}

#[tokio::test]
async fn tool_rounds_are_bounded() {
    let gemini = MockServer::start().await;
    let ddg = MockServer::start().await;

    // The model asks for another search whenever it is allowed to.
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .and(WithoutTools)
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Enough searching.")))
        .with_priority(1)
        .mount(&gemini)
        .await;
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "duckduckgo_search", "args": { "query": "one more" } } }]
                }
            }]
        })))
        .with_priority(2)
        .mount(&gemini)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&ddg)
        .await;

    let config = AgentConfig {
        max_tool_rounds: 2,
        ..AgentConfig::default()
    };
    let agent = VideoAgent::new(
        config,
        Arc::new(DuckDuckGoProvider::with_base_url(ddg.uri())),
        API_KEY,
        gemini.uri(),
    );
    let video = RemoteFile {
        name: "files/abc".to_string(),
        display_name: None,
        mime_type: Some("video/mp4".to_string()),
        size_bytes: None,
        uri: Some(format!("{}/v1beta/files/abc", gemini.uri())),
        state: FileState::Active,
        error: None,
    };

    let response = agent.run("Describe the video", &[video]).await.unwrap();
    assert_eq!(response.content, "Enough searching.");
    assert_eq!(response.search_queries, vec!["one more", "one more"]);

    let bodies = request_bodies(&gemini, &generate_path()).await;
    assert_eq!(bodies.len(), 3, "max_tool_rounds + 1 model calls");
    assert!(bodies[..2].iter().all(|body| body.get("tools").is_some()));
    assert!(bodies[2].get("tools").is_none(), "last round offers no tools");

    let searches = ddg.received_requests().await.unwrap_or_default();
    assert_eq!(searches.len(), 2);
}
