//! Integration tests for the LLM providers and the rate-limit controller

use serde_json::json;
use sitesift::config::{ProviderKind, ResolvedProvider};
use sitesift::state::BackoffPolicy;
use sitesift::transform::{check_available, ChatProvider, ContentTransform, RateLimitController};
use sitesift::transform::{RateLimitSignal, TransformErrorKind, TransformFailure};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer, kind: ProviderKind) -> ChatProvider {
    let resolved = ResolvedProvider {
        kind,
        model: "test-model".to_string(),
        base_url: Url::parse(&server.uri()).unwrap(),
        api_key: Some("secret-key".to_string()),
    };
    ChatProvider::with_client(
        reqwest::Client::new(),
        &resolved,
        "Clean this:\n\n".to_string(),
        256,
    )
}

fn ollama_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "test-model",
        "message": { "role": "assistant", "content": text },
        "done": true
    }))
}

fn policy() -> BackoffPolicy {
    BackoffPolicy {
        base: Duration::from_millis(100),
        ceiling: Duration::from_secs(2),
        floor: Duration::ZERO,
        reset_after_successes: 5,
    }
}

#[tokio::test]
async fn test_ollama_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "stream": false,
            "options": { "num_predict": 256 },
            "messages": [{ "role": "user", "content": "Clean this:\n\n# Raw page" }]
        })))
        .respond_with(ollama_reply("  # Clean page\n"))
        .expect(1)
        .mount(&server)
        .await;

    let cleaned = provider(&server, ProviderKind::Ollama)
        .clean("# Raw page")
        .await
        .unwrap();
    assert_eq!(cleaned, "# Clean page");
}

#[tokio::test]
async fn test_anthropic_sends_key_and_version() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "secret-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({ "model": "test-model", "max_tokens": 256 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "content": [
                { "type": "text", "text": "Part one. " },
                { "type": "text", "text": "Part two." }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cleaned = provider(&server, ProviderKind::Anthropic)
        .clean("raw")
        .await
        .unwrap();
    assert_eq!(cleaned, "Part one. Part two.");
}

#[tokio::test]
async fn test_openrouter_uses_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Cleaned." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cleaned = provider(&server, ProviderKind::Openrouter)
        .clean("raw")
        .await
        .unwrap();
    assert_eq!(cleaned, "Cleaned.");
}

#[tokio::test]
async fn test_failure_classification() {
    let server = MockServer::start().await;
    Mock::given(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [{ "content": "Clean this:\n\nbusy" }]
        })))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "5")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;
    Mock::given(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [{ "content": "Clean this:\n\nhuge" }]
        })))
        .respond_with(ResponseTemplate::new(413).set_body_string("request too large"))
        .mount(&server)
        .await;
    Mock::given(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [{ "content": "Clean this:\n\nbroken" }]
        })))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;
    Mock::given(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [{ "content": "Clean this:\n\nsilent" }]
        })))
        .respond_with(ollama_reply("   "))
        .mount(&server)
        .await;

    let provider = provider(&server, ProviderKind::Ollama);

    assert_eq!(
        provider.clean("busy").await,
        Err(TransformFailure::RateLimited(RateLimitSignal {
            retry_after: Some(Duration::from_secs(5)),
            message: Some("slow down".to_string()),
        }))
    );
    assert!(matches!(
        provider.clean("huge").await,
        Err(TransformFailure::ContentTooLarge(_))
    ));
    assert_eq!(
        provider.clean("broken").await,
        Err(TransformFailure::Provider("HTTP 500: model crashed".to_string()))
    );
    assert!(matches!(
        provider.clean("silent").await,
        Err(TransformFailure::Provider(_))
    ));
}

#[tokio::test]
async fn test_rate_limit_error_inside_successful_response() {
    let server = MockServer::start().await;
    Mock::given(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": 429, "message": "Rate limit exceeded, try again in 3 seconds" }
        })))
        .mount(&server)
        .await;

    let result = provider(&server, ProviderKind::Openrouter).clean("raw").await;
    match result {
        Err(TransformFailure::RateLimited(signal)) => {
            assert_eq!(signal.retry_after, None);
            assert!(signal.message.unwrap().contains("try again in 3 seconds"));
        }
        other => panic!("expected a rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_controller_waits_out_retry_after() {
    let server = MockServer::start().await;
    Mock::given(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/chat"))
        .respond_with(ollama_reply("Cleaned after waiting."))
        .expect(1)
        .mount(&server)
        .await;

    let controller = RateLimitController::new(
        Arc::new(provider(&server, ProviderKind::Ollama)),
        policy(),
        10_000,
        3,
    );

    let start = Instant::now();
    let cleaned = controller.transform("raw page").await.unwrap();

    assert_eq!(cleaned, "Cleaned after waiting.");
    assert!(start.elapsed() >= Duration::from_secs(1));

    let state = controller.state().await;
    assert_eq!(state.last_retry_after, Some(Duration::from_secs(1)));
    assert_eq!(state.consecutive_failures, 0);
}

#[tokio::test]
async fn test_controller_gives_up_after_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(2)
        .mount(&server)
        .await;

    let controller = RateLimitController::new(
        Arc::new(provider(&server, ProviderKind::Ollama)),
        policy(),
        10_000,
        2,
    );

    let error = controller.transform("raw page").await.unwrap_err();
    assert_eq!(error.kind, TransformErrorKind::ProviderError);
    assert!(error.message.contains("HTTP 503"));
}

#[tokio::test]
async fn test_controller_truncates_long_input() {
    let server = MockServer::start().await;
    let expected_prompt = format!("Clean this:\n\n{}", "x".repeat(100));
    Mock::given(path("/api/chat"))
        .respond_with(ollama_reply("short"))
        .mount(&server)
        .await;

    let controller = RateLimitController::new(
        Arc::new(provider(&server, ProviderKind::Ollama)),
        policy(),
        100,
        1,
    );
    controller.transform(&"x".repeat(500)).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["messages"][0]["content"].as_str().unwrap();

    assert!(prompt.ends_with("[Content truncated...]"));
    assert_eq!(
        prompt.chars().count(),
        expected_prompt.chars().count(),
        "truncated input keeps the character ceiling"
    );
}

#[tokio::test]
async fn test_check_available() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    assert!(check_available(&client, &Url::parse(&server.uri()).unwrap()).await);

    let empty = MockServer::start().await;
    assert!(!check_available(&client, &Url::parse(&empty.uri()).unwrap()).await);

    // nothing listens on port 9 of the loopback interface
    assert!(!check_available(&client, &Url::parse("http://127.0.0.1:9").unwrap()).await);
}
