//! End-to-end adapter tests against a mock vendor server

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use storyforge_core::{
    AiConfig, ErrorKind, ExpectedFormat, ModelType, Orchestrator, StandardAiRequest,
};

fn orchestrator_for(server: &ServerGuard, provider: ModelType, key: &str) -> Orchestrator {
    let mut config = AiConfig::default();
    let section = config.providers.get_mut(provider);
    section.api_key = key.to_string();
    section.base_url = Some(server.url());
    Orchestrator::from_config(&config).unwrap()
}

fn json_request(request_type: &str, model: &str) -> StandardAiRequest {
    StandardAiRequest::new(request_type, "You are a story assistant.", "Describe the hero.")
        .with_model(model)
        .with_format(ExpectedFormat::Json)
        .with_timeout_ms(5_000)
}

#[tokio::test]
async fn test_openai_fenced_json_is_parsed() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({"model": "gpt-4o", "stream": false})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "```json\n{\"name\":\"Alice\"}\n```"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 42, "completion_tokens": 9, "total_tokens": 51}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::OpenAi, "sk-test");
    let response = orchestrator
        .process_ai_request(json_request("character-detail", "gpt-4o"))
        .await;

    mock.assert_async().await;
    assert!(response.is_success(), "{:?}", response.error);
    assert_eq!(response.content, Some(json!({"name": "Alice"})));
    assert_eq!(response.usage.total_tokens, 51);
    assert!(!response.usage.estimated);
}

#[tokio::test]
async fn test_openai_rate_limit_is_quota_exceeded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_header("retry-after", "17")
        .with_body(r#"{"error": {"message": "Rate limit reached for gpt-4o", "type": "requests"}}"#)
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::OpenAi, "sk-test");
    let response = orchestrator
        .process_ai_request(json_request("summary", "gpt-4o"))
        .await;

    mock.assert_async().await;
    assert_eq!(response.error_code(), Some(ErrorKind::QuotaExceeded));
    assert!(response.content.is_none());
    let error = response.error.unwrap();
    assert_eq!(error.details["status"], 429);
    assert_eq!(error.details["retryAfterSeconds"], 17);
    assert_eq!(error.details["vendorMessage"], "Rate limit reached for gpt-4o");
}

#[tokio::test]
async fn test_openai_truncation_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(
            json!({
                "choices": [{"message": {"content": "{\"name\": \"Al"}, "finish_reason": "length"}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::OpenAi, "sk-test");
    let response = orchestrator
        .process_ai_request(json_request("character-detail", "gpt-4o").with_max_tokens(5))
        .await;

    assert_eq!(response.error_code(), Some(ErrorKind::InvalidRequest));
    assert!(response.content.is_none());
    assert_eq!(response.raw_content, "{\"name\": \"Al");
    assert_eq!(response.error.unwrap().details["finishReason"], "length");
}

#[tokio::test]
async fn test_anthropic_unauthorized_is_authentication_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant-bad")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(401)
        .with_body(
            r#"{"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}"#,
        )
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::Anthropic, "sk-ant-bad");
    let response = orchestrator
        .process_ai_request(json_request("character-detail", "claude-3-5-sonnet-latest"))
        .await;

    mock.assert_async().await;
    assert_eq!(response.error_code(), Some(ErrorKind::AuthenticationError));
    let error = response.error.unwrap();
    assert_eq!(error.details["vendorMessage"], "invalid x-api-key");
    assert!(!error.message.contains("x-api-key"));
}

#[tokio::test]
async fn test_anthropic_success_with_default_max_tokens() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::PartialJson(json!({"max_tokens": 4096})))
        .with_status(200)
        .with_body(
            json!({
                "id": "msg_1",
                "type": "message",
                "content": [{"type": "text", "text": "[{\"name\": \"Mara\"}, {\"name\": \"Ivo\"}]"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 20, "output_tokens": 12}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::Anthropic, "sk-ant-ok");
    let response = orchestrator
        .process_ai_request(json_request("character-list", "claude-3-5-sonnet-latest"))
        .await;

    mock.assert_async().await;
    let content = response.content.unwrap();
    let items = content.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item["id"].is_string()));
}

#[tokio::test]
async fn test_gemini_empty_body_is_server_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
        .match_header("x-goog-api-key", "AIza-test")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::Gemini, "AIza-test");
    let response = orchestrator
        .process_ai_request(json_request("world-building", "gemini-1.5-pro"))
        .await;

    mock.assert_async().await;
    assert_eq!(response.error_code(), Some(ErrorKind::ServerError));
    assert!(response.content.is_none());
}

#[tokio::test]
async fn test_gemini_rejects_model_name_that_alters_url() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::Gemini, "AIza-test");
    let response = orchestrator
        .process_ai_request(json_request("location-detail", "gemini-pro?alt=sse#x"))
        .await;

    mock.assert_async().await;
    assert_eq!(response.debug.provider, Some(ModelType::Gemini));
    assert_eq!(response.error_code(), Some(ErrorKind::InvalidRequest));
}

#[tokio::test]
async fn test_gemini_yaml_response() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
        .with_status(200)
        .with_body(
            json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "```yaml\nname: Harbor Town\nfactions:\n  - Smugglers\n```"}]},
                    "finishReason": "STOP"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::Gemini, "AIza-test");
    let request = StandardAiRequest::new("location-detail", "", "A harbor town")
        .with_format(ExpectedFormat::Yaml);
    let response = orchestrator.process_ai_request(request).await;

    assert!(response.is_success(), "{:?}", response.error);
    assert_eq!(response.debug.provider, Some(ModelType::Gemini));
    assert_eq!(
        response.content,
        Some(json!({"name": "Harbor Town", "factions": ["Smugglers"]}))
    );
    assert!(response.usage.estimated);
}

#[tokio::test]
async fn test_mistral_overloaded_is_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer mistral-key")
        .with_status(503)
        .with_body(r#"{"message": "Service unavailable"}"#)
        .create_async()
        .await;

    let orchestrator = orchestrator_for(&server, ModelType::Mistral, "mistral-key");
    let response = orchestrator
        .process_ai_request(json_request("summary", "mistral-large-latest"))
        .await;

    assert_eq!(response.error_code(), Some(ErrorKind::ServerError));
    assert_eq!(response.error.unwrap().details["provider"], "mistral");
}

#[tokio::test]
async fn test_ollama_sends_no_auth_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(json!({"choices": [{"message": {"content": "Once upon a time."}}]}).to_string())
        .create_async()
        .await;

    let mut config = AiConfig::default();
    config.providers.ollama.base_url = Some(format!("{}/v1", server.url()));
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let request = StandardAiRequest::new("scene-draft", "", "Begin.").with_model("llama3.1");
    let response = orchestrator.process_ai_request(request).await;

    mock.assert_async().await;
    assert!(response.is_success(), "{:?}", response.error);
    assert_eq!(response.content, Some(json!("Once upon a time.")));
}

#[tokio::test]
async fn test_missing_credential_never_reaches_vendor() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .expect(0)
        .create_async()
        .await;

    let mut config = AiConfig::default();
    config.providers.anthropic.base_url = Some(server.url());
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let response = orchestrator
        .process_ai_request(json_request("character-detail", "claude-3-5-sonnet-latest"))
        .await;

    mock.assert_async().await;
    assert_eq!(response.error_code(), Some(ErrorKind::AuthenticationError));
    assert!(response.content.is_none());
}
