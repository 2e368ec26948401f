/*!
 * Tests for the Anthropic translation and scoring backends
 */

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hawk_translation::app_config::{AnthropicConfig, ScoringConfig};
use hawk_translation::errors::ProviderError;
use hawk_translation::providers::anthropic::{AnthropicScorer, AnthropicTranslator};
use hawk_translation::providers::{ScoringBackend, TranslationBackend};

fn config(server: &MockServer, api_key: &str) -> AnthropicConfig {
    AnthropicConfig {
        api_key: api_key.to_string(),
        endpoint: server.uri(),
        ..AnthropicConfig::default()
    }
}

fn message(text: &str) -> serde_json::Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "usage": { "input_tokens": 120, "output_tokens": 40 }
    })
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Test a well-formed answer yields one translation per segment
#[tokio::test]
async fn test_translate_withValidAnswer_shouldReturnTranslations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(
            r#"{"translations": ["El alcalde habló hoy.", "Los vecinos se reunieron."]}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let backend = AnthropicTranslator::new(&config(&server, "test-key"), 5);
    let result = backend
        .translate(&texts(&["The mayor spoke today.", "Residents gathered."]), "en", "es")
        .await
        .unwrap();

    assert_eq!(result, vec!["El alcalde habló hoy.".to_string(), "Los vecinos se reunieron.".to_string()]);
}

/// Test JSON wrapped in a code fence is still accepted
#[tokio::test]
async fn test_translate_withFencedJson_shouldParse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(
            "```json\n{\"translations\": [\"Bonjour\"]}\n```",
        )))
        .mount(&server)
        .await;

    let backend = AnthropicTranslator::new(&config(&server, "test-key"), 5);
    let result = backend.translate(&texts(&["Hello"]), "en", "fr").await.unwrap();

    assert_eq!(result, vec!["Bonjour".to_string()]);
}

/// Test prose without JSON is a malformed answer
#[tokio::test]
async fn test_translate_withProseAnswer_shouldBeMalformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("Sorry, I cannot help with that.")))
        .mount(&server)
        .await;

    let backend = AnthropicTranslator::new(&config(&server, "test-key"), 5);
    let error = backend.translate(&texts(&["Hello"]), "en", "es").await.unwrap_err();

    assert!(error.is_malformed());
    assert!(!error.is_transient());
}

/// Test rate limiting maps to a transient error
#[tokio::test]
async fn test_translate_withRateLimit_shouldBeTransient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let backend = AnthropicTranslator::new(&config(&server, "test-key"), 5);
    let error = backend.translate(&texts(&["Hello"]), "en", "es").await.unwrap_err();

    assert!(matches!(error, ProviderError::RateLimitExceeded(ref body) if body == "slow down"));
    assert!(error.is_transient());
}

/// Test a rejected key maps to an authentication error
#[tokio::test]
async fn test_translate_withUnauthorized_shouldNotBeTransient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let backend = AnthropicTranslator::new(&config(&server, "bad-key"), 5);
    let error = backend.translate(&texts(&["Hello"]), "en", "es").await.unwrap_err();

    assert!(matches!(error, ProviderError::AuthenticationError(_)));
    assert!(!error.is_transient());
}

/// Test that without a key nothing is sent
#[tokio::test]
async fn test_translate_withoutKey_shouldBeUnavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let backend = AnthropicTranslator::new(&config(&server, ""), 5);
    assert!(!backend.is_available());

    let error = backend.translate(&texts(&["Hello"]), "en", "es").await.unwrap_err();
    assert!(matches!(error, ProviderError::Unavailable(_)));
}

/// Test the scorer parses a score object
#[tokio::test]
async fn test_score_withValidAnswer_shouldParseScore() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(
            r#"Here is my assessment: {"overall": 4.5, "fluency": "4", "accuracy": 5, "flags": ["register"]}"#,
        )))
        .mount(&server)
        .await;

    let scorer = AnthropicScorer::new(&config(&server, "test-key"), &ScoringConfig::default());
    let score = scorer.score("Hello", "Hola", "es").await.unwrap();

    assert_eq!(score.overall, 4.5);
    assert_eq!(score.fluency, 4.0);
    assert_eq!(score.accuracy, 5.0);
    assert_eq!(score.flags, vec!["register".to_string()]);
}

/// Test a score object missing a dimension is malformed
#[tokio::test]
async fn test_score_withMissingField_shouldBeMalformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(r#"{"overall": 4}"#)))
        .mount(&server)
        .await;

    let scorer = AnthropicScorer::new(&config(&server, "test-key"), &ScoringConfig::default());
    let error = scorer.score("Hello", "Hola", "es").await.unwrap_err();

    assert!(error.is_malformed());
}
