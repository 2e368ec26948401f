/*!
 * Tests for the Google Cloud Translation backend
 */

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hawk_translation::app_config::GoogleConfig;
use hawk_translation::errors::ProviderError;
use hawk_translation::providers::TranslationBackend;
use hawk_translation::providers::google::GoogleTranslate;

fn backend(server: &MockServer, api_key: &str) -> GoogleTranslate {
    GoogleTranslate::new(
        &GoogleConfig {
            api_key: api_key.to_string(),
            endpoint: server.uri(),
        },
        5,
    )
}

fn translations(items: &[&str]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = items.iter().map(|t| json!({ "translatedText": t })).collect();
    json!({ "data": { "translations": entries } })
}

/// Test a batch is sent as plain text with the key as a query parameter
#[tokio::test]
async fn test_translate_shouldSendBatchAndReturnTranslations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/language/translate/v2"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({
            "q": ["Storm warning tonight.", "Stay inside."],
            "source": "en",
            "target": "ht",
            "format": "text"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(translations(&[
            "Avètisman tanpèt aswè a.",
            "Rete anndan.",
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let texts = vec!["Storm warning tonight.".to_string(), "Stay inside.".to_string()];
    let result = backend(&server, "g-key").translate(&texts, "en", "ht").await.unwrap();

    assert_eq!(result, vec!["Avètisman tanpèt aswè a.".to_string(), "Rete anndan.".to_string()]);
}

/// Test Chinese is requested as simplified Chinese
#[tokio::test]
async fn test_translate_forChinese_shouldUseSimplifiedCode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/language/translate/v2"))
        .and(body_partial_json(json!({ "target": "zh-CN" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(translations(&["你好"])))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server, "g-key")
        .translate(&["Hello".to_string()], "en", "zh")
        .await
        .unwrap();

    assert_eq!(result, vec!["你好".to_string()]);
}

/// Test server errors are transient
#[tokio::test]
async fn test_translate_withServerError_shouldBeTransient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend busy"))
        .mount(&server)
        .await;

    let error = backend(&server, "g-key")
        .translate(&["Hello".to_string()], "en", "hi")
        .await
        .unwrap_err();

    assert!(matches!(error, ProviderError::ApiError { status_code: 503, .. }));
    assert!(error.is_transient());
}

/// Test an unexpected body shape is a parse error
#[tokio::test]
async fn test_translate_withUnexpectedBody_shouldBeMalformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .mount(&server)
        .await;

    let error = backend(&server, "g-key")
        .translate(&["Hello".to_string()], "en", "ur")
        .await
        .unwrap_err();

    assert!(error.is_malformed());
}

/// Test that without a key the backend is unavailable and silent
#[tokio::test]
async fn test_translate_withoutKey_shouldBeUnavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let google = backend(&server, "");
    assert!(!google.is_available());
    let error = google.translate(&["Hello".to_string()], "en", "ht").await.unwrap_err();
    assert!(matches!(error, ProviderError::Unavailable(_)));
}
