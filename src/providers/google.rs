/*!
 * Google Cloud Translation (v2) client.
 *
 * Serves the target languages routed to the secondary backend. Without an
 * API key the backend reports itself unavailable and the orchestrator
 * degrades instead of calling it.
 */

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::GoogleConfig;
use crate::errors::ProviderError;
use crate::language_utils::find_language;
use crate::providers::TranslationBackend;

/// Google Cloud Translation client
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout_secs: u64,
}

/// Translate request body
#[derive(Debug, Serialize)]
struct GoogleRequest<'a> {
    q: &'a [String],
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    data: GoogleData,
}

#[derive(Debug, Deserialize)]
struct GoogleData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: String,
}

impl GoogleTranslate {
    pub fn new(config: &GoogleConfig, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            timeout_secs,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/language/translate/v2", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslate {
    fn name(&self) -> &str {
        "google"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn translate(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        if !self.is_available() {
            return Err(ProviderError::Unavailable("no Google Translate API key configured".to_string()));
        }

        let target = find_language(target_language)
            .map(|l| l.secondary_code)
            .unwrap_or(target_language);

        let body = GoogleRequest {
            q: texts,
            source: source_language,
            target,
            format: "text",
        };

        let response = self
            .client
            .post(self.api_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Google Translate API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let parsed = response
            .json::<GoogleResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Google Translate response: {}", e)))?;

        Ok(parsed
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect())
    }
}
