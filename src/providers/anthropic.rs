use std::time::Duration;
use serde::{Serialize, Deserialize};
use async_trait::async_trait;
use reqwest::Client;
use log::{debug, error};

use crate::app_config::{AnthropicConfig, ScoringConfig};
use crate::errors::ProviderError;
use crate::providers::{ScoringBackend, TranslationBackend, extract_json};
use crate::translation::prompts::{TranslationPromptBuilder, TranslationResponse, build_scoring_prompt};
use crate::translation::quality::QualityScore;

/// Anthropic client for interacting with Anthropic API
#[derive(Debug, Clone)]
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL (optional, defaults to public API)
    endpoint: String,
    /// Request timeout reported in errors
    timeout_secs: u64,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,

    /// System prompt to guide the AI
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Token usage information
#[derive(Debug, Deserialize, Default)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The content of the response
    pub content: Vec<AnthropicContent>,
    /// Token usage information
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    pub content_type: String,

    /// The actual text content
    #[serde(default)]
    pub text: String,
}

impl AnthropicRequest {
    /// Create a new Anthropic request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            temperature: None,
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Anthropic {
    /// Create a new Anthropic client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            timeout_secs,
        }
    }

    /// Whether an API key is configured
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Complete a messages request
    pub async fn complete(&self, request: AnthropicRequest) -> Result<AnthropicResponse, ProviderError> {
        if !self.has_credentials() {
            return Err(ProviderError::Unavailable("no Anthropic API key configured".to_string()));
        }

        let api_url = if self.endpoint.is_empty() {
            "https://api.anthropic.com/v1/messages".to_string()
        } else {
            format!("{}/v1/messages", self.endpoint.trim_end_matches('/'))
        };

        let response = self.client.post(&api_url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Anthropic API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let anthropic_response = response.json::<AnthropicResponse>().await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Anthropic API response: {}", e)))?;

        debug!(
            "Anthropic usage: {} input / {} output tokens",
            anthropic_response.usage.input_tokens, anthropic_response.usage.output_tokens
        );

        Ok(anthropic_response)
    }

    /// Extract text from Anthropic response
    pub fn extract_text_from_response(response: &AnthropicResponse) -> String {
        response.content.iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.clone())
            .collect()
    }
}

/// Primary translation backend backed by an Anthropic model
#[derive(Debug, Clone)]
pub struct AnthropicTranslator {
    client: Anthropic,
    model: String,
    max_tokens: u32,
}

impl AnthropicTranslator {
    pub fn new(config: &AnthropicConfig, timeout_secs: u64) -> Self {
        Self {
            client: Anthropic::new(config.api_key.clone(), config.endpoint.clone(), timeout_secs),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TranslationBackend for AnthropicTranslator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_available(&self) -> bool {
        self.client.has_credentials()
    }

    async fn translate(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let (system, user) = TranslationPromptBuilder::new(source_language, target_language)
            .with_segments(texts)
            .build();

        let request = AnthropicRequest::new(self.model.clone(), self.max_tokens)
            .system(system)
            .temperature(0.2)
            .add_message("user", user);

        let response = self.client.complete(request).await?;
        let text = Anthropic::extract_text_from_response(&response);
        let json = extract_json(&text)?;

        let parsed: TranslationResponse = serde_json::from_str(&json)
            .map_err(|e| ProviderError::ParseError(format!("Invalid translation JSON: {}", e)))?;

        Ok(parsed.translations)
    }
}

/// Quality scoring backend backed by an Anthropic model
#[derive(Debug, Clone)]
pub struct AnthropicScorer {
    client: Anthropic,
    model: String,
    max_chars: usize,
}

impl AnthropicScorer {
    pub fn new(anthropic: &AnthropicConfig, scoring: &ScoringConfig) -> Self {
        Self {
            client: Anthropic::new(anthropic.api_key.clone(), anthropic.endpoint.clone(), scoring.timeout_secs),
            model: scoring.model.clone(),
            max_chars: scoring.max_chars,
        }
    }
}

#[async_trait]
impl ScoringBackend for AnthropicScorer {
    fn is_available(&self) -> bool {
        self.client.has_credentials()
    }

    async fn score(
        &self,
        original: &str,
        translated: &str,
        target_language: &str,
    ) -> Result<QualityScore, ProviderError> {
        let prompt = build_scoring_prompt(original, translated, target_language, self.max_chars);
        let request = AnthropicRequest::new(self.model.clone(), 512)
            .temperature(0.0)
            .add_message("user", prompt);

        let response = self.client.complete(request).await?;
        let text = Anthropic::extract_text_from_response(&response);
        let json = extract_json(&text)?;
        let value: serde_json::Value = serde_json::from_str(&json)
            .map_err(|e| ProviderError::ParseError(format!("Invalid score JSON: {}", e)))?;

        QualityScore::from_json(&value)
    }
}
