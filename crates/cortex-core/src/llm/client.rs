//! OpenAI-compatible LLM client
//!
//! Talks to any `/chat/completions` + `/embeddings` endpoint (Groq by
//! default) with rate limit handling and exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::domain::embedding::Embedder;
use crate::error::{Error, Result};

use super::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, LlmResponse, Message,
};

/// Groq's OpenAI-compatible API
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Maximum number of attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Default embedding model for the `/embeddings` endpoint
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Client for OpenAI-compatible chat and embedding APIs
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    api_key: String,
    base_url: String,
    embedding_model: String,
    embedding_dimension: usize,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.config.default_model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

/// Builder for creating an LlmClient
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    embedding_model: Option<String>,
    embedding_dimension: Option<usize>,
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            base_url: None,
            timeout_secs: None,
            embedding_model: None,
            embedding_dimension: None,
        }
    }

    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the base URL from the configuration
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Model and output size used when this client acts as an [`Embedder`]
    pub fn embedding(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.embedding_model = Some(model.into());
        self.embedding_dimension = Some(dimension);
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_else(|| crate::config::Config::default().llm);
        let api_key = self
            .api_key
            .ok_or_else(|| Error::LLMError("API key is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .or_else(|| Some(config.base_url.clone()).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: self.embedding_dimension.unwrap_or(384),
        })
    }
}

impl LlmClient {
    /// Create a new LlmClient with the given configuration and API key
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        LlmClientBuilder::new()
            .config(config)
            .api_key(api_key)
            .build()
    }

    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a chat completion request
    ///
    /// `temperature` overrides the configured one for this call only.
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let request = ChatRequest::new(&self.config.default_model, messages)
            .with_temperature(temperature.unwrap_or(self.config.temperature))
            .with_max_tokens(self.config.max_tokens);

        self.execute_request(&request).await
    }

    /// Execute a chat request with retry logic
    async fn execute_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(Error::RateLimited(wait_secs)) if attempts < MAX_RETRY_ATTEMPTS => {
                    let backoff = calculate_backoff(attempts, wait_secs);
                    warn!(
                        attempt = attempts,
                        wait_ms = backoff,
                        "Rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the API
    async fn send_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            return handle_error_response(status, response).await;
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))
    }

    /// Generate an embedding through the `/embeddings` endpoint
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest::new(&self.embedding_model, text)
            .with_dimensions(self.embedding_dimension);

        debug!(model = %request.model, "Sending embedding request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            return handle_error_response(status, response).await;
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Failed to parse response: {}", e)))?;

        embedding_response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| Error::EmbeddingFailed("Empty embedding response".to_string()))
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text).await
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn name(&self) -> &str {
        &self.embedding_model
    }
}

/// Map a non-success HTTP status to an error
pub(crate) async fn handle_error_response<T>(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> Result<T> {
    let body = response.text().await.unwrap_or_default();

    match status.as_u16() {
        401 => Err(Error::LLMError(
            "Unauthorized: Invalid API key. Set CORTEX_API_KEY or GROQ_API_KEY environment variable."
                .to_string(),
        )),
        429 => {
            let wait_secs = extract_retry_after(&body).unwrap_or(60);
            Err(Error::RateLimited(wait_secs))
        }
        400 => Err(Error::LLMError(format!("Bad request: {}", body))),
        403 => Err(Error::LLMError(format!("Forbidden: {}", body))),
        404 => Err(Error::LLMError(format!(
            "Model not found or endpoint unavailable: {}",
            body
        ))),
        500..=599 => Err(Error::LLMError(format!(
            "Server error ({}): {}",
            status, body
        ))),
        _ => Err(Error::LLMError(format!("HTTP error {}: {}", status, body))),
    }
}

/// Calculate backoff delay with jitter
fn calculate_backoff(attempt: u32, suggested_wait: u64) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1));
    let delay = base.max(suggested_wait * 1000);

    // Up to 10% jitter
    let jitter = (delay / 10).max(1);
    delay + rand::thread_rng().gen_range(0..jitter)
}

/// Extract retry-after value from error response
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error").and_then(|e| e.get("retry_after")))
        .and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> LlmConfig {
        let mut config = Config::default().llm;
        config.default_model = "test/model".to_string();
        config.timeout_secs = 30;
        config
    }

    #[test]
    fn test_client_builder() {
        let client = LlmClient::builder()
            .config(test_config())
            .api_key("test-key")
            .base_url("https://example.com/v1/")
            .timeout_secs(60)
            .embedding("nomic-embed-text", 768)
            .build()
            .unwrap();

        assert_eq!(client.default_model(), "test/model");
        assert_eq!(client.base_url(), "https://example.com/v1");
        assert_eq!(Embedder::dimension(&client), 768);
        assert_eq!(Embedder::name(&client), "nomic-embed-text");
    }

    #[test]
    fn test_client_builder_requires_api_key() {
        let result = LlmClient::builder().config(test_config()).build();
        assert!(matches!(result, Err(Error::LLMError(_))));
    }

    #[test]
    fn test_client_uses_configured_base_url() {
        let client = LlmClient::new(test_config(), "test-key").unwrap();
        assert_eq!(client.base_url(), "https://api.groq.com/openai/v1");
        assert_eq!(Embedder::dimension(&client), 384);
    }

    #[test]
    fn test_client_debug_hides_key() {
        let client = LlmClient::new(test_config(), "sk-very-secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("LlmClient"));
        assert!(debug.contains("test/model"));
        assert!(!debug.contains("sk-very-secret"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[test]
    fn test_calculate_backoff() {
        let backoff1 = calculate_backoff(1, 0);
        assert!(backoff1 >= BACKOFF_BASE_MS);
        assert!(backoff1 < BACKOFF_BASE_MS * 11 / 10);

        let backoff2 = calculate_backoff(2, 0);
        assert!(backoff2 >= BACKOFF_BASE_MS * 2);

        let backoff_with_wait = calculate_backoff(1, 5);
        assert!(backoff_with_wait >= 5000);
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(extract_retry_after(r#"{"retry_after": 30}"#), Some(30));
        assert_eq!(
            extract_retry_after(r#"{"error": {"retry_after": 60}}"#),
            Some(60)
        );
        assert_eq!(extract_retry_after(r#"{"message": "rate limited"}"#), None);
        assert_eq!(extract_retry_after("not json"), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = LlmClient::builder()
            .config(test_config())
            .api_key("test-key")
            .base_url("http://127.0.0.1:9")
            .timeout_secs(2)
            .build()
            .unwrap();

        let err = client
            .complete(vec![Message::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NetworkError(_)));
        assert!(err.is_transient());
    }
}
