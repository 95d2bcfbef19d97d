//! Ollama client for local chat and embeddings

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::debug;

use crate::domain::embedding::Embedder;
use crate::error::{Error, Result};

use super::client::handle_error_response;
use super::types::{
    LlmResponse, Message, OllamaChatRequest, OllamaChatResponse, OllamaEmbedRequest,
    OllamaEmbedResponse, OllamaOptions,
};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// all-minilm produces 384-dimensional vectors
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "all-minilm";

/// Client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: HttpClient,
    base_url: String,
    chat_model: String,
    embed_model: String,
    embed_dimension: usize,
    temperature: f32,
}

impl OllamaClient {
    /// Create a client for `base_url` answering with `chat_model`
    pub fn new(
        base_url: impl Into<String>,
        chat_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embed_model: DEFAULT_OLLAMA_EMBED_MODEL.to_string(),
            embed_dimension: 384,
            temperature: 0.7,
        })
    }

    /// Model and output size used when this client acts as an [`Embedder`]
    pub fn with_embedding(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.embed_model = model.into();
        self.embed_dimension = dimension;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    /// Non-streaming `/api/chat`
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model: self.chat_model.clone(),
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: temperature.unwrap_or(self.temperature),
            },
        };

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending Ollama chat request"
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return handle_error_response(status, response).await;
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(chat.into())
    }

    /// `/api/embed` for a single input
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = OllamaEmbedRequest {
            model: self.embed_model.clone(),
            input: text.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return handle_error_response(status, response).await;
        }

        let body: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Failed to parse response: {}", e)))?;

        body.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingFailed("Empty embedding response".to_string()))
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text).await
    }

    fn dimension(&self) -> usize {
        self.embed_dimension
    }

    fn name(&self) -> &str {
        &self.embed_model
    }
}
