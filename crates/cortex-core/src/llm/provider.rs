//! LLM provider: answers, fact extraction and duplicate proposals
//!
//! One chat backend is picked from configuration at construction time and
//! serves all three domain contracts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{Config, EmbeddingProviderKind, LlmConfig, ProviderKind};
use crate::domain::distiller::FactExtractor;
use crate::domain::embedding::{Embedder, HashingEmbedder};
use crate::domain::gardener::{DuplicateProposer, MergePair};
use crate::domain::knowledge::FactCandidate;
use crate::domain::pipeline::AnswerGenerator;
use crate::error::{Error, Result};

use super::client::LlmClient;
use super::ollama::OllamaClient;
use super::parsing::parse_json_list;
use super::types::{LlmResponse, Message};

const ANSWER_SYSTEM_PROMPT: &str = "You are the Cortex Core.
Answer the user's question clearly and concisely.
If context is provided, prioritize that information.";

/// Deterministic temperature for structured output
const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Chat endpoint behind the provider
#[derive(Debug, Clone)]
pub enum ChatBackend {
    /// OpenAI-compatible chat completions (Groq by default)
    Cloud(LlmClient),
    /// Ollama `/api/chat`
    Local(OllamaClient),
}

impl ChatBackend {
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        match self {
            Self::Cloud(client) => client.complete(messages, temperature).await,
            Self::Local(client) => client.chat(messages, temperature).await,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Cloud(_) => ProviderKind::Cloud,
            Self::Local(_) => ProviderKind::Local,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Cloud(client) => client.default_model(),
            Self::Local(client) => client.chat_model(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmProvider {
    backend: ChatBackend,
    temperature: f32,
}

impl LlmProvider {
    pub fn new(backend: ChatBackend, temperature: f32) -> Self {
        Self {
            backend,
            temperature,
        }
    }

    /// Build the backend selected by `config.provider`
    ///
    /// The cloud backend needs an API key from the environment.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let backend = match config.provider {
            ProviderKind::Cloud => {
                let api_key = config
                    .resolved_api_key()
                    .map_err(|e| Error::ConfigError(e.to_string()))?
                    .ok_or_else(|| {
                        Error::ConfigError(
                            "No API key found. Set CORTEX_API_KEY or GROQ_API_KEY, or switch to llm.provider = \"local\"".to_string(),
                        )
                    })?;
                ChatBackend::Cloud(LlmClient::new(config.clone(), api_key)?)
            }
            ProviderKind::Local => ChatBackend::Local(
                OllamaClient::new(&config.local_url, &config.local_model, config.timeout())?
                    .with_temperature(config.temperature),
            ),
        };

        info!(
            provider = backend.kind().as_str(),
            model = %backend.model(),
            "LLM provider ready"
        );
        Ok(Self::new(backend, config.temperature))
    }

    pub fn backend(&self) -> &ChatBackend {
        &self.backend
    }
}

#[async_trait]
impl AnswerGenerator for LlmProvider {
    async fn generate_answer(&self, query: &str, context: &str) -> Result<String> {
        let messages = vec![
            Message::system(ANSWER_SYSTEM_PROMPT),
            Message::user(answer_prompt(query, context)),
        ];

        let response = self.backend.chat(messages, Some(self.temperature)).await?;
        debug!(
            model = %response.model,
            tokens = response.tokens_used,
            "Answer generated"
        );
        Ok(response.content)
    }
}

#[async_trait]
impl FactExtractor for LlmProvider {
    async fn extract_facts(&self, text: &str) -> Result<Vec<FactCandidate>> {
        let messages = vec![Message::user(fact_extraction_prompt(text))];
        let response = self
            .backend
            .chat(messages, Some(EXTRACTION_TEMPERATURE))
            .await?;
        parse_fact_candidates(&response.content)
    }
}

#[async_trait]
impl DuplicateProposer for LlmProvider {
    async fn propose_duplicates(&self, entities: &[String]) -> Result<Vec<MergePair>> {
        let messages = vec![Message::user(duplicate_prompt(entities))];
        let response = self
            .backend
            .chat(messages, Some(EXTRACTION_TEMPERATURE))
            .await?;
        parse_merge_pairs(&response.content)
    }
}

/// User turn for answer generation
pub fn answer_prompt(query: &str, context: &str) -> String {
    format!("Context: {}\n\nQuestion: {}", context, query)
}

pub fn fact_extraction_prompt(text: &str) -> String {
    format!(
        r#"Extract the key facts from this text: "{}"
Return ONLY a JSON list of relationships in this format:
[
  {{"head": "Entity1", "type": "RELATION", "tail": "Entity2"}}
]
Do not add any markdown formatting like ```json. Just raw JSON."#,
        text
    )
}

pub fn duplicate_prompt(entities: &[String]) -> String {
    let list = serde_json::to_string(entities).unwrap_or_else(|_| format!("{:?}", entities));
    format!(
        r#"Analyze this list of entities: {}
Identify pairs that refer to the SAME real-world object but have slightly different spellings or capitalizations.

Return ONLY a valid JSON list of objects. Format:
[
  {{"keep": "SpaceX", "merge": "Space X"}},
  {{"keep": "Elon Musk", "merge": "elon musk"}}
]

If no duplicates are found, return empty list [].
Do not add any explanations or markdown. Just the JSON."#,
        list
    )
}

/// Fact candidates from a model reply; non-object items are dropped
pub fn parse_fact_candidates(response: &str) -> Result<Vec<FactCandidate>> {
    Ok(parse_json_list(response)?
        .into_iter()
        .filter_map(FactCandidate::from_value)
        .collect())
}

/// Merge pairs from a model reply; non-object items are dropped
pub fn parse_merge_pairs(response: &str) -> Result<Vec<MergePair>> {
    Ok(parse_json_list(response)?
        .iter()
        .filter_map(MergePair::from_value)
        .collect())
}

/// Build the embedder selected by `config.embedding.provider`
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedding = &config.embedding;

    let embedder: Arc<dyn Embedder> = match embedding.provider {
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(embedding.dimension)),
        EmbeddingProviderKind::Ollama => Arc::new(
            OllamaClient::new(
                &config.llm.local_url,
                &config.llm.local_model,
                config.llm.timeout(),
            )?
            .with_embedding(&embedding.model, embedding.dimension),
        ),
        EmbeddingProviderKind::Openai => {
            let api_key = config
                .llm
                .resolved_api_key()
                .map_err(|e| Error::ConfigError(e.to_string()))?
                .ok_or_else(|| {
                    Error::ConfigError(
                        "The openai embedding provider needs CORTEX_API_KEY or GROQ_API_KEY"
                            .to_string(),
                    )
                })?;
            Arc::new(
                LlmClient::builder()
                    .config(config.llm.clone())
                    .api_key(api_key)
                    .embedding(&embedding.model, embedding.dimension)
                    .build()?,
            )
        }
        EmbeddingProviderKind::Fastembed => fastembed_embedder(embedding.dimension)?,
    };

    info!(
        provider = embedding.provider.as_str(),
        embedder = %embedder.name(),
        dimension = embedder.dimension(),
        "Embedder ready"
    );
    Ok(embedder)
}

#[cfg(feature = "fastembed")]
fn fastembed_embedder(dimension: usize) -> Result<Arc<dyn Embedder>> {
    let embedder = crate::domain::embedding::FastEmbedder::new();
    if embedder.dimension() != dimension {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            actual: embedder.dimension(),
        });
    }
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_embedder(_dimension: usize) -> Result<Arc<dyn Embedder>> {
    Err(Error::ConfigError(
        "This build has no local model support. Rebuild with --features fastembed or pick another embedding.provider".to_string(),
    ))
}
