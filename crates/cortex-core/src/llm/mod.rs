//! LLM integration
//!
//! This module provides:
//! - OpenAI-compatible HTTP client (Groq by default) with rate limit retry
//! - Ollama client for local chat and embeddings
//! - Request/response types for both
//! - JSON extraction from free-form replies
//! - The provider implementing the answer, fact and duplicate contracts

mod client;
mod ollama;
mod parsing;
mod provider;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use ollama::{DEFAULT_OLLAMA_EMBED_MODEL, DEFAULT_OLLAMA_URL, OllamaClient};
pub use parsing::{extract_json_from_response, parse_json_list};
pub use provider::{
    ChatBackend, LlmProvider, answer_prompt, duplicate_prompt, embedder_from_config,
    fact_extraction_prompt, parse_fact_candidates, parse_merge_pairs,
};
pub use types::{
    ChatRequest, ChatResponse, Choice, EmbeddingRequest, EmbeddingResponse, FinishReason,
    LlmResponse, Message, MessageRole, Usage,
};
