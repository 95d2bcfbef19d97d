//! Cortex Core Library
//!
//! Two-tier conversational memory in front of a language model:
//! - Semantic cache (answers reused for similar enough questions)
//! - Knowledge graph (facts distilled from past answers, fed back as context)
//! - Distiller (background fact extraction after every generated answer)
//! - Gardener (entity deduplication and cache retention)
//! - LLM providers (OpenAI-compatible cloud API or local Ollama)
//! - Storage (SQLite through sqlx, versioned migrations)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod jobs;
pub mod llm;
pub mod storage;

pub use error::{Error, Result};

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod error_tests;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::application::MemorySystem;
    pub use crate::config::Config;
    pub use crate::domain::cache::SemanticCache;
    pub use crate::domain::distiller::{Distiller, FactExtractor};
    pub use crate::domain::embedding::Embedder;
    pub use crate::domain::gardener::{DuplicateProposer, Gardener};
    pub use crate::domain::knowledge::GraphStore;
    pub use crate::domain::pipeline::{AnswerGenerator, AnswerSource, ChatAnswer, MemoryPipeline};
    pub use crate::error::{Error, Result};
    pub use crate::jobs::BackgroundJobs;
}
