//! Memory pipeline: the request path for one question
//!
//! 1. Semantic cache lookup; a hit is returned as is
//! 2. Entity extraction and concurrent graph fact lookup
//! 3. Answer generation with the facts as context
//! 4. Background jobs: cache write and distillation

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::jobs::BackgroundJobs;

use super::cache::SemanticCache;
use super::distiller::Distiller;
use super::knowledge::{EntityExtractor, GraphStore};

/// Produces the final answer for a question
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// `context` holds known facts, one per line; it may be empty
    async fn generate_answer(&self, query: &str, context: &str) -> Result<String>;
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Cache,
    Generated,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Generated => "generated",
        }
    }
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub source: AnswerSource,
    /// Graph facts handed to the generator; always empty for cache hits
    pub context: Vec<String>,
}

impl ChatAnswer {
    pub fn graph_context_found(&self) -> bool {
        !self.context.is_empty()
    }
}

pub struct MemoryPipeline {
    cache: Arc<SemanticCache>,
    graph: Arc<dyn GraphStore>,
    extractor: EntityExtractor,
    generator: Arc<dyn AnswerGenerator>,
    distiller: Arc<Distiller>,
    jobs: BackgroundJobs,
}

impl MemoryPipeline {
    pub fn new(
        cache: Arc<SemanticCache>,
        graph: Arc<dyn GraphStore>,
        generator: Arc<dyn AnswerGenerator>,
        distiller: Arc<Distiller>,
        jobs: BackgroundJobs,
    ) -> Self {
        Self {
            cache,
            graph,
            extractor: EntityExtractor::new(),
            generator,
            distiller,
            jobs,
        }
    }

    pub fn jobs(&self) -> &BackgroundJobs {
        &self.jobs
    }

    /// Answer `query` from memory, or generate and remember a new answer
    pub async fn answer(&self, query: &str) -> Result<ChatAnswer> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("Question must not be empty".to_string()));
        }

        if let Some(answer) = self.cache.lookup(query).await {
            return Ok(ChatAnswer {
                answer,
                source: AnswerSource::Cache,
                context: Vec::new(),
            });
        }

        let context = self.graph_context(query).await;
        debug!(facts = context.len(), "Graph context assembled");

        let answer = self
            .generator
            .generate_answer(query, &context.join("\n"))
            .await?;

        self.remember(query, &answer);

        info!(
            source = "generated",
            graph_context_found = !context.is_empty(),
            "Answer ready"
        );
        Ok(ChatAnswer {
            answer,
            source: AnswerSource::Generated,
            context,
        })
    }

    /// Facts for every extracted entity, in entity order
    ///
    /// A failed lookup contributes nothing.
    pub async fn graph_context(&self, query: &str) -> Vec<String> {
        let entities = self.extractor.extract(query);
        if entities.is_empty() {
            return Vec::new();
        }

        let lookups = entities.iter().map(|entity| async move {
            match self.graph.get_entity_facts(entity).await {
                Ok(facts) => facts,
                Err(e) => {
                    warn!(entity = %entity, error = %e, code = e.code(), "Graph lookup failed");
                    Vec::new()
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }

    fn remember(&self, query: &str, answer: &str) {
        let cache = Arc::clone(&self.cache);
        let (q, a) = (query.to_string(), answer.to_string());
        self.jobs.submit("cache-save", async move {
            cache.try_save(&q, &a).await.map(|_| ())
        });

        let distiller = Arc::clone(&self.distiller);
        let (q, a) = (query.to_string(), answer.to_string());
        self.jobs.submit("distill", async move {
            distiller.distill(&q, &a).await.map(|_| ())
        });
    }
}
