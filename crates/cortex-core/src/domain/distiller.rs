//! Distiller: turns a finished question/answer turn into graph facts
//!
//! Runs off the request path. The fact extractor proposes raw candidates;
//! each one is resolved through the key aliases, normalized and upserted on
//! its own.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

use super::knowledge::{FactCandidate, GraphStore};

/// Source of raw fact candidates for a piece of text
#[async_trait]
pub trait FactExtractor: Send + Sync {
    async fn extract_facts(&self, text: &str) -> Result<Vec<FactCandidate>>;
}

/// What one distillation pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistillationReport {
    /// Candidates returned by the extractor
    pub candidates: usize,
    pub stored: usize,
    /// Candidates missing a head, relation or tail
    pub skipped: usize,
    /// Candidates whose write failed
    pub failed: usize,
}

/// Combined text handed to the fact extractor
pub fn distillation_text(question: &str, answer: &str) -> String {
    format!("Question: {}\nAnswer:{}", question, answer)
}

pub struct Distiller {
    graph: Arc<dyn GraphStore>,
    extractor: Arc<dyn FactExtractor>,
}

impl Distiller {
    pub fn new(graph: Arc<dyn GraphStore>, extractor: Arc<dyn FactExtractor>) -> Self {
        Self { graph, extractor }
    }

    /// Extract facts from a turn and write them to the graph
    ///
    /// Only an extractor failure is returned as an error. Write failures are
    /// counted in the report.
    pub async fn distill(&self, question: &str, answer: &str) -> Result<DistillationReport> {
        let text = distillation_text(question, answer);
        let candidates = self.extractor.extract_facts(&text).await?;

        let mut report = DistillationReport {
            candidates: candidates.len(),
            ..DistillationReport::default()
        };

        if candidates.is_empty() {
            debug!("No facts found to distill");
            return Ok(report);
        }

        for candidate in &candidates {
            let Some(edge) = candidate.to_edge() else {
                debug!(candidate = ?candidate.0, "Skipping incomplete fact");
                report.skipped += 1;
                continue;
            };

            match self
                .graph
                .add_relationship(&edge.head, &edge.relation_type, &edge.tail)
                .await
            {
                Ok(()) => {
                    debug!(fact = %edge, "Stored fact");
                    report.stored += 1;
                }
                Err(e) => {
                    warn!(fact = %edge, error = %e, code = e.code(), "Failed to store fact");
                    report.failed += 1;
                }
            }
        }

        info!(
            candidates = report.candidates,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed,
            "Distillation complete"
        );
        Ok(report)
    }
}
