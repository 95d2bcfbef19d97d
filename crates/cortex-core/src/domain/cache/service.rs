//! Semantic cache: answer reuse by question similarity

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::domain::embedding::Embedder;
use crate::error::{Error, Result};

use super::entry::{CacheEntry, CacheIdGenerator, DistanceMetric, PayloadFilter, ScoredEntry};
use super::store::VectorStore;

/// Similarity cache in front of the answer generator
///
/// `lookup` and `save` are best-effort: any store, embedder or timeout
/// failure is logged and turned into a miss or a skipped write. The `try_*`
/// variants surface the error for callers that want it.
pub struct SemanticCache {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: CacheConfig,
    ids: CacheIdGenerator,
}

impl std::fmt::Debug for SemanticCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("collection", &self.config.collection)
            .field("threshold", &self.config.threshold)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl SemanticCache {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
            ids: CacheIdGenerator::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Create the collection if it doesn't exist yet
    ///
    /// Call once when wiring the system up. Fails if the embedder's output
    /// size disagrees with the configured collection dimension.
    pub async fn ensure_collection(&self) -> Result<()> {
        if self.embedder.dimension() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: self.embedder.dimension(),
            });
        }

        self.bounded(
            "create collection",
            self.store.create_collection(
                &self.config.collection,
                self.config.dimension,
                DistanceMetric::Cosine,
            ),
        )
        .await?;

        info!(
            collection = %self.config.collection,
            dimension = self.config.dimension,
            embedder = %self.embedder.name(),
            "Semantic cache collection ready"
        );
        Ok(())
    }

    /// Cached answer for a similar enough question, if any
    pub async fn lookup(&self, query: &str) -> Option<String> {
        match self.try_lookup(query).await {
            Ok(hit) => hit.map(|entry| entry.payload.answer),
            Err(e) => {
                warn!(error = %e, code = e.code(), "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Best match if its score is strictly above the threshold
    pub async fn try_lookup(&self, query: &str) -> Result<Option<ScoredEntry>> {
        let candidates = self.search(query, self.config.top_k.max(1)).await?;

        for (rank, candidate) in candidates.iter().enumerate() {
            debug!(
                rank = rank,
                id = candidate.id,
                score = candidate.score,
                question = %candidate.payload.question,
                "Cache candidate"
            );
        }

        match candidates.into_iter().next() {
            Some(best) if best.score > self.config.threshold => {
                info!(id = best.id, score = best.score, "Cache hit");
                Ok(Some(best))
            }
            Some(best) => {
                debug!(
                    score = best.score,
                    threshold = self.config.threshold,
                    "Cache miss, best candidate below threshold"
                );
                Ok(None)
            }
            None => {
                debug!("Cache miss, collection empty");
                Ok(None)
            }
        }
    }

    /// Top `k` stored questions by similarity
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredEntry>> {
        let vector = self.embed(query).await?;
        self.bounded(
            "vector search",
            self.store.search(&self.config.collection, &vector, k),
        )
        .await
    }

    /// Store a question/answer pair; returns whether it was written
    pub async fn save(&self, query: &str, answer: &str) -> bool {
        match self.try_save(query, answer).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, code = e.code(), "Cache save skipped");
                false
            }
        }
    }

    /// Store a question/answer pair, returning the new entry id
    pub async fn try_save(&self, query: &str, answer: &str) -> Result<u64> {
        let vector = self.embed(query).await?;
        let entry = CacheEntry::new(self.ids.next_id(), vector, query, answer);

        self.bounded(
            "vector upsert",
            self.store.upsert(&self.config.collection, &entry),
        )
        .await?;

        debug!(id = entry.id, "Saved to semantic cache");
        Ok(entry.id)
    }

    /// Delete entries older than `retention`
    pub async fn prune_older_than(&self, retention: chrono::Duration) -> Result<u64> {
        let cutoff = Utc::now().checked_sub_signed(retention).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Retention of {} days reaches past the supported date range",
                retention.num_days()
            ))
        })?;
        let deleted = self
            .bounded(
                "vector prune",
                self.store
                    .delete_where(&self.config.collection, &PayloadFilter::CreatedBefore(cutoff)),
            )
            .await?;

        info!(deleted = deleted, cutoff = %cutoff, "Pruned old cache entries");
        Ok(deleted)
    }

    /// Number of cached entries
    pub async fn count(&self) -> Result<u64> {
        self.bounded("vector count", self.store.count(&self.config.collection))
            .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.bounded("embed", self.embedder.embed(text)).await?;
        if vector.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.store_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(operation.to_string(), limit.as_secs())),
        }
    }
}
