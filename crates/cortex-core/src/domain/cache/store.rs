//! Vector store contract

use async_trait::async_trait;

use crate::error::Result;

use super::entry::{CacheEntry, DistanceMetric, PayloadFilter, ScoredEntry};

/// Storage backend for named vector collections
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection if absent
    ///
    /// Re-creating an existing collection with the same dimension is a
    /// no-op; a different dimension is [`crate::Error::DimensionMismatch`].
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Insert or replace the point with `entry.id`
    async fn upsert(&self, collection: &str, entry: &CacheEntry) -> Result<()>;

    /// Best `top_k` points by score, descending; equal scores by ascending id
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredEntry>>;

    /// Delete every point matching the filter, returning how many went
    async fn delete_where(&self, collection: &str, filter: &PayloadFilter) -> Result<u64>;

    async fn count(&self, collection: &str) -> Result<u64>;
}
