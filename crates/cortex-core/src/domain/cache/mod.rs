//! Semantic cache domain
//!
//! Tier one of the memory: previously answered questions, found again by
//! embedding similarity. A hit requires the best candidate's cosine score to
//! be strictly greater than the configured threshold.

mod entry;
mod service;
mod store;


pub use entry::{
    CacheEntry, CacheIdGenerator, CachePayload, DistanceMetric, PayloadFilter, ScoredEntry,
};
pub use service::SemanticCache;
pub use store::VectorStore;
