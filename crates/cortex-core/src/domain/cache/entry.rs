//! Cache entries and vector store records

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a cached answer carries besides its vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePayload {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// One point in a vector collection
///
/// Created once by the cache's save step, never mutated, removed only by
/// retention pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: CachePayload,
}

impl CacheEntry {
    pub fn new(id: u64, vector: Vec<f32>, question: &str, answer: &str) -> Self {
        Self {
            id,
            vector,
            payload: CachePayload {
                question: question.to_string(),
                answer: answer.to_string(),
                timestamp: Utc::now(),
            },
        }
    }

    /// Override the creation time (imports and retention tests)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.payload.timestamp = timestamp;
        self
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub id: u64,
    pub score: f32,
    pub payload: CachePayload,
}

/// Similarity used to rank a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    /// Raw dot product; equals cosine for unit vectors
    Dot,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(Self::Cosine),
            "dot" => Some(Self::Dot),
            _ => None,
        }
    }
}

/// Bulk delete selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFilter {
    /// Entries whose timestamp is strictly before the instant
    CreatedBefore(DateTime<Utc>),
}

/// Time-derived, strictly increasing entry ids
///
/// Ids are wall-clock microseconds, bumped to `last + 1` whenever the clock
/// hasn't moved (or moved backwards) since the previous id.
#[derive(Debug, Default)]
pub struct CacheIdGenerator {
    last: AtomicU64,
}

impl CacheIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_strictly_increase() {
        let ids = CacheIdGenerator::new();
        let mut previous = ids.next_id();
        for _ in 0..10_000 {
            let id = ids.next_id();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn test_ids_track_wall_clock() {
        let ids = CacheIdGenerator::new();
        let before = Utc::now().timestamp_micros() as u64;
        let id = ids.next_id();
        assert!(id >= before);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = Arc::new(CacheIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_distance_metric_parse() {
        assert_eq!(DistanceMetric::parse("Cosine"), Some(DistanceMetric::Cosine));
        assert_eq!(DistanceMetric::parse("dot"), Some(DistanceMetric::Dot));
        assert_eq!(DistanceMetric::parse("euclid"), None);
        assert_eq!(DistanceMetric::Cosine.as_str(), "cosine");
    }

    #[test]
    fn test_entry_with_timestamp() {
        let ts = Utc::now() - chrono::Duration::days(400);
        let entry = CacheEntry::new(1, vec![1.0], "q", "a").with_timestamp(ts);
        assert_eq!(entry.payload.timestamp, ts);
        assert_eq!(entry.payload.question, "q");
    }
}
