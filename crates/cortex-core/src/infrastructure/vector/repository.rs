//! SQLite implementation of the VectorStore
//!
//! Vectors are stored as little-endian `f32` blobs and scored in process by
//! brute force over the whole collection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::cache::{
    CacheEntry, CachePayload, DistanceMetric, PayloadFilter, ScoredEntry, VectorStore,
};
use crate::domain::embedding::cosine_similarity;
use crate::error::{Error, Result};

/// SQLite-backed vector collections
#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Create a vector store over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn collection(&self, name: &str) -> Result<(usize, DistanceMetric)> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT dimension, metric FROM vector_collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        let (dimension, metric) = row.ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;
        let metric = DistanceMetric::parse(&metric)
            .ok_or_else(|| Error::Other(format!("Invalid distance metric: {}", metric)))?;
        Ok((dimension as usize, metric))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn similarity(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::Dot => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
    }
}

#[derive(Debug, FromRow)]
struct PointRow {
    id: i64,
    vector: Vec<u8>,
    question: String,
    answer: String,
    created_at_ms: i64,
}

impl PointRow {
    fn payload(self) -> CachePayload {
        CachePayload {
            question: self.question,
            answer: self.answer,
            timestamp: DateTime::<Utc>::from_timestamp_millis(self.created_at_ms)
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vector_collections (name, dimension, metric)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(dimension as i64)
        .bind(metric.as_str())
        .execute(&self.pool)
        .await?;

        let (existing, _) = self.collection(name).await?;
        if existing != dimension {
            return Err(Error::DimensionMismatch {
                expected: existing,
                actual: dimension,
            });
        }
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM vector_collections WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn upsert(&self, collection: &str, entry: &CacheEntry) -> Result<()> {
        let (dimension, _) = self.collection(collection).await?;
        if entry.vector.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: entry.vector.len(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO vector_points (collection, id, vector, question, answer, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                vector = excluded.vector,
                question = excluded.question,
                answer = excluded.answer,
                created_at_ms = excluded.created_at_ms
            "#,
        )
        .bind(collection)
        .bind(entry.id as i64)
        .bind(encode_vector(&entry.vector))
        .bind(&entry.payload.question)
        .bind(&entry.payload.answer)
        .bind(entry.payload.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!(collection = %collection, id = entry.id, "Vector point upserted");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredEntry>> {
        let (dimension, metric) = self.collection(collection).await?;
        if vector.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<PointRow> = sqlx::query_as(
            r#"
            SELECT id, vector, question, answer, created_at_ms
            FROM vector_points
            WHERE collection = ?
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredEntry> = rows
            .into_iter()
            .map(|row| {
                let score = similarity(metric, vector, &decode_vector(&row.vector));
                ScoredEntry {
                    id: row.id as u64,
                    score,
                    payload: row.payload(),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn delete_where(&self, collection: &str, filter: &PayloadFilter) -> Result<u64> {
        self.collection(collection).await?;

        let result = match filter {
            PayloadFilter::CreatedBefore(cutoff) => {
                sqlx::query("DELETE FROM vector_points WHERE collection = ? AND created_at_ms < ?")
                    .bind(collection)
                    .bind(cutoff.timestamp_millis())
                    .execute(&self.pool)
                    .await?
            }
        };

        Ok(result.rows_affected())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.collection(collection).await?;

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM vector_points WHERE collection = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}
