//! SQLite implementation of the GraphStore
//!
//! Entities are rows keyed by name; edges are rows keyed by the normalized
//! `(head, relation_type, tail)` triple, so duplicate facts collapse in the
//! database rather than in application code.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::domain::knowledge::{GraphStats, GraphStore, RelationEdge};
use crate::error::Result;

/// SQLite-backed knowledge graph
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    /// Create a graph store over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RelationRow {
    head: String,
    relation_type: String,
    tail: String,
}

impl From<RelationRow> for RelationEdge {
    fn from(row: RelationRow) -> Self {
        Self {
            head: row.head,
            relation_type: row.relation_type,
            tail: row.tail,
        }
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn add_relationship(&self, head: &str, relation_type: &str, tail: &str) -> Result<()> {
        let edge = RelationEdge::new(head, relation_type, tail)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO graph_entities (name) VALUES (?), (?)")
            .bind(&edge.head)
            .bind(&edge.tail)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO graph_relations (head, relation_type, tail)
            VALUES (?, ?, ?)
            ON CONFLICT(head, relation_type, tail) DO NOTHING
            "#,
        )
        .bind(&edge.head)
        .bind(&edge.relation_type)
        .bind(&edge.tail)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            head = %edge.head,
            relation = %edge.relation_type,
            tail = %edge.tail,
            created = result.rows_affected() > 0,
            "Relationship upserted"
        );
        Ok(())
    }

    async fn get_entity_facts(&self, entity_name: &str) -> Result<Vec<String>> {
        let needle = entity_name.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        // SQLite's lower() folds ASCII only, so matching happens here
        let needle = needle.to_lowercase();
        let rows: Vec<RelationRow> = sqlx::query_as(
            r#"
            SELECT head, relation_type, tail
            FROM graph_relations
            ORDER BY head, relation_type, tail
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|row| {
                row.head.to_lowercase().contains(&needle)
                    || row.tail.to_lowercase().contains(&needle)
            })
            .map(|row| RelationEdge::from(row).as_fact())
            .collect())
    }

    async fn list_entity_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM graph_entities ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn merge_entities(&self, keep: &str, discard: &str) -> Result<bool> {
        if keep == discard {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> =
            sqlx::query_as("SELECT name FROM graph_entities WHERE name = ?")
                .bind(discard)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            debug!(keep = %keep, discard = %discard, "Merge skipped, entity already gone");
            return Ok(false);
        }

        sqlx::query("INSERT OR IGNORE INTO graph_entities (name) VALUES (?)")
            .bind(keep)
            .execute(&mut *tx)
            .await?;

        // Re-point every edge touching `discard`; ones that now duplicate an
        // existing edge are dropped by the primary key
        let moved = sqlx::query(
            r#"
            INSERT OR IGNORE INTO graph_relations (head, relation_type, tail, created_at)
            SELECT
                CASE WHEN head = ? THEN ? ELSE head END,
                relation_type,
                CASE WHEN tail = ? THEN ? ELSE tail END,
                created_at
            FROM graph_relations
            WHERE head = ? OR tail = ?
            "#,
        )
        .bind(discard)
        .bind(keep)
        .bind(discard)
        .bind(keep)
        .bind(discard)
        .bind(discard)
        .execute(&mut *tx)
        .await?;

        let removed = sqlx::query("DELETE FROM graph_relations WHERE head = ? OR tail = ?")
            .bind(discard)
            .bind(discard)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM graph_entities WHERE name = ?")
            .bind(discard)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            keep = %keep,
            discard = %discard,
            edges_moved = moved.rows_affected(),
            edges_collapsed = removed.rows_affected().saturating_sub(moved.rows_affected()),
            "Entities merged"
        );
        Ok(true)
    }

    async fn outgoing_relationships(&self, name: &str) -> Result<Vec<RelationEdge>> {
        let rows: Vec<RelationRow> = sqlx::query_as(
            r#"
            SELECT head, relation_type, tail
            FROM graph_relations
            WHERE head = ?
            ORDER BY relation_type, tail
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RelationEdge::from).collect())
    }

    async fn entity_exists(&self, name: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_entities WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn stats(&self) -> Result<GraphStats> {
        let (entities,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_entities")
            .fetch_one(&self.pool)
            .await?;
        let (relationships,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_relations")
            .fetch_one(&self.pool)
            .await?;

        Ok(GraphStats {
            entities: entities as u64,
            relationships: relationships as u64,
        })
    }
}
