//! Graph store contract
//!
//! The knowledge graph is a directed labeled multigraph keyed by entity name.
//! Writes are MERGE-style upserts so concurrent distillation jobs never need
//! an application lock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::relation::RelationEdge;

/// Entity and relationship counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub entities: u64,
    pub relationships: u64,
}

/// Storage backend for the knowledge graph
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert both entities and the edge between them
    ///
    /// The relation type is normalized first. Inserting a triple that already
    /// exists changes nothing.
    async fn add_relationship(&self, head: &str, relation_type: &str, tail: &str) -> Result<()>;

    /// `"head TYPE tail"` for every edge whose head or tail name contains
    /// `entity_name`, case-insensitively (full Unicode case folding)
    ///
    /// Ordered by head, type, tail. A blank `entity_name` matches nothing.
    async fn get_entity_facts(&self, entity_name: &str) -> Result<Vec<String>>;

    /// Every entity name, ordered by name
    async fn list_entity_names(&self) -> Result<Vec<String>>;

    /// Move every edge touching `discard` onto `keep`, then delete `discard`
    ///
    /// Returns `false` (and changes nothing) when `discard` does not exist.
    /// `keep` is created if missing.
    async fn merge_entities(&self, keep: &str, discard: &str) -> Result<bool>;

    /// Outgoing edges of the entity with exactly this name
    async fn outgoing_relationships(&self, name: &str) -> Result<Vec<RelationEdge>>;

    async fn entity_exists(&self, name: &str) -> Result<bool>;

    async fn stats(&self) -> Result<GraphStats>;
}
