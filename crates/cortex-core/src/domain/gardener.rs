//! Gardener: periodic maintenance of both memory tiers
//!
//! - **Deduplication**: asks the duplicate proposer which entity names refer
//!   to the same thing and merges each pair in the graph
//! - **Cache pruning**: drops semantic cache entries older than the
//!   retention window
//!
//! A whole dedup pass runs under one maintenance lock, so two passes never
//! interleave their merges.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GardenerConfig;
use crate::error::Result;

use super::cache::SemanticCache;
use super::knowledge::GraphStore;

/// One proposed merge: `merge` is folded into `keep`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePair {
    pub keep: String,
    pub merge: String,
}

impl MergePair {
    pub fn new(keep: impl Into<String>, merge: impl Into<String>) -> Self {
        Self {
            keep: keep.into(),
            merge: merge.into(),
        }
    }

    /// Lenient read of a `{"keep": .., "merge": ..}` object
    ///
    /// Missing or non-string fields become empty strings; the gardener skips
    /// such pairs.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        Some(Self::new(field("keep"), field("merge")))
    }

    fn is_actionable(&self) -> bool {
        !self.keep.is_empty() && !self.merge.is_empty() && self.keep != self.merge
    }
}

/// Source of duplicate-entity proposals
#[async_trait]
pub trait DuplicateProposer: Send + Sync {
    /// Pairs of names in `entities` that refer to the same real-world thing
    ///
    /// An unparseable proposal is an error; the gardener aborts the pass.
    async fn propose_duplicates(&self, entities: &[String]) -> Result<Vec<MergePair>>;
}

/// What one dedup pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupOutcome {
    pub entities: usize,
    pub proposed: usize,
    pub merged: usize,
    /// Blank or self pairs, and pairs whose `merge` entity no longer exists
    pub skipped: usize,
    pub failed: usize,
    /// Listing or proposing failed, so no merge was attempted
    pub aborted: bool,
}

/// Result of [`Gardener::run_once`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenerReport {
    pub dedup: DedupOutcome,
    /// `None` when the prune failed
    pub pruned: Option<u64>,
}

pub struct Gardener {
    graph: Arc<dyn GraphStore>,
    cache: Arc<SemanticCache>,
    proposer: Arc<dyn DuplicateProposer>,
    config: GardenerConfig,
    maintenance: Mutex<()>,
}

impl Gardener {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        cache: Arc<SemanticCache>,
        proposer: Arc<dyn DuplicateProposer>,
        config: GardenerConfig,
    ) -> Self {
        Self {
            graph,
            cache,
            proposer,
            config,
            maintenance: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &GardenerConfig {
        &self.config
    }

    /// Merge duplicate entities proposed for the current entity list
    pub async fn deduplicate(&self) -> DedupOutcome {
        let _guard = self.maintenance.lock().await;
        let mut outcome = DedupOutcome::default();

        let entities = match self.graph.list_entity_names().await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(error = %e, code = e.code(), "Gardener could not list entities");
                outcome.aborted = true;
                return outcome;
            }
        };
        outcome.entities = entities.len();

        if entities.len() < 2 {
            debug!(entities = entities.len(), "Not enough entities to deduplicate");
            return outcome;
        }

        info!(entities = entities.len(), "Analyzing entities for duplicates");

        let pairs = match self.proposer.propose_duplicates(&entities).await {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!(error = %e, code = e.code(), "Duplicate proposal failed, skipping pass");
                outcome.aborted = true;
                return outcome;
            }
        };
        outcome.proposed = pairs.len();

        if pairs.is_empty() {
            info!("No duplicates found");
            return outcome;
        }

        for pair in &pairs {
            if !pair.is_actionable() {
                debug!(keep = %pair.keep, merge = %pair.merge, "Ignoring unusable merge pair");
                outcome.skipped += 1;
                continue;
            }

            match self.graph.merge_entities(&pair.keep, &pair.merge).await {
                Ok(true) => outcome.merged += 1,
                Ok(false) => {
                    debug!(keep = %pair.keep, merge = %pair.merge, "Nothing to merge");
                    outcome.skipped += 1;
                }
                Err(e) => {
                    warn!(
                        keep = %pair.keep,
                        merge = %pair.merge,
                        error = %e,
                        code = e.code(),
                        "Entity merge failed"
                    );
                    outcome.failed += 1;
                }
            }
        }

        info!(
            proposed = outcome.proposed,
            merged = outcome.merged,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Graph deduplication complete"
        );
        outcome
    }

    /// Delete cache entries older than the retention window
    pub async fn prune_cache(&self) -> Option<u64> {
        match self.cache.prune_older_than(self.config.retention()).await {
            Ok(deleted) => Some(deleted),
            Err(e) => {
                warn!(
                    error = %e,
                    code = e.code(),
                    retention_days = self.config.retention_days,
                    "Cache pruning failed"
                );
                None
            }
        }
    }

    /// One full maintenance run: dedup, then pruning
    pub async fn run_once(&self) -> GardenerReport {
        info!("Gardener run started");
        let dedup = self.deduplicate().await;
        let pruned = self.prune_cache().await;
        GardenerReport { dedup, pruned }
    }

    /// Run [`Gardener::run_once`] every `interval` until `cancel` fires
    ///
    /// The first run starts immediately.
    pub fn spawn(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Gardener stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.run_once().await;
                        debug!(?report, "Gardener run finished");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use tokio::sync::Notify;

    use crate::config::CacheConfig;
    use crate::domain::embedding::HashingEmbedder;
    use crate::domain::knowledge::{GraphStats, RelationEdge};
    use crate::error::Error;
    use crate::infrastructure::{SqliteGraphStore, SqliteVectorStore};
    use crate::storage::run_migrations;

    struct ScriptedProposer {
        reply: StdMutex<Option<Result<Vec<MergePair>>>>,
        calls: StdMutex<Vec<Vec<String>>>,
        called: Notify,
    }

    impl ScriptedProposer {
        fn new(reply: Result<Vec<MergePair>>) -> Self {
            Self {
                reply: StdMutex::new(Some(reply)),
                calls: StdMutex::new(Vec::new()),
                called: Notify::new(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DuplicateProposer for ScriptedProposer {
        async fn propose_duplicates(&self, entities: &[String]) -> Result<Vec<MergePair>> {
            self.calls.lock().unwrap().push(entities.to_vec());
            self.called.notify_one();
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Delegates to SQLite, but merging `poisoned` away always fails
    struct FailingMerge {
        inner: Arc<SqliteGraphStore>,
        poisoned: &'static str,
    }

    #[async_trait]
    impl GraphStore for FailingMerge {
        async fn add_relationship(&self, head: &str, relation_type: &str, tail: &str) -> Result<()> {
            self.inner.add_relationship(head, relation_type, tail).await
        }
        async fn get_entity_facts(&self, entity_name: &str) -> Result<Vec<String>> {
            self.inner.get_entity_facts(entity_name).await
        }
        async fn list_entity_names(&self) -> Result<Vec<String>> {
            self.inner.list_entity_names().await
        }
        async fn merge_entities(&self, keep: &str, discard: &str) -> Result<bool> {
            if discard == self.poisoned {
                return Err(Error::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            self.inner.merge_entities(keep, discard).await
        }
        async fn outgoing_relationships(&self, name: &str) -> Result<Vec<RelationEdge>> {
            self.inner.outgoing_relationships(name).await
        }
        async fn entity_exists(&self, name: &str) -> Result<bool> {
            self.inner.entity_exists(name).await
        }
        async fn stats(&self) -> Result<GraphStats> {
            self.inner.stats().await
        }
    }

    async fn stores() -> (Arc<SqliteGraphStore>, Arc<SemanticCache>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let graph = Arc::new(SqliteGraphStore::new(pool.clone()));
        let cache = Arc::new(SemanticCache::new(
            Arc::new(SqliteVectorStore::new(pool)),
            Arc::new(HashingEmbedder::new(384)),
            CacheConfig::default(),
        ));
        cache.ensure_collection().await.unwrap();
        (graph, cache)
    }

    async fn fixture(proposer: Arc<ScriptedProposer>) -> (Arc<SqliteGraphStore>, Gardener) {
        let (graph, cache) = stores().await;
        let gardener = Gardener::new(graph.clone(), cache, proposer, GardenerConfig::default());
        (graph, gardener)
    }

    #[test]
    fn test_merge_pair_from_value_is_lenient() {
        assert_eq!(
            MergePair::from_value(&json!({"keep": " SpaceX ", "merge": "Space X"})),
            Some(MergePair::new("SpaceX", "Space X"))
        );
        assert_eq!(
            MergePair::from_value(&json!({"keep": "SpaceX"})),
            Some(MergePair::new("SpaceX", ""))
        );
        assert_eq!(MergePair::from_value(&json!("SpaceX")), None);
    }

    #[tokio::test]
    async fn test_dedup_merges_proposed_pairs() {
        let proposer = Arc::new(ScriptedProposer::new(Ok(vec![MergePair::new(
            "SpaceX", "Space X",
        )])));
        let (graph, gardener) = fixture(proposer.clone()).await;
        graph.add_relationship("Elon Musk", "FOUNDED", "SpaceX").await.unwrap();
        graph.add_relationship("Space X", "BASED_IN", "Hawthorne").await.unwrap();

        let outcome = gardener.deduplicate().await;

        assert_eq!(outcome.merged, 1);
        assert!(!outcome.aborted);
        assert!(!graph.entity_exists("Space X").await.unwrap());
        assert_eq!(
            graph.get_entity_facts("SpaceX").await.unwrap(),
            vec![
                "Elon Musk FOUNDED SpaceX".to_string(),
                "SpaceX BASED_IN Hawthorne".to_string(),
            ]
        );
        assert_eq!(proposer.calls.lock().unwrap()[0].len(), 4);
    }

    #[tokio::test]
    async fn test_dedup_needs_two_entities() {
        let proposer = Arc::new(ScriptedProposer::new(Ok(vec![])));
        let (_graph, gardener) = fixture(proposer.clone()).await;

        let outcome = gardener.deduplicate().await;

        assert_eq!(outcome, DedupOutcome::default());
        assert_eq!(proposer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dedup_aborts_on_unparseable_proposal() {
        let proposer = Arc::new(ScriptedProposer::new(Err(Error::MalformedResponse(
            "not json".to_string(),
        ))));
        let (graph, gardener) = fixture(proposer).await;
        graph.add_relationship("SpaceX", "IS", "Space X").await.unwrap();

        let outcome = gardener.deduplicate().await;

        assert!(outcome.aborted);
        assert_eq!(outcome.merged, 0);
        assert_eq!(graph.stats().await.unwrap().entities, 2);
    }

    #[tokio::test]
    async fn test_dedup_skips_unusable_pairs() {
        let proposer = Arc::new(ScriptedProposer::new(Ok(vec![
            MergePair::new("", "Space X"),
            MergePair::new("SpaceX", "SpaceX"),
            MergePair::new("SpaceX", "Never Seen"),
            MergePair::new("SpaceX", "Space X"),
        ])));
        let (graph, gardener) = fixture(proposer).await;
        graph.add_relationship("SpaceX", "LAUNCHES", "Falcon 9").await.unwrap();
        graph.add_relationship("Space X", "LAUNCHES", "Starship").await.unwrap();

        let outcome = gardener.deduplicate().await;

        assert_eq!(outcome.proposed, 4);
        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.merged, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(
            graph.get_entity_facts("SpaceX").await.unwrap(),
            vec![
                "SpaceX LAUNCHES Falcon 9".to_string(),
                "SpaceX LAUNCHES Starship".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_dedup_continues_after_failed_merge() {
        let proposer = Arc::new(ScriptedProposer::new(Ok(vec![
            MergePair::new("SpaceX", "Space X"),
            MergePair::new("Tesla", "Tesla Inc"),
        ])));
        let (sqlite, cache) = stores().await;
        sqlite.add_relationship("SpaceX", "LAUNCHES", "Falcon 9").await.unwrap();
        sqlite.add_relationship("Space X", "LAUNCHES", "Starship").await.unwrap();
        sqlite.add_relationship("Tesla Inc", "MAKES", "Cars").await.unwrap();
        let graph = Arc::new(FailingMerge {
            inner: sqlite.clone(),
            poisoned: "Space X",
        });
        let gardener = Gardener::new(graph, cache, proposer, GardenerConfig::default());

        let outcome = gardener.deduplicate().await;

        assert!(!outcome.aborted);
        assert_eq!(outcome.proposed, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.merged, 1);
        assert!(sqlite.entity_exists("Space X").await.unwrap());
        assert!(!sqlite.entity_exists("Tesla Inc").await.unwrap());
        assert_eq!(
            sqlite.outgoing_relationships("Tesla").await.unwrap(),
            vec![RelationEdge::new("Tesla", "MAKES", "Cars").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_prune_failure_is_reported_not_fatal() {
        let proposer = Arc::new(ScriptedProposer::new(Ok(vec![])));
        let (graph, cache) = stores().await;
        cache.save("Who founded SpaceX?", "Elon Musk").await;
        let config = GardenerConfig {
            retention_days: 4_000_000_000,
            ..GardenerConfig::default()
        };
        let gardener = Gardener::new(graph, cache.clone(), proposer, config);

        let report = gardener.run_once().await;

        assert_eq!(report.pruned, None);
        assert_eq!(cache.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_once_reports_prune() {
        let proposer = Arc::new(ScriptedProposer::new(Ok(vec![])));
        let (_graph, gardener) = fixture(proposer).await;
        gardener.cache.save("Who founded SpaceX?", "Elon Musk").await;

        let report = gardener.run_once().await;

        assert_eq!(report.pruned, Some(0));
        assert_eq!(gardener.cache.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_spawn_runs_until_cancelled() {
        let proposer = Arc::new(ScriptedProposer::new(Ok(vec![])));
        let (graph, gardener) = fixture(proposer.clone()).await;
        graph.add_relationship("SpaceX", "IS", "Company").await.unwrap();

        let cancel = CancellationToken::new();
        let handle = Arc::new(gardener).spawn(Duration::from_secs(3600), cancel.clone());

        tokio::time::timeout(Duration::from_secs(5), proposer.called.notified())
            .await
            .expect("first run should start immediately");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("gardener should stop")
            .unwrap();
        assert_eq!(proposer.call_count(), 1);
    }
}
