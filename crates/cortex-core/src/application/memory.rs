//! Assembled memory system

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::domain::cache::SemanticCache;
use crate::domain::distiller::{Distiller, FactExtractor};
use crate::domain::embedding::Embedder;
use crate::domain::gardener::{DuplicateProposer, Gardener};
use crate::domain::knowledge::GraphStore;
use crate::domain::pipeline::{AnswerGenerator, MemoryPipeline};
use crate::infrastructure::{SqliteGraphStore, SqliteVectorStore};
use crate::jobs::BackgroundJobs;
use crate::llm::embedder_from_config;
use crate::storage::{Database, DatabaseConfig};

/// Both memory tiers over one database, plus the shared job tracker
///
/// Commands that only read memory (`facts`, `cache search`) need nothing
/// else. Answering and gardening take their model-backed collaborators as
/// arguments.
pub struct MemorySystem {
    config: Config,
    database: Database,
    cache: Arc<SemanticCache>,
    graph: Arc<dyn GraphStore>,
    jobs: BackgroundJobs,
}

impl MemorySystem {
    /// Open the configured database and embedder
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let database = Database::new(DatabaseConfig::from_config(&config)).await?;
        let embedder = embedder_from_config(&config).context("Failed to set up the embedder")?;

        Self::with_parts(config, database, embedder).await
    }

    /// Assemble from an already opened database and embedder
    pub async fn with_parts(
        config: Config,
        database: Database,
        embedder: Arc<dyn Embedder>,
    ) -> anyhow::Result<Self> {
        let cache = Arc::new(SemanticCache::new(
            Arc::new(SqliteVectorStore::new(database.pool().clone())),
            embedder,
            config.cache.clone(),
        ));
        cache
            .ensure_collection()
            .await
            .context("Failed to prepare the semantic cache collection")?;

        let graph: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(database.pool().clone()));

        info!(database = %database.path().display(), "Memory system ready");
        Ok(Self {
            config,
            database,
            cache,
            graph,
            jobs: BackgroundJobs::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn cache(&self) -> &Arc<SemanticCache> {
        &self.cache
    }

    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    pub fn jobs(&self) -> &BackgroundJobs {
        &self.jobs
    }

    pub fn distiller(&self, extractor: Arc<dyn FactExtractor>) -> Distiller {
        Distiller::new(Arc::clone(&self.graph), extractor)
    }

    /// Request path sharing this system's job tracker
    pub fn pipeline(
        &self,
        generator: Arc<dyn AnswerGenerator>,
        extractor: Arc<dyn FactExtractor>,
    ) -> MemoryPipeline {
        MemoryPipeline::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.graph),
            generator,
            Arc::new(self.distiller(extractor)),
            self.jobs.clone(),
        )
    }

    pub fn gardener(&self, proposer: Arc<dyn DuplicateProposer>) -> Gardener {
        Gardener::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.cache),
            proposer,
            self.config.gardener.clone(),
        )
    }

    /// Wait for background jobs, then close the database
    pub async fn shutdown(&self) {
        self.jobs.shutdown().await;
        let stats = self.jobs.stats();
        info!(
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Background jobs drained"
        );
        self.database.close().await;
    }
}
