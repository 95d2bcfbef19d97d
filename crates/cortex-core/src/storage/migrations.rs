//! Database migrations
//!
//! Versioned SQLite schema for the vector collections and the knowledge
//! graph. Migrations are applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Vector collections
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS vector_collections (
        name TEXT PRIMARY KEY NOT NULL,
        dimension INTEGER NOT NULL CHECK (dimension > 0),
        metric TEXT NOT NULL DEFAULT 'cosine' CHECK (metric IN ('cosine', 'dot')),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Vectors are little-endian f32 blobs; created_at_ms is Unix milliseconds
    CREATE TABLE IF NOT EXISTS vector_points (
        collection TEXT NOT NULL REFERENCES vector_collections(name) ON DELETE CASCADE,
        id INTEGER NOT NULL,
        vector BLOB NOT NULL,
        question TEXT NOT NULL,
        answer TEXT NOT NULL,
        created_at_ms INTEGER NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_vector_points_created
        ON vector_points(collection, created_at_ms);
"#;

/// Migration 2: Knowledge graph
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS graph_entities (
        name TEXT PRIMARY KEY NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- The primary key on the normalized triple makes fact insertion an upsert
    CREATE TABLE IF NOT EXISTS graph_relations (
        head TEXT NOT NULL REFERENCES graph_entities(name) ON DELETE CASCADE,
        relation_type TEXT NOT NULL CHECK (length(relation_type) > 0),
        tail TEXT NOT NULL REFERENCES graph_entities(name) ON DELETE CASCADE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (head, relation_type, tail)
    );

    CREATE INDEX IF NOT EXISTS idx_graph_relations_tail ON graph_relations(tail);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Vector collections");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Knowledge graph");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub current_version: i32,
    pub target_version: i32,
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        for table in [
            "vector_collections",
            "vector_points",
            "graph_entities",
            "graph_relations",
        ] {
            let result: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_duplicate_triple_rejected_by_schema() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query("INSERT INTO graph_entities (name) VALUES ('A'), ('B')")
            .execute(&pool)
            .await
            .unwrap();
        let insert = "INSERT INTO graph_relations (head, relation_type, tail) VALUES ('A', 'KNOWS', 'B')";
        sqlx::query(insert).execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).execute(&pool).await.is_err());
    }
}
