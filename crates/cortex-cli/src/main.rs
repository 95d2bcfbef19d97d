//! Cortex CLI - two-tier conversational memory

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cortex_core::application::MemorySystem;
use cortex_core::config::Config;
use cortex_core::domain::gardener::GardenerReport;
use cortex_core::llm::LlmProvider;
use cortex_core::storage::{CURRENT_VERSION, migration_status};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cortex")]
#[command(author, version, about = "Semantic cache and knowledge graph memory for LLM answers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question through the memory pipeline
    Ask {
        /// The question; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Show known facts for an entity (case-insensitive substring match)
    Facts { entity: String },

    /// List every entity in the knowledge graph
    Entities,

    /// Inspect the semantic cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Deduplicate the graph and prune old cache entries
    Garden {
        /// Keep running on an interval until interrupted
        #[arg(short, long)]
        watch: bool,
        /// Seconds between runs in watch mode (defaults to gardener.interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Most similar cached questions
    Search {
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },
    /// Number of cached answers
    Count,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show configuration file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cortex=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { question } => cmd_ask(&question.join(" "), cli.format, cli.quiet).await,
        Commands::Facts { entity } => cmd_facts(&entity, cli.format, cli.quiet).await,
        Commands::Entities => cmd_entities(cli.format, cli.quiet).await,
        Commands::Cache { action } => cmd_cache(action, cli.format, cli.quiet).await,
        Commands::Garden {
            watch,
            interval_secs,
        } => cmd_garden(watch, interval_secs, cli.format, cli.quiet).await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
        Commands::Doctor => cmd_doctor(cli.quiet).await,
    }
}

async fn open_memory() -> anyhow::Result<MemorySystem> {
    let config = Config::load()?;
    MemorySystem::open(config).await
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_ask(question: &str, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let system = open_memory().await?;
    let provider = Arc::new(LlmProvider::from_config(&system.config().llm)?);
    let pipeline = system.pipeline(provider.clone(), provider);

    let result = pipeline.answer(question).await;
    // Let the cache write and distillation finish before exiting
    system.shutdown().await;
    let answer = result?;

    if format == OutputFormat::Json {
        return print_json(&answer);
    }

    println!("{}", answer.answer);
    if !quiet {
        println!();
        println!("(source: {})", answer.source);
        if answer.graph_context_found() {
            println!("Context used:");
            for fact in &answer.context {
                println!("  - {}", fact);
            }
        }
    }
    Ok(())
}

async fn cmd_facts(entity: &str, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let system = open_memory().await?;
    let facts = system.graph().get_entity_facts(entity).await?;
    system.shutdown().await;

    if format == OutputFormat::Json {
        return print_json(&facts);
    }

    if facts.is_empty() {
        if !quiet {
            println!("No facts found for '{}'.", entity);
        }
        return Ok(());
    }

    for fact in facts {
        println!("{}", fact);
    }
    Ok(())
}

async fn cmd_entities(format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let system = open_memory().await?;
    let names = system.graph().list_entity_names().await?;
    let stats = system.graph().stats().await?;
    system.shutdown().await;

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "entities": names,
            "stats": stats,
        }));
    }

    for name in &names {
        println!("{}", name);
    }
    if !quiet {
        println!();
        println!(
            "{} entities, {} relationships",
            stats.entities, stats.relationships
        );
    }
    Ok(())
}

async fn cmd_cache(action: CacheAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let system = open_memory().await?;

    match action {
        CacheAction::Search { query, k } => {
            let hits = system.cache().search(&query, k).await?;
            let threshold = system.cache().config().threshold;

            if format == OutputFormat::Json {
                print_json(&hits)?;
            } else if hits.is_empty() {
                if !quiet {
                    println!("Cache is empty.");
                }
            } else {
                for hit in &hits {
                    let marker = if hit.score > threshold { "*" } else { " " };
                    println!(
                        "{} {:.4}  {}  ->  {}",
                        marker, hit.score, hit.payload.question, hit.payload.answer
                    );
                }
                if !quiet {
                    println!();
                    println!("* = would be served from cache (threshold {})", threshold);
                }
            }
        }
        CacheAction::Count => {
            let count = system.cache().count().await?;
            if format == OutputFormat::Json {
                print_json(&serde_json::json!({ "count": count }))?;
            } else {
                println!("{}", count);
            }
        }
    }

    system.shutdown().await;
    Ok(())
}

async fn cmd_garden(
    watch: bool,
    interval_secs: Option<u64>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let system = open_memory().await?;
    let provider = Arc::new(LlmProvider::from_config(&system.config().llm)?);
    let gardener = Arc::new(system.gardener(provider));

    if !watch {
        let report = gardener.run_once().await;
        system.shutdown().await;
        return print_report(&report, format, quiet);
    }

    let interval = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| gardener.config().interval());
    if interval.is_zero() {
        anyhow::bail!("--interval-secs must be at least 1");
    }

    let cancel = CancellationToken::new();
    let handle = Arc::clone(&gardener).spawn(interval, cancel.clone());
    info!(interval_secs = interval.as_secs(), "Gardener watching, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    if let Err(e) = handle.await {
        warn!(error = %e, "Gardener task ended abnormally");
    }

    system.shutdown().await;
    Ok(())
}

fn print_report(report: &GardenerReport, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }
    if quiet {
        return Ok(());
    }

    let dedup = &report.dedup;
    println!("Gardener run complete");
    println!("  Entities analyzed: {}", dedup.entities);
    if dedup.aborted {
        println!("  Deduplication: aborted (see logs)");
    } else {
        println!(
            "  Merges: {} applied, {} skipped, {} failed ({} proposed)",
            dedup.merged, dedup.skipped, dedup.failed, dedup.proposed
        );
    }
    match report.pruned {
        Some(n) => println!("  Cache entries pruned: {}", n),
        None => println!("  Cache pruning: failed (see logs)"),
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Cortex Health Check");
        println!("===================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            config
        }
        Err(e) => {
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
            anyhow::bail!("Health check failed");
        }
    };

    if !quiet {
        println!("[--] LLM provider: {}", config.llm.provider.as_str());
        println!(
            "[--] Embeddings: {} ({}, {} dimensions)",
            config.embedding.provider.as_str(),
            config.embedding.model,
            config.embedding.dimension
        );
    }

    match config.llm.redacted_api_key() {
        Ok(Some(redacted)) => {
            if !quiet {
                println!("[OK] API Key: Configured ({})", redacted);
            }
        }
        Ok(None) => {
            if config.llm.provider == cortex_core::config::ProviderKind::Cloud {
                all_ok = false;
                if !quiet {
                    println!("[!!] API Key: Not configured");
                    println!("     Set CORTEX_API_KEY or GROQ_API_KEY environment variable");
                }
            } else if !quiet {
                println!("[--] API Key: Not needed for the local provider");
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] API Key: Error - {}", e);
            }
        }
    }

    match MemorySystem::open(config).await {
        Ok(system) => {
            let db = system.database();
            match migration_status(db.pool()).await {
                Ok(status) if status.current_version == CURRENT_VERSION => {
                    if !quiet {
                        println!(
                            "[OK] Database: {} (schema v{})",
                            db.path().display(),
                            status.current_version
                        );
                    }
                }
                Ok(status) => {
                    all_ok = false;
                    if !quiet {
                        println!(
                            "[!!] Database: schema v{}, expected v{}",
                            status.current_version, CURRENT_VERSION
                        );
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Database: Error - {}", e);
                    }
                }
            }

            if !quiet {
                match system.cache().count().await {
                    Ok(n) => println!("[OK] Semantic cache: {} entries", n),
                    Err(e) => println!("[!!] Semantic cache: Error - {}", e),
                }
                match system.graph().stats().await {
                    Ok(stats) => println!(
                        "[OK] Knowledge graph: {} entities, {} relationships",
                        stats.entities, stats.relationships
                    ),
                    Err(e) => println!("[!!] Knowledge graph: Error - {}", e),
                }
            }
            system.shutdown().await;
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Memory: Error - {:#}", e);
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    if all_ok {
        Ok(())
    } else {
        anyhow::bail!("Health check failed")
    }
}
