//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables consulted for the provider API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["CORTEX_API_KEY", "GROQ_API_KEY"];

/// Cortex configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub gardener: GardenerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum cosine similarity for a hit (compared with strict `>`)
    pub threshold: f32,
    pub collection: String,
    pub dimension: usize,
    /// Candidates fetched per lookup; only the best one can hit
    pub top_k: usize,
    pub store_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub provider: ProviderKind,
    pub base_url: String,
    pub default_model: String,
    pub local_url: String,
    pub local_model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GardenerConfig {
    pub interval_secs: u64,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; `None` means the default location
    pub database_path: Option<PathBuf>,
}

/// Which chat backend answers questions and extracts facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible hosted API (Groq by default)
    Cloud,
    /// Ollama running on this machine
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cloud" | "groq" | "remote" => Some(Self::Cloud),
            "local" | "ollama" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Which embedding function turns questions into vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// In-process ONNX model (requires the `fastembed` feature)
    Fastembed,
    /// Ollama `/api/embed`
    Ollama,
    /// OpenAI-compatible `/embeddings`
    Openai,
    /// Deterministic feature hashing, no model download
    Hashing,
}

impl EmbeddingProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fastembed => "fastembed",
            Self::Ollama => "ollama",
            Self::Openai => "openai",
            Self::Hashing => "hashing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fastembed" => Some(Self::Fastembed),
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::Openai),
            "hashing" | "hash" => Some(Self::Hashing),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            gardener: GardenerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderKind::Cloud,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            default_model: "llama-3.3-70b-versatile".to_string(),
            local_url: "http://localhost:11434".to_string(),
            local_model: "qwen3".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            model: "all-minilm".to_string(),
            dimension: 384,
        }
    }
}

/// Upper bound for `gardener.retention_days` (100 years)
pub const MAX_RETENTION_DAYS: u32 = 36_500;

impl Default for GardenerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 24 * 60 * 60,
            retention_days: 365,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            collection: "universal_history".to_string(),
            dimension: 384,
            top_k: 3,
            store_timeout_secs: 10,
        }
    }
}

impl CacheConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

impl GardenerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(API_KEY_ENV_VARS
            .iter()
            .find_map(|name| env::var(name).ok())
            .filter(|key| !key.trim().is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CORTEX_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("cortex")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or use defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;

        if !(0.0..=1.0).contains(&self.cache.threshold) {
            return Err(anyhow!("Cache threshold must be between 0.0 and 1.0"));
        }
        if self.cache.dimension == 0 {
            return Err(anyhow!("Cache dimension must be positive"));
        }
        if self.cache.dimension != self.embedding.dimension {
            return Err(anyhow!(
                "Cache dimension ({}) must match embedding dimension ({})",
                self.cache.dimension,
                self.embedding.dimension
            ));
        }
        if self.cache.top_k == 0 {
            return Err(anyhow!("Cache top_k must be at least 1"));
        }
        if self.cache.collection.trim().is_empty() {
            return Err(anyhow!("Cache collection name must not be empty"));
        }
        if self.cache.store_timeout_secs == 0 {
            return Err(anyhow!("Cache store_timeout_secs must be at least 1"));
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.gardener.retention_days) {
            return Err(anyhow!(
                "Gardener retention_days must be between 1 and {}",
                MAX_RETENTION_DAYS
            ));
        }
        if self.gardener.interval_secs == 0 {
            return Err(anyhow!("Gardener interval_secs must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // Cache settings
            "cache.threshold" => Ok(self.cache.threshold.to_string()),
            "cache.collection" => Ok(self.cache.collection.clone()),
            "cache.dimension" => Ok(self.cache.dimension.to_string()),
            "cache.top_k" => Ok(self.cache.top_k.to_string()),
            "cache.store_timeout_secs" => Ok(self.cache.store_timeout_secs.to_string()),

            // LLM settings
            "llm.provider" => Ok(self.llm.provider.as_str().to_string()),
            "llm.base_url" => Ok(self.llm.base_url.clone()),
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.local_url" => Ok(self.llm.local_url.clone()),
            "llm.local_model" => Ok(self.llm.local_model.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            // Embedding settings
            "embedding.provider" => Ok(self.embedding.provider.as_str().to_string()),
            "embedding.model" => Ok(self.embedding.model.clone()),
            "embedding.dimension" => Ok(self.embedding.dimension.to_string()),

            // Gardener settings
            "gardener.interval_secs" => Ok(self.gardener.interval_secs.to_string()),
            "gardener.retention_days" => Ok(self.gardener.retention_days.to_string()),

            // Storage settings
            "storage.database_path" => Ok(self
                .storage
                .database_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string())),

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use CORTEX_API_KEY or GROQ_API_KEY env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `cortex config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            // Cache settings
            "cache.threshold" => {
                let threshold: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid threshold value: {}", value))?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(anyhow!("Threshold must be between 0.0 and 1.0"));
                }
                self.cache.threshold = threshold;
            }
            "cache.collection" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Collection name must not be empty"));
                }
                self.cache.collection = value.trim().to_string();
            }
            "cache.dimension" => {
                self.cache.dimension = parse_positive(value, "dimension")?;
            }
            "cache.top_k" => {
                self.cache.top_k = parse_positive(value, "top_k")?;
            }
            "cache.store_timeout_secs" => {
                self.cache.store_timeout_secs = parse_positive(value, "store_timeout_secs")?;
            }

            // LLM settings
            "llm.provider" => {
                self.llm.provider = ProviderKind::parse(value).ok_or_else(|| {
                    anyhow!("Invalid provider: {}. Valid options: cloud, local", value)
                })?;
            }
            "llm.base_url" => {
                self.llm.base_url = value.trim_end_matches('/').to_string();
            }
            "llm.default_model" => {
                self.llm.default_model = value.to_string();
            }
            "llm.local_url" => {
                self.llm.local_url = value.trim_end_matches('/').to_string();
            }
            "llm.local_model" => {
                self.llm.local_model = value.to_string();
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = parse_positive(value, "max_tokens")?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = parse_positive(value, "timeout_secs")?;
            }

            // Embedding settings
            "embedding.provider" => {
                self.embedding.provider = EmbeddingProviderKind::parse(value).ok_or_else(|| {
                    anyhow!(
                        "Invalid embedding provider: {}. Valid options: fastembed, ollama, openai, hashing",
                        value
                    )
                })?;
            }
            "embedding.model" => {
                self.embedding.model = value.to_string();
            }
            "embedding.dimension" => {
                let dimension = parse_positive(value, "dimension")?;
                self.embedding.dimension = dimension;
                // The collection dimension follows the embedding function
                self.cache.dimension = dimension;
            }

            // Gardener settings
            "gardener.interval_secs" => {
                self.gardener.interval_secs = parse_positive(value, "interval_secs")?;
            }
            "gardener.retention_days" => {
                let days: u32 = parse_positive(value, "retention_days")?;
                if days > MAX_RETENTION_DAYS {
                    return Err(anyhow!(
                        "retention_days must be at most {}",
                        MAX_RETENTION_DAYS
                    ));
                }
                self.gardener.retention_days = days;
            }

            // Storage settings
            "storage.database_path" => {
                self.storage.database_path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the CORTEX_API_KEY or GROQ_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `cortex config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "cache.threshold",
            "cache.collection",
            "cache.dimension",
            "cache.top_k",
            "cache.store_timeout_secs",
            "llm.provider",
            "llm.base_url",
            "llm.default_model",
            "llm.local_url",
            "llm.local_model",
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
            "embedding.provider",
            "embedding.model",
            "embedding.dimension",
            "gardener.interval_secs",
            "gardener.retention_days",
            "storage.database_path",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_positive<T>(value: &str, name: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let parsed: T = value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))?;
    if parsed == T::default() {
        return Err(anyhow!("{} must be greater than zero", name));
    }
    Ok(parsed)
}
