//! Config module tests

use crate::config::{Config, EmbeddingProviderKind, ProviderKind};

#[test]
fn test_config_default() {
    let config = Config::default();

    // Cache defaults
    assert_eq!(config.cache.threshold, 0.9);
    assert_eq!(config.cache.collection, "universal_history");
    assert_eq!(config.cache.dimension, 384);
    assert_eq!(config.cache.top_k, 3);
    assert_eq!(config.cache.store_timeout_secs, 10);

    // LLM defaults
    assert!(config.llm.api_key.is_none());
    assert_eq!(config.llm.provider, ProviderKind::Cloud);
    assert_eq!(config.llm.default_model, "llama-3.3-70b-versatile");
    assert_eq!(config.llm.local_model, "qwen3");
    assert_eq!(config.llm.temperature, 0.7);
    assert_eq!(config.llm.timeout_secs, 120);

    // Gardener defaults
    assert_eq!(config.gardener.interval_secs, 86_400);
    assert_eq!(config.gardener.retention_days, 365);
    assert_eq!(config.gardener.retention(), chrono::Duration::days(365));

    assert!(config.storage.database_path.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_toml_roundtrip() {
    let mut config = Config::default();
    config.cache.threshold = 0.85;
    config.llm.provider = ProviderKind::Local;

    let serialized = toml::to_string_pretty(&config).expect("Should serialize");
    let parsed = Config::from_toml(&serialized).expect("Should parse");

    assert_eq!(parsed.cache.threshold, 0.85);
    assert_eq!(parsed.llm.provider, ProviderKind::Local);
    assert!(!serialized.contains("api_key"));
}

#[test]
fn test_api_key_in_file_is_rejected() {
    let mut serialized = toml::to_string_pretty(&Config::default()).expect("Should serialize");
    serialized = serialized.replace("[llm]\n", "[llm]\napi_key = \"sk-secret\"\n");

    let err = Config::from_toml(&serialized).unwrap_err();
    assert!(err.to_string().contains("environment variables"));
}

#[test]
fn test_set_api_key_is_rejected() {
    let mut config = Config::default();
    let err = config.set("llm.api_key", "sk-test").unwrap_err();
    assert!(err.to_string().contains("CORTEX_API_KEY"));
}

#[test]
fn test_get_and_set_threshold() {
    let mut config = Config::default();
    config.set("cache.threshold", "0.75").unwrap();
    assert_eq!(config.get("cache.threshold").unwrap(), "0.75");

    assert!(config.set("cache.threshold", "1.5").is_err());
    assert!(config.set("cache.threshold", "abc").is_err());
    assert_eq!(config.cache.threshold, 0.75);
}

#[test]
fn test_set_providers() {
    let mut config = Config::default();

    config.set("llm.provider", "ollama").unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Local);
    config.set("llm.provider", "cloud").unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Cloud);
    assert!(config.set("llm.provider", "mainframe").is_err());

    config.set("embedding.provider", "hashing").unwrap();
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Hashing);
    assert_eq!(config.get("embedding.provider").unwrap(), "hashing");
}

#[test]
fn test_embedding_dimension_follows_into_cache() {
    let mut config = Config::default();
    config.set("embedding.dimension", "768").unwrap();

    assert_eq!(config.embedding.dimension, 768);
    assert_eq!(config.cache.dimension, 768);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_dimension_mismatch() {
    let mut config = Config::default();
    config.cache.dimension = 512;
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_values_rejected() {
    let mut config = Config::default();
    assert!(config.set("cache.top_k", "0").is_err());
    assert!(config.set("gardener.retention_days", "0").is_err());
    assert!(config.set("gardener.interval_secs", "-5").is_err());
    config.set("gardener.retention_days", "30").unwrap();
    assert_eq!(config.gardener.retention_days, 30);
}

#[test]
fn test_validate_rejects_zero_store_timeout() {
    let mut config = Config::default();
    config.cache.store_timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_retention_days_bounded() {
    let mut config = Config::default();
    assert!(config.set("gardener.retention_days", "4000000000").is_err());
    assert!(config.set("gardener.retention_days", "36501").is_err());
    assert_eq!(config.gardener.retention_days, 365);

    config.gardener.retention_days = 4_000_000_000;
    assert!(config.validate().is_err());

    config.set("gardener.retention_days", "36500").unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_unknown_key() {
    let mut config = Config::default();
    assert!(config.get("cost.daily_limit_usd").is_err());
    assert!(config.set("nope", "1").is_err());
}

#[test]
fn test_list_contains_every_section() {
    let config = Config::default();
    let entries = config.list().unwrap();

    for key in [
        "cache.threshold",
        "llm.provider",
        "embedding.model",
        "gardener.retention_days",
        "storage.database_path",
    ] {
        assert!(entries.iter().any(|(k, _)| k == key), "missing {}", key);
    }
    let db = entries
        .iter()
        .find(|(k, _)| k == "storage.database_path")
        .unwrap();
    assert_eq!(db.1, "(default)");
}

#[test]
fn test_provider_kind_parse() {
    assert_eq!(ProviderKind::parse("LOCAL"), Some(ProviderKind::Local));
    assert_eq!(ProviderKind::parse("groq"), Some(ProviderKind::Cloud));
    assert_eq!(
        EmbeddingProviderKind::parse("FastEmbed"),
        Some(EmbeddingProviderKind::Fastembed)
    );
    assert_eq!(EmbeddingProviderKind::parse("word2vec"), None);
}
