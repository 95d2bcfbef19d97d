//! CLI integration tests for cortex
//!
//! Every test gets its own config directory, so the database and config file
//! land in a temp dir. Nothing here needs a network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated to `dir`, with no API key in its environment
#[allow(deprecated)]
fn cortex_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cortex").unwrap();
    cmd.current_dir(dir.path())
        .env("CORTEX_CONFIG_DIR", dir.path())
        .env_remove("CORTEX_API_KEY")
        .env_remove("GROQ_API_KEY")
        .env("RUST_LOG", "error");
    cmd
}

/// Temp dir configured for the offline embedder
fn offline_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["config", "set", "embedding.provider", "hashing"])
        .assert()
        .success();
    dir
}

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();

    cortex_cmd(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(
            dir.path().to_string_lossy().to_string(),
        ));
}

#[test]
fn test_config_set_then_get() {
    let dir = TempDir::new().unwrap();

    cortex_cmd(&dir)
        .args(["config", "set", "cache.threshold", "0.8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set cache.threshold = 0.8"));

    cortex_cmd(&dir)
        .args(["config", "get", "cache.threshold"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0.8\n"));

    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_rejects_api_key() {
    let dir = TempDir::new().unwrap();

    cortex_cmd(&dir)
        .args(["config", "set", "llm.api_key", "sk-secret"])
        .assert()
        .failure();

    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_config_unknown_key_fails() {
    let dir = TempDir::new().unwrap();

    cortex_cmd(&dir)
        .args(["config", "get", "cache.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_config_list_and_reset() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["config", "set", "gardener.retention_days", "30"])
        .assert()
        .success();

    cortex_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gardener.retention_days = 30"))
        .stdout(predicate::str::contains("cache.collection = universal_history"));

    cortex_cmd(&dir).args(["config", "reset"]).assert().success();

    cortex_cmd(&dir)
        .args(["config", "get", "gardener.retention_days"])
        .assert()
        .success()
        .stdout(predicate::str::diff("365\n"));
}

#[test]
fn test_entities_on_empty_graph() {
    let dir = offline_dir();

    cortex_cmd(&dir)
        .args(["entities"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 entities, 0 relationships"));

    assert!(dir.path().join("cortex.db").exists());
}

#[test]
fn test_entities_json_output() {
    let dir = offline_dir();

    cortex_cmd(&dir)
        .args(["entities", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"entities\": []"));
}

#[test]
fn test_facts_for_unknown_entity() {
    let dir = offline_dir();

    cortex_cmd(&dir)
        .args(["facts", "SpaceX"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No facts found for 'SpaceX'."));
}

#[test]
fn test_cache_search_and_count_on_empty_cache() {
    let dir = offline_dir();

    cortex_cmd(&dir)
        .args(["cache", "search", "Who founded SpaceX?", "-k", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache is empty."));

    cortex_cmd(&dir)
        .args(["cache", "count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
}

#[test]
fn test_ask_without_api_key_fails() {
    let dir = offline_dir();

    cortex_cmd(&dir)
        .args(["ask", "Who founded SpaceX?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key found"));
}

#[test]
fn test_ask_blank_question_fails() {
    let dir = offline_dir();
    cortex_cmd(&dir)
        .args(["config", "set", "llm.provider", "local"])
        .assert()
        .success();

    cortex_cmd(&dir)
        .args(["ask", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Question must not be empty"));
}

#[test]
fn test_garden_on_empty_graph() {
    let dir = offline_dir();
    cortex_cmd(&dir)
        .args(["config", "set", "llm.provider", "local"])
        .assert()
        .success();

    cortex_cmd(&dir)
        .args(["garden"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entities analyzed: 0"))
        .stdout(predicate::str::contains("Cache entries pruned: 0"));
}
