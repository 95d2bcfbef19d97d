//! Error module tests

use crate::error::{Error, Result};

#[test]
fn test_llm_error() {
    let error = Error::LLMError("Model not found".to_string());
    assert_eq!(error.code(), "E101");
    assert_eq!(
        error.suggestion(),
        Some("cortex config get llm.api_key".to_string())
    );
    assert!(error.to_string().contains("Model not found"));
}

#[test]
fn test_rate_limited_error() {
    let error = Error::RateLimited(30);
    assert_eq!(error.code(), "E102");
    assert_eq!(error.suggestion(), None);
    assert!(error.to_string().contains("30"));
    assert!(error.is_transient());
}

#[test]
fn test_malformed_response_error() {
    let error = Error::MalformedResponse("expected a JSON list".to_string());
    assert_eq!(error.code(), "E103");
    assert!(!error.is_transient());
    assert!(error.to_string().contains("JSON list"));
}

#[test]
fn test_dimension_mismatch_error() {
    let error = Error::DimensionMismatch {
        expected: 384,
        actual: 768,
    };
    assert_eq!(error.code(), "E201");
    assert_eq!(
        error.suggestion(),
        Some("cortex config set embedding.dimension 384".to_string())
    );
    assert!(error.to_string().contains("384"));
    assert!(error.to_string().contains("768"));
}

#[test]
fn test_collection_not_found_error() {
    let error = Error::CollectionNotFound("universal_history".to_string());
    assert_eq!(error.code(), "E401");
    assert!(error.to_string().contains("universal_history"));
}

#[test]
fn test_timeout_error() {
    let error = Error::Timeout("vector search".to_string(), 10);
    assert_eq!(error.code(), "E402");
    assert!(error.is_transient());
    assert!(error.to_string().contains("vector search"));
}

#[test]
fn test_config_error() {
    let error = Error::ConfigError("Missing API key".to_string());
    assert_eq!(error.code(), "E600");
    assert_eq!(error.suggestion(), Some("cortex config list".to_string()));
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("Empty name".to_string());
    assert_eq!(error.code(), "E800");
    assert_eq!(error.suggestion(), None);
    assert!(!error.is_transient());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let error: Error = io.into();
    assert_eq!(error.code(), "E9999");
    assert!(error.is_transient());
}

#[test]
fn test_result_alias() {
    fn fails() -> Result<()> {
        Err(Error::Other("boom".to_string()))
    }
    let err = fails().unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(err.code(), "E9999");
}
