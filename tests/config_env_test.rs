//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy when present; each test sets the variables it asserts on.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use mcp_langbase_mindmap::config::{
    Config, LogFormat, DEFAULT_GENERATION_TIMEOUT_MS, MAX_GENERATION_TIMEOUT_MS,
    MIN_GENERATION_TIMEOUT_MS,
};
use mcp_langbase_mindmap::mindmap::ColorScheme;
use serial_test::serial;
use std::env;

fn with_api_key() {
    env::set_var("LANGBASE_API_KEY", "test-key");
}

#[test]
#[serial]
fn test_config_requires_api_key() {
    let saved = env::var("LANGBASE_API_KEY").ok();
    env::remove_var("LANGBASE_API_KEY");

    // A .env file may still provide the key
    if std::path::Path::new(".env").exists() {
        return;
    }
    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("LANGBASE_API_KEY"));

    if let Some(key) = saved {
        env::set_var("LANGBASE_API_KEY", key);
    }
}

#[test]
#[serial]
fn test_config_from_env_custom_base_url() {
    with_api_key();
    env::set_var("LANGBASE_BASE_URL", "https://custom.api.com");

    let config = Config::from_env().unwrap();
    assert_eq!(config.langbase.base_url, "https://custom.api.com");

    env::remove_var("LANGBASE_BASE_URL");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    with_api_key();
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    with_api_key();
    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");

    env::remove_var("LOG_FORMAT");
    env::remove_var("LOG_LEVEL");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    with_api_key();
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("RETRY_DELAY_MS", "2000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_retries, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);

    env::remove_var("REQUEST_TIMEOUT_MS");
    env::remove_var("MAX_RETRIES");
    env::remove_var("RETRY_DELAY_MS");
}

#[test]
#[serial]
fn test_config_from_env_custom_pipe() {
    with_api_key();
    env::set_var("PIPE_MINDMAP", "custom-mindmap-v2");

    let config = Config::from_env().unwrap();
    assert_eq!(config.pipes.mindmap, "custom-mindmap-v2");

    env::remove_var("PIPE_MINDMAP");
}

#[test]
#[serial]
fn test_config_invalid_number_uses_default() {
    with_api_key();
    env::set_var("DATABASE_MAX_CONNECTIONS", "not-a-number");
    env::set_var("GENERATION_TIMEOUT_MS", "soon");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.generation.timeout_ms, DEFAULT_GENERATION_TIMEOUT_MS);

    env::remove_var("DATABASE_MAX_CONNECTIONS");
    env::remove_var("GENERATION_TIMEOUT_MS");
}

#[test]
#[serial]
fn test_config_generation_timeout_clamped() {
    with_api_key();

    env::set_var("GENERATION_TIMEOUT_MS", "5");
    assert_eq!(
        Config::from_env().unwrap().generation.timeout_ms,
        MIN_GENERATION_TIMEOUT_MS
    );

    env::set_var("GENERATION_TIMEOUT_MS", "99999999");
    assert_eq!(
        Config::from_env().unwrap().generation.timeout_ms,
        MAX_GENERATION_TIMEOUT_MS
    );

    env::set_var("GENERATION_TIMEOUT_MS", "8000");
    assert_eq!(Config::from_env().unwrap().generation.timeout_ms, 8000);

    env::remove_var("GENERATION_TIMEOUT_MS");
}

#[test]
#[serial]
fn test_config_default_color_scheme() {
    with_api_key();

    env::set_var("DEFAULT_COLOR_SCHEME", "authentic-blue");
    assert_eq!(
        Config::from_env().unwrap().generation.default_color_scheme,
        ColorScheme::AuthenticBlue
    );

    env::set_var("DEFAULT_COLOR_SCHEME", "neonpink");
    assert_eq!(
        Config::from_env().unwrap().generation.default_color_scheme,
        ColorScheme::Purple
    );

    env::remove_var("DEFAULT_COLOR_SCHEME");
}
