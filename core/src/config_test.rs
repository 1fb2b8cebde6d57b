use super::*;
use tempfile::TempDir;

#[test]
fn test_default_config_values() {
    let config = Config::default();

    // API defaults
    assert_eq!(config.api.base_url, "https://api.assemblyai.com/v2");
    assert!(config.api.api_key.is_none());
    assert_eq!(config.api.request_timeout_secs, 60);
    assert_eq!(config.api.upload_timeout_secs, 0);

    // Polling defaults: fixed 2s cadence, bounded wall clock
    assert_eq!(config.polling.interval_ms, 2000);
    assert!((config.polling.backoff_multiplier - 1.0).abs() < f64::EPSILON);
    assert_eq!(config.polling.max_wait_secs, 3600);

    // Retry defaults
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.logging.level, LogLevel::Info);
    assert!(config.logging.file.is_none());
}

#[test]
fn test_load_valid_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
[api]
base_url = "http://127.0.0.1:8080/v2"
api_key = "secret"
request_timeout_secs = 5
upload_timeout_secs = 1800

[polling]
interval_ms = 500
backoff_multiplier = 2.0
max_interval_ms = 8000
max_wait_secs = 0

[retry]
max_retries = 5
base_delay_ms = 100

[logging]
level = "debug"
file = "/tmp/scribe.log"
"#;

    std::fs::write(&config_path, toml_content).unwrap();

    let config = Config::load_from(&config_path).unwrap();

    assert_eq!(config.api.base_url, "http://127.0.0.1:8080/v2");
    assert_eq!(config.api.api_key.as_deref(), Some("secret"));
    assert_eq!(config.api.request_timeout_secs, 5);
    assert_eq!(config.api.upload_timeout_secs, 1800);
    assert_eq!(config.polling.interval_ms, 500);
    assert!((config.polling.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    assert_eq!(config.polling.max_interval_ms, 8000);
    assert_eq!(config.polling.max_wait_secs, 0);
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.base_delay_ms, 100);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/scribe.log")));
}

#[test]
fn test_missing_config_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nonexistent.toml");

    let config = Config::load_from(&config_path).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_toml_returns_error() {
    let result = Config::parse("this is not valid { toml [");

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("TOML"));
}

#[test]
fn test_invalid_log_level_returns_error() {
    let toml_content = r#"
[logging]
level = "verbose"
"#;

    assert!(Config::parse(toml_content).is_err());
}

#[test]
fn test_partial_config_uses_defaults_for_missing() {
    let partial_toml = r#"
[polling]
interval_ms = 1000
"#;

    let config = Config::parse(partial_toml).unwrap();

    assert_eq!(config.polling.interval_ms, 1000);
    assert_eq!(config.polling.max_interval_ms, 30_000);
    assert_eq!(config.api, ApiConfig::default());
    assert_eq!(config.retry, RetryConfig::default());
}

#[test]
fn test_zero_interval_rejected() {
    let err = Config::parse("[polling]\ninterval_ms = 0\n").unwrap_err();
    assert!(err.to_string().contains("interval_ms"));
}

#[test]
fn test_shrinking_backoff_rejected() {
    let err = Config::parse("[polling]\nbackoff_multiplier = 0.5\n").unwrap_err();
    assert!(err.to_string().contains("backoff_multiplier"));
}

#[test]
fn test_cap_below_interval_rejected() {
    let toml_content = r#"
[polling]
interval_ms = 5000
max_interval_ms = 1000
"#;

    assert!(Config::parse(toml_content).is_err());
}

#[test]
fn test_env_key_overrides_file_key() {
    let api = ApiConfig {
        api_key: Some("from-file".to_string()),
        ..ApiConfig::default()
    };

    assert_eq!(
        api.api_key_with_override(Some("from-env".to_string())).as_deref(),
        Some("from-env")
    );
    assert_eq!(api.api_key_with_override(None).as_deref(), Some("from-file"));
}

#[test]
fn test_blank_keys_count_as_missing() {
    let api = ApiConfig {
        api_key: Some("  ".to_string()),
        ..ApiConfig::default()
    };

    assert_eq!(api.api_key_with_override(Some(String::new())), None);
}

#[test]
fn test_debug_output_redacts_key() {
    let api = ApiConfig {
        api_key: Some("super-secret".to_string()),
        ..ApiConfig::default()
    };

    let debug = format!("{:?}", api);
    assert!(!debug.contains("super-secret"));
    assert!(debug.contains("REDACTED"));
}

#[test]
fn test_redacted_toml_hides_key() {
    let config = Config {
        api: ApiConfig {
            api_key: Some("super-secret".to_string()),
            ..ApiConfig::default()
        },
        ..Config::default()
    };

    let rendered = config.to_redacted_toml().unwrap();
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("api_key = \"[REDACTED]\""));
}

#[test]
fn test_unset_optional_fields_not_serialized() {
    let toml_str = toml::to_string(&Config::default()).unwrap();

    assert!(!toml_str.contains("api_key"));
    assert!(!toml_str.contains("file"));
    assert!(toml_str.contains("level = \"info\""));
}

#[test]
fn test_log_level_filter_covers_binary() {
    assert_eq!(
        LogLevel::Debug.as_filter(),
        "audioscribe_core=debug,scribe=debug"
    );
}
