use filestore_core::config::*;
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.dispatcher.bind_address, "0.0.0.0:8080");
    assert_eq!(config.dispatcher.await_timeout(), Duration::from_secs(5));
    assert!(config.worker.worker_id.is_empty());
    assert!(config.observability.metrics_enabled);
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[dispatcher]
bind_address = "127.0.0.1:9090"
await_timeout_ms = 2500
upload_timeout_base_ms = 1000
upload_timeout_per_mb_ms = 250
max_result_poll_ms = 30000
max_snapshot_wait_ms = 1000
max_request_size_mb = 64

[worker]
worker_id = "storage-a"
dispatcher_url = "http://dispatcher:9090"
storage_root = "/var/lib/filestore"
poll_interval_ms = 100
max_backoff_ms = 2000

[client]
dispatcher_url = "http://dispatcher:9090"
result_timeout_ms = 15000

[observability]
log_level = "debug"
log_format = "json"
metrics_enabled = false
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();

    assert_eq!(config.dispatcher.bind_address, "127.0.0.1:9090");
    assert_eq!(config.dispatcher.max_request_bytes(), 64 * 1024 * 1024);
    assert_eq!(config.worker.worker_id, "storage-a");
    assert_eq!(config.worker.storage_root, "/var/lib/filestore");
    assert_eq!(config.client.result_timeout_ms, 15000);
    assert_eq!(config.observability.log_format, "json");
    assert!(!config.observability.metrics_enabled);
}

#[test]
fn test_config_validation_dispatcher() {
    let mut config = AppConfig::default();

    config.dispatcher.max_snapshot_wait_ms = 0;
    assert!(config.validate().is_err());

    config.dispatcher.max_snapshot_wait_ms = 1000;
    config.dispatcher.max_request_size_mb = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_worker() {
    let mut config = AppConfig::default();

    config.worker.storage_root = "  ".to_string();
    assert!(config.validate().is_err());

    config.worker.storage_root = "data".to_string();
    config.worker.worker_id = "a/b".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_observability() {
    let mut config = AppConfig::default();

    for level in ["trace", "debug", "info", "warn", "error"] {
        config.observability.log_level = level.to_string();
        assert!(config.validate().is_ok(), "日志级别 {level} 应该有效");
    }

    config.observability.log_level = "loud".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_load_from_file() {
    let toml_content = r#"
[dispatcher]
await_timeout_ms = 750

[worker]
storage_root = "/tmp/filestore-test"
"#;

    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), toml_content).unwrap();

    let config = AppConfig::load(Some(temp_file.path().to_str().unwrap())).unwrap();

    assert_eq!(config.dispatcher.await_timeout_ms, 750);
    assert_eq!(config.worker.storage_root, "/tmp/filestore-test");
    // 未出现的字段保持默认值
    assert_eq!(config.dispatcher.upload_timeout_base_ms, 5_000);
}

#[test]
fn test_config_load_nonexistent_file() {
    let result = AppConfig::load(Some("/nonexistent/filestore.toml"));
    assert!(result.is_err());
}

#[test]
fn test_config_environment_override() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), "[client]\nresult_timeout_ms = 9000\n").unwrap();

    env::set_var("FILESTORE__CLIENT__RESULT_TIMEOUT_MS", "1234");
    let config = AppConfig::load(Some(temp_file.path().to_str().unwrap()));
    env::remove_var("FILESTORE__CLIENT__RESULT_TIMEOUT_MS");

    assert_eq!(config.unwrap().client.result_timeout_ms, 1234);
}

#[test]
fn test_invalid_toml_format() {
    let invalid_toml = r#"
[dispatcher
bind_address = "broken
"#;

    assert!(AppConfig::from_toml(invalid_toml).is_err());
}
