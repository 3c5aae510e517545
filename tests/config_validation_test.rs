//! Configuration validation tests
//!
//! Tests that verify configuration defaults, loading and startup validation.

use std::io::Write;
use tapmon::config::{Config, RecoverablePolicy};
use tapmon::error::TapmonError;

const MINIMAL: &str = r#"
[[devices]]
address = "192.168.1.20"
username = "me@example.com"
password = "secret"

[remote_write]
endpoint = "https://prom.example.com/api/v1/write"
"#;

/// Write `contents` to a temporary .toml file and load it
fn load(contents: &str) -> Config {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    Config::load(file.path().to_str().expect("utf-8 path")).expect("Failed to load config")
}

fn config_error(config: &Config) -> String {
    match config.validate() {
        Err(TapmonError::Config(message)) => message,
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_minimal_config_gets_defaults() {
    // Given: a config with only the required fields
    // When: loading it
    let config = load(MINIMAL);

    // Then: intervals default to five minutes and the offset to one second
    assert_eq!(config.polling.interval_seconds, 300);
    assert_eq!(config.polling.request_timeout_seconds, 10);
    assert_eq!(config.remote_write.flush_interval_seconds, 300);
    assert_eq!(config.remote_write.flush_offset_millis, 1000);
    assert_eq!(config.remote_write.timeout_seconds, 30);
    assert!(config.remote_write.verify_ssl);
    assert_eq!(
        config.remote_write.on_recoverable_error,
        RecoverablePolicy::Drop
    );
    assert_eq!(config.intake.capacity, 0);
    assert!(!config.server.enabled);
    assert_eq!(config.server.port, 9101);
    assert!(config.validate().is_ok());
}

#[test]
fn test_full_config_is_parsed() {
    // Given: a config overriding every default
    let config = load(
        r#"
[polling]
interval_seconds = 60
request_timeout_seconds = 5

[[devices]]
address = "192.168.1.20"
username = "me@example.com"
password = "secret"
name = "fridge"

[remote_write]
endpoint = "http://localhost:9090/api/v1/write"
username = "writer"
password = "pw"
flush_interval_seconds = 120
flush_offset_millis = 0
verify_ssl = false
on_recoverable_error = "retain"
job = "tapo"

[intake]
capacity = 64

[server]
enabled = true
port = 9200
"#,
    );

    // Then: every value is taken from the file
    assert_eq!(config.polling.interval_seconds, 60);
    assert_eq!(config.devices[0].name.as_deref(), Some("fridge"));
    assert_eq!(config.remote_write.username.as_deref(), Some("writer"));
    assert_eq!(
        config.remote_write.on_recoverable_error,
        RecoverablePolicy::Retain
    );
    assert_eq!(config.remote_write.job.as_deref(), Some("tapo"));
    assert_eq!(config.intake.capacity, 64);
    assert!(config.server.enabled);
    assert_eq!(config.server.port, 9200);
    assert!(config.validate().is_ok());
}

#[test]
fn test_no_devices_fails_validation() {
    let mut config = load(MINIMAL);
    config.devices.clear();

    assert!(config_error(&config).contains("no devices"));
}

#[test]
fn test_duplicate_device_fails_validation() {
    let mut config = load(MINIMAL);
    let duplicate = config.devices[0].clone();
    config.devices.push(duplicate);

    assert!(config_error(&config).contains("more than once"));
}

#[test]
fn test_blank_address_fails_validation() {
    let mut config = load(MINIMAL);
    config.devices[0].address = "  ".to_string();

    assert!(config_error(&config).contains("address"));
}

#[test]
fn test_zero_intervals_fail_validation() {
    let mut config = load(MINIMAL);
    config.polling.interval_seconds = 0;
    assert!(config_error(&config).contains("polling.interval_seconds"));

    let mut config = load(MINIMAL);
    config.remote_write.flush_interval_seconds = 0;
    assert!(config_error(&config).contains("flush_interval_seconds"));
}

#[test]
fn test_malformed_endpoint_fails_validation() {
    // Given: endpoints that are not absolute http(s) URLs
    for endpoint in ["not a url", "ftp://example.com/write", "/api/v1/write"] {
        let mut config = load(MINIMAL);
        config.remote_write.endpoint = endpoint.to_string();

        // Then: validation rejects each of them
        assert!(
            config_error(&config).contains("endpoint"),
            "endpoint {:?} should be rejected",
            endpoint
        );
    }
}

#[test]
fn test_missing_remote_write_section_fails_to_load() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(b"[[devices]]\naddress = \"1.2.3.4\"\nusername = \"u\"\npassword = \"p\"\n")
        .expect("Failed to write config");

    assert!(Config::load(file.path().to_str().expect("utf-8 path")).is_err());
}
