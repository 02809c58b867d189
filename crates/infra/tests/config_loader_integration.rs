//! Integration tests for configuration loading from files.

use std::io::Write;

use callstats_domain::Config;
use callstats_infra::config;
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> (NamedTempFile, std::path::PathBuf) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    (temp_file, path)
}

#[test]
fn test_load_full_config_from_json_file() {
    let (_temp, path) = write_config(
        r#"{
            "storage": { "path": "/tmp/callstats_integration.db", "pool_size": 6 },
            "recent": {
                "directory": "/tmp/callstats-recent",
                "capacity": 200,
                "fallback_capacity": 20,
                "quota_bytes": 5242880,
                "primary_key": "recent",
                "backup_key": "recent.bak"
            },
            "retention": {
                "enabled": true,
                "horizon_days": 30,
                "sweep_interval_secs": 600,
                "sweep_timeout_secs": 15
            },
            "logging": { "level": "callstats=debug", "json": true }
        }"#,
        "json",
    );

    let config = config::load_from_file(Some(path.clone())).expect("JSON config loads");
    config.validate().expect("JSON config validates");

    assert_eq!(config.storage.pool_size, 6);
    assert_eq!(config.recent.capacity, 200);
    assert_eq!(config.recent.quota_bytes, Some(5_242_880));
    assert_eq!(config.retention.horizon_ms(), 30 * 86_400_000);
    assert_eq!(config.logging.level, "callstats=debug");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_toml_and_json_produce_the_same_config() {
    let (_json_temp, json_path) = write_config(
        r#"{ "storage": { "path": "same.db" }, "retention": { "horizon_days": 7 } }"#,
        "json",
    );
    let (_toml_temp, toml_path) = write_config(
        "[storage]\npath = \"same.db\"\n\n[retention]\nhorizon_days = 7\n",
        "toml",
    );

    let from_json = config::load_from_file(Some(json_path.clone())).unwrap();
    let from_toml = config::load_from_file(Some(toml_path.clone())).unwrap();

    assert_eq!(from_json, from_toml);
    assert_eq!(from_json.recent, Config::default().recent);

    std::fs::remove_file(json_path).ok();
    std::fs::remove_file(toml_path).ok();
}

#[test]
fn test_invalid_values_fail_validation() {
    let (_temp, path) = write_config(
        r#"{ "recent": { "capacity": 4, "fallback_capacity": 8 } }"#,
        "json",
    );

    let config = config::load_from_file(Some(path.clone())).expect("file parses");
    assert!(config.validate().is_err());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_wrong_field_type_is_rejected() {
    let (_temp, path) = write_config("[storage]\npool_size = \"four\"\n", "toml");

    assert!(config::load_from_file(Some(path.clone())).is_err());

    std::fs::remove_file(path).ok();
}
