use claims::{assert_err, assert_matches, assert_ok};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

use lifecycle::config::{ConfigError, load_config};

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn test_load_config_from_file() {
    let (_dir, path) = write_config(
        r#"
        app_version = "2024.10.1"
        notification_check_delay_ms = 2500
        localhost_hosts = ["localhost", "dev.courier.local"]

        [logging]
        level = "warn"
        file = "courier.log"
        "#,
    );

    let config = assert_ok!(load_config(Some(&path)));

    assert_eq!(config.app_version(), "2024.10.1");
    assert_eq!(config.notification_check_delay(), Duration::from_millis(2500));
    assert!(config.localhost_hosts().iter().any(|host| host == "dev.courier.local"));
    assert_eq!(config.logging().level(), "warn");
    assert_eq!(config.logging().file(), Some("courier.log"));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.toml");

    assert_matches!(load_config(Some(&path)), Err(ConfigError::Load(_)));
}

#[test]
fn test_invalid_values_fail_validation() {
    let (_dir, path) = write_config(r#"login_path = """#);

    let err = assert_err!(load_config(Some(&path)));
    assert!(err.to_string().contains("login_path must not be empty"));
}
