//! Loading configuration files from disk.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use homectl_protocol::StatusSchema;
use homectl_runner::config::InitialDoorState;
use homectl_runner::{Config, ConfigError};
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
host: "10.0.0.5:2323"
schema: extended
page_path: /srv/www/home/index.html
initial_door_state: unknown
timeouts:
  handshake_ms: 4000
  cycle_budget_ms: 15000
backoff:
  success_secs: 30
smtp:
  relay: mail.example.net
  sender: controller@example.net
  recipients:
    - owner@example.net
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.host, "10.0.0.5:2323");
    assert_eq!(config.schema, StatusSchema::Extended);
    assert_eq!(config.initial_door_state, InitialDoorState::Unknown);
    assert_eq!(config.page_path, Path::new("/srv/www/home/index.html"));
    assert_eq!(config.backoff.success(), Duration::from_secs(30));
    assert_eq!(config.backoff.failure(), Duration::from_secs(2));

    let timeouts = config.protocol_timeouts();
    assert_eq!(timeouts.handshake, Duration::from_secs(4));
    assert_eq!(timeouts.cycle_budget, Some(Duration::from_secs(15)));
    assert_eq!(timeouts.first_field, Duration::from_millis(500));

    let smtp = config.smtp.unwrap();
    assert_eq!(smtp.port, 25);
    assert_eq!(smtp.recipients, vec!["owner@example.net".to_string()]);
}

#[test]
fn test_empty_file_is_default() {
    let file = write_config("");
    assert_eq!(Config::load(file.path()).unwrap(), Config::default());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Read { path: ref p, .. } if *p == path));
}

#[test]
fn test_unknown_key_rejected() {
    let file = write_config("host: controller\npoll_interval: 5\n");
    assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse(_))));
}

#[test]
fn test_invalid_values_rejected() {
    let file = write_config("smtp:\n  relay: mail\n  sender: a@b.c\n  recipients: []\n");
    assert!(matches!(Config::load(file.path()), Err(ConfigError::Invalid(_))));
}
