//! Integration tests for configuration files and policy reloads.

use std::fs;

use proxy_policy::{Config, ConfigErrorKind, ConnectAction, PolicyError, RequestGuard, Stage};
use tempfile::TempDir;

const POLICY: &str = r#"{
  "server": {
    "addr": "127.0.0.1:3128",
    "read_timeout": 10000000000,
    "write_timeout": 10000000000,
    "idle_timeout": 60000000000,
    "max_connections": 64
  },
  "users": [
    {
      "username": "alice",
      "password": "wonderland",
      "role": "admin",
      "allowed": [],
      "denied": ["gambling"],
      "quota": {"daily_limit": 0, "monthly_limit": 0, "enabled": false}
    }
  ],
  "rules": [
    {"name": "block_tracker", "type": "deny", "pattern": "tracker.", "username": "", "priority": 10}
  ],
  "logging": {"level": "warn", "file": "", "max_size": 10, "max_backups": 1, "compress": false, "console": true},
  "security": {
    "require_auth": true,
    "allowed_ips": [],
    "blocked_ips": [],
    "rate_limit": 60,
    "max_request_size": 1048576,
    "enable_https": true,
    "cert_file": "ca.pem",
    "key_file": "ca.key"
  }
}"#;

#[test]
fn test_load_or_create_writes_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let config = Config::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config, Config::default());

    // Second call reads the file back
    let reread = Config::load_or_create(&path).unwrap();
    assert_eq!(reread, config);
}

#[test]
fn test_save_and_reload_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.json");

    let mut config = Config::default();
    config.security.blocked_ips = vec!["192.0.2.10".to_string()];
    config.save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"blocked_ips\""));
    assert!(text.contains("\"type\": \"deny\""));

    assert_eq!(Config::from_file(&path).unwrap(), config);
}

#[test]
fn test_full_file_fields() {
    let config = Config::parse(POLICY).unwrap();

    assert_eq!(config.server.addr, "127.0.0.1:3128");
    assert_eq!(config.server.max_connections, 64);
    assert_eq!(config.server.idle_timeout.as_secs(), 60);
    assert_eq!(config.logging.level().unwrap(), tracing::Level::WARN);
    assert_eq!(config.security.rate_limit, 60);

    let guard = RequestGuard::from_config(&config).unwrap();
    let snapshot = guard.snapshot();
    assert_eq!(snapshot.connect_action(), ConnectAction::Intercept);
    assert_eq!(snapshot.security().rate_limit_per_minute, 60);
    assert_eq!(snapshot.security().cert_file, "ca.pem");
    assert_eq!(snapshot.identity("alice").unwrap().role, "admin");
}

#[test]
fn test_missing_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, PolicyError::ParseError(_)));
}

#[test]
fn test_reload_from_file_publishes_new_rules() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.json");
    fs::write(&path, POLICY).unwrap();

    let guard = RequestGuard::from_config(&Config::from_file(&path).unwrap()).unwrap();
    let alice = proxy_policy::Credentials::new("alice", "wonderland");
    let req = proxy_policy::RequestInfo::new("10.0.0.1", "cdn.example.com").with_credentials(&alice);
    assert!(guard.check(&req).allow);

    fs::write(&path, POLICY.replace("tracker.", "cdn.")).unwrap();
    guard.reload_from_file(&path).unwrap();

    let d = guard.check(&req);
    assert_eq!(d.stage, Stage::Access);
    assert_eq!(d.reason, "block_tracker");
}

#[test]
fn test_invalid_reload_keeps_previous_policy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.json");
    fs::write(&path, POLICY).unwrap();

    let guard = RequestGuard::from_config(&Config::from_file(&path).unwrap()).unwrap();

    let broken = POLICY.replace("\"type\": \"deny\"", "\"type\": \"block\"");
    fs::write(&path, broken).unwrap();

    let err = guard.reload_from_file(&path).unwrap_err();
    assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownRuleKind));
    assert_eq!(guard.snapshot().rules()[0].name, "block_tracker");

    fs::write(&path, "{ truncated").unwrap();
    assert!(matches!(
        guard.reload_from_file(&path).unwrap_err(),
        PolicyError::JsonError(_)
    ));
    assert_eq!(guard.snapshot().identity_count(), 1);
}
