//! Configuration parsing and management.
//!
//! The persisted shape is JSON with snake_case keys. Server timeouts are
//! stored as integer nanoseconds.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigErrorKind, PolicyError, Result};

const MIB: u64 = 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub users: Vec<UserConfig>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener settings, consumed by the transport
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    #[serde(with = "duration_nanos")]
    pub read_timeout: Duration,
    #[serde(with = "duration_nanos")]
    pub write_timeout: Duration,
    #[serde(with = "duration_nanos")]
    pub idle_timeout: Duration,
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ":8080".to_string(),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
            max_connections: 1000,
        }
    }
}

/// A configured proxy user
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    /// Domain substrings this user may reach; empty means unrestricted
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Domain substrings this user may never reach
    #[serde(default)]
    pub denied: Vec<String>,
    #[serde(default)]
    pub quota: QuotaConfig,
}

/// Per-user traffic quota, in bytes. Zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct QuotaConfig {
    #[serde(default)]
    pub daily_limit: u64,
    #[serde(default)]
    pub monthly_limit: u64,
    #[serde(default)]
    pub enabled: bool,
}

/// A global access rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: String,
    /// "allow" or "deny"
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub pattern: String,
    /// Restricts the rule to one user; empty applies it to everyone
    #[serde(default)]
    pub username: String,
    /// Higher runs first
    #[serde(default)]
    pub priority: i64,
}

/// Logging configuration.
///
/// Only `level` is interpreted here; file rotation settings are carried for
/// the embedding binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    pub file: String,
    /// Max size of one log file in MB
    pub max_size: u32,
    pub max_backups: u32,
    pub compress: bool,
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "proxy.log".to_string(),
            max_size: 100,
            max_backups: 3,
            compress: true,
            console: true,
        }
    }
}

impl LoggingConfig {
    /// Map the configured level to a tracing level
    pub fn level(&self) -> Result<tracing::Level> {
        match self.level.as_str() {
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            other => Err(PolicyError::config(
                ConfigErrorKind::UnknownLogLevel,
                format!(
                    "log level must be debug, info, warn or error, got '{}'",
                    other
                ),
            )),
        }
    }
}

/// Client-facing security settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub require_auth: bool,
    pub allowed_ips: Vec<String>,
    pub blocked_ips: Vec<String>,
    /// Requests per minute, enforced by an external limiter
    pub rate_limit: u32,
    /// Bytes
    pub max_request_size: u64,
    /// Enables TLS interception of CONNECT tunnels
    pub enable_https: bool,
    pub cert_file: String,
    pub key_file: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_ips: Vec::new(),
            blocked_ips: Vec::new(),
            rate_limit: 1000,
            max_request_size: 10 * MIB,
            enable_https: false,
            cert_file: String::new(),
            key_file: String::new(),
        }
    }
}

impl Default for Config {
    /// Sample policy written out when no config file exists.
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            users: vec![
                UserConfig {
                    username: "admin".to_string(),
                    password: "admin123".to_string(),
                    role: "admin".to_string(),
                    ..Default::default()
                },
                UserConfig {
                    username: "user1".to_string(),
                    password: "password1".to_string(),
                    role: "user".to_string(),
                    allowed: vec!["google.com".to_string(), "github.com".to_string()],
                    denied: vec!["facebook.com".to_string(), "twitter.com".to_string()],
                    quota: QuotaConfig {
                        daily_limit: 100 * MIB,
                        monthly_limit: 2 * 1024 * MIB,
                        enabled: true,
                    },
                },
            ],
            rules: vec![
                RuleConfig {
                    name: "block_malware".to_string(),
                    kind: "deny".to_string(),
                    pattern: "malware.com".to_string(),
                    username: String::new(),
                    priority: 100,
                },
                RuleConfig {
                    name: "allow_trusted".to_string(),
                    kind: "allow".to_string(),
                    pattern: "trusted.com".to_string(),
                    username: String::new(),
                    priority: 90,
                },
            ],
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PolicyError::ParseError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path`, writing the default configuration there first
    /// if it does not exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file missing, writing default");
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        Self::from_file(path)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), data)?;
        tracing::debug!(path = %path.as_ref().display(), "config saved");
        Ok(())
    }

    /// Check structural invariants. Rule kinds are checked here as well as
    /// during compilation so a bad file is rejected before any snapshot
    /// is built.
    pub fn validate(&self) -> Result<()> {
        if self.server.addr.is_empty() {
            return Err(PolicyError::config(
                ConfigErrorKind::EmptyAddress,
                "server address must not be empty",
            ));
        }

        if self.users.is_empty() {
            return Err(PolicyError::config(
                ConfigErrorKind::NoUsers,
                "at least one user must be configured",
            ));
        }

        let mut seen = HashSet::with_capacity(self.users.len());
        for user in &self.users {
            if user.username.is_empty() {
                return Err(PolicyError::config(
                    ConfigErrorKind::EmptyUsername,
                    "username must not be empty",
                ));
            }
            if !seen.insert(user.username.as_str()) {
                return Err(PolicyError::config(
                    ConfigErrorKind::DuplicateUsername,
                    format!("duplicate username: {}", user.username),
                ));
            }
            if user.allowed.iter().chain(&user.denied).any(String::is_empty) {
                return Err(PolicyError::config(
                    ConfigErrorKind::EmptyDomainEntry,
                    format!("user '{}' has an empty domain entry", user.username),
                ));
            }
        }

        for rule in &self.rules {
            if rule.kind != "allow" && rule.kind != "deny" {
                return Err(PolicyError::config(
                    ConfigErrorKind::UnknownRuleKind,
                    format!("rule type must be 'allow' or 'deny': {}", rule.name),
                ));
            }
            if rule.pattern.is_empty() {
                return Err(PolicyError::config(
                    ConfigErrorKind::EmptyPattern,
                    format!("rule pattern must not be empty: {}", rule.name),
                ));
            }
        }

        self.logging.level()?;
        Ok(())
    }

    /// Emit a one-shot overview of the loaded configuration
    pub fn log_summary(&self) {
        tracing::info!(
            addr = %self.server.addr,
            users = self.users.len(),
            rules = self.rules.len(),
            log_level = %self.logging.level,
            require_auth = self.security.require_auth,
            rate_limit = self.security.rate_limit,
            "configuration loaded"
        );
    }
}

mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
