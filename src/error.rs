use thiserror::Error;

/// Classifies configuration errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Server listen address is empty
    EmptyAddress,
    /// No users configured
    NoUsers,
    /// A user has an empty username
    EmptyUsername,
    /// Two users share a username
    DuplicateUsername,
    /// Rule type is neither `allow` nor `deny`
    UnknownRuleKind,
    /// Rule pattern is empty
    EmptyPattern,
    /// A user's allowed/denied list holds an empty entry
    EmptyDomainEntry,
    /// Log level is not one of debug, info, warn, error
    UnknownLogLevel,
}

/// Policy engine error types.
///
/// Access denials, failed authentication and exhausted quotas are decisions,
/// not errors; everything here is raised while loading a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Config error: {message}")]
    ConfigError {
        kind: ConfigErrorKind,
        message: String,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PolicyError {
    pub(crate) fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        PolicyError::ConfigError {
            kind,
            message: message.into(),
        }
    }

    /// Configuration error kind, if this is a configuration error.
    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            PolicyError::ConfigError { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
