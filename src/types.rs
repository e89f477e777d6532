use std::fmt;

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Allow/deny outcome plus the reason that decided it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: String,
}

impl Decision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Deny,
            reason: reason.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        self.verdict.is_allow()
    }
}

/// Guard step that produced a final decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ClientIp,
    RequestSize,
    Authentication,
    Access,
    Quota,
    /// Every step passed
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ClientIp => "client_ip",
            Stage::RequestSize => "request_size",
            Stage::Authentication => "authentication",
            Stage::Access => "access",
            Stage::Quota => "quota",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// What the transport should do with a CONNECT request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    /// Relay the encrypted stream untouched
    Tunnel,
    /// Terminate TLS and inspect the inner requests
    Intercept,
}

/// Cache key for the per-snapshot decision cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub username: String,
    pub host: String,
}

impl CacheKey {
    pub fn new(username: &str, host: &str) -> Self {
        Self {
            username: username.to_string(),
            host: host.to_string(),
        }
    }
}
