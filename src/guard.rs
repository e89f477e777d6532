//! Per-request orchestration.
//!
//! [`RequestGuard`] runs the checks in order, stopping at the first failure:
//! client IP, request size, authentication, access, quota. It performs no I/O;
//! the transport renders the returned [`GuardDecision`].

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::auth::{self, Credentials, DEFAULT_REALM};
use crate::config::Config;
use crate::error::Result;
use crate::ip_guard;
use crate::policy::PolicyStore;
use crate::quota::QuotaTracker;
use crate::types::Stage;

pub const STATUS_OK: u16 = 200;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_PROXY_AUTH_REQUIRED: u16 = 407;
pub const STATUS_PAYLOAD_TOO_LARGE: u16 = 413;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

pub const REASON_IP_REJECTED: &str = "client ip rejected";
pub const REASON_TOO_LARGE: &str = "request too large";
pub const REASON_AUTH_REQUIRED: &str = "authentication required";
pub const REASON_QUOTA_EXCEEDED: &str = "quota exceeded";

/// Process-wide policy pointer.
///
/// Readers take an `Arc` to the snapshot that is current when they start and
/// keep using it even if a reload publishes a newer one meanwhile.
pub struct SharedPolicy {
    current: ArcSwap<PolicyStore>,
}

impl SharedPolicy {
    pub fn new(store: PolicyStore) -> Self {
        Self {
            current: ArcSwap::from_pointee(store),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<PolicyStore> {
        self.current.load_full()
    }

    /// Atomically replace the snapshot
    pub fn publish(&self, store: PolicyStore) {
        self.current.store(Arc::new(store));
    }
}

/// Raw inputs supplied by the transport for one request
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub credentials: Option<&'a Credentials>,
    pub client_ip: &'a str,
    /// Destination host as seen by the proxy (may include a port)
    pub host: &'a str,
    /// `None` when the length is unknown
    pub content_length: Option<u64>,
}

impl<'a> RequestInfo<'a> {
    pub fn new(client_ip: &'a str, host: &'a str) -> Self {
        Self {
            credentials: None,
            client_ip,
            host,
            content_length: None,
        }
    }

    pub fn with_credentials(mut self, credentials: &'a Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the declared body length. Negative values mean unknown.
    pub fn with_content_length(mut self, length: i64) -> Self {
        self.content_length = u64::try_from(length).ok();
        self
    }

    fn username(&self) -> &'a str {
        self.credentials.map_or("", |c| c.username.as_str())
    }

    fn password(&self) -> &'a str {
        self.credentials.map_or("", |c| c.password.as_str())
    }
}

/// Final outcome for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecision {
    pub allow: bool,
    /// HTTP status the transport should answer with on denial
    pub status: u16,
    pub reason: String,
    /// Step that decided; [`Stage::Complete`] when everything passed
    pub stage: Stage,
    /// Bytes charged against the identity's quota
    pub charged: u64,
    /// `Proxy-Authenticate` value to send with a 407
    pub challenge: Option<String>,
}

impl GuardDecision {
    fn deny(stage: Stage, status: u16, reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            status,
            reason: reason.into(),
            stage,
            charged: 0,
            challenge: None,
        }
    }

    fn allow(reason: impl Into<String>, charged: u64) -> Self {
        Self {
            allow: true,
            status: STATUS_OK,
            reason: reason.into(),
            stage: Stage::Complete,
            charged,
            challenge: None,
        }
    }
}

/// Policy enforcement point shared by all connection handlers
pub struct RequestGuard {
    policy: SharedPolicy,
    quota: QuotaTracker,
    realm: String,
}

impl RequestGuard {
    pub fn new(store: PolicyStore) -> Self {
        Self::with_quota_tracker(store, QuotaTracker::new())
    }

    pub fn with_quota_tracker(store: PolicyStore, quota: QuotaTracker) -> Self {
        Self {
            policy: SharedPolicy::new(store),
            quota,
            realm: DEFAULT_REALM.to_string(),
        }
    }

    /// Compile `config` and build a guard around it
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(PolicyStore::compile(config)?))
    }

    /// Set the realm advertised in authentication challenges
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Snapshot currently in force
    pub fn snapshot(&self) -> Arc<PolicyStore> {
        self.policy.load()
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Publish a new snapshot. Quota usage carries over.
    pub fn publish(&self, store: PolicyStore) {
        tracing::info!(
            identities = store.identity_count(),
            rules = store.rules().len(),
            "policy snapshot published"
        );
        self.policy.publish(store);
    }

    /// Compile and publish `config`. The live snapshot is untouched on error.
    pub fn reload(&self, config: &Config) -> Result<()> {
        let store = PolicyStore::compile(config)?;
        self.publish(store);
        Ok(())
    }

    /// Re-read, validate and publish the config file at `path`.
    /// The live snapshot is untouched on error.
    pub fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let result = Config::from_file(path).and_then(|config| self.reload(&config));
        if let Err(ref e) = result {
            tracing::warn!(path = %path.display(), error = %e, "policy reload failed, keeping current snapshot");
        }
        result
    }

    /// Run every check for one request
    pub fn check(&self, req: &RequestInfo<'_>) -> GuardDecision {
        let decision = self.evaluate(req);
        if !decision.allow {
            tracing::debug!(
                stage = %decision.stage,
                status = decision.status,
                reason = %decision.reason,
                client_ip = req.client_ip,
                host = req.host,
                username = req.username(),
                "request denied"
            );
        }
        decision
    }

    fn evaluate(&self, req: &RequestInfo<'_>) -> GuardDecision {
        let store = self.policy.load();
        let security = store.security();

        if !ip_guard::check_ip(security, req.client_ip) {
            return GuardDecision::deny(Stage::ClientIp, STATUS_FORBIDDEN, REASON_IP_REJECTED);
        }

        if req
            .content_length
            .is_some_and(|len| len > security.max_request_size)
        {
            return GuardDecision::deny(
                Stage::RequestSize,
                STATUS_PAYLOAD_TOO_LARGE,
                REASON_TOO_LARGE,
            );
        }

        let username = req.username();
        if !auth::authenticate(&store, username, req.password()) {
            let mut decision = GuardDecision::deny(
                Stage::Authentication,
                STATUS_PROXY_AUTH_REQUIRED,
                REASON_AUTH_REQUIRED,
            );
            decision.challenge = Some(auth::challenge(&self.realm));
            return decision;
        }

        let access = store.evaluate(username, req.host);
        if !access.is_allow() {
            return GuardDecision::deny(Stage::Access, STATUS_FORBIDDEN, access.reason);
        }

        // Only verified credentials spend an identity's quota
        let charge = req.content_length.unwrap_or(0);
        let verified = store.security().require_auth
            || auth::verify(&store, username, req.password());
        if let Some(identity) = store.identity(username).filter(|_| verified) {
            if !self.quota.charge_and_check(username, &identity.quota, charge) {
                let mut decision = GuardDecision::deny(
                    Stage::Quota,
                    STATUS_TOO_MANY_REQUESTS,
                    REASON_QUOTA_EXCEEDED,
                );
                decision.charged = charge;
                return decision;
            }
            return GuardDecision::allow(access.reason, charge);
        }

        // Wildcard or unverified identity: no quota to charge
        GuardDecision::allow(access.reason, 0)
    }

    /// Charge bytes observed after the fact (e.g. response bodies).
    /// Returns false once the identity is over quota.
    pub fn record_transfer(&self, username: &str, bytes: u64) -> bool {
        let store = self.policy.load();
        match store.identity(username) {
            Some(identity) => self.quota.charge_and_check(username, &identity.quota, bytes),
            None => true,
        }
    }
}
