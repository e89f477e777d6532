//! Compiled policy snapshot.
//!
//! A [`PolicyStore`] is built once from a validated [`Config`] and never
//! mutated afterwards. Reloads build a new store and publish it through
//! [`SharedPolicy`](crate::guard::SharedPolicy).

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::{Config, QuotaConfig, RuleConfig, SecurityConfig, UserConfig};
use crate::error::{ConfigErrorKind, PolicyError, Result};
use crate::evaluator;
use crate::matcher::{DomainList, HostMatcher, IpList, SubstringMatcher};
use crate::types::{CacheKey, ConnectAction, Decision};

/// Default LRU cache size for access decisions
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Per-identity byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaPolicy {
    /// Bytes per calendar day, 0 = unlimited
    pub daily_limit: u64,
    /// Bytes per calendar month, 0 = unlimited
    pub monthly_limit: u64,
    pub enabled: bool,
}

impl QuotaPolicy {
    /// Whether charges against this policy can ever be refused
    pub fn is_active(&self) -> bool {
        self.enabled && (self.daily_limit > 0 || self.monthly_limit > 0)
    }
}

impl From<QuotaConfig> for QuotaPolicy {
    fn from(q: QuotaConfig) -> Self {
        Self {
            daily_limit: q.daily_limit,
            monthly_limit: q.monthly_limit,
            enabled: q.enabled,
        }
    }
}

/// A configured proxy user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    password: String,
    pub role: String,
    pub allowed: DomainList,
    pub denied: DomainList,
    pub quota: QuotaPolicy,
}

impl Identity {
    fn from_config(user: &UserConfig) -> Self {
        Self {
            username: user.username.clone(),
            password: user.password.clone(),
            role: user.role.clone(),
            allowed: DomainList::new(user.allowed.iter().cloned()),
            denied: DomainList::new(user.denied.iter().cloned()),
            quota: user.quota.into(),
        }
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

/// Global rule kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Allow,
    Deny,
}

impl FromStr for RuleKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allow" => Ok(RuleKind::Allow),
            "deny" => Ok(RuleKind::Deny),
            other => Err(PolicyError::config(
                ConfigErrorKind::UnknownRuleKind,
                format!("rule type must be 'allow' or 'deny', got '{}'", other),
            )),
        }
    }
}

/// A priority-ordered rule applying to one or all identities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalRule {
    pub name: String,
    pub kind: RuleKind,
    pub matcher: SubstringMatcher,
    /// `None` applies the rule to every identity
    pub username: Option<String>,
    pub priority: i64,
}

impl GlobalRule {
    fn from_config(rule: &RuleConfig) -> Result<Self> {
        if rule.pattern.is_empty() {
            return Err(PolicyError::config(
                ConfigErrorKind::EmptyPattern,
                format!("rule pattern must not be empty: {}", rule.name),
            ));
        }
        Ok(Self {
            name: rule.name.clone(),
            kind: rule.kind.parse()?,
            matcher: SubstringMatcher::new(rule.pattern.clone()),
            username: (!rule.username.is_empty()).then(|| rule.username.clone()),
            priority: rule.priority,
        })
    }

    /// Whether this rule is in scope for `username`
    pub fn applies_to(&self, username: &str) -> bool {
        self.username.as_deref().map_or(true, |scope| scope == username)
    }

    pub fn matches(&self, host: &str) -> bool {
        self.matcher.matches(host)
    }
}

/// Client-facing security settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub require_auth: bool,
    pub allowed_ips: IpList,
    pub blocked_ips: IpList,
    /// Passed through to the external rate limiter
    pub rate_limit_per_minute: u32,
    pub max_request_size: u64,
    /// Opaque gate for the transport's CONNECT handling
    pub tls_interception: bool,
    pub cert_file: String,
    pub key_file: String,
}

impl From<&SecurityConfig> for SecurityPolicy {
    fn from(s: &SecurityConfig) -> Self {
        Self {
            require_auth: s.require_auth,
            allowed_ips: IpList::new(s.allowed_ips.iter().cloned()),
            blocked_ips: IpList::new(s.blocked_ips.iter().cloned()),
            rate_limit_per_minute: s.rate_limit,
            max_request_size: s.max_request_size,
            tls_interception: s.enable_https,
            cert_file: s.cert_file.clone(),
            key_file: s.key_file.clone(),
        }
    }
}

/// Immutable policy snapshot with a bounded access-decision cache
pub struct PolicyStore {
    identities: HashMap<String, Identity>,
    rules: Vec<GlobalRule>,
    security: SecurityPolicy,
    cache: Mutex<LruCache<CacheKey, Decision>>,
}

impl PolicyStore {
    /// Compile a validated configuration into a snapshot
    pub fn compile(config: &Config) -> Result<Self> {
        Self::compile_with_cache(config, DEFAULT_CACHE_SIZE)
    }

    /// Compile with an explicit decision cache size
    pub fn compile_with_cache(config: &Config, cache_size: usize) -> Result<Self> {
        config.validate()?;

        let identities = config
            .users
            .iter()
            .map(|u| (u.username.clone(), Identity::from_config(u)))
            .collect();

        let mut rules = config
            .rules
            .iter()
            .map(GlobalRule::from_config)
            .collect::<Result<Vec<_>>>()?;
        // Stable: equal priorities keep declaration order
        rules.sort_by_key(|r| Reverse(r.priority));

        Ok(Self::new(
            identities,
            rules,
            SecurityPolicy::from(&config.security),
            cache_size,
        ))
    }

    fn new(
        identities: HashMap<String, Identity>,
        rules: Vec<GlobalRule>,
        security: SecurityPolicy,
        cache_size: usize,
    ) -> Self {
        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            identities,
            rules,
            security,
            cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    pub fn identity(&self, username: &str) -> Option<&Identity> {
        self.identities.get(username)
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Global rules in evaluation order
    pub fn rules(&self) -> &[GlobalRule] {
        &self.rules
    }

    pub fn security(&self) -> &SecurityPolicy {
        &self.security
    }

    /// How the transport should treat a CONNECT request
    pub fn connect_action(&self) -> ConnectAction {
        if self.security.tls_interception {
            ConnectAction::Intercept
        } else {
            ConnectAction::Tunnel
        }
    }

    /// Evaluate access for `username` to `host`, memoized per snapshot
    pub fn evaluate(&self, username: &str, host: &str) -> Decision {
        let key = CacheKey::new(username, host);

        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(&key) {
            return cached.clone();
        }

        // Evaluation is CPU-only, holding the lock avoids duplicate work
        let decision = evaluator::evaluate(self, username, host);
        cache.put(key, decision.clone());
        decision
    }

    /// Drop all memoized decisions
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

impl fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyStore")
            .field("identities", &self.identities.len())
            .field("rules", &self.rules.len())
            .field("security", &self.security)
            .finish()
    }
}
