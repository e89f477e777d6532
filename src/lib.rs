//! Proxy Policy - access control and traffic quotas for forward proxies
//!
//! This library decides, per proxied request, whether it may proceed:
//! - Client IP allow/block lists
//! - Request size limits
//! - Basic proxy authentication against configured users
//! - Per-user allowed/denied domain lists
//! - Priority-ordered global allow/deny rules
//! - Daily and monthly byte quotas per user
//!
//! The transport (listener, CONNECT tunnelling, TLS interception) stays
//! outside; it feeds raw request facts in and renders the returned decision.
//!
//! # Example
//!
//! ```rust
//! use proxy_policy::{Config, Credentials, RequestGuard, RequestInfo, Stage};
//!
//! let guard = RequestGuard::from_config(&Config::default()).unwrap();
//!
//! let creds = Credentials::new("user1", "password1");
//! let req = RequestInfo::new("10.0.0.7", "api.github.com")
//!     .with_credentials(&creds)
//!     .with_content_length(512);
//!
//! let decision = guard.check(&req);
//! assert!(decision.allow);
//!
//! let req = RequestInfo::new("10.0.0.7", "www.facebook.com").with_credentials(&creds);
//! let decision = guard.check(&req);
//! assert_eq!(decision.stage, Stage::Access);
//! assert_eq!(decision.status, 403);
//! ```
//!
//! # Matching
//!
//! Domain entries and rule patterns match by literal, case-sensitive
//! substring containment against the host string: `trusted.com` matches
//! `sub.trusted.com` and also `evil-trusted.com`. IP lists use exact string
//! equality.
//!
//! # Evaluation order
//!
//! | Step | Failure status |
//! |------|----------------|
//! | Client IP | 403 |
//! | Request size | 413 |
//! | Authentication | 407 |
//! | Access (user lists, then global rules) | 403 |
//! | Quota | 429 |

pub mod auth;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod ip_guard;
pub mod matcher;
pub mod policy;
pub mod quota;
pub mod types;

// Re-export commonly used items
pub use auth::{authenticate, verify, Credentials};
pub use config::{
    Config, LoggingConfig, QuotaConfig, RuleConfig, SecurityConfig, ServerConfig, UserConfig,
};
pub use error::{ConfigErrorKind, PolicyError, Result};
pub use evaluator::evaluate;
pub use guard::{GuardDecision, RequestGuard, RequestInfo, SharedPolicy};
pub use ip_guard::{check_ip, client_ip};
pub use matcher::{DomainList, HostMatcher, IpList, SubstringMatcher};
pub use policy::{
    GlobalRule, Identity, PolicyStore, QuotaPolicy, RuleKind, SecurityPolicy, DEFAULT_CACHE_SIZE,
};
pub use quota::{Clock, FixedClock, LocalClock, MonthKey, QuotaTracker, QuotaUsage};
pub use types::{ConnectAction, Decision, Stage, Verdict};
