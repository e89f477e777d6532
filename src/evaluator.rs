//! Access evaluation.
//!
//! Checks run in a fixed order and the first decisive one wins:
//! identity lookup, user denylist, user allowlist, global rules by priority,
//! then a fail-open default.

use crate::matcher::HostMatcher;
use crate::policy::{PolicyStore, RuleKind};
use crate::types::Decision;

pub const REASON_UNKNOWN_IDENTITY: &str = "unknown identity";
pub const REASON_USER_DENYLIST: &str = "user denylist";
pub const REASON_ALLOWLIST_MISS: &str = "user allowlist miss";
pub const REASON_NO_RULE: &str = "no applicable rule";

/// Decide whether `username` may reach `host` under `store`.
///
/// When authentication is not required, a username that resolves to no
/// identity (including the empty one) is treated as a wildcard identity:
/// per-user lists are skipped and only global rules apply.
pub fn evaluate(store: &PolicyStore, username: &str, host: &str) -> Decision {
    match store.identity(username) {
        Some(identity) => {
            if identity.denied.matches(host) {
                return Decision::deny(REASON_USER_DENYLIST);
            }
            if !identity.allowed.is_empty() && !identity.allowed.matches(host) {
                return Decision::deny(REASON_ALLOWLIST_MISS);
            }
        }
        None if store.security().require_auth => {
            return Decision::deny(REASON_UNKNOWN_IDENTITY);
        }
        None => {}
    }

    scan_rules(store, username, host)
}

fn scan_rules(store: &PolicyStore, username: &str, host: &str) -> Decision {
    let rule = store
        .rules()
        .iter()
        .filter(|r| r.applies_to(username))
        .find(|r| r.matches(host));

    match rule {
        Some(r) if r.kind == RuleKind::Allow => Decision::allow(r.name.clone()),
        Some(r) => Decision::deny(r.name.clone()),
        None => Decision::allow(REASON_NO_RULE),
    }
}
