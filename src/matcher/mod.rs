mod domain;
mod ip;

pub use domain::{DomainList, SubstringMatcher};
pub use ip::IpList;

/// Trait for host matchers
pub trait HostMatcher: Send + Sync {
    /// Check if the host matches this matcher
    fn matches(&self, host: &str) -> bool;
}
