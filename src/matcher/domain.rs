use super::HostMatcher;

/// Domain matcher - literal, case-sensitive substring containment.
///
/// Not hostname-aware: pattern `trusted.com` also matches `evil-trusted.com`
/// and `trusted.com.attacker.net`. Existing policies depend on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringMatcher {
    pattern: String,
}

impl SubstringMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl HostMatcher for SubstringMatcher {
    fn matches(&self, host: &str) -> bool {
        host.contains(self.pattern.as_str())
    }
}

/// An ordered list of substring matchers (a user's allowed or denied domains)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainList {
    entries: Vec<SubstringMatcher>,
}

impl DomainList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: patterns.into_iter().map(SubstringMatcher::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl HostMatcher for DomainList {
    /// True if any entry matches. An empty list matches nothing.
    fn matches(&self, host: &str) -> bool {
        self.entries.iter().any(|m| m.matches(host))
    }
}
