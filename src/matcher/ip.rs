use std::collections::HashSet;

/// IP address list - exact string membership.
///
/// Entries are compared verbatim against the client IP string supplied by the
/// transport; `10.0.0.1` and `::ffff:10.0.0.1` are different entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpList {
    ips: HashSet<String>,
}

impl IpList {
    pub fn new<I, S>(ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ips: ips.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.ips.contains(ip)
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }
}
