//! Client IP checks.

use crate::policy::SecurityPolicy;

/// Sentinel used when no client address can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Check a client IP against the block and allow lists.
///
/// The block list always wins; a non-empty allow list requires membership.
pub fn check_ip(security: &SecurityPolicy, client_ip: &str) -> bool {
    if security.blocked_ips.contains(client_ip) {
        return false;
    }
    if !security.allowed_ips.is_empty() {
        return security.allowed_ips.contains(client_ip);
    }
    true
}

/// Resolve the client IP the way the proxy sees it.
///
/// Precedence: first `X-Forwarded-For` entry, `X-Real-IP`, the host part of
/// the connection's remote address, then [`UNKNOWN_CLIENT`].
pub fn client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    remote_addr: Option<&str>,
) -> String {
    if let Some(first) = forwarded_for
        .filter(|v| !v.is_empty())
        .and_then(|v| v.split(',').next())
    {
        return first.trim().to_string();
    }

    if let Some(ip) = real_ip.filter(|v| !v.is_empty()) {
        return ip.to_string();
    }

    match remote_addr.filter(|v| !v.is_empty()) {
        Some(addr) => split_host(addr).unwrap_or(addr).to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

/// Host part of `host:port` or `[v6]:port`. `None` if there is no port.
fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        tail.strip_prefix(':')?;
        return Some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    // Bare IPv6 without brackets is ambiguous
    if host.contains(':') {
        return None;
    }
    Some(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;

    fn policy(allowed: &[&str], blocked: &[&str]) -> SecurityPolicy {
        let config = SecurityConfig {
            allowed_ips: allowed.iter().map(|s| s.to_string()).collect(),
            blocked_ips: blocked.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        SecurityPolicy::from(&config)
    }

    #[test]
    fn test_no_lists_allows_everything() {
        let p = policy(&[], &[]);
        assert!(check_ip(&p, "203.0.113.9"));
        assert!(check_ip(&p, UNKNOWN_CLIENT));
    }

    #[test]
    fn test_blocked() {
        let p = policy(&[], &["10.0.0.5"]);
        assert!(!check_ip(&p, "10.0.0.5"));
        assert!(check_ip(&p, "10.0.0.6"));
    }

    #[test]
    fn test_allow_list_requires_membership() {
        let p = policy(&["10.0.0.1"], &[]);
        assert!(check_ip(&p, "10.0.0.1"));
        assert!(!check_ip(&p, "10.0.0.2"));
        assert!(!check_ip(&p, UNKNOWN_CLIENT));
    }

    #[test]
    fn test_block_beats_allow() {
        let p = policy(&["10.0.0.1"], &["10.0.0.1"]);
        assert!(!check_ip(&p, "10.0.0.1"));
    }

    #[test]
    fn test_client_ip_forwarded_for_first_entry() {
        let ip = client_ip(
            Some(" 198.51.100.7 , 10.0.0.1"),
            Some("192.0.2.1"),
            Some("127.0.0.1:5000"),
        );
        assert_eq!(ip, "198.51.100.7");
    }

    #[test]
    fn test_client_ip_real_ip() {
        let ip = client_ip(None, Some("192.0.2.1"), Some("127.0.0.1:5000"));
        assert_eq!(ip, "192.0.2.1");

        let ip = client_ip(Some(""), Some("192.0.2.1"), None);
        assert_eq!(ip, "192.0.2.1");
    }

    #[test]
    fn test_client_ip_remote_addr() {
        assert_eq!(client_ip(None, None, Some("127.0.0.1:5000")), "127.0.0.1");
        assert_eq!(client_ip(None, None, Some("[2001:db8::1]:443")), "2001:db8::1");
        assert_eq!(client_ip(None, None, Some("localhost:80")), "localhost");
    }

    #[test]
    fn test_client_ip_remote_addr_without_port() {
        assert_eq!(client_ip(None, None, Some("127.0.0.1")), "127.0.0.1");
        assert_eq!(client_ip(None, None, Some("2001:db8::1")), "2001:db8::1");
    }

    #[test]
    fn test_client_ip_unknown() {
        assert_eq!(client_ip(None, None, None), UNKNOWN_CLIENT);
        assert_eq!(client_ip(Some(""), Some(""), Some("")), UNKNOWN_CLIENT);
    }
}
