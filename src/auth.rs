//! Proxy authentication.

use base64::Engine;
use subtle::ConstantTimeEq;

use crate::policy::PolicyStore;

/// Realm advertised in `Proxy-Authenticate` challenges
pub const DEFAULT_REALM: &str = "Proxy Policy Realm";

/// Username/password pair supplied by the client
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode a `Proxy-Authorization: Basic <base64(user:pass)>` header value.
    ///
    /// Returns `None` for any other scheme or a malformed payload. The
    /// password may itself contain `:`.
    pub fn from_proxy_authorization(header: &str) -> Option<Self> {
        let encoded = header.trim().strip_prefix("Basic ")?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()?;
        let decoded = std::str::from_utf8(&decoded).ok()?;
        let (user, pass) = decoded.split_once(':')?;
        Some(Self::new(user, pass))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Check `username`/`password` against the snapshot.
///
/// Always true when the policy does not require authentication. Unknown
/// users fail closed.
pub fn authenticate(store: &PolicyStore, username: &str, password: &str) -> bool {
    if !store.security().require_auth {
        return true;
    }

    verify(store, username, password)
}

/// True if `username` is configured and `password` is its password,
/// regardless of whether the policy requires authentication.
pub fn verify(store: &PolicyStore, username: &str, password: &str) -> bool {
    match store.identity(username) {
        Some(identity) => bool::from(identity.password().as_bytes().ct_eq(password.as_bytes())),
        None => false,
    }
}

/// `Proxy-Authenticate` header value for a 407 response
pub fn challenge(realm: &str) -> String {
    format!("Basic realm=\"{}\"", realm)
}
