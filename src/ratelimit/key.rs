//! Rate limit key derivation.

use super::request::RequestInfo;

/// A key that identifies one counter in a window store.
///
/// The derived request key is paired with the name of the policy that
/// produced it, so several policies can share one store without their
/// counters colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    /// Name of the owning policy
    pub policy: String,
    /// Key derived from the request
    pub key: String,
}

impl WindowKey {
    /// Create a new window key.
    pub fn new(policy: &str, key: impl Into<String>) -> Self {
        Self {
            policy: policy.to_string(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.policy, self.key)
    }
}

/// Default key: client address plus request path.
pub fn address_and_path(request: &RequestInfo) -> String {
    format!("{}:{}", request.client_addr, request.path)
}

/// Address-only key under a fixed scope, e.g. `auth:203.0.113.7`.
pub fn scoped_address(scope: &str, request: &RequestInfo) -> String {
    format!("{}:{}", scope, request.client_addr)
}
