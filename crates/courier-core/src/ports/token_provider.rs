//! TokenProvider port: bearer identity tokens for task targets.

use async_trait::async_trait;

/// Issues an identity token for `principal`, scoped to `audience`.
///
/// Implementations never fail outward: any error is logged and reported as
/// `None`, which callers treat as "send without an Authorization header".
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn identity_token(&self, principal: &str, audience: &str) -> Option<String>;
}

/// Provider for deployments without task authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokenProvider;

#[async_trait]
impl TokenProvider for NoTokenProvider {
    async fn identity_token(&self, _principal: &str, _audience: &str) -> Option<String> {
        None
    }
}
