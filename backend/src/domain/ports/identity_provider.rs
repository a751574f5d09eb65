//! Port abstraction for the external identity collaborator.
//!
//! Token issuance, password hashing, and registration conflicts all live
//! outside the core; the only contract here is turning a presented bearer
//! token into a stable numeric user identity.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::UserId;

define_port_error! {
    /// Errors raised by identity adapters.
    pub enum IdentityError {
        /// The token is missing, malformed, expired, or unknown.
        Unverified { message: String } => "bearer token rejected: {message}",
        /// The identity collaborator is unreachable.
        Unavailable { message: String } => "identity provider unavailable: {message}",
    }
}

/// Resolves a validated credential to a caller identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to the user it authenticates.
    async fn resolve(&self, token: &str) -> Result<UserId, IdentityError>;
}

/// Static-token identity for deployments fronted by an external auth
/// gateway and for tests.
///
/// Accepts exactly one configured token and maps it to one user id.
#[derive(Debug, Clone)]
pub struct FixtureIdentityProvider {
    token: String,
    user_id: UserId,
}

impl FixtureIdentityProvider {
    /// Create a provider accepting `token` on behalf of `user_id`.
    pub fn new(token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            token: token.into(),
            user_id,
        }
    }
}

#[async_trait]
impl IdentityProvider for FixtureIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<UserId, IdentityError> {
        if token == self.token {
            Ok(self.user_id)
        } else {
            Err(IdentityError::unverified("unknown token"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_accepts_only_its_token() {
        let provider = FixtureIdentityProvider::new("dev-token", UserId::new(7));

        let resolved = provider.resolve("dev-token").await.expect("valid token");
        assert_eq!(resolved, UserId::new(7));

        let err = provider.resolve("other").await.expect_err("rejected");
        assert!(matches!(err, IdentityError::Unverified { .. }));
    }
}
