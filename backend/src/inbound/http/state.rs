//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{IdentityProvider, PullSync, PushSync};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Push entry point.
    pub push: Arc<dyn PushSync>,
    /// Pull/status entry point.
    pub pull: Arc<dyn PullSync>,
    /// Credential resolution.
    pub identity: Arc<dyn IdentityProvider>,
}

impl HttpState {
    /// Bundle the port implementations handlers depend on.
    pub fn new(
        push: Arc<dyn PushSync>,
        pull: Arc<dyn PullSync>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            push,
            pull,
            identity,
        }
    }
}
