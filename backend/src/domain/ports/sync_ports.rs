//! Driving ports exposing the sync core to inbound adapters.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::UserId;
use crate::domain::sync::{PullPage, PullRequest, PushOutcome, PushRequest, SyncStatusReport};

/// Push entry point implemented by [`crate::domain::Reconciler`].
#[async_trait]
pub trait PushSync: Send + Sync {
    /// Merge a session descriptor and reading batch into store state.
    async fn push(&self, user_id: UserId, request: PushRequest) -> Result<PushOutcome, Error>;
}

/// Pull/status entry points implemented by [`crate::domain::DeltaSelector`].
#[async_trait]
pub trait PullSync: Send + Sync {
    /// Select sessions changed since the checkpoint.
    async fn pull(&self, user_id: UserId, request: PullRequest) -> Result<PullPage, Error>;

    /// Per-user sync statistics and recent ledger rows.
    async fn status(&self, user_id: UserId) -> Result<SyncStatusReport, Error>;
}
