//! Port abstraction for the asynchronous analytics collaborator.
//!
//! After a successful push the reconciler hands the session off for batch
//! statistics. The worker runs out of band with its own retry policy; a
//! dispatch failure is logged and never fails the push.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::define_port_error;
use crate::domain::UserId;

define_port_error! {
    /// Errors raised by analytics dispatch adapters.
    pub enum AnalyticsDispatchError {
        /// The queue or worker endpoint rejected the job.
        Rejected { message: String } => "analytics job rejected: {message}",
        /// The queue infrastructure is unreachable.
        Unavailable { message: String } => "analytics queue unavailable: {message}",
    }
}

/// Fire-and-forget hand-off of a freshly pushed session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsDispatcher: Send + Sync {
    /// Enqueue analysis of `session_id` for `user_id`. Must return quickly;
    /// the actual analysis is never awaited by the core.
    async fn enqueue(&self, user_id: UserId, session_id: Uuid)
    -> Result<(), AnalyticsDispatchError>;
}

/// Dispatcher used when no analytics worker is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAnalyticsDispatcher;

#[async_trait]
impl AnalyticsDispatcher for NoOpAnalyticsDispatcher {
    async fn enqueue(
        &self,
        user_id: UserId,
        session_id: Uuid,
    ) -> Result<(), AnalyticsDispatchError> {
        debug!(%user_id, %session_id, "analytics dispatch skipped (no worker configured)");
        Ok(())
    }
}
