//! Analytics dispatch adapter.
//!
//! The statistics pipeline is an external batch collaborator with its own
//! scheduling and retry policy. This adapter is the hand-off edge: it records
//! the dispatch and returns immediately. Deployments with a real queue
//! replace it behind the same port.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::ports::{AnalyticsDispatchError, AnalyticsDispatcher};

/// Dispatcher that announces the hand-off through structured logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalyticsDispatcher;

#[async_trait]
impl AnalyticsDispatcher for TracingAnalyticsDispatcher {
    async fn enqueue(
        &self,
        user_id: UserId,
        session_id: Uuid,
    ) -> Result<(), AnalyticsDispatchError> {
        info!(%user_id, %session_id, "session handed to analytics worker");
        Ok(())
    }
}
