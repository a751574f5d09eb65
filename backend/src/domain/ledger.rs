//! Sync ledger service.
//!
//! Passive recorder wrapped around the store's log operations. Every push or
//! pull opens a row before touching entity state and finalises it on every
//! exit path; `started_at <= completed_at` holds because both come from the
//! same injected clock.

use std::sync::Arc;

use mockable::Clock;
use serde_json::Value;
use tracing::warn;

use super::Error;
use super::UserId;
use super::ports::{LogFinalize, NewSyncLogEntry, SyncStore, SyncStoreError};
use super::sync::{SyncLogStatus, SyncType};

/// Map store failures to transport-agnostic domain errors.
pub(crate) fn map_store_error(error: SyncStoreError) -> Error {
    match error {
        SyncStoreError::Connection { message } => {
            Error::service_unavailable(format!("sync store unavailable: {message}"))
        }
        SyncStoreError::Query { message } => {
            Error::internal(format!("sync store error: {message}"))
        }
        SyncStoreError::Serialization { message } => {
            Error::internal(format!("sync store decode error: {message}"))
        }
    }
}

/// Handle to an opened, not yet finalised ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenLog {
    /// Ledger row id.
    pub id: i64,
}

/// Records every sync attempt for audit and status reporting.
#[derive(Clone)]
pub struct SyncLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> SyncLedger<S>
where
    S: SyncStore,
{
    /// Create a ledger over the given store and clock.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Open a ledger row for an attempt. Commits durably before any entity
    /// mutation so a later rollback cannot erase the attempt.
    pub async fn open(
        &self,
        user_id: UserId,
        sync_type: SyncType,
        metadata: Option<Value>,
    ) -> Result<OpenLog, Error> {
        let id = self
            .store
            .open_log(NewSyncLogEntry {
                user_id,
                sync_type,
                started_at: self.clock.utc(),
                metadata,
            })
            .await
            .map_err(map_store_error)?;
        Ok(OpenLog { id })
    }

    /// Finalise a row with a successful outcome.
    pub async fn finalize_success(
        &self,
        log: OpenLog,
        records_count: i64,
        metadata: Option<Value>,
    ) -> Result<(), Error> {
        self.store
            .finalize_log(log.id, self.success_outcome(records_count, metadata))
            .await
            .map_err(map_store_error)
    }

    /// Build the success finalisation applied atomically by
    /// [`SyncStore::commit_push`].
    pub fn success_outcome(&self, records_count: i64, metadata: Option<Value>) -> LogFinalize {
        LogFinalize {
            status: SyncLogStatus::Success,
            records_count,
            duplicates_count: 0,
            errors_count: 0,
            error_message: None,
            metadata,
            completed_at: self.clock.utc(),
        }
    }

    /// Finalise a row as failed, best effort. A secondary store failure is
    /// logged and swallowed so it never masks the primary error.
    pub async fn finalize_failure(&self, log: OpenLog, error: &Error, errors_count: i64) {
        let outcome = LogFinalize {
            status: SyncLogStatus::Failed,
            records_count: 0,
            duplicates_count: 0,
            errors_count,
            error_message: Some(error.message().to_owned()),
            metadata: None,
            completed_at: self.clock.utc(),
        };
        if let Err(finalize_error) = self.store.finalize_log(log.id, outcome).await {
            warn!(
                log_id = log.id,
                error = %finalize_error,
                "failed to finalise sync log after error"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockable::DefaultClock;

    use super::*;
    use crate::domain::ports::MockSyncStore;

    #[tokio::test]
    async fn open_maps_connection_errors_to_service_unavailable() {
        let mut store = MockSyncStore::new();
        store
            .expect_open_log()
            .return_once(|_| Err(SyncStoreError::connection("refused")));

        let ledger = SyncLedger::new(Arc::new(store), Arc::new(DefaultClock));
        let err = ledger
            .open(UserId::new(1), SyncType::Push, None)
            .await
            .expect_err("open fails");
        assert_eq!(err.code(), crate::domain::ErrorCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn finalize_failure_swallows_secondary_errors() {
        let mut store = MockSyncStore::new();
        store
            .expect_finalize_log()
            .return_once(|_, _| Err(SyncStoreError::query("gone")));

        let ledger = SyncLedger::new(Arc::new(store), Arc::new(DefaultClock));
        ledger
            .finalize_failure(OpenLog { id: 9 }, &Error::internal("boom"), 3)
            .await;
    }

    #[tokio::test]
    async fn failure_outcome_records_detail_and_batch_size() {
        let mut store = MockSyncStore::new();
        store
            .expect_finalize_log()
            .withf(|log_id, outcome| {
                *log_id == 4
                    && outcome.status == SyncLogStatus::Failed
                    && outcome.errors_count == 2
                    && outcome.error_message.as_deref() == Some("boom")
            })
            .return_once(|_, _| Ok(()));

        let ledger = SyncLedger::new(Arc::new(store), Arc::new(DefaultClock));
        ledger
            .finalize_failure(OpenLog { id: 4 }, &Error::internal("boom"), 2)
            .await;
    }
}
