//! Push reconciliation service.
//!
//! Merges an incoming session descriptor and reading batch into store state:
//! last-write-wins on session fields and reading payloads, insert for
//! unoccupied `(session, sensor_type, timestamp)` slots, authoritative
//! `data_count` recount, all committed as one atomic unit together with the
//! ledger finalisation. Retrying the same batch is safe by construction.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::warn;

use super::ledger::{OpenLog, SyncLedger, map_store_error};
use super::ports::{AnalyticsDispatcher, PushSync, PushWrites, SyncStore};
use super::sync::merge::{group_timestamps, plan_reading_writes, plan_session_write};
use super::sync::{PushOutcome, PushRequest, SyncType};
use super::{Error, UserId};

fn count_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Domain service implementing the push half of the sync protocol.
#[derive(Clone)]
pub struct Reconciler<S> {
    store: Arc<S>,
    ledger: SyncLedger<S>,
    analytics: Arc<dyn AnalyticsDispatcher>,
    clock: Arc<dyn Clock>,
}

impl<S> Reconciler<S>
where
    S: SyncStore,
{
    /// Create a reconciler over the given store, analytics hand-off, and
    /// clock.
    pub fn new(
        store: Arc<S>,
        analytics: Arc<dyn AnalyticsDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = SyncLedger::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            ledger,
            analytics,
            clock,
        }
    }

    async fn reconcile(
        &self,
        user_id: UserId,
        request: PushRequest,
        log: OpenLog,
    ) -> Result<PushOutcome, Error> {
        let now = self.clock.utc();
        let session_id = request.session.session_id;
        let total_records = request.readings.len();

        let existing = self
            .store
            .find_session(user_id, session_id)
            .await
            .map_err(map_store_error)?;
        let session_write = plan_session_write(existing.as_ref(), &request.session, user_id);

        let groups = group_timestamps(&request.readings);
        let sensor_types: Vec<&str> = groups.iter().map(|g| g.sensor_type.as_str()).collect();
        let occupied = match &existing {
            Some(session) => self
                .store
                .existing_reading_keys(session.id, groups.clone())
                .await
                .map_err(map_store_error)?,
            None => HashSet::new(),
        };

        let plan = plan_reading_writes(&occupied, request.readings);
        let inserted = plan.inserted();
        let updated = plan.updated();

        let metadata = json!({
            "inserted": inserted,
            "updated": updated,
            "sensor_types": sensor_types,
            "total_size_bytes": request.payload_bytes,
        });
        let log_finalize = self
            .ledger
            .success_outcome(count_i64(total_records), Some(metadata));

        let receipt = self
            .store
            .commit_push(PushWrites {
                log_id: log.id,
                session: session_write,
                reading_inserts: plan.inserts,
                reading_updates: plan.updates,
                now,
                log_finalize,
            })
            .await
            .map_err(map_store_error)?;

        Ok(PushOutcome {
            session_id,
            total_records,
            inserted,
            updated,
            duplicates: 0,
            errors: 0,
            sync_log_id: log.id,
            session_data_count: receipt.data_count,
        })
    }
}

#[async_trait]
impl<S> PushSync for Reconciler<S>
where
    S: SyncStore,
{
    async fn push(&self, user_id: UserId, request: PushRequest) -> Result<PushOutcome, Error> {
        let batch_size = count_i64(request.readings.len());
        let log = self.ledger.open(user_id, SyncType::Push, None).await?;

        match self.reconcile(user_id, request, log).await {
            Ok(outcome) => {
                if let Err(error) = self.analytics.enqueue(user_id, outcome.session_id).await {
                    warn!(%user_id, session_id = %outcome.session_id, error = %error,
                        "analytics dispatch failed after push");
                }
                Ok(outcome)
            }
            Err(error) => {
                self.ledger.finalize_failure(log, &error, batch_size).await;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
