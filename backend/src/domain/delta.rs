//! Delta-pull selection service.
//!
//! Selects the caller's sessions updated strictly after the supplied
//! checkpoint, most recently changed first, paginated, optionally inlining
//! each session's readings. The returned `server_timestamp` is the only safe
//! checkpoint for the next pull; a client clock ahead of the server's can
//! skip sessions updated inside the skew window.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;

use super::ledger::{SyncLedger, map_store_error};
use super::ports::{PullSync, SessionFilter, SyncStore};
use super::sync::{PullPage, PullRequest, SessionDelta, SyncStatusReport, SyncType};
use super::{Error, UserId};

/// Ledger rows returned by the status endpoint.
const RECENT_SYNCS_LIMIT: i64 = 10;

/// Domain service implementing the pull half of the sync protocol.
#[derive(Clone)]
pub struct DeltaSelector<S> {
    store: Arc<S>,
    ledger: SyncLedger<S>,
    clock: Arc<dyn Clock>,
}

impl<S> DeltaSelector<S>
where
    S: SyncStore,
{
    /// Create a selector over the given store and clock.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let ledger = SyncLedger::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            ledger,
            clock,
        }
    }

    async fn select(
        &self,
        user_id: UserId,
        request: &PullRequest,
    ) -> Result<(Vec<SessionDelta>, i64, usize), Error> {
        let filter = SessionFilter {
            updated_after: request.last_sync_time,
            session_ids: request.session_ids.clone(),
        };
        let page = self
            .store
            .select_sessions(user_id, filter, request.page)
            .await
            .map_err(map_store_error)?;

        let mut deltas = Vec::with_capacity(page.sessions.len());
        let mut total_records = 0_usize;
        for session in page.sessions {
            let readings = if request.include_data {
                let readings = self
                    .store
                    .readings_for_session(session.id)
                    .await
                    .map_err(map_store_error)?;
                total_records += readings.len();
                readings
            } else {
                Vec::new()
            };
            deltas.push(SessionDelta { session, readings });
        }
        Ok((deltas, page.total, total_records))
    }
}

#[async_trait]
impl<S> PullSync for DeltaSelector<S>
where
    S: SyncStore,
{
    async fn pull(&self, user_id: UserId, request: PullRequest) -> Result<PullPage, Error> {
        let request_metadata = json!({
            "last_sync_time": request.last_sync_time.map(|t| t.to_rfc3339()),
            "page": request.page.page(),
            "page_size": request.page.page_size(),
            "include_data": request.include_data,
        });
        let log = self
            .ledger
            .open(user_id, SyncType::Pull, Some(request_metadata))
            .await?;

        match self.select(user_id, &request).await {
            Ok((sessions, total, total_records)) => {
                let has_more = request.page.has_more(total);
                // Finalisation carries the request parameters too: the
                // changeset replaces the row's metadata rather than merging.
                let outcome_metadata = json!({
                    "last_sync_time": request.last_sync_time.map(|t| t.to_rfc3339()),
                    "page": request.page.page(),
                    "page_size": request.page.page_size(),
                    "include_data": request.include_data,
                    "sessions_count": sessions.len(),
                    "total_records": total_records,
                    "total_sessions": total,
                    "has_more": has_more,
                });
                self.ledger
                    .finalize_success(
                        log,
                        i64::try_from(total_records).unwrap_or(i64::MAX),
                        Some(outcome_metadata),
                    )
                    .await?;

                Ok(PullPage {
                    sessions,
                    server_timestamp: self.clock.utc(),
                    page: request.page.page(),
                    page_size: request.page.page_size(),
                    total,
                    has_more,
                    sync_log_id: log.id,
                })
            }
            Err(error) => {
                self.ledger.finalize_failure(log, &error, 0).await;
                Err(error)
            }
        }
    }

    async fn status(&self, user_id: UserId) -> Result<SyncStatusReport, Error> {
        let stats = self
            .store
            .session_stats(user_id)
            .await
            .map_err(map_store_error)?;
        let recent_syncs = self
            .store
            .recent_logs(user_id, RECENT_SYNCS_LIMIT)
            .await
            .map_err(map_store_error)?;
        Ok(SyncStatusReport {
            stats,
            recent_syncs,
        })
    }
}

#[cfg(test)]
#[path = "delta_tests.rs"]
mod tests;
