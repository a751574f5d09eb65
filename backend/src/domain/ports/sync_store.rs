//! Port abstraction for the transactional entity store.
//!
//! The [`SyncStore`] trait is the core's view of durable state: keyed reads,
//! range existence checks, and declarative write sets that the adapter must
//! apply atomically. Services never see connections or transactions; the
//! adapter owns transaction scope per call.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::PageRequest;
use serde_json::Value;
use uuid::Uuid;

use super::define_port_error;
use crate::domain::UserId;
use crate::domain::sync::merge::{ReadingKey, SensorGroup, SessionWrite};
use crate::domain::sync::{
    ReadingUpload, SessionSnapshot, SessionStats, StoredReading, SyncLogEntry, SyncLogStatus,
    SyncType,
};

define_port_error! {
    /// Errors raised by entity store adapters.
    pub enum SyncStoreError {
        /// Store connection could not be established or was lost.
        Connection { message: String } => "sync store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "sync store query failed: {message}",
        /// Stored content could not be decoded into domain types.
        Serialization { message: String } => "sync store serialization failed: {message}",
    }
}

/// Fields for a ledger row opened at the start of an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncLogEntry {
    /// User the attempt belongs to.
    pub user_id: UserId,
    /// Push or pull.
    pub sync_type: SyncType,
    /// Attempt start.
    pub started_at: DateTime<Utc>,
    /// Request parameters worth auditing.
    pub metadata: Option<Value>,
}

/// Terminal fields written onto a ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFinalize {
    /// Terminal status.
    pub status: SyncLogStatus,
    /// Records in the attempt.
    pub records_count: i64,
    /// Reserved no-op slot; stays zero under the current merge policy.
    pub duplicates_count: i64,
    /// Records that failed.
    pub errors_count: i64,
    /// Failure detail for the audit trail.
    pub error_message: Option<String>,
    /// Outcome metadata merged onto the row.
    pub metadata: Option<Value>,
    /// Attempt completion.
    pub completed_at: DateTime<Utc>,
}

/// Atomic write set for one push.
///
/// The adapter must apply the session write, every reading write, the
/// authoritative `data_count` recount, and the ledger finalisation as one
/// transaction: either all of it commits or none of it is observable.
#[derive(Debug, Clone, PartialEq)]
pub struct PushWrites {
    /// Ledger row to finalise inside the transaction.
    pub log_id: i64,
    /// Planned session create or field merge.
    pub session: SessionWrite,
    /// Readings to create. Adapters back inserts with the unique
    /// `(session, sensor_type, timestamp)` constraint and degrade a
    /// concurrent-racer conflict to the update path.
    pub reading_inserts: Vec<ReadingUpload>,
    /// Readings to overwrite in place, in batch order.
    pub reading_updates: Vec<ReadingUpload>,
    /// Server time applied to `updated_at`, `last_synced_at`, and inserts.
    pub now: DateTime<Utc>,
    /// Success finalisation for the ledger row.
    pub log_finalize: LogFinalize,
}

/// Result of a committed push write set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReceipt {
    /// Surrogate key of the created or updated session.
    pub session_pk: i64,
    /// Authoritative reading count after the merge.
    pub data_count: i64,
}

/// Candidate filter for delta selection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionFilter {
    /// Exclusive lower bound on `updated_at`.
    pub updated_after: Option<DateTime<Utc>>,
    /// Restriction to specific natural keys.
    pub session_ids: Option<Vec<Uuid>>,
}

/// One page of delta candidates plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPage {
    /// Selected sessions ordered by `updated_at` descending.
    pub sessions: Vec<SessionSnapshot>,
    /// Size of the filtered set before pagination.
    pub total: i64,
}

/// Transactional entity store port backing the sync core.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Durably create a ledger row; commits independently of any later
    /// entity transaction so failed attempts stay attributable.
    async fn open_log(&self, entry: NewSyncLogEntry) -> Result<i64, SyncStoreError>;

    /// Write terminal fields onto a ledger row.
    async fn finalize_log(&self, log_id: i64, outcome: LogFinalize)
    -> Result<(), SyncStoreError>;

    /// Resolve a session by `(owner, natural key)`.
    async fn find_session(
        &self,
        user_id: UserId,
        session_id: Uuid,
    ) -> Result<Option<SessionSnapshot>, SyncStoreError>;

    /// Occupied reading slots for the given sensor-type groups, one range
    /// query per group.
    async fn existing_reading_keys(
        &self,
        session_pk: i64,
        groups: Vec<SensorGroup>,
    ) -> Result<HashSet<ReadingKey>, SyncStoreError>;

    /// Apply a push write set atomically.
    async fn commit_push(&self, writes: PushWrites) -> Result<PushReceipt, SyncStoreError>;

    /// Select a user's sessions matching the filter, ordered by
    /// `updated_at` descending, paginated, with the pre-pagination total.
    async fn select_sessions(
        &self,
        user_id: UserId,
        filter: SessionFilter,
        page: PageRequest,
    ) -> Result<SessionPage, SyncStoreError>;

    /// All readings of one session ordered by ascending timestamp.
    async fn readings_for_session(
        &self,
        session_pk: i64,
    ) -> Result<Vec<StoredReading>, SyncStoreError>;

    /// Per-user session counters.
    async fn session_stats(&self, user_id: UserId) -> Result<SessionStats, SyncStoreError>;

    /// Most recent ledger rows for a user, newest first.
    async fn recent_logs(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<SyncLogEntry>, SyncStoreError>;
}
