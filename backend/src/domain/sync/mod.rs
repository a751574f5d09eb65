//! Sync domain types.
//!
//! Value objects exchanged between the inbound adapter, the core services,
//! and the store port. All timestamps are UTC; reading timestamps are the
//! client's epoch milliseconds and are never reinterpreted as server time.

pub mod merge;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pagination::PageRequest;
use serde_json::Value;
use uuid::Uuid;

use super::UserId;

/// Direction of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    /// Client-to-server merge of a session and its readings.
    Push,
    /// Server-to-client delta selection.
    Pull,
}

impl SyncType {
    /// Stable wire/storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

/// Terminal outcome recorded on a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLogStatus {
    /// Every record applied.
    Success,
    /// Some records applied, some rejected.
    Partial,
    /// The attempt rolled back.
    Failed,
}

impl SyncLogStatus {
    /// Stable wire/storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncLogStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

/// Error raised when decoding an unknown stored enum tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// Client-supplied description of a recording session.
///
/// Optional fields follow last-write-wins merge semantics: a supplied value
/// overwrites the stored one, an omitted value preserves it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescriptor {
    /// Client-generated natural key used for upsert matching.
    pub session_id: Uuid,
    /// Capture episode start.
    pub start_time: DateTime<Utc>,
    /// Capture episode end, if the episode has closed.
    pub end_time: Option<DateTime<Utc>>,
    /// Whether the client considers the episode live.
    pub is_active: Option<bool>,
    /// Ordered sensor-type tags enabled for the episode.
    pub enabled_sensors: Option<Vec<String>>,
    /// Informational sampling rate in Hz.
    pub sample_rate: Option<i32>,
    /// Free-text annotation.
    pub notes: Option<String>,
}

/// One uploaded sensor sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingUpload {
    /// Sensor-type tag, e.g. `accelerometer`.
    pub sensor_type: String,
    /// Client epoch milliseconds.
    pub timestamp: i64,
    /// Opaque payload whose shape depends on the sensor type.
    pub data: Value,
}

/// One stored sensor sample projected for pull responses.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    /// Sensor-type tag.
    pub sensor_type: String,
    /// Client epoch milliseconds.
    pub timestamp: i64,
    /// Opaque payload.
    pub data: Value,
}

/// Full projection of a stored recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Server-assigned surrogate key.
    pub id: i64,
    /// Client-generated natural key.
    pub session_id: Uuid,
    /// Owning user.
    pub user_id: UserId,
    /// Episode start.
    pub start_time: DateTime<Utc>,
    /// Episode end, if closed.
    pub end_time: Option<DateTime<Utc>>,
    /// Whether the episode is live.
    pub is_active: bool,
    /// Ordered sensor-type tags.
    pub enabled_sensors: Vec<String>,
    /// Sampling rate in Hz.
    pub sample_rate: i32,
    /// Denormalised owned-reading count, recomputed on every push.
    pub data_count: i64,
    /// Free-text annotation.
    pub notes: String,
    /// True once any push has succeeded.
    pub is_uploaded: bool,
    /// Completion time of the most recent successful push.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutating push; the delta-pull filter field.
    pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::domain::Reconciler::push`].
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    /// Session descriptor from the client.
    pub session: SessionDescriptor,
    /// Uploaded readings.
    pub readings: Vec<ReadingUpload>,
    /// Raw request body size, recorded in the ledger metadata.
    pub payload_bytes: Option<u64>,
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// Natural key of the merged session.
    pub session_id: Uuid,
    /// Batch size as received.
    pub total_records: usize,
    /// Readings created by this push.
    pub inserted: usize,
    /// Readings overwritten in place by this push.
    pub updated: usize,
    /// Reserved no-op slot; the merge policy never increments it.
    pub duplicates: usize,
    /// Readings rejected; always zero for a committed push.
    pub errors: usize,
    /// Ledger row recording this attempt.
    pub sync_log_id: i64,
    /// Authoritative reading count after the merge.
    pub session_data_count: i64,
}

/// Input to [`crate::domain::DeltaSelector::pull`].
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    /// Exclusive checkpoint; only sessions updated strictly after it match.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Optional restriction to specific session natural keys.
    pub session_ids: Option<Vec<Uuid>>,
    /// Validated pagination window.
    pub page: PageRequest,
    /// Whether to inline readings or return metadata only.
    pub include_data: bool,
}

/// One session plus its (optionally inlined) readings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDelta {
    /// Session projection.
    pub session: SessionSnapshot,
    /// Readings ordered by ascending timestamp; empty in metadata-only mode.
    pub readings: Vec<StoredReading>,
}

/// Result of a pull.
///
/// `server_timestamp` is the checkpoint the client must use for its next
/// pull. Using a client clock instead can silently skip sessions updated
/// inside the skew window.
#[derive(Debug, Clone, PartialEq)]
pub struct PullPage {
    /// Selected sessions, most recently updated first.
    pub sessions: Vec<SessionDelta>,
    /// Server-side time of this response; the next checkpoint.
    pub server_timestamp: DateTime<Utc>,
    /// Echoed page number.
    pub page: u32,
    /// Echoed page size.
    pub page_size: u32,
    /// Size of the filtered candidate set before pagination.
    pub total: i64,
    /// Whether pages beyond this one remain.
    pub has_more: bool,
    /// Ledger row recording this attempt.
    pub sync_log_id: i64,
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogEntry {
    /// Row id.
    pub id: i64,
    /// User the attempt belongs to.
    pub user_id: UserId,
    /// Push or pull.
    pub sync_type: SyncType,
    /// Surrogate key of the session touched, when resolvable.
    pub session_pk: Option<i64>,
    /// Records in the attempt.
    pub records_count: i64,
    /// Reserved no-op slot, see [`PushOutcome::duplicates`].
    pub duplicates_count: i64,
    /// Records that failed.
    pub errors_count: i64,
    /// Terminal status.
    pub status: SyncLogStatus,
    /// Failure detail; never echoed to clients.
    pub error_message: Option<String>,
    /// Free-form attempt metadata.
    pub metadata: Option<Value>,
    /// Attempt start.
    pub started_at: DateTime<Utc>,
    /// Attempt completion; `None` while in flight.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-user session counters for the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Sessions owned by the user.
    pub total_sessions: i64,
    /// Sessions currently flagged active.
    pub active_sessions: i64,
    /// Sessions with at least one successful push.
    pub uploaded_sessions: i64,
}

/// Aggregate returned by the status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatusReport {
    /// Session counters.
    pub stats: SessionStats,
    /// Most recent ledger rows, newest first.
    pub recent_syncs: Vec<SyncLogEntry>,
}
