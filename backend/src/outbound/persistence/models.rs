//! Diesel row types and conversions into domain projections.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::ports::SyncStoreError;
use crate::domain::sync::{SessionSnapshot, StoredReading, SyncLogEntry};

use super::schema::{recording_sessions, sensor_readings, sync_logs};

/// Queryable row for recording sessions.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = recording_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SessionRow {
    pub id: i64,
    pub session_id: Uuid,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub enabled_sensors: Value,
    pub sample_rate: i32,
    pub data_count: i64,
    pub notes: String,
    pub is_uploaded: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for SessionSnapshot {
    type Error = SyncStoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let enabled_sensors: Vec<String> =
            serde_json::from_value(row.enabled_sensors).map_err(|err| {
                SyncStoreError::serialization(format!("decode enabled_sensors: {err}"))
            })?;
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            user_id: UserId::new(row.user_id),
            start_time: row.start_time,
            end_time: row.end_time,
            is_active: row.is_active,
            enabled_sensors,
            sample_rate: row.sample_rate,
            data_count: row.data_count,
            notes: row.notes,
            is_uploaded: row.is_uploaded,
            last_synced_at: row.last_synced_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insertable row for a session created by a push.
#[derive(Debug, Insertable)]
#[diesel(table_name = recording_sessions)]
pub(crate) struct NewSessionRow {
    pub session_id: Uuid,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub enabled_sensors: Value,
    pub sample_rate: i32,
    pub data_count: i64,
    pub notes: String,
    pub is_uploaded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Last-write-wins field merge for an existing session. `None` fields are
/// skipped by Diesel, which is exactly the omission-preserves semantics;
/// `updated_at` is always written.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = recording_sessions)]
pub(crate) struct SessionMergeChangeset {
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Post-merge maintenance applied to the session inside the push
/// transaction.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = recording_sessions)]
pub(crate) struct SessionSyncChangeset {
    pub data_count: i64,
    pub last_synced_at: DateTime<Utc>,
    pub is_uploaded: bool,
}

/// Queryable row for sensor readings.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sensor_readings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ReadingRow {
    pub id: i64,
    pub session_id: i64,
    pub sensor_type: String,
    pub timestamp: i64,
    pub data: Value,
    pub is_uploaded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ReadingRow> for StoredReading {
    fn from(row: ReadingRow) -> Self {
        Self {
            sensor_type: row.sensor_type,
            timestamp: row.timestamp,
            data: row.data,
        }
    }
}

/// Insertable row for a reading created by a push.
#[derive(Debug, Insertable)]
#[diesel(table_name = sensor_readings)]
pub(crate) struct NewReadingRow {
    pub session_id: i64,
    pub sensor_type: String,
    pub timestamp: i64,
    pub data: Value,
    pub is_uploaded: bool,
    pub created_at: DateTime<Utc>,
}

/// Queryable row for ledger entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sync_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SyncLogRow {
    pub id: i64,
    pub user_id: i64,
    pub sync_type: String,
    pub session_id: Option<i64>,
    pub records_count: i64,
    pub duplicates_count: i64,
    pub errors_count: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub metadata: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SyncLogRow> for SyncLogEntry {
    type Error = SyncStoreError;

    fn try_from(row: SyncLogRow) -> Result<Self, Self::Error> {
        let sync_type = row
            .sync_type
            .parse()
            .map_err(|err| SyncStoreError::serialization(format!("decode sync_type: {err}")))?;
        let status = row
            .status
            .parse()
            .map_err(|err| SyncStoreError::serialization(format!("decode status: {err}")))?;
        Ok(Self {
            id: row.id,
            user_id: UserId::new(row.user_id),
            sync_type,
            session_pk: row.session_id,
            records_count: row.records_count,
            duplicates_count: row.duplicates_count,
            errors_count: row.errors_count,
            status,
            error_message: row.error_message,
            metadata: row.metadata,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// Insertable row for a freshly opened ledger entry.
#[derive(Debug, Insertable)]
#[diesel(table_name = sync_logs)]
pub(crate) struct NewSyncLogRow {
    pub user_id: i64,
    pub sync_type: String,
    pub records_count: i64,
    pub duplicates_count: i64,
    pub errors_count: i64,
    pub status: String,
    pub metadata: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Terminal fields written onto a ledger row. `None` fields are skipped so a
/// failure finalisation keeps the request metadata recorded at open time.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = sync_logs)]
pub(crate) struct SyncLogFinalizeChangeset {
    pub session_id: Option<i64>,
    pub records_count: i64,
    pub duplicates_count: i64,
    pub errors_count: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub metadata: Option<Value>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::domain::sync::{SyncLogStatus, SyncType};

    fn log_row() -> SyncLogRow {
        SyncLogRow {
            id: 1,
            user_id: 2,
            sync_type: "push".to_owned(),
            session_id: Some(3),
            records_count: 10,
            duplicates_count: 0,
            errors_count: 0,
            status: "success".to_owned(),
            error_message: None,
            metadata: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        }
    }

    #[rstest]
    fn session_row_decodes_sensor_list() {
        let now = Utc::now();
        let row = SessionRow {
            id: 1,
            session_id: Uuid::new_v4(),
            user_id: 2,
            start_time: now,
            end_time: None,
            is_active: false,
            enabled_sensors: json!(["accelerometer", "gps"]),
            sample_rate: 100,
            data_count: 0,
            notes: String::new(),
            is_uploaded: false,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };

        let snapshot = SessionSnapshot::try_from(row).expect("row converts");
        assert_eq!(snapshot.enabled_sensors, vec!["accelerometer", "gps"]);
        assert_eq!(snapshot.user_id, UserId::new(2));
    }

    #[rstest]
    fn session_row_rejects_malformed_sensor_list() {
        let now = Utc::now();
        let row = SessionRow {
            id: 1,
            session_id: Uuid::new_v4(),
            user_id: 2,
            start_time: now,
            end_time: None,
            is_active: false,
            enabled_sensors: json!({ "not": "a list" }),
            sample_rate: 100,
            data_count: 0,
            notes: String::new(),
            is_uploaded: false,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };

        let err = SessionSnapshot::try_from(row).expect_err("bad json rejected");
        assert!(matches!(err, SyncStoreError::Serialization { .. }));
    }

    #[rstest]
    fn log_row_decodes_enum_tags() {
        let entry = SyncLogEntry::try_from(log_row()).expect("row converts");
        assert_eq!(entry.sync_type, SyncType::Push);
        assert_eq!(entry.status, SyncLogStatus::Success);
    }

    #[rstest]
    fn log_row_rejects_unknown_status() {
        let mut row = log_row();
        row.status = "exploded".to_owned();
        let err = SyncLogEntry::try_from(row).expect_err("unknown tag rejected");
        assert!(matches!(err, SyncStoreError::Serialization { .. }));
    }
}
