//! In-memory test doubles for the sync core.
//!
//! [`InMemorySyncStore`] mirrors the transactional store contract over plain
//! vectors so service tests can assert on end state without a database.
//! [`MutableClock`] makes server time deterministic and advanceable.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use pagination::PageRequest;
use uuid::Uuid;

use super::UserId;
use super::ports::{
    LogFinalize, NewSyncLogEntry, PushReceipt, PushWrites, SessionFilter, SessionPage, SyncStore,
    SyncStoreError,
};
use super::sync::merge::{ReadingKey, SensorGroup, SessionWrite};
use super::sync::{
    SessionSnapshot, SessionStats, StoredReading, SyncLogEntry, SyncLogStatus,
};

#[derive(Debug, Clone)]
struct ReadingRow {
    session_pk: i64,
    sensor_type: String,
    timestamp: i64,
    data: serde_json::Value,
}

#[derive(Default)]
struct StoreState {
    sessions: Vec<SessionSnapshot>,
    readings: Vec<ReadingRow>,
    logs: Vec<SyncLogEntry>,
    next_session_pk: i64,
    next_log_id: i64,
}

/// Vector-backed [`SyncStore`] implementation for service tests.
#[derive(Default)]
pub struct InMemorySyncStore {
    state: Mutex<StoreState>,
}

impl InMemorySyncStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("store mutex poisoned"),
        }
    }

    /// All ledger rows, oldest first.
    pub fn logs(&self) -> Vec<SyncLogEntry> {
        self.lock().logs.clone()
    }

    /// All session rows.
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.lock().sessions.clone()
    }

    /// Stored reading count across all sessions.
    pub fn reading_count(&self) -> usize {
        self.lock().readings.len()
    }

    /// Payload stored at one reading slot.
    pub fn reading_data(
        &self,
        session_pk: i64,
        sensor_type: &str,
        timestamp: i64,
    ) -> Option<serde_json::Value> {
        self.lock()
            .readings
            .iter()
            .find(|r| {
                r.session_pk == session_pk
                    && r.sensor_type == sensor_type
                    && r.timestamp == timestamp
            })
            .map(|r| r.data.clone())
    }
}

#[async_trait]
impl SyncStore for InMemorySyncStore {
    async fn open_log(&self, entry: NewSyncLogEntry) -> Result<i64, SyncStoreError> {
        let mut state = self.lock();
        state.next_log_id += 1;
        let id = state.next_log_id;
        state.logs.push(SyncLogEntry {
            id,
            user_id: entry.user_id,
            sync_type: entry.sync_type,
            session_pk: None,
            records_count: 0,
            duplicates_count: 0,
            errors_count: 0,
            status: SyncLogStatus::Success,
            error_message: None,
            metadata: entry.metadata,
            started_at: entry.started_at,
            completed_at: None,
        });
        Ok(id)
    }

    async fn finalize_log(
        &self,
        log_id: i64,
        outcome: LogFinalize,
    ) -> Result<(), SyncStoreError> {
        let mut state = self.lock();
        let log = state
            .logs
            .iter_mut()
            .find(|log| log.id == log_id)
            .ok_or_else(|| SyncStoreError::query("log row not found"))?;
        log.status = outcome.status;
        log.records_count = outcome.records_count;
        log.duplicates_count = outcome.duplicates_count;
        log.errors_count = outcome.errors_count;
        log.error_message = outcome.error_message;
        if outcome.metadata.is_some() {
            log.metadata = outcome.metadata;
        }
        log.completed_at = Some(outcome.completed_at);
        Ok(())
    }

    async fn find_session(
        &self,
        user_id: UserId,
        session_id: Uuid,
    ) -> Result<Option<SessionSnapshot>, SyncStoreError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.session_id == session_id)
            .cloned())
    }

    async fn existing_reading_keys(
        &self,
        session_pk: i64,
        groups: Vec<SensorGroup>,
    ) -> Result<HashSet<ReadingKey>, SyncStoreError> {
        let state = self.lock();
        let mut keys = HashSet::new();
        for group in groups {
            for row in state.readings.iter().filter(|r| {
                r.session_pk == session_pk
                    && r.sensor_type == group.sensor_type
                    && group.timestamps.contains(&r.timestamp)
            }) {
                keys.insert(ReadingKey {
                    sensor_type: row.sensor_type.clone(),
                    timestamp: row.timestamp,
                });
            }
        }
        Ok(keys)
    }

    async fn commit_push(&self, writes: PushWrites) -> Result<PushReceipt, SyncStoreError> {
        let mut state = self.lock();

        let session_pk = match writes.session {
            SessionWrite::Create(fields) => {
                state.next_session_pk += 1;
                let pk = state.next_session_pk;
                state.sessions.push(SessionSnapshot {
                    id: pk,
                    session_id: fields.session_id,
                    user_id: fields.user_id,
                    start_time: fields.start_time,
                    end_time: fields.end_time,
                    is_active: fields.is_active,
                    enabled_sensors: fields.enabled_sensors,
                    sample_rate: fields.sample_rate,
                    data_count: 0,
                    notes: fields.notes,
                    is_uploaded: false,
                    last_synced_at: None,
                    created_at: writes.now,
                    updated_at: writes.now,
                });
                pk
            }
            SessionWrite::Update { id, changes } => {
                let session = state
                    .sessions
                    .iter_mut()
                    .find(|s| s.id == id)
                    .ok_or_else(|| SyncStoreError::query("session row not found"))?;
                if let Some(end_time) = changes.end_time {
                    session.end_time = Some(end_time);
                }
                if let Some(is_active) = changes.is_active {
                    session.is_active = is_active;
                }
                if let Some(notes) = changes.notes {
                    session.notes = notes;
                }
                session.updated_at = writes.now;
                id
            }
        };

        for insert in writes.reading_inserts {
            // Mirrors the unique-triple upsert backstop.
            let existing = state.readings.iter().position(|r| {
                r.session_pk == session_pk
                    && r.sensor_type == insert.sensor_type
                    && r.timestamp == insert.timestamp
            });
            match existing {
                Some(index) => state.readings[index].data = insert.data,
                None => state.readings.push(ReadingRow {
                    session_pk,
                    sensor_type: insert.sensor_type,
                    timestamp: insert.timestamp,
                    data: insert.data,
                }),
            }
        }
        for update in writes.reading_updates {
            let row = state
                .readings
                .iter_mut()
                .find(|r| {
                    r.session_pk == session_pk
                        && r.sensor_type == update.sensor_type
                        && r.timestamp == update.timestamp
                })
                .ok_or_else(|| SyncStoreError::query("reading row not found"))?;
            row.data = update.data;
        }

        let data_count = i64::try_from(
            state
                .readings
                .iter()
                .filter(|r| r.session_pk == session_pk)
                .count(),
        )
        .unwrap_or(i64::MAX);

        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_pk)
            .ok_or_else(|| SyncStoreError::query("session row not found"))?;
        session.data_count = data_count;
        session.last_synced_at = Some(writes.now);
        session.is_uploaded = true;

        let log = state
            .logs
            .iter_mut()
            .find(|log| log.id == writes.log_id)
            .ok_or_else(|| SyncStoreError::query("log row not found"))?;
        log.session_pk = Some(session_pk);
        log.status = writes.log_finalize.status;
        log.records_count = writes.log_finalize.records_count;
        log.duplicates_count = writes.log_finalize.duplicates_count;
        log.errors_count = writes.log_finalize.errors_count;
        log.metadata = writes.log_finalize.metadata;
        log.completed_at = Some(writes.log_finalize.completed_at);

        Ok(PushReceipt {
            session_pk,
            data_count,
        })
    }

    async fn select_sessions(
        &self,
        user_id: UserId,
        filter: SessionFilter,
        page: PageRequest,
    ) -> Result<SessionPage, SyncStoreError> {
        let state = self.lock();
        let mut candidates: Vec<SessionSnapshot> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter(|s| {
                filter
                    .updated_after
                    .is_none_or(|checkpoint| s.updated_at > checkpoint)
            })
            .filter(|s| {
                filter
                    .session_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&s.session_id))
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let total = i64::try_from(candidates.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let sessions = candidates.into_iter().skip(offset).take(limit).collect();
        Ok(SessionPage { sessions, total })
    }

    async fn readings_for_session(
        &self,
        session_pk: i64,
    ) -> Result<Vec<StoredReading>, SyncStoreError> {
        let state = self.lock();
        let mut rows: Vec<&ReadingRow> = state
            .readings
            .iter()
            .filter(|r| r.session_pk == session_pk)
            .collect();
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows
            .into_iter()
            .map(|r| StoredReading {
                sensor_type: r.sensor_type.clone(),
                timestamp: r.timestamp,
                data: r.data.clone(),
            })
            .collect())
    }

    async fn session_stats(&self, user_id: UserId) -> Result<SessionStats, SyncStoreError> {
        let state = self.lock();
        let owned = state.sessions.iter().filter(|s| s.user_id == user_id);
        let mut stats = SessionStats::default();
        for session in owned {
            stats.total_sessions += 1;
            if session.is_active {
                stats.active_sessions += 1;
            }
            if session.is_uploaded {
                stats.uploaded_sessions += 1;
            }
        }
        Ok(stats)
    }

    async fn recent_logs(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<SyncLogEntry>, SyncStoreError> {
        let state = self.lock();
        let mut logs: Vec<SyncLogEntry> = state
            .logs
            .iter()
            .filter(|log| log.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.id.cmp(&a.id));
        logs.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(logs)
    }
}

/// Deterministic, advanceable clock for service tests.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Create a clock pinned at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    /// Advance the clock by whole seconds.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    fn lock_clock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex poisoned"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}
