//! PostgreSQL-backed [`SyncStore`] implementation using Diesel.
//!
//! The adapter owns transaction scope: a push write set commits as one
//! transaction (session write, reading upserts, recount, ledger
//! finalisation), everything else is a single statement per call. Reading
//! inserts go through `ON CONFLICT DO UPDATE` on the unique
//! `(session_id, sensor_type, timestamp)` index so a concurrent push racing
//! past the existence check degrades to the update path instead of failing.

use std::collections::HashSet;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use pagination::PageRequest;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::ports::{
    LogFinalize, NewSyncLogEntry, PushReceipt, PushWrites, SessionFilter, SessionPage, SyncStore,
    SyncStoreError,
};
use crate::domain::sync::merge::{ReadingKey, SensorGroup, SessionWrite};
use crate::domain::sync::{
    SessionSnapshot, SessionStats, StoredReading, SyncLogEntry, SyncLogStatus,
};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{
    NewReadingRow, NewSessionRow, NewSyncLogRow, ReadingRow, SessionMergeChangeset, SessionRow,
    SessionSyncChangeset, SyncLogFinalizeChangeset, SyncLogRow,
};
use super::pool::DbPool;
use super::schema::{recording_sessions, sensor_readings, sync_logs};

/// Diesel-backed implementation of the entity store port.
#[derive(Clone)]
pub struct DieselSyncStore {
    pool: DbPool,
}

impl DieselSyncStore {
    /// Create a new store over the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn encode_sensors(sensors: &[String]) -> Result<Value, SyncStoreError> {
    serde_json::to_value(sensors)
        .map_err(|err| SyncStoreError::serialization(format!("encode enabled_sensors: {err}")))
}

fn finalize_changeset(session_pk: Option<i64>, outcome: LogFinalize) -> SyncLogFinalizeChangeset {
    SyncLogFinalizeChangeset {
        session_id: session_pk,
        records_count: outcome.records_count,
        duplicates_count: outcome.duplicates_count,
        errors_count: outcome.errors_count,
        status: outcome.status.to_string(),
        error_message: outcome.error_message,
        metadata: outcome.metadata,
        completed_at: outcome.completed_at,
    }
}

enum SessionPlan {
    Insert(NewSessionRow),
    Update(i64, SessionMergeChangeset),
}

#[async_trait]
impl SyncStore for DieselSyncStore {
    async fn open_log(&self, entry: NewSyncLogEntry) -> Result<i64, SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewSyncLogRow {
            user_id: entry.user_id.as_i64(),
            sync_type: entry.sync_type.to_string(),
            records_count: 0,
            duplicates_count: 0,
            errors_count: 0,
            status: SyncLogStatus::Success.to_string(),
            metadata: entry.metadata,
            started_at: entry.started_at,
            created_at: entry.started_at,
        };
        diesel::insert_into(sync_logs::table)
            .values(&row)
            .returning(sync_logs::id)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn finalize_log(
        &self,
        log_id: i64,
        outcome: LogFinalize,
    ) -> Result<(), SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(sync_logs::table.find(log_id))
            .set(&finalize_changeset(None, outcome))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_session(
        &self,
        user_id: UserId,
        session_id: Uuid,
    ) -> Result<Option<SessionSnapshot>, SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = recording_sessions::table
            .filter(
                recording_sessions::user_id
                    .eq(user_id.as_i64())
                    .and(recording_sessions::session_id.eq(session_id)),
            )
            .select(SessionRow::as_select())
            .first::<SessionRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(SessionSnapshot::try_from).transpose()
    }

    async fn existing_reading_keys(
        &self,
        session_pk: i64,
        groups: Vec<SensorGroup>,
    ) -> Result<HashSet<ReadingKey>, SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut keys = HashSet::new();
        for group in groups {
            let rows: Vec<(String, i64)> = sensor_readings::table
                .filter(
                    sensor_readings::session_id
                        .eq(session_pk)
                        .and(sensor_readings::sensor_type.eq(group.sensor_type))
                        .and(sensor_readings::timestamp.eq_any(group.timestamps)),
                )
                .select((sensor_readings::sensor_type, sensor_readings::timestamp))
                .load(&mut conn)
                .await
                .map_err(map_diesel_error)?;
            keys.extend(rows.into_iter().map(|(sensor_type, timestamp)| ReadingKey {
                sensor_type,
                timestamp,
            }));
        }
        Ok(keys)
    }

    async fn commit_push(&self, writes: PushWrites) -> Result<PushReceipt, SyncStoreError> {
        let now = writes.now;
        let plan = match writes.session {
            SessionWrite::Create(fields) => SessionPlan::Insert(NewSessionRow {
                session_id: fields.session_id,
                user_id: fields.user_id.as_i64(),
                start_time: fields.start_time,
                end_time: fields.end_time,
                is_active: fields.is_active,
                enabled_sensors: encode_sensors(&fields.enabled_sensors)?,
                sample_rate: fields.sample_rate,
                data_count: 0,
                notes: fields.notes,
                is_uploaded: false,
                created_at: now,
                updated_at: now,
            }),
            SessionWrite::Update { id, changes } => SessionPlan::Update(
                id,
                SessionMergeChangeset {
                    end_time: changes.end_time,
                    is_active: changes.is_active,
                    notes: changes.notes,
                    updated_at: now,
                },
            ),
        };
        let inserts = writes.reading_inserts;
        let updates = writes.reading_updates;
        let log_id = writes.log_id;
        let log_finalize = writes.log_finalize;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let session_pk: i64 = match plan {
                    SessionPlan::Insert(row) => {
                        diesel::insert_into(recording_sessions::table)
                            .values(&row)
                            .returning(recording_sessions::id)
                            .get_result(conn)
                            .await?
                    }
                    SessionPlan::Update(id, changeset) => {
                        diesel::update(recording_sessions::table.find(id))
                            .set(&changeset)
                            .execute(conn)
                            .await?;
                        id
                    }
                };

                if !inserts.is_empty() {
                    let rows: Vec<NewReadingRow> = inserts
                        .into_iter()
                        .map(|reading| NewReadingRow {
                            session_id: session_pk,
                            sensor_type: reading.sensor_type,
                            timestamp: reading.timestamp,
                            data: reading.data,
                            is_uploaded: true,
                            created_at: now,
                        })
                        .collect();
                    diesel::insert_into(sensor_readings::table)
                        .values(&rows)
                        .on_conflict((
                            sensor_readings::session_id,
                            sensor_readings::sensor_type,
                            sensor_readings::timestamp,
                        ))
                        .do_update()
                        .set((
                            sensor_readings::data.eq(excluded(sensor_readings::data)),
                            sensor_readings::is_uploaded
                                .eq(excluded(sensor_readings::is_uploaded)),
                        ))
                        .execute(conn)
                        .await?;
                }

                for reading in updates {
                    diesel::update(
                        sensor_readings::table.filter(
                            sensor_readings::session_id
                                .eq(session_pk)
                                .and(sensor_readings::sensor_type.eq(&reading.sensor_type))
                                .and(sensor_readings::timestamp.eq(reading.timestamp)),
                        ),
                    )
                    .set((
                        sensor_readings::data.eq(&reading.data),
                        sensor_readings::is_uploaded.eq(true),
                    ))
                    .execute(conn)
                    .await?;
                }

                // Authoritative recount, not an increment, so retried and
                // concurrent pushes cannot drift the denormalised counter.
                let data_count: i64 = sensor_readings::table
                    .filter(sensor_readings::session_id.eq(session_pk))
                    .count()
                    .get_result(conn)
                    .await?;

                diesel::update(recording_sessions::table.find(session_pk))
                    .set(&SessionSyncChangeset {
                        data_count,
                        last_synced_at: now,
                        is_uploaded: true,
                    })
                    .execute(conn)
                    .await?;

                diesel::update(sync_logs::table.find(log_id))
                    .set(&finalize_changeset(Some(session_pk), log_finalize))
                    .execute(conn)
                    .await?;

                Ok::<_, diesel::result::Error>(PushReceipt {
                    session_pk,
                    data_count,
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn select_sessions(
        &self,
        user_id: UserId,
        filter: SessionFilter,
        page: PageRequest,
    ) -> Result<SessionPage, SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut count_query = recording_sessions::table
            .filter(recording_sessions::user_id.eq(user_id.as_i64()))
            .count()
            .into_boxed();
        if let Some(checkpoint) = filter.updated_after {
            // Strictly greater than: a session updated exactly at the
            // checkpoint is not re-sent.
            count_query = count_query.filter(recording_sessions::updated_at.gt(checkpoint));
        }
        if let Some(ids) = filter.session_ids.clone() {
            count_query = count_query.filter(recording_sessions::session_id.eq_any(ids));
        }
        let total: i64 = count_query
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let mut rows_query = recording_sessions::table
            .filter(recording_sessions::user_id.eq(user_id.as_i64()))
            .select(SessionRow::as_select())
            .order(recording_sessions::updated_at.desc())
            .into_boxed();
        if let Some(checkpoint) = filter.updated_after {
            rows_query = rows_query.filter(recording_sessions::updated_at.gt(checkpoint));
        }
        if let Some(ids) = filter.session_ids {
            rows_query = rows_query.filter(recording_sessions::session_id.eq_any(ids));
        }
        let rows: Vec<SessionRow> = rows_query
            .offset(page.offset())
            .limit(page.limit())
            .load::<SessionRow>(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let sessions = rows
            .into_iter()
            .map(SessionSnapshot::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SessionPage { sessions, total })
    }

    async fn readings_for_session(
        &self,
        session_pk: i64,
    ) -> Result<Vec<StoredReading>, SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ReadingRow> = sensor_readings::table
            .filter(sensor_readings::session_id.eq(session_pk))
            .order(sensor_readings::timestamp.asc())
            .select(ReadingRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(StoredReading::from).collect())
    }

    async fn session_stats(&self, user_id: UserId) -> Result<SessionStats, SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let total_sessions: i64 = recording_sessions::table
            .filter(recording_sessions::user_id.eq(user_id.as_i64()))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let active_sessions: i64 = recording_sessions::table
            .filter(recording_sessions::user_id.eq(user_id.as_i64()))
            .filter(recording_sessions::is_active.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let uploaded_sessions: i64 = recording_sessions::table
            .filter(recording_sessions::user_id.eq(user_id.as_i64()))
            .filter(recording_sessions::is_uploaded.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(SessionStats {
            total_sessions,
            active_sessions,
            uploaded_sessions,
        })
    }

    async fn recent_logs(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<SyncLogEntry>, SyncStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SyncLogRow> = sync_logs::table
            .filter(sync_logs::user_id.eq(user_id.as_i64()))
            .order(sync_logs::created_at.desc())
            .limit(limit)
            .select(SyncLogRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(SyncLogEntry::try_from).collect()
    }
}
