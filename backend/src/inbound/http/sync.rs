//! Sync HTTP handlers.
//!
//! ```text
//! POST /sync/push
//! POST /sync/pull
//! GET  /sync/status
//! ```
//!
//! Wire field names are snake_case to match the mobile client contract.
//! Request validation happens here, before any service call, so malformed
//! input never opens a ledger row.

use actix_web::{HttpRequest, HttpResponse, get, http::header, post, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::sync::{
    PullPage, PullRequest, PushOutcome, PushRequest, ReadingUpload, SessionDelta,
    SessionDescriptor, StoredReading, SyncLogEntry, SyncStatusReport,
};
use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{BearerToken, authenticate};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, missing_field_error, missing_item_field_error, parse_iso8601_timestamp,
    parse_optional_iso8601_timestamp, parse_page, parse_uuid, parse_uuid_list,
};

/// Session descriptor as sent by clients.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SessionDescriptorBody {
    /// Client-generated session UUID.
    #[schema(format = "uuid")]
    pub session_id: Option<String>,
    /// Episode start, ISO 8601.
    #[schema(format = "date-time")]
    pub start_time: Option<String>,
    /// Episode end, ISO 8601.
    #[schema(format = "date-time")]
    pub end_time: Option<String>,
    /// Whether the episode is live on the device.
    pub is_active: Option<bool>,
    /// Sensor-type tags enabled for the episode.
    pub enabled_sensors: Option<Vec<String>>,
    /// Sampling rate in Hz.
    pub sample_rate: Option<i32>,
    /// Free-text annotation.
    pub notes: Option<String>,
}

/// One uploaded sensor sample.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SensorReadingBody {
    /// Sensor-type tag, e.g. `accelerometer`.
    pub sensor_type: Option<String>,
    /// Client epoch milliseconds.
    pub timestamp: Option<i64>,
    /// Payload whose shape depends on the sensor type.
    pub data: Option<Value>,
}

/// Request payload for `POST /sync/push`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct PushRequestBody {
    /// Session descriptor.
    pub session: SessionDescriptorBody,
    /// Uploaded readings.
    pub sensor_data: Vec<SensorReadingBody>,
}

/// Response payload for `POST /sync/push`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PushResponseBody {
    /// Human-readable completion message.
    pub message: String,
    /// Natural key of the merged session.
    #[schema(format = "uuid")]
    pub session_id: String,
    /// Batch size as received.
    pub total_records: usize,
    /// Readings created.
    pub inserted: usize,
    /// Readings overwritten in place.
    pub updated: usize,
    /// Reserved no-op counter.
    pub duplicates: usize,
    /// Readings rejected.
    pub errors: usize,
    /// Ledger row recording the attempt.
    pub sync_log_id: i64,
    /// Authoritative reading count after the merge.
    pub session_data_count: i64,
}

impl From<PushOutcome> for PushResponseBody {
    fn from(outcome: PushOutcome) -> Self {
        Self {
            message: "Sync completed successfully".to_owned(),
            session_id: outcome.session_id.to_string(),
            total_records: outcome.total_records,
            inserted: outcome.inserted,
            updated: outcome.updated,
            duplicates: outcome.duplicates,
            errors: outcome.errors,
            sync_log_id: outcome.sync_log_id,
            session_data_count: outcome.session_data_count,
        }
    }
}

/// Request payload for `POST /sync/pull`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct PullRequestBody {
    /// Exclusive checkpoint from a prior response's `server_timestamp`.
    #[schema(format = "date-time")]
    pub last_sync_time: Option<String>,
    /// Restriction to specific session UUIDs.
    pub session_ids: Option<Vec<String>>,
    /// 1-based page number; defaults to 1.
    pub page: Option<u32>,
    /// Page size in 1..=100; defaults to 50.
    pub page_size: Option<u32>,
    /// Inline readings or return metadata only; defaults to true.
    pub include_data: Option<bool>,
}

/// One session in a pull response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionBody {
    /// Natural key.
    #[schema(format = "uuid")]
    pub session_id: String,
    /// Episode start, ISO 8601.
    pub start_time: String,
    /// Episode end, ISO 8601.
    pub end_time: Option<String>,
    /// Whether the episode is live.
    pub is_active: bool,
    /// Sensor-type tags enabled for the episode.
    pub enabled_sensors: Vec<String>,
    /// Sampling rate in Hz.
    pub sample_rate: i32,
    /// Stored reading count.
    pub data_count: i64,
    /// Free-text annotation.
    pub notes: String,
    /// True once any push has succeeded.
    pub is_uploaded: bool,
    /// Row creation time.
    pub created_at: String,
    /// Last mutating push; the delta filter field.
    pub updated_at: String,
    /// Readings ordered by ascending timestamp; empty in metadata-only mode.
    pub sensor_data: Vec<SensorDataBody>,
}

/// One stored reading in a pull response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SensorDataBody {
    /// Sensor-type tag.
    pub sensor_type: String,
    /// Client epoch milliseconds.
    pub timestamp: i64,
    /// Stored payload.
    pub data: Value,
}

impl From<StoredReading> for SensorDataBody {
    fn from(reading: StoredReading) -> Self {
        Self {
            sensor_type: reading.sensor_type,
            timestamp: reading.timestamp,
            data: reading.data,
        }
    }
}

impl From<SessionDelta> for SessionBody {
    fn from(delta: SessionDelta) -> Self {
        let session = delta.session;
        Self {
            session_id: session.session_id.to_string(),
            start_time: session.start_time.to_rfc3339(),
            end_time: session.end_time.map(|t| t.to_rfc3339()),
            is_active: session.is_active,
            enabled_sensors: session.enabled_sensors,
            sample_rate: session.sample_rate,
            data_count: session.data_count,
            notes: session.notes,
            is_uploaded: session.is_uploaded,
            created_at: session.created_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
            sensor_data: delta.readings.into_iter().map(Into::into).collect(),
        }
    }
}

/// Response payload for `POST /sync/pull`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PullResponseBody {
    /// Selected sessions, most recently updated first.
    pub sessions: Vec<SessionBody>,
    /// Server time of this response; the client's next checkpoint. Clients
    /// must not substitute their own clock: a fast client clock skips
    /// sessions updated inside the skew window.
    #[schema(format = "date-time")]
    pub server_timestamp: String,
    /// Echoed page number.
    pub page: u32,
    /// Echoed page size.
    pub page_size: u32,
    /// Filtered candidate count before pagination.
    pub total: i64,
    /// Whether pages beyond this one remain.
    pub has_more: bool,
    /// Ledger row recording the attempt.
    pub sync_log_id: i64,
}

impl From<PullPage> for PullResponseBody {
    fn from(page: PullPage) -> Self {
        Self {
            sessions: page.sessions.into_iter().map(Into::into).collect(),
            server_timestamp: page.server_timestamp.to_rfc3339(),
            page: page.page,
            page_size: page.page_size,
            total: page.total,
            has_more: page.has_more,
            sync_log_id: page.sync_log_id,
        }
    }
}

/// One ledger row in a status response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncLogBody {
    /// Row id.
    pub id: i64,
    /// User the attempt belongs to.
    pub user_id: i64,
    /// `push` or `pull`.
    pub sync_type: String,
    /// Surrogate key of the session touched, when resolvable.
    pub session_id: Option<i64>,
    /// Records in the attempt.
    pub records_count: i64,
    /// Reserved no-op counter.
    pub duplicates_count: i64,
    /// Records that failed.
    pub errors_count: i64,
    /// `success`, `partial`, or `failed`.
    pub status: String,
    /// Failure detail recorded for audit.
    pub error_message: Option<String>,
    /// Free-form attempt metadata.
    pub metadata: Option<Value>,
    /// Attempt start, ISO 8601.
    pub started_at: String,
    /// Attempt completion, ISO 8601; null while in flight.
    pub completed_at: Option<String>,
}

impl From<SyncLogEntry> for SyncLogBody {
    fn from(entry: SyncLogEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id.as_i64(),
            sync_type: entry.sync_type.to_string(),
            session_id: entry.session_pk,
            records_count: entry.records_count,
            duplicates_count: entry.duplicates_count,
            errors_count: entry.errors_count,
            status: entry.status.to_string(),
            error_message: entry.error_message,
            metadata: entry.metadata,
            started_at: entry.started_at.to_rfc3339(),
            completed_at: entry.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response payload for `GET /sync/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponseBody {
    /// Sessions owned by the caller.
    pub total_sessions: i64,
    /// Sessions currently flagged active.
    pub active_sessions: i64,
    /// Sessions with at least one successful push.
    pub uploaded_sessions: i64,
    /// Most recent ledger rows, newest first.
    pub recent_syncs: Vec<SyncLogBody>,
}

impl From<SyncStatusReport> for StatusResponseBody {
    fn from(report: SyncStatusReport) -> Self {
        Self {
            total_sessions: report.stats.total_sessions,
            active_sessions: report.stats.active_sessions,
            uploaded_sessions: report.stats.uploaded_sessions,
            recent_syncs: report.recent_syncs.into_iter().map(Into::into).collect(),
        }
    }
}

fn parse_session_descriptor(body: SessionDescriptorBody) -> Result<SessionDescriptor, Error> {
    let session_id = body
        .session_id
        .ok_or_else(|| missing_field_error(FieldName::new("session_id")))?;
    let start_time = body
        .start_time
        .ok_or_else(|| missing_field_error(FieldName::new("start_time")))?;

    Ok(SessionDescriptor {
        session_id: parse_uuid(session_id, FieldName::new("session_id"))?,
        start_time: parse_iso8601_timestamp(start_time, FieldName::new("start_time"))?,
        end_time: parse_optional_iso8601_timestamp(body.end_time, FieldName::new("end_time"))?,
        is_active: body.is_active,
        enabled_sensors: body.enabled_sensors,
        sample_rate: body.sample_rate,
        notes: body.notes,
    })
}

/// Missing `timestamp` or `sensor_type` on any item fails the whole batch;
/// partially applying a batch would make client retry logic ambiguous.
fn parse_readings(items: Vec<SensorReadingBody>) -> Result<Vec<ReadingUpload>, Error> {
    let mut readings = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let sensor_type = item
            .sensor_type
            .ok_or_else(|| missing_item_field_error(FieldName::new("sensor_type"), index))?;
        let timestamp = item
            .timestamp
            .ok_or_else(|| missing_item_field_error(FieldName::new("timestamp"), index))?;
        readings.push(ReadingUpload {
            sensor_type,
            timestamp,
            data: item.data.unwrap_or_else(|| Value::Object(Default::default())),
        });
    }
    Ok(readings)
}

fn parse_push_request(body: PushRequestBody, payload_bytes: Option<u64>) -> Result<PushRequest, Error> {
    Ok(PushRequest {
        session: parse_session_descriptor(body.session)?,
        readings: parse_readings(body.sensor_data)?,
        payload_bytes,
    })
}

fn parse_pull_request(body: PullRequestBody) -> Result<PullRequest, Error> {
    let page = parse_page(
        body.page.unwrap_or(1),
        body.page_size.unwrap_or(pagination::DEFAULT_PAGE_SIZE),
    )?;
    let session_ids = body
        .session_ids
        .map(|ids| parse_uuid_list(ids, FieldName::new("session_ids")))
        .transpose()?;

    Ok(PullRequest {
        last_sync_time: parse_optional_iso8601_timestamp(
            body.last_sync_time,
            FieldName::new("last_sync_time"),
        )?,
        session_ids,
        page,
        include_data: body.include_data.unwrap_or(true),
    })
}

fn content_length(request: &HttpRequest) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Merge a session and its readings into server state.
#[utoipa::path(
    post,
    path = "/sync/push",
    request_body = PushRequestBody,
    responses(
        (status = 200, description = "Batch merged", body = PushResponseBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Internal server error", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["sync"],
    operation_id = "pushSync",
    security(("BearerToken" = []))
)]
#[post("/push")]
pub async fn push_sync(
    state: web::Data<HttpState>,
    token: BearerToken,
    request: HttpRequest,
    payload: web::Json<PushRequestBody>,
) -> ApiResult<web::Json<PushResponseBody>> {
    let user_id = authenticate(state.identity.as_ref(), &token).await?;
    let push_request = parse_push_request(payload.into_inner(), content_length(&request))?;

    let outcome = state.push.push(user_id, push_request).await?;
    Ok(web::Json(PushResponseBody::from(outcome)))
}

/// Select sessions changed since a checkpoint.
#[utoipa::path(
    post,
    path = "/sync/pull",
    request_body = PullRequestBody,
    responses(
        (status = 200, description = "Delta page", body = PullResponseBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Internal server error", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["sync"],
    operation_id = "pullSync",
    security(("BearerToken" = []))
)]
#[post("/pull")]
pub async fn pull_sync(
    state: web::Data<HttpState>,
    token: BearerToken,
    payload: web::Json<PullRequestBody>,
) -> ApiResult<web::Json<PullResponseBody>> {
    let user_id = authenticate(state.identity.as_ref(), &token).await?;
    let pull_request = parse_pull_request(payload.into_inner())?;

    let page = state.pull.pull(user_id, pull_request).await?;
    Ok(web::Json(PullResponseBody::from(page)))
}

/// Per-user sync statistics and recent attempts.
#[utoipa::path(
    get,
    path = "/sync/status",
    responses(
        (status = 200, description = "Sync status", body = StatusResponseBody),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Internal server error", body = ErrorSchema)
    ),
    tags = ["sync"],
    operation_id = "syncStatus",
    security(("BearerToken" = []))
)]
#[get("/status")]
pub async fn sync_status(
    state: web::Data<HttpState>,
    token: BearerToken,
) -> ApiResult<HttpResponse> {
    let user_id = authenticate(state.identity.as_ref(), &token).await?;
    let report = state.pull.status(user_id).await?;
    Ok(HttpResponse::Ok().json(StatusResponseBody::from(report)))
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
