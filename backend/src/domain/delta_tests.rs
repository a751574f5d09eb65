//! Tests for the delta-pull selection service.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mockable::Clock;
use pagination::PageRequest;
use rstest::{fixture, rstest};
use serde_json::json;
use uuid::Uuid;

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::{MockSyncStore, NoOpAnalyticsDispatcher, PushSync, SyncStoreError};
use crate::domain::sync::{PushRequest, ReadingUpload, SessionDescriptor, SyncLogStatus};
use crate::domain::testing::{InMemorySyncStore, MutableClock};
use crate::domain::Reconciler;

const USER: UserId = UserId::new(1);

fn pull_request() -> PullRequest {
    PullRequest {
        last_sync_time: None,
        session_ids: None,
        page: PageRequest::first(),
        include_data: true,
    }
}

fn push_request(session_id: Uuid, readings: Vec<ReadingUpload>) -> PushRequest {
    PushRequest {
        session: SessionDescriptor {
            session_id,
            start_time: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            end_time: None,
            is_active: None,
            enabled_sensors: None,
            sample_rate: None,
            notes: None,
        },
        readings,
        payload_bytes: None,
    }
}

fn reading(sensor_type: &str, timestamp: i64) -> ReadingUpload {
    ReadingUpload {
        sensor_type: sensor_type.to_owned(),
        timestamp,
        data: json!({ "v": timestamp }),
    }
}

#[fixture]
fn store() -> Arc<InMemorySyncStore> {
    Arc::new(InMemorySyncStore::default())
}

#[fixture]
fn clock() -> Arc<MutableClock> {
    Arc::new(MutableClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ))
}

fn selector(
    store: &Arc<InMemorySyncStore>,
    clock: &Arc<MutableClock>,
) -> DeltaSelector<InMemorySyncStore> {
    DeltaSelector::new(Arc::clone(store), Arc::clone(clock) as Arc<dyn Clock>)
}

/// Seed one session per id, advancing the clock between pushes so each has a
/// distinct `updated_at`.
async fn seed_sessions(
    store: &Arc<InMemorySyncStore>,
    clock: &Arc<MutableClock>,
    session_ids: &[Uuid],
) {
    let reconciler = Reconciler::new(
        Arc::clone(store),
        Arc::new(NoOpAnalyticsDispatcher),
        Arc::clone(clock) as Arc<dyn Clock>,
    );
    for session_id in session_ids {
        clock.advance_seconds(60);
        reconciler
            .push(USER, push_request(*session_id, vec![]))
            .await
            .expect("seed push succeeds");
    }
}

#[rstest]
#[tokio::test]
async fn pull_returns_sessions_most_recently_updated_first(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    seed_sessions(&store, &clock, &ids).await;

    let page = selector(&store, &clock)
        .pull(USER, pull_request())
        .await
        .expect("pull succeeds");

    assert_eq!(page.total, 3);
    assert!(!page.has_more);
    let returned: Vec<Uuid> = page.sessions.iter().map(|d| d.session.session_id).collect();
    assert_eq!(returned, vec![ids[2], ids[1], ids[0]]);
}

#[rstest]
#[tokio::test]
async fn checkpoint_filter_is_strictly_exclusive(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    let ids = [Uuid::new_v4(), Uuid::new_v4()];
    seed_sessions(&store, &clock, &ids).await;
    let boundary = store.sessions()[0].updated_at;

    let mut request = pull_request();
    request.last_sync_time = Some(boundary);
    let page = selector(&store, &clock)
        .pull(USER, request)
        .await
        .expect("pull succeeds");

    // The session updated exactly at the checkpoint is not re-sent.
    assert_eq!(page.total, 1);
    assert_eq!(page.sessions[0].session.session_id, ids[1]);
}

#[rstest]
#[tokio::test]
async fn server_timestamp_round_trip_returns_nothing_after_quiescence(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    seed_sessions(&store, &clock, &[Uuid::new_v4(), Uuid::new_v4()]).await;
    let service = selector(&store, &clock);

    let first = service
        .pull(USER, pull_request())
        .await
        .expect("first pull succeeds");
    clock.advance_seconds(60);

    let mut request = pull_request();
    request.last_sync_time = Some(first.server_timestamp);
    let second = service
        .pull(USER, request)
        .await
        .expect("second pull succeeds");

    assert_eq!(second.total, 0);
    assert!(second.sessions.is_empty());
}

#[rstest]
#[tokio::test]
async fn pagination_covers_the_candidate_set_exactly_once(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    seed_sessions(&store, &clock, &ids).await;
    let service = selector(&store, &clock);

    let mut collected = Vec::new();
    for page_number in 1..=3 {
        let mut request = pull_request();
        request.page = PageRequest::new(page_number, 2).expect("valid window");
        let page = service.pull(USER, request).await.expect("pull succeeds");

        assert_eq!(page.total, 5);
        assert_eq!(page.has_more, page_number < 3);
        collected.extend(page.sessions.iter().map(|d| d.session.session_id));
    }

    let mut expected: Vec<Uuid> = ids.clone();
    expected.reverse();
    assert_eq!(collected, expected);
}

#[rstest]
#[tokio::test]
async fn include_data_inlines_readings_in_timestamp_order(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    let session_id = Uuid::new_v4();
    let reconciler = Reconciler::new(
        Arc::clone(&store),
        Arc::new(NoOpAnalyticsDispatcher),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    reconciler
        .push(
            USER,
            push_request(
                session_id,
                vec![reading("gyroscope", 2000), reading("accelerometer", 1000)],
            ),
        )
        .await
        .expect("push succeeds");

    let page = selector(&store, &clock)
        .pull(USER, pull_request())
        .await
        .expect("pull succeeds");

    let readings = &page.sessions[0].readings;
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].timestamp, 1000);
    assert_eq!(readings[1].timestamp, 2000);
}

#[rstest]
#[tokio::test]
async fn metadata_only_mode_returns_empty_reading_lists(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    let session_id = Uuid::new_v4();
    let reconciler = Reconciler::new(
        Arc::clone(&store),
        Arc::new(NoOpAnalyticsDispatcher),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    reconciler
        .push(USER, push_request(session_id, vec![reading("gps", 1000)]))
        .await
        .expect("push succeeds");

    let mut request = pull_request();
    request.include_data = false;
    let page = selector(&store, &clock)
        .pull(USER, request)
        .await
        .expect("pull succeeds");

    assert!(page.sessions[0].readings.is_empty());
    assert_eq!(page.sessions[0].session.data_count, 1);
}

#[rstest]
#[tokio::test]
async fn session_ids_restrict_the_candidate_set(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    seed_sessions(&store, &clock, &ids).await;

    let mut request = pull_request();
    request.session_ids = Some(vec![ids[0], ids[2]]);
    let page = selector(&store, &clock)
        .pull(USER, request)
        .await
        .expect("pull succeeds");

    assert_eq!(page.total, 2);
    let returned: Vec<Uuid> = page.sessions.iter().map(|d| d.session.session_id).collect();
    assert_eq!(returned, vec![ids[2], ids[0]]);
}

#[rstest]
#[tokio::test]
async fn pull_finalises_its_ledger_row(store: Arc<InMemorySyncStore>, clock: Arc<MutableClock>) {
    seed_sessions(&store, &clock, &[Uuid::new_v4()]).await;

    let page = selector(&store, &clock)
        .pull(USER, pull_request())
        .await
        .expect("pull succeeds");

    let log = store
        .logs()
        .into_iter()
        .find(|log| log.id == page.sync_log_id)
        .expect("pull log exists");
    assert_eq!(log.status, SyncLogStatus::Success);
    assert!(log.completed_at.is_some());
    let metadata = log.metadata.as_ref().expect("metadata recorded");
    assert_eq!(metadata["sessions_count"], 1);
    assert_eq!(metadata["has_more"], false);
}

#[rstest]
#[tokio::test]
async fn pull_is_scoped_to_the_calling_user(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    seed_sessions(&store, &clock, &[Uuid::new_v4()]).await;

    let page = selector(&store, &clock)
        .pull(UserId::new(99), pull_request())
        .await
        .expect("pull succeeds");

    assert_eq!(page.total, 0);
    assert!(page.sessions.is_empty());
}

#[tokio::test]
async fn failed_selection_marks_ledger_failed() {
    let mut store = MockSyncStore::new();
    store.expect_open_log().return_once(|_| Ok(77));
    store
        .expect_select_sessions()
        .return_once(|_, _, _| Err(SyncStoreError::query("bad plan")));
    store
        .expect_finalize_log()
        .withf(|log_id, outcome| *log_id == 77 && outcome.status == SyncLogStatus::Failed)
        .return_once(|_, _| Ok(()));

    let service = DeltaSelector::new(
        Arc::new(store),
        Arc::new(mockable::DefaultClock) as Arc<dyn Clock>,
    );
    let err = service
        .pull(USER, pull_request())
        .await
        .expect_err("pull fails");
    assert_eq!(err.code(), ErrorCode::InternalError);
}

#[rstest]
#[tokio::test]
async fn status_reports_counters_and_recent_logs(
    store: Arc<InMemorySyncStore>,
    clock: Arc<MutableClock>,
) {
    let ids: Vec<Uuid> = (0..12).map(|_| Uuid::new_v4()).collect();
    seed_sessions(&store, &clock, &ids).await;

    let report = selector(&store, &clock)
        .status(USER)
        .await
        .expect("status succeeds");

    assert_eq!(report.stats.total_sessions, 12);
    assert_eq!(report.stats.active_sessions, 0);
    assert_eq!(report.stats.uploaded_sessions, 12);
    // Capped at the ten most recent attempts, newest first.
    assert_eq!(report.recent_syncs.len(), 10);
    assert!(report.recent_syncs[0].id > report.recent_syncs[9].id);
}
