//! Pure merge planning for push reconciliation.
//!
//! Planning is separated from execution: these functions look at the current
//! store state and the incoming batch and produce declarative write sets the
//! store adapter applies in one transaction. A reading slot is identified by
//! the `(session, sensor_type, timestamp)` triple; a second write to an
//! occupied slot overwrites the payload (last-write-wins) and counts as an
//! update, never as a duplicate.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ReadingUpload, SessionDescriptor, SessionSnapshot};
use crate::domain::UserId;

/// Sample rate applied when a new session omits one.
pub const DEFAULT_SAMPLE_RATE: i32 = 100;

/// Field values for a session row created by a push.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionFields {
    /// Client-generated natural key.
    pub session_id: Uuid,
    /// Owning user.
    pub user_id: UserId,
    /// Episode start.
    pub start_time: DateTime<Utc>,
    /// Episode end, if already closed.
    pub end_time: Option<DateTime<Utc>>,
    /// Defaults to `false` when omitted.
    pub is_active: bool,
    /// Defaults to empty when omitted.
    pub enabled_sensors: Vec<String>,
    /// Defaults to [`DEFAULT_SAMPLE_RATE`] when omitted.
    pub sample_rate: i32,
    /// Defaults to empty when omitted.
    pub notes: String,
}

/// Last-write-wins field changes for an existing session row.
///
/// `None` preserves the stored value; `Some` overwrites it. `updated_at` is
/// bumped unconditionally by the executing adapter, which is what makes the
/// delta-pull filter observe every mutating push.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionChanges {
    /// Overwrite the episode end.
    pub end_time: Option<DateTime<Utc>>,
    /// Overwrite the live flag.
    pub is_active: Option<bool>,
    /// Overwrite the annotation.
    pub notes: Option<String>,
}

/// Planned session write for one push.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionWrite {
    /// No session matched `(user, session_id)`; create one.
    Create(NewSessionFields),
    /// A session matched; apply field-level last-write-wins.
    Update {
        /// Surrogate key of the matched session.
        id: i64,
        /// Field changes to apply.
        changes: SessionChanges,
    },
}

/// Resolve the session branch of the push algorithm.
pub fn plan_session_write(
    existing: Option<&SessionSnapshot>,
    descriptor: &SessionDescriptor,
    caller: UserId,
) -> SessionWrite {
    match existing {
        None => SessionWrite::Create(NewSessionFields {
            session_id: descriptor.session_id,
            user_id: caller,
            start_time: descriptor.start_time,
            end_time: descriptor.end_time,
            is_active: descriptor.is_active.unwrap_or(false),
            enabled_sensors: descriptor.enabled_sensors.clone().unwrap_or_default(),
            sample_rate: descriptor.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            notes: descriptor.notes.clone().unwrap_or_default(),
        }),
        Some(session) => SessionWrite::Update {
            id: session.id,
            changes: SessionChanges {
                end_time: descriptor.end_time,
                is_active: descriptor.is_active,
                notes: descriptor.notes.clone(),
            },
        },
    }
}

/// Identity of a logical reading slot within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadingKey {
    /// Sensor-type tag.
    pub sensor_type: String,
    /// Client epoch milliseconds.
    pub timestamp: i64,
}

impl ReadingKey {
    fn of(reading: &ReadingUpload) -> Self {
        Self {
            sensor_type: reading.sensor_type.clone(),
            timestamp: reading.timestamp,
        }
    }
}

/// Timestamps of one sensor-type group, driving a single existence query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorGroup {
    /// Sensor-type tag shared by the group.
    pub sensor_type: String,
    /// Timestamps present in the batch for this sensor type.
    pub timestamps: Vec<i64>,
}

/// Partition a batch by sensor type.
///
/// Grouping only batches the existence check; it never changes which items
/// are classified insert or update.
pub fn group_timestamps(readings: &[ReadingUpload]) -> Vec<SensorGroup> {
    let mut groups: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for reading in readings {
        groups
            .entry(reading.sensor_type.as_str())
            .or_default()
            .push(reading.timestamp);
    }
    groups
        .into_iter()
        .map(|(sensor_type, timestamps)| SensorGroup {
            sensor_type: sensor_type.to_owned(),
            timestamps,
        })
        .collect()
}

/// Declarative reading writes for one push, in batch order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadingWritePlan {
    /// Slots with no stored row; create them.
    pub inserts: Vec<ReadingUpload>,
    /// Occupied slots; overwrite payloads in place.
    pub updates: Vec<ReadingUpload>,
}

impl ReadingWritePlan {
    /// Number of planned creations.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.inserts.len()
    }

    /// Number of planned overwrites.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.updates.len()
    }
}

/// Classify each incoming reading against the occupied slots.
///
/// A slot occupied by an earlier item of the same batch is treated as
/// occupied for later items, so an in-batch repeat becomes an update of the
/// row the insert creates moments earlier in the same transaction. Updates
/// keep batch order, which makes the last occurrence win.
pub fn plan_reading_writes(
    occupied: &HashSet<ReadingKey>,
    readings: Vec<ReadingUpload>,
) -> ReadingWritePlan {
    let mut plan = ReadingWritePlan::default();
    let mut seen: HashSet<ReadingKey> = HashSet::new();
    for reading in readings {
        let key = ReadingKey::of(&reading);
        if occupied.contains(&key) || seen.contains(&key) {
            plan.updates.push(reading);
        } else {
            seen.insert(key);
            plan.inserts.push(reading);
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    fn reading(sensor_type: &str, timestamp: i64, value: i64) -> ReadingUpload {
        ReadingUpload {
            sensor_type: sensor_type.to_owned(),
            timestamp,
            data: json!({ "x": value }),
        }
    }

    #[fixture]
    fn descriptor() -> SessionDescriptor {
        SessionDescriptor {
            session_id: Uuid::new_v4(),
            start_time: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            end_time: None,
            is_active: None,
            enabled_sensors: None,
            sample_rate: None,
            notes: None,
        }
    }

    #[fixture]
    fn snapshot(descriptor: SessionDescriptor) -> SessionSnapshot {
        SessionSnapshot {
            id: 7,
            session_id: descriptor.session_id,
            user_id: UserId::new(1),
            start_time: descriptor.start_time,
            end_time: None,
            is_active: true,
            enabled_sensors: vec!["accelerometer".to_owned()],
            sample_rate: 200,
            data_count: 3,
            notes: "morning run".to_owned(),
            is_uploaded: true,
            last_synced_at: None,
            created_at: descriptor.start_time,
            updated_at: descriptor.start_time,
        }
    }

    #[rstest]
    fn create_applies_defaults(descriptor: SessionDescriptor) {
        let write = plan_session_write(None, &descriptor, UserId::new(1));
        let SessionWrite::Create(fields) = write else {
            panic!("expected create");
        };
        assert!(!fields.is_active);
        assert_eq!(fields.sample_rate, DEFAULT_SAMPLE_RATE);
        assert!(fields.enabled_sensors.is_empty());
        assert_eq!(fields.notes, "");
    }

    #[rstest]
    fn create_keeps_supplied_fields(mut descriptor: SessionDescriptor) {
        descriptor.is_active = Some(true);
        descriptor.sample_rate = Some(50);
        descriptor.enabled_sensors = Some(vec!["gps".to_owned()]);
        descriptor.notes = Some("hill repeats".to_owned());

        let write = plan_session_write(None, &descriptor, UserId::new(1));
        let SessionWrite::Create(fields) = write else {
            panic!("expected create");
        };
        assert!(fields.is_active);
        assert_eq!(fields.sample_rate, 50);
        assert_eq!(fields.enabled_sensors, vec!["gps".to_owned()]);
        assert_eq!(fields.notes, "hill repeats");
    }

    #[rstest]
    fn update_preserves_omitted_fields(descriptor: SessionDescriptor, snapshot: SessionSnapshot) {
        let write = plan_session_write(Some(&snapshot), &descriptor, UserId::new(1));
        let SessionWrite::Update { id, changes } = write else {
            panic!("expected update");
        };
        assert_eq!(id, snapshot.id);
        assert_eq!(changes, SessionChanges::default());
    }

    #[rstest]
    fn update_overwrites_supplied_fields(
        mut descriptor: SessionDescriptor,
        snapshot: SessionSnapshot,
    ) {
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        descriptor.end_time = Some(end);
        descriptor.is_active = Some(false);
        descriptor.notes = Some("done".to_owned());

        let write = plan_session_write(Some(&snapshot), &descriptor, UserId::new(1));
        let SessionWrite::Update { changes, .. } = write else {
            panic!("expected update");
        };
        assert_eq!(changes.end_time, Some(end));
        assert_eq!(changes.is_active, Some(false));
        assert_eq!(changes.notes.as_deref(), Some("done"));
    }

    #[rstest]
    fn groups_preserve_per_sensor_timestamps() {
        let readings = vec![
            reading("gyroscope", 20, 1),
            reading("accelerometer", 10, 1),
            reading("gyroscope", 30, 1),
        ];
        let groups = group_timestamps(&readings);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sensor_type, "accelerometer");
        assert_eq!(groups[0].timestamps, vec![10]);
        assert_eq!(groups[1].sensor_type, "gyroscope");
        assert_eq!(groups[1].timestamps, vec![20, 30]);
    }

    #[rstest]
    fn fresh_slots_are_inserts() {
        let plan = plan_reading_writes(
            &HashSet::new(),
            vec![reading("accelerometer", 10, 1), reading("gyroscope", 20, 1)],
        );
        assert_eq!(plan.inserted(), 2);
        assert_eq!(plan.updated(), 0);
    }

    #[rstest]
    fn occupied_slots_become_updates_even_with_identical_payloads() {
        let mut occupied = HashSet::new();
        occupied.insert(ReadingKey {
            sensor_type: "accelerometer".to_owned(),
            timestamp: 10,
        });

        let plan = plan_reading_writes(&occupied, vec![reading("accelerometer", 10, 1)]);
        assert_eq!(plan.inserted(), 0);
        assert_eq!(plan.updated(), 1);
    }

    #[rstest]
    fn in_batch_repeat_updates_the_earlier_insert() {
        let plan = plan_reading_writes(
            &HashSet::new(),
            vec![reading("accelerometer", 10, 1), reading("accelerometer", 10, 2)],
        );
        assert_eq!(plan.inserted(), 1);
        assert_eq!(plan.updated(), 1);
        assert_eq!(plan.updates[0].data, json!({ "x": 2 }));
    }

    #[rstest]
    fn same_timestamp_different_sensor_is_a_distinct_slot() {
        let plan = plan_reading_writes(
            &HashSet::new(),
            vec![reading("accelerometer", 10, 1), reading("gyroscope", 10, 1)],
        );
        assert_eq!(plan.inserted(), 2);
    }
}
