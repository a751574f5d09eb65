//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations under `backend/migrations`
//! exactly. Diesel uses them for compile-time query validation and type-safe
//! SQL generation; regenerate with `diesel print-schema` after schema
//! changes.

diesel::table! {
    /// Registered users. Provisioned by the external identity collaborator;
    /// the sync core only references rows, it never mutates them.
    users (id) {
        /// Primary key.
        id -> Int8,
        /// Unique login name.
        #[max_length = 80]
        username -> Varchar,
        /// Unique contact address.
        #[max_length = 120]
        email -> Varchar,
        /// Credential hash managed by the identity collaborator.
        #[max_length = 255]
        password_hash -> Varchar,
        /// Unique device binding.
        #[max_length = 100]
        device_id -> Nullable<Varchar>,
        /// Account enabled flag.
        is_active -> Bool,
        /// Row creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One continuous data-capture episode per row.
    recording_sessions (id) {
        /// Server-assigned surrogate key.
        id -> Int8,
        /// Client-generated natural key used for upsert matching.
        session_id -> Uuid,
        /// Owning user.
        user_id -> Int8,
        /// Episode start.
        start_time -> Timestamptz,
        /// Episode end, null while open.
        end_time -> Nullable<Timestamptz>,
        /// Whether the episode is live on the device.
        is_active -> Bool,
        /// Ordered sensor-type tags, stored as a JSON array.
        enabled_sensors -> Jsonb,
        /// Informational sampling rate in Hz.
        sample_rate -> Int4,
        /// Denormalised owned-reading count, recomputed on every push.
        data_count -> Int8,
        /// Free-text annotation.
        notes -> Text,
        /// True once any push has succeeded.
        is_uploaded -> Bool,
        /// Completion time of the most recent successful push.
        last_synced_at -> Nullable<Timestamptz>,
        /// Row creation timestamp.
        created_at -> Timestamptz,
        /// Bumped on every mutating push; the delta-pull filter column.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One sensor sample per row. The unique index on
    /// `(session_id, sensor_type, timestamp)` backstops the merge's
    /// existence check under concurrent pushes.
    sensor_readings (id) {
        /// Primary key.
        id -> Int8,
        /// Owning session surrogate key; rows cascade on session delete.
        session_id -> Int8,
        /// Sensor-type tag.
        #[max_length = 50]
        sensor_type -> Varchar,
        /// Client epoch milliseconds, not server time.
        timestamp -> Int8,
        /// Opaque payload whose shape depends on the sensor type.
        data -> Jsonb,
        /// Upload marker.
        is_uploaded -> Bool,
        /// Server insert time.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only audit record of one push or pull attempt.
    sync_logs (id) {
        /// Primary key.
        id -> Int8,
        /// User the attempt belongs to.
        user_id -> Int8,
        /// `push` or `pull`.
        #[max_length = 20]
        sync_type -> Varchar,
        /// Session touched by the attempt, when resolvable.
        session_id -> Nullable<Int8>,
        /// Records in the attempt.
        records_count -> Int8,
        /// Reserved no-op counter.
        duplicates_count -> Int8,
        /// Records that failed.
        errors_count -> Int8,
        /// `success`, `partial`, or `failed`.
        #[max_length = 20]
        status -> Varchar,
        /// Failure detail for audit; never echoed to clients.
        error_message -> Nullable<Text>,
        /// Free-form attempt metadata.
        metadata -> Nullable<Jsonb>,
        /// Attempt start.
        started_at -> Timestamptz,
        /// Attempt completion, null while in flight.
        completed_at -> Nullable<Timestamptz>,
        /// Row creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(recording_sessions -> users (user_id));
diesel::joinable!(sensor_readings -> recording_sessions (session_id));
diesel::joinable!(sync_logs -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    recording_sessions,
    sensor_readings,
    sync_logs,
);
