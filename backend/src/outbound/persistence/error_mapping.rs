//! Shared error mapping for the Diesel store adapter.

use tracing::debug;

use crate::domain::ports::SyncStoreError;

use super::pool::PoolError;

/// Map pool failures to store connection errors.
pub(crate) fn map_pool_error(error: PoolError) -> SyncStoreError {
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    SyncStoreError::connection(message)
}

/// Map Diesel failures to store errors, logging driver detail at debug level.
pub(crate) fn map_diesel_error(error: diesel::result::Error) -> SyncStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => SyncStoreError::query("record not found"),
        DieselError::QueryBuilderError(_) => SyncStoreError::query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            SyncStoreError::connection("database connection error")
        }
        DieselError::DatabaseError(_, _) => SyncStoreError::query("database error"),
        _ => SyncStoreError::query("database error"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn pool_errors_map_to_connection() {
        let err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, SyncStoreError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn not_found_maps_to_query() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(err, SyncStoreError::Query { .. }));
        assert!(err.to_string().contains("record not found"));
    }
}
