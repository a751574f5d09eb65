//! PostgreSQL persistence adapter built on Diesel.

mod diesel_sync_store;
mod error_mapping;
mod models;
mod pool;
pub(crate) mod schema;

pub use diesel_sync_store::DieselSyncStore;
pub use pool::{DbPool, PoolConfig, PoolError};
