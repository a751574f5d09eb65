//! Domain ports defining the edges of the hexagon.
//!
//! Driven ports describe how the core expects to interact with the entity
//! store, the identity collaborator, and the analytics worker. Driving ports
//! expose the core services to inbound adapters. Each trait carries strongly
//! typed errors so adapters map failures into predictable variants.

mod analytics_dispatcher;
mod identity_provider;
mod macros;
mod sync_ports;
mod sync_store;

pub(crate) use macros::define_port_error;

pub use analytics_dispatcher::{
    AnalyticsDispatchError, AnalyticsDispatcher, NoOpAnalyticsDispatcher,
};
pub use identity_provider::{FixtureIdentityProvider, IdentityError, IdentityProvider};
pub use sync_ports::{PullSync, PushSync};
pub use sync_store::{
    LogFinalize, NewSyncLogEntry, PushReceipt, PushWrites, SessionFilter, SessionPage, SyncStore,
    SyncStoreError,
};

#[cfg(test)]
pub use analytics_dispatcher::MockAnalyticsDispatcher;
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
#[cfg(test)]
pub use sync_store::MockSyncStore;
