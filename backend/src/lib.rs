//! Sync backend library modules.
//!
//! The crate follows a hexagonal layout: `domain` holds the sync
//! reconciliation core and its ports, `inbound` exposes the REST adapter,
//! `outbound` implements the driven adapters (PostgreSQL persistence,
//! analytics dispatch), and `server` wires everything into an actix-web
//! application.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod server;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
