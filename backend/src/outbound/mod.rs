//! Outbound adapters implementing the domain's driven ports.

pub mod analytics;
pub mod persistence;
