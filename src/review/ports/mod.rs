//! Port contracts for review persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by review services.

pub mod store;

pub use store::{ReviewStore, ReviewStoreError, ReviewStoreResult, ReviewTransaction};
