//! Adapter implementations of the dispatch ports.

pub mod memory;
pub mod notifier;
pub mod postgres;
pub mod spool;
pub mod validator;
