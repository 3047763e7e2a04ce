//! Review task lifecycle.
//!
//! Reports are opened as tasks keyed by their project codes, assigned to a
//! reviewer chosen by [`ranking`], edited while open, and finally either
//! finished into the closed-task history or force deleted. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - The ranking function in [`ranking`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod ranking;
pub mod services;

#[cfg(test)]
mod tests;
