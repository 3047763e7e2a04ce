//! Work-queue consumer driving the review lifecycle.
//!
//! Commands arrive on three channels (`receive`, `read`, `resend`) and are
//! claimed by workers sharing the `worker` delivery group. Every claimed
//! entry is acknowledged whatever the outcome; failures are reported through
//! the notifier instead of being retried.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The consumer loop in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
