//! Reviewer roster and workload ledger.
//!
//! The roster owns one row per person who can author or review reports.
//! Each reviewer carries an availability level and a running total of
//! weighted pages across the open tasks currently assigned to them. All
//! ledger writes happen through the review store transaction port so that
//! they commit or roll back together with the task rows they accompany.

pub mod domain;

#[cfg(test)]
mod tests;
