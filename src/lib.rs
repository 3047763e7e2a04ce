//! Rota: reviewer assignment and review lifecycle engine.
//!
//! Rota assigns incoming review tasks to reviewers, tracks every task from
//! open to closed and keeps a page-weighted workload counter per reviewer
//! consistent under concurrent workers.
//!
//! # Architecture
//!
//! Rota follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, spool, logs)
//!
//! # Modules
//!
//! - [`roster`]: Reviewers, availability and the workload ledger counter
//! - [`review`]: Tasks, the assignment ranker and the lifecycle engine
//! - [`dispatch`]: Work-queue consumer and its collaborator ports
//! - [`config`]: Worker configuration
//! - [`telemetry`]: Logging setup

pub mod config;
pub mod dispatch;
pub mod review;
pub mod roster;
pub mod telemetry;
