//! Domain model for review tasks.
//!
//! Open tasks are keyed by a fingerprint of their project codes so that
//! duplicate submissions collide. Closed tasks are immutable history rows
//! with a database-assigned sequence number.

mod codes;
mod error;
mod ids;
mod mail_log;
mod query;
mod task;

pub use codes::{CODE_SEPARATOR, Pages, ProjectCodes};
pub use error::ReviewDomainError;
pub use ids::{ClosedTaskId, OpenTaskId, TaskRef};
pub use mail_log::{MailLogEntry, NewMailLogEntry};
pub use query::{Page, PageRequest, TaskFilter};
pub use task::{ClosedTask, NewClosedTask, OpenTask, PersistedClosedTaskData, PersistedOpenTaskData};
