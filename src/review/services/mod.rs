//! Application services for the review lifecycle.

mod digest;
mod error;
mod lifecycle;
mod requests;

pub use digest::{SILENCE_WINDOW, WorkloadDigest};
pub use error::{AssigneeRejection, ReviewLifecycleError, ReviewLifecycleResult};
pub use lifecycle::ReviewLifecycleService;
pub use requests::{AssignRequest, EditRequest, OpenTaskRequest, SubmitRequest};
