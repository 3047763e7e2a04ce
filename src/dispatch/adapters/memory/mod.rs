//! In-memory adapters for tests and single-process use.

mod collaborators;
mod stream;

pub use collaborators::{InMemoryDocumentReader, InMemoryMailSource, RecordingNotifier};
pub use stream::InMemoryCommandStream;
