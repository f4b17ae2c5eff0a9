//! In-memory implementations used by tests of the crates built on top.

mod batch;
mod queue;

pub use batch::StubBatchDb;
pub use queue::StubTaskQueue;
