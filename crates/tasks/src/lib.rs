//! Supervision of the long-running service tasks.
//!
//! Tasks are spawned as "critical": a panic in any of them brings the process
//! down through [`TaskManager::monitor`], and all of them observe one shared
//! shutdown signal.

mod manager;
mod shutdown;

pub use manager::{PanickedTaskError, TaskExecutor, TaskManager};
pub use shutdown::{ShutdownGuard, ShutdownSignal};
