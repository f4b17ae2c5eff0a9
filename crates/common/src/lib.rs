//! Reusable pieces shared by the tessera services: tracing setup and retry
//! policies.

pub mod logging;
pub mod retry;
