//! Deferred deletion of stored assets.

mod scheduler;

pub use scheduler::{ExpiryScheduler, ReapSummary};
