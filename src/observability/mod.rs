//! Observability for the runtime.
//!
//! Every runtime keeps a [`SystemMetrics`] block that the scheduler updates
//! as threads come and go. Read it through
//! [`Runtime::stats`](crate::Runtime::stats).

pub mod metrics;

pub use metrics::{RuntimeStats, SystemMetrics};
