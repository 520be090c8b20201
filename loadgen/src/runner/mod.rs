//! Thin workload orchestrator
//!
//! Owns what the virtual users must not: identity allocation, spawn pacing,
//! the run deadline and statistics aggregation.

mod identity;
pub mod stats;
mod swarm;

pub use identity::{IdentityScheme, UserIdAllocator};
pub use stats::{
    EndpointSummary, LatencyStats, Percentiles, RunReport, RunStats, TaskSummary, UserEvent,
};
pub use swarm::LoadTest;
