//! Gateway load generator library
//!
//! Exports the virtual user profile, the gateway client and the orchestrator
//! for use by the binary and the integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod profile;
pub mod runner;

// Re-export commonly used types
pub use api::{Endpoint, Exchange, GatewayClient};
pub use config::Config;
pub use error::{LoadgenError, Result};
pub use profile::{AuthState, TaskKind, TaskOutcome, UserId, VirtualUser};
pub use runner::{LoadTest, RunReport};
