//! Virtual user behavior profile
//!
//! This module provides:
//! - `VirtualUser`, which performs the register + login handshake and runs tasks
//! - `AuthState` and `CredentialSnapshot` for the per-user credential lifecycle
//! - `TaskWeights`, `TaskSelector` and `ThinkTime` describing the workload mix

mod credentials;
mod tasks;
mod user;

pub use credentials::{AuthState, CredentialSnapshot, TokenRefreshPolicy};
pub use tasks::{Precondition, TaskKind, TaskSelector, TaskWeights, ThinkTime};
pub use user::{
    EMAIL_DOMAIN, FIRST_NAME, Handshake, NEW_PASSWORD, PASSWORD, SURNAME, SkipReason,
    TaskOutcome, UPDATED_NAME, UserId, VirtualUser,
};
