//! Target gateway API surface
//!
//! This module provides:
//! - `Endpoint`, the fixed set of routes the workload exercises
//! - Request and response payloads exchanged with the gateway
//! - `GatewayClient`, a pooled HTTP client that turns every call into an `Exchange`

mod client;
mod types;

pub use client::{Exchange, GatewayClient, Reply};
pub use types::{
    Endpoint, LoginRequest, PasswordChange, ProfileUpdate, RegisterRequest, TokenPair,
    TokenRequest,
};
