//! Error types for the load generator

use thiserror::Error;

/// Errors raised while configuring or driving a load test
#[derive(Debug, Error)]
pub enum LoadgenError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid task weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid target host: {0}")]
    InvalidHost(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("No response from {0}")]
    NoResponse(String),

    #[error("Malformed response body: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoadgenError>;
