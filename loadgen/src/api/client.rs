//! Pooled HTTP client for the target gateway

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::Endpoint;
use crate::error::{LoadgenError, Result};

/// Status and body of a completed HTTP call
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Bytes,
}

/// One request/response round trip, successful or not
///
/// Transport failures are captured rather than returned so that every call,
/// including failed ones, reaches the statistics collector.
#[derive(Debug)]
pub struct Exchange {
    pub endpoint: Endpoint,
    pub latency: Duration,
    pub outcome: Result<Reply>,
}

impl Exchange {
    pub fn status(&self) -> Option<StatusCode> {
        self.outcome.as_ref().ok().map(|reply| reply.status)
    }

    /// A call fails on transport error or any non-2xx status
    pub fn is_success(&self) -> bool {
        self.status().is_some_and(|s| s.is_success())
    }

    /// Decode the response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.outcome {
            Ok(reply) => Ok(serde_json::from_slice(&reply.body)?),
            Err(e) => Err(LoadgenError::NoResponse(format!("{}: {}", self.endpoint, e))),
        }
    }

    /// Short human-readable failure description
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            Ok(reply) if reply.status.is_success() => None,
            Ok(reply) => Some(format!("HTTP {}", reply.status.as_u16())),
            Err(e) => Some(e.to_string()),
        }
    }
}

/// HTTP client bound to one gateway base URL
///
/// Cloning is cheap: clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, endpoint: Endpoint, bearer: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let builder = self.http.request(endpoint.method(), url);
        match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Issue a request without a body
    pub async fn send(&self, endpoint: Endpoint, bearer: Option<&str>) -> Exchange {
        self.execute(endpoint, self.request(endpoint, bearer)).await
    }

    /// Issue a request with a JSON body
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        body: &B,
        bearer: Option<&str>,
    ) -> Exchange {
        self.execute(endpoint, self.request(endpoint, bearer).json(body))
            .await
    }

    async fn execute(&self, endpoint: Endpoint, request: RequestBuilder) -> Exchange {
        let start = Instant::now();
        let outcome = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, LoadgenError>(Reply { status, body })
        }
        .await;
        let latency = start.elapsed();

        match &outcome {
            Ok(reply) => debug!("{} -> {} in {:?}", endpoint, reply.status, latency),
            Err(e) => debug!("{} failed after {:?}: {}", endpoint, latency, e),
        }

        Exchange {
            endpoint,
            latency,
            outcome,
        }
    }
}
