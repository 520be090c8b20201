//! Run statistics: per-endpoint latency and failures, per-task skip counts

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::api::{Endpoint, Exchange};
use crate::profile::{Handshake, SkipReason, TaskKind, TaskOutcome};

/// Samples kept per endpoint for percentile estimates
pub const MAX_LATENCY_SAMPLES: usize = 50_000;

/// Latency percentiles computed from one sort of the sample set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Percentiles {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Latency samples for one endpoint
///
/// Mean and max are exact. Percentiles come from a uniform reservoir of at
/// most `capacity` samples, so memory stays bounded on long runs.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    samples: Vec<Duration>,
    capacity: usize,
    count: u64,
    total: Duration,
    max: Option<Duration>,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LATENCY_SAMPLES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::new(),
            capacity: capacity.max(1),
            count: 0,
            total: Duration::ZERO,
            max: None,
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.count += 1;
        self.total = self.total.saturating_add(latency);
        self.max = self.max.max(Some(latency));

        if self.samples.len() < self.capacity {
            self.samples.push(latency);
        } else {
            // Reservoir sampling: every recorded latency is kept with equal probability
            let slot = rand::rng().random_range(0..self.count);
            if let Some(kept) = self.samples.get_mut(slot as usize) {
                *kept = latency;
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of samples currently held for percentile estimates
    pub fn retained(&self) -> usize {
        self.samples.len()
    }

    pub fn percentiles(&self) -> Option<Percentiles> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let at = |p: f64| {
            let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };
        Some(Percentiles {
            p50: at(50.0),
            p95: at(95.0),
            p99: at(99.0),
        })
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.total.as_secs_f64() / self.count as f64,
        ))
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }
}

/// Counters for one endpoint
#[derive(Debug, Default, Clone)]
pub struct EndpointStats {
    pub requests: u64,
    pub failures: u64,
    /// Calls that never produced a status (connect error, timeout, ...)
    pub transport_errors: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub latencies: LatencyStats,
}

/// Counters for one task
#[derive(Debug, Default, Clone)]
pub struct TaskStats {
    pub executed: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
}

impl TaskStats {
    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }
}

/// Event emitted by a virtual user towards the collector
#[derive(Debug)]
pub enum UserEvent {
    Spawned,
    Handshake(Handshake),
    Task { kind: TaskKind, outcome: TaskOutcome },
}

/// Aggregated statistics for a whole run
#[derive(Debug, Default)]
pub struct RunStats {
    pub users_spawned: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    /// Requests that carried tokens already invalidated by logout
    pub revoked_credential_calls: u64,
    pub endpoints: BTreeMap<Endpoint, EndpointStats>,
    pub tasks: BTreeMap<TaskKind, TaskStats>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: UserEvent) {
        match event {
            UserEvent::Spawned => self.users_spawned += 1,
            UserEvent::Handshake(handshake) => self.record_handshake(&handshake),
            UserEvent::Task { kind, outcome } => self.record_task(kind, &outcome),
        }
    }

    pub fn record_exchange(&mut self, exchange: &Exchange) {
        let stats = self.endpoints.entry(exchange.endpoint).or_default();
        stats.requests += 1;
        stats.latencies.record(exchange.latency);
        match exchange.status() {
            Some(status) => {
                *stats.status_codes.entry(status.as_u16()).or_default() += 1;
                if !status.is_success() {
                    stats.failures += 1;
                }
            }
            None => {
                stats.transport_errors += 1;
                stats.failures += 1;
            }
        }
    }

    pub fn record_handshake(&mut self, handshake: &Handshake) {
        self.record_exchange(&handshake.register);
        self.record_exchange(&handshake.login);
        if handshake.authenticated {
            self.logins_succeeded += 1;
        } else {
            self.logins_failed += 1;
        }
    }

    pub fn record_task(&mut self, kind: TaskKind, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Executed {
                exchange,
                revoked_credentials,
            } => {
                self.tasks.entry(kind).or_default().executed += 1;
                if *revoked_credentials {
                    self.revoked_credential_calls += 1;
                }
                self.record_exchange(exchange);
            }
            TaskOutcome::Skipped(reason) => {
                *self
                    .tasks
                    .entry(kind)
                    .or_default()
                    .skipped
                    .entry(*reason)
                    .or_default() += 1;
            }
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.endpoints.values().map(|s| s.requests).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.endpoints.values().map(|s| s.failures).sum()
    }

    pub fn into_report(self, started_at: DateTime<Utc>, duration: Duration) -> RunReport {
        let total_requests = self.total_requests();
        let total_failures = self.total_failures();
        let secs = duration.as_secs_f64();

        let endpoints = self
            .endpoints
            .iter()
            .map(|(endpoint, stats)| (*endpoint, EndpointSummary::from_stats(*endpoint, stats)))
            .collect();
        let tasks = self
            .tasks
            .iter()
            .map(|(kind, stats)| {
                (
                    *kind,
                    TaskSummary {
                        executed: stats.executed,
                        skipped: stats.skipped_total(),
                        skip_reasons: stats.skipped.clone(),
                    },
                )
            })
            .collect();

        RunReport {
            started_at,
            duration_secs: secs,
            users_spawned: self.users_spawned,
            logins_succeeded: self.logins_succeeded,
            logins_failed: self.logins_failed,
            revoked_credential_calls: self.revoked_credential_calls,
            total_requests,
            total_failures,
            error_rate: if total_requests > 0 {
                total_failures as f64 / total_requests as f64
            } else {
                0.0
            },
            throughput: if secs > 0.0 {
                total_requests as f64 / secs
            } else {
                0.0
            },
            endpoints,
            tasks,
        }
    }
}

fn as_ms(d: Option<Duration>) -> Option<f64> {
    d.map(|d| d.as_secs_f64() * 1000.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub route: String,
    pub requests: u64,
    pub failures: u64,
    pub transport_errors: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub mean_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl EndpointSummary {
    fn from_stats(endpoint: Endpoint, stats: &EndpointStats) -> Self {
        let percentiles = stats.latencies.percentiles();
        Self {
            route: endpoint.to_string(),
            requests: stats.requests,
            failures: stats.failures,
            transport_errors: stats.transport_errors,
            status_codes: stats.status_codes.clone(),
            mean_ms: as_ms(stats.latencies.mean()),
            p50_ms: as_ms(percentiles.map(|p| p.p50)),
            p95_ms: as_ms(percentiles.map(|p| p.p95)),
            p99_ms: as_ms(percentiles.map(|p| p.p99)),
            max_ms: as_ms(stats.latencies.max()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub executed: u64,
    pub skipped: u64,
    pub skip_reasons: BTreeMap<SkipReason, u64>,
}

/// Final, serializable report of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub users_spawned: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub revoked_credential_calls: u64,
    pub total_requests: u64,
    pub total_failures: u64,
    pub error_rate: f64,
    pub throughput: f64,
    pub endpoints: BTreeMap<Endpoint, EndpointSummary>,
    pub tasks: BTreeMap<TaskKind, TaskSummary>,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn print_summary(&self) {
        println!("\n=== Load Test Results ===");
        println!(
            "Started:           {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("Duration:          {:.1}s", self.duration_secs);
        println!("Users spawned:     {}", self.users_spawned);
        println!(
            "Logins:            {} ok, {} failed",
            self.logins_succeeded, self.logins_failed
        );
        println!("Total requests:    {}", self.total_requests);
        println!(
            "Failures:          {} ({:.2}%)",
            self.total_failures,
            self.error_rate * 100.0
        );
        println!("Throughput:        {:.1} req/sec", self.throughput);
        if self.revoked_credential_calls > 0 {
            println!(
                "Revoked-token calls: {}",
                self.revoked_credential_calls
            );
        }

        println!(
            "\n{:<38} {:>8} {:>8} {:>9} {:>9} {:>9}",
            "Route", "Reqs", "Fails", "p50 ms", "p95 ms", "p99 ms"
        );
        for summary in self.endpoints.values() {
            println!(
                "{:<38} {:>8} {:>8} {:>9} {:>9} {:>9}",
                summary.route,
                summary.requests,
                summary.failures,
                fmt_ms(summary.p50_ms),
                fmt_ms(summary.p95_ms),
                fmt_ms(summary.p99_ms),
            );
        }

        println!("\n{:<18} {:>10} {:>10}", "Task", "Executed", "Skipped");
        for (kind, summary) in &self.tasks {
            println!(
                "{:<18} {:>10} {:>10}",
                kind.name(),
                summary.executed,
                summary.skipped
            );
        }
    }
}

fn fmt_ms(v: Option<f64>) -> String {
    v.map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "-".to_string())
}
