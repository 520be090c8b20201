//! Workload orchestrator
//!
//! Spawns virtual users at a fixed rate, drives each one through its
//! handshake and weighted task loop until the run deadline or a shutdown
//! signal, and folds every event into a single `RunStats`.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant as Deadline, sleep, sleep_until};
use tracing::{debug, info, warn};

use super::identity::UserIdAllocator;
use super::stats::{RunReport, RunStats, UserEvent};
use crate::api::GatewayClient;
use crate::config::Config;
use crate::error::Result;
use crate::profile::{TaskSelector, TaskWeights, ThinkTime, VirtualUser};

/// Capacity of the user -> collector event channel
const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// A configured load test, ready to run against the target gateway
pub struct LoadTest {
    config: Config,
    client: GatewayClient,
    weights: TaskWeights,
}

impl LoadTest {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = GatewayClient::new(&config.host, config.request_timeout)?;
        Ok(Self {
            config,
            client,
            weights: TaskWeights::default(),
        })
    }

    /// Override the stock task mix
    pub fn with_weights(mut self, weights: TaskWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run until `run_time` elapses or `shutdown` flips to `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<RunReport> {
        let selector = TaskSelector::new(&self.weights)?;
        let allocator = Arc::new(UserIdAllocator::new(self.config.identity));
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = self.config.deadline_from(Deadline::now())?;
        let spawn_interval = self.config.spawn_interval()?;

        info!(
            "Starting load test against {}: {} users at {}/s for {:?}",
            self.config.host, self.config.users, self.config.spawn_rate, self.config.run_time
        );

        let (tx, mut rx) = mpsc::channel::<UserEvent>(EVENT_CHANNEL_CAPACITY);
        let collector = tokio::spawn(async move {
            let mut stats = RunStats::new();
            while let Some(event) = rx.recv().await {
                stats.apply(event);
            }
            stats
        });

        let mut users = JoinSet::new();
        for index in 0..self.config.users {
            if stop_requested(&shutdown) || Deadline::now() >= deadline {
                break;
            }

            let user = VirtualUser::new(allocator.allocate(), self.client.clone())
                .with_refresh_policy(self.config.refresh_policy);
            let rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
                None => StdRng::from_rng(&mut rand::rng()),
            };
            let driver = UserDriver {
                user,
                selector: selector.clone(),
                think_time: self.config.think_time,
                deadline,
                shutdown: shutdown.clone(),
                events: tx.clone(),
                rng,
            };
            users.spawn(driver.run());

            if index + 1 < self.config.users {
                tokio::select! {
                    _ = sleep(spawn_interval) => {}
                    _ = sleep_until(deadline) => break,
                    _ = wait_for_stop(&mut shutdown) => break,
                }
            }
        }
        info!("Spawned {} users", users.len());

        // The collector finishes once every user has dropped its sender
        drop(tx);
        while let Some(joined) = users.join_next().await {
            if let Err(e) = joined {
                debug!("Virtual user task ended abnormally: {}", e);
            }
        }
        let stats = collected_stats(collector.await);

        let duration = start.elapsed();
        info!(
            "Load test finished after {:.1}s: {} requests, {} failures",
            duration.as_secs_f64(),
            stats.total_requests(),
            stats.total_failures()
        );
        Ok(stats.into_report(started_at, duration))
    }
}

/// Unwrap the collector result, falling back to empty statistics on failure
fn collected_stats(joined: std::result::Result<RunStats, JoinError>) -> RunStats {
    match joined {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Event collector failed, reporting empty statistics: {}", e);
            RunStats::default()
        }
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Resolve once shutdown is requested; never resolves if the sender is gone
async fn wait_for_stop(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Per-user state moved into its own task
struct UserDriver {
    user: VirtualUser,
    selector: TaskSelector,
    think_time: ThinkTime,
    deadline: Deadline,
    shutdown: watch::Receiver<bool>,
    events: mpsc::Sender<UserEvent>,
    rng: StdRng,
}

impl UserDriver {
    async fn run(mut self) {
        let _ = self.events.send(UserEvent::Spawned).await;

        // The handshake always precedes the first task
        let handshake = tokio::select! {
            handshake = self.user.register_and_login() => handshake,
            _ = sleep_until(self.deadline) => return,
            _ = wait_for_stop(&mut self.shutdown) => return,
        };
        if self.events.send(UserEvent::Handshake(handshake)).await.is_err() {
            return;
        }

        loop {
            let kind = self.selector.pick(&mut self.rng);
            let outcome = tokio::select! {
                outcome = self.user.run_task(kind) => outcome,
                _ = sleep_until(self.deadline) => break,
                _ = wait_for_stop(&mut self.shutdown) => break,
            };
            if self
                .events
                .send(UserEvent::Task { kind, outcome })
                .await
                .is_err()
            {
                break;
            }

            let pause = self.think_time.sample(&mut self.rng);
            tokio::select! {
                _ = sleep(pause) => {}
                _ = sleep_until(self.deadline) => break,
                _ = wait_for_stop(&mut self.shutdown) => break,
            }
        }

        debug!(
            "{} finished in state {}",
            self.user.username(),
            self.user.auth_state().label()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn crashing_collector() -> RunStats {
        panic!("collector crashed")
    }

    #[tokio::test]
    async fn test_failed_collector_yields_empty_stats() {
        let panicked = tokio::spawn(crashing_collector()).await;
        assert!(panicked.is_err());

        let stats = collected_stats(panicked);
        assert_eq!(stats.total_requests(), 0);
        assert_eq!(stats.total_failures(), 0);
    }

    #[tokio::test]
    async fn test_collected_stats_are_passed_through() {
        let mut stats = RunStats::new();
        stats.apply(UserEvent::Spawned);
        let joined = tokio::spawn(async move { stats }).await;

        let report = collected_stats(joined).into_report(Utc::now(), Duration::from_secs(1));
        assert_eq!(report.users_spawned, 1);
    }

    #[tokio::test]
    async fn test_stop_signal_wakes_waiter() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { wait_for_stop(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }
}
