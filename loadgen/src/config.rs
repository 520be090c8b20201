//! Load generator configuration
//!
//! Defaults mirror the fixed workload profile. Every value can be overridden
//! from environment variables (`Config::from_env`) and then from command-line
//! flags in `main`.

use std::env;
use std::time::Duration;

use clap::ValueEnum;
use reqwest::Url;
use tokio::time::Instant;

use crate::error::{LoadgenError, Result};
use crate::profile::{ThinkTime, TokenRefreshPolicy};
use crate::runner::IdentityScheme;

/// Main load test configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the target gateway
    pub host: String,
    /// Number of concurrent virtual users
    pub users: usize,
    /// Users spawned per second until `users` is reached
    pub spawn_rate: f64,
    /// Total run duration, measured from the first spawn
    pub run_time: Duration,
    /// Per-request timeout applied by the HTTP client
    pub request_timeout: Duration,
    /// Pause between two tasks of the same user
    pub think_time: ThinkTime,
    /// How virtual user identities are generated
    pub identity: IdentityScheme,
    /// What the refresh task does with the refresh response
    pub refresh_policy: TokenRefreshPolicy,
    /// Seed for task selection and think time (random when unset)
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1:8000".to_string(),
            users: 10,
            spawn_rate: 1.0,
            run_time: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            think_time: ThinkTime::default(),
            identity: IdentityScheme::Sequential,
            refresh_policy: TokenRefreshPolicy::Discard,
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("LOADGEN_HOST")
            && !host.is_empty()
        {
            config.host = host;
        }
        if let Ok(val) = env::var("LOADGEN_USERS")
            && let Ok(v) = val.parse()
        {
            config.users = v;
        }
        if let Ok(val) = env::var("LOADGEN_SPAWN_RATE")
            && let Ok(v) = val.parse()
        {
            config.spawn_rate = v;
        }
        if let Ok(val) = env::var("LOADGEN_RUN_TIME_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.run_time = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("LOADGEN_REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.request_timeout = Duration::from_secs(secs);
        }

        // Think time
        if let Ok(val) = env::var("LOADGEN_THINK_MIN_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.think_time.min = Duration::from_millis(ms);
        }
        if let Ok(val) = env::var("LOADGEN_THINK_MAX_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.think_time.max = Duration::from_millis(ms);
        }

        if let Ok(val) = env::var("LOADGEN_IDENTITY")
            && let Ok(scheme) = <IdentityScheme as ValueEnum>::from_str(&val, true)
        {
            config.identity = scheme;
        }
        if let Ok(val) = env::var("LOADGEN_ADOPT_REFRESHED_TOKENS")
            && (val.to_lowercase() == "true" || val == "1")
        {
            config.refresh_policy = TokenRefreshPolicy::Adopt;
        }
        if let Ok(val) = env::var("LOADGEN_SEED")
            && let Ok(seed) = val.parse()
        {
            config.seed = Some(seed);
        }

        config
    }

    /// Check that the configuration describes a runnable load test
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.host)
            .map_err(|e| LoadgenError::InvalidHost(format!("{}: {}", self.host, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(LoadgenError::InvalidHost(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        if self.users == 0 {
            return Err(LoadgenError::InvalidConfig(
                "at least one user is required".to_string(),
            ));
        }
        if !self.spawn_rate.is_finite() || self.spawn_rate <= 0.0 {
            return Err(LoadgenError::InvalidConfig(format!(
                "spawn rate must be positive, got {}",
                self.spawn_rate
            )));
        }
        self.spawn_interval()?;
        if self.run_time.is_zero() {
            return Err(LoadgenError::InvalidConfig(
                "run time must be non-zero".to_string(),
            ));
        }
        self.deadline_from(Instant::now())?;
        if self.request_timeout.is_zero() {
            return Err(LoadgenError::InvalidConfig(
                "request timeout must be non-zero".to_string(),
            ));
        }
        if self.think_time.min > self.think_time.max {
            return Err(LoadgenError::InvalidConfig(format!(
                "think time min {:?} exceeds max {:?}",
                self.think_time.min, self.think_time.max
            )));
        }

        Ok(())
    }

    /// Pause between two user spawns
    pub fn spawn_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(1.0 / self.spawn_rate).map_err(|_| {
            LoadgenError::InvalidConfig(format!(
                "spawn rate {} is too small to schedule",
                self.spawn_rate
            ))
        })
    }

    /// Instant at which a run started at `start` must stop
    pub fn deadline_from(&self, start: Instant) -> Result<Instant> {
        start.checked_add(self.run_time).ok_or_else(|| {
            LoadgenError::InvalidConfig(format!("run time {:?} is too long", self.run_time))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "http://127.0.0.1:8000");
        assert_eq!(config.think_time.min, Duration::from_secs(1));
        assert_eq!(config.think_time.max, Duration::from_secs(3));
        assert_eq!(config.refresh_policy, TokenRefreshPolicy::Discard);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env() {
        // No LOADGEN_* variables are set in the test environment
        let config = Config::from_env();
        assert_eq!(config.users, 10);
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let config = Config {
            host: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadgenError::InvalidHost(_))
        ));

        let config = Config {
            host: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadgenError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_users_and_bad_rates() {
        let config = Config {
            users: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            spawn_rate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            spawn_rate: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_think_time() {
        let config = Config {
            think_time: ThinkTime {
                min: Duration::from_secs(5),
                max: Duration::from_secs(1),
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadgenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unschedulable_spawn_rate() {
        let config = Config {
            spawn_rate: 1e-30,
            users: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadgenError::InvalidConfig(_))
        ));

        let config = Config {
            spawn_rate: 0.5,
            ..Default::default()
        };
        assert_eq!(config.spawn_interval().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_overflowing_run_time() {
        let config = Config {
            run_time: Duration::from_secs(u64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadgenError::InvalidConfig(_))
        ));
        assert!(config.deadline_from(Instant::now()).is_err());

        let config = Config {
            run_time: Duration::from_secs(7 * 24 * 3600),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
