//! Weighted task table, task selection and think time

use std::time::Duration;

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use crate::api::Endpoint;
use crate::error::{LoadgenError, Result};

/// Repeatable tasks a virtual user performs after its handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    HealthCheck,
    TokenRefresh,
    UpdateProfile,
    ChangePassword,
    QueueProbe,
    Logout,
}

/// Credential a task needs before it may issue its request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    AccessToken,
    RefreshToken,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::HealthCheck,
        TaskKind::TokenRefresh,
        TaskKind::UpdateProfile,
        TaskKind::ChangePassword,
        TaskKind::QueueProbe,
        TaskKind::Logout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::HealthCheck => "health_check",
            TaskKind::TokenRefresh => "token_refresh",
            TaskKind::UpdateProfile => "update_profile",
            TaskKind::ChangePassword => "change_password",
            TaskKind::QueueProbe => "queue_probe",
            TaskKind::Logout => "logout",
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            TaskKind::HealthCheck => Endpoint::Health,
            TaskKind::TokenRefresh => Endpoint::Refresh,
            TaskKind::UpdateProfile => Endpoint::UpdateProfile,
            TaskKind::ChangePassword => Endpoint::ChangePassword,
            TaskKind::QueueProbe => Endpoint::QueueProbe,
            TaskKind::Logout => Endpoint::Logout,
        }
    }

    pub fn precondition(&self) -> Precondition {
        match self {
            TaskKind::HealthCheck | TaskKind::QueueProbe => Precondition::None,
            TaskKind::TokenRefresh | TaskKind::Logout => Precondition::RefreshToken,
            TaskKind::UpdateProfile | TaskKind::ChangePassword => Precondition::AccessToken,
        }
    }

    /// Relative selection frequency in the stock profile
    pub fn default_weight(&self) -> u32 {
        match self {
            TaskKind::HealthCheck | TaskKind::TokenRefresh => 2,
            _ => 1,
        }
    }
}

/// Validated mapping from task to relative selection frequency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWeights {
    entries: Vec<(TaskKind, u32)>,
}

impl Default for TaskWeights {
    fn default() -> Self {
        Self {
            entries: TaskKind::ALL
                .iter()
                .map(|kind| (*kind, kind.default_weight()))
                .collect(),
        }
    }
}

impl TaskWeights {
    /// Build a weight table; every weight must be positive and every task listed once
    pub fn new(entries: Vec<(TaskKind, u32)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(LoadgenError::InvalidWeights(
                "weight table is empty".to_string(),
            ));
        }
        for (i, (kind, weight)) in entries.iter().enumerate() {
            if *weight == 0 {
                return Err(LoadgenError::InvalidWeights(format!(
                    "{} has zero weight",
                    kind.name()
                )));
            }
            if entries[..i].iter().any(|(k, _)| k == kind) {
                return Err(LoadgenError::InvalidWeights(format!(
                    "{} listed more than once",
                    kind.name()
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn weight(&self, kind: TaskKind) -> Option<u32> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, w)| *w)
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Expected fraction of selections that land on `kind`
    pub fn share(&self, kind: TaskKind) -> f64 {
        self.weight(kind)
            .map(|w| w as f64 / self.total() as f64)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskKind, u32)> + '_ {
        self.entries.iter().copied()
    }
}

/// Picks tasks with probability proportional to their weight
#[derive(Debug, Clone)]
pub struct TaskSelector {
    tasks: Vec<TaskKind>,
    index: WeightedIndex<u32>,
}

impl TaskSelector {
    pub fn new(weights: &TaskWeights) -> Result<Self> {
        let tasks: Vec<TaskKind> = weights.iter().map(|(k, _)| k).collect();
        let index = WeightedIndex::new(weights.iter().map(|(_, w)| w))
            .map_err(|e| LoadgenError::InvalidWeights(e.to_string()))?;
        Ok(Self { tasks, index })
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> TaskKind {
        self.tasks[self.index.sample(rng)]
    }
}

/// Uniformly distributed pause between two tasks of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min: Duration,
    pub max: Duration,
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}

impl ThinkTime {
    pub fn fixed(duration: Duration) -> Self {
        Self {
            min: duration,
            max: duration,
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    #[test]
    fn test_default_weights_match_profile() {
        let weights = TaskWeights::default();
        assert_eq!(weights.weight(TaskKind::HealthCheck), Some(2));
        assert_eq!(weights.weight(TaskKind::TokenRefresh), Some(2));
        assert_eq!(weights.weight(TaskKind::UpdateProfile), Some(1));
        assert_eq!(weights.weight(TaskKind::ChangePassword), Some(1));
        assert_eq!(weights.weight(TaskKind::QueueProbe), Some(1));
        assert_eq!(weights.weight(TaskKind::Logout), Some(1));
        assert_eq!(weights.total(), 8);
    }

    #[test]
    fn test_weights_reject_zero_empty_and_duplicates() {
        assert!(TaskWeights::new(vec![]).is_err());
        assert!(TaskWeights::new(vec![(TaskKind::HealthCheck, 0)]).is_err());
        assert!(
            TaskWeights::new(vec![(TaskKind::Logout, 1), (TaskKind::Logout, 3)]).is_err()
        );
        assert!(TaskWeights::new(vec![(TaskKind::Logout, 1)]).is_ok());
    }

    #[test]
    fn test_preconditions() {
        assert_eq!(TaskKind::HealthCheck.precondition(), Precondition::None);
        assert_eq!(TaskKind::QueueProbe.precondition(), Precondition::None);
        assert_eq!(
            TaskKind::TokenRefresh.precondition(),
            Precondition::RefreshToken
        );
        assert_eq!(TaskKind::Logout.precondition(), Precondition::RefreshToken);
        assert_eq!(
            TaskKind::UpdateProfile.precondition(),
            Precondition::AccessToken
        );
        assert_eq!(
            TaskKind::ChangePassword.precondition(),
            Precondition::AccessToken
        );
    }

    #[test]
    fn test_selection_converges_to_weight_ratios() {
        let weights = TaskWeights::default();
        let selector = TaskSelector::new(&weights).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let samples = 80_000;
        let mut counts: HashMap<TaskKind, usize> = HashMap::new();
        for _ in 0..samples {
            *counts.entry(selector.pick(&mut rng)).or_default() += 1;
        }

        for kind in TaskKind::ALL {
            let observed = counts.get(&kind).copied().unwrap_or(0) as f64 / samples as f64;
            let expected = weights.share(kind);
            assert!(
                (observed - expected).abs() < 0.01,
                "{}: observed {:.4}, expected {:.4}",
                kind.name(),
                observed,
                expected
            );
        }
    }

    #[test]
    fn test_selector_only_picks_listed_tasks() {
        let weights =
            TaskWeights::new(vec![(TaskKind::QueueProbe, 3), (TaskKind::Logout, 1)]).unwrap();
        let selector = TaskSelector::new(&weights).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            let kind = selector.pick(&mut rng);
            assert!(kind == TaskKind::QueueProbe || kind == TaskKind::Logout);
        }
    }

    #[test]
    fn test_think_time_stays_in_range() {
        let think = ThinkTime::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            let pause = think.sample(&mut rng);
            assert!(pause >= Duration::from_secs(1));
            assert!(pause <= Duration::from_secs(3));
        }

        let fixed = ThinkTime::fixed(Duration::from_millis(5));
        assert_eq!(fixed.sample(&mut rng), Duration::from_millis(5));
    }
}
