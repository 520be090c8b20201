//! Orchestrator-owned identity generation

use std::sync::atomic::{AtomicU64, Ordering};

use clap::ValueEnum;

use crate::profile::UserId;

/// How usernames are derived for spawned users
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdentityScheme {
    /// `user_1`, `user_2`, ... in spawn order
    Sequential,
    /// `user_<12 hex chars>`, unique across runs
    Uuid,
}

/// Hands out one identity per spawned user
///
/// The counter is owned here rather than read from shared run state, so two
/// users spawned concurrently never observe the same value.
#[derive(Debug)]
pub struct UserIdAllocator {
    scheme: IdentityScheme,
    next: AtomicU64,
}

impl UserIdAllocator {
    pub fn new(scheme: IdentityScheme) -> Self {
        Self::starting_at(scheme, 1)
    }

    pub fn starting_at(scheme: IdentityScheme, first: u64) -> Self {
        Self {
            scheme,
            next: AtomicU64::new(first),
        }
    }

    pub fn allocate(&self) -> UserId {
        match self.scheme {
            IdentityScheme::Sequential => {
                UserId::sequential(self.next.fetch_add(1, Ordering::Relaxed))
            }
            IdentityScheme::Uuid => UserId::random(),
        }
    }
}
