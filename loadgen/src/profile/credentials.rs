//! Credential snapshots and the authentication lifecycle of a virtual user

use crate::api::TokenPair;

/// Immutable access/refresh token pair
///
/// Never mutated in place: every successful auth event produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSnapshot {
    access_token: String,
    refresh_token: String,
}

impl CredentialSnapshot {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Accept a login response only when both tokens are present and non-empty
    pub fn from_token_pair(pair: TokenPair) -> Option<Self> {
        match (pair.access_token, pair.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Self::new(access, refresh))
            }
            _ => None,
        }
    }

    /// Build the snapshot that follows a refresh response
    ///
    /// A missing refresh token in the response keeps the current one.
    pub fn rotated(&self, pair: TokenPair) -> Option<Self> {
        let access = pair.access_token.filter(|t| !t.is_empty())?;
        let refresh = pair
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.refresh_token.clone());
        Some(Self::new(access, refresh))
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

/// Authentication lifecycle
///
/// `Anonymous -> Authenticated -> Revoked`. There is no way back to
/// `Anonymous`: a revoked user keeps its snapshot and token-gated tasks keep
/// sending the stale tokens, so the gateway's handling of invalidated
/// credentials stays under load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated(CredentialSnapshot),
    Revoked(CredentialSnapshot),
}

impl AuthState {
    pub fn credentials(&self) -> Option<&CredentialSnapshot> {
        match self {
            AuthState::Anonymous => None,
            AuthState::Authenticated(snapshot) | AuthState::Revoked(snapshot) => Some(snapshot),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn is_revoked(&self) -> bool {
        matches!(self, AuthState::Revoked(_))
    }

    /// Replace the credentials wholesale after a successful login or refresh
    pub fn authenticate(self, snapshot: CredentialSnapshot) -> Self {
        AuthState::Authenticated(snapshot)
    }

    /// Mark the current credentials as invalidated by logout
    pub fn revoke(self) -> Self {
        match self {
            AuthState::Authenticated(snapshot) => AuthState::Revoked(snapshot),
            other => other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticated(_) => "authenticated",
            AuthState::Revoked(_) => "revoked",
        }
    }
}

/// What the refresh task does with a successful refresh response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenRefreshPolicy {
    /// Discard the response and keep reusing the login-time refresh token
    #[default]
    Discard,
    /// Replace the snapshot with the tokens carried by the response
    Adopt,
}
