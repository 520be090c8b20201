//! Virtual user: startup handshake and task execution

use std::fmt;

use reqwest::StatusCode;
use tracing::{debug, warn};
use uuid::Uuid;

use super::credentials::{AuthState, CredentialSnapshot, TokenRefreshPolicy};
use super::tasks::{Precondition, TaskKind};
use crate::api::{
    Endpoint, Exchange, GatewayClient, LoginRequest, PasswordChange, ProfileUpdate,
    RegisterRequest, TokenPair, TokenRequest,
};

pub const PASSWORD: &str = "test1234";
pub const NEW_PASSWORD: &str = "newpass123";
pub const FIRST_NAME: &str = "Test";
pub const SURNAME: &str = "User";
pub const UPDATED_NAME: &str = "Updated";
pub const EMAIL_DOMAIN: &str = "example.com";

/// Identity handed to a virtual user at construction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn sequential(n: u64) -> Self {
        Self(n.to_string())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string()[..12].to_string())
    }

    pub fn username(&self) -> String {
        format!("user_{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the register + login handshake
#[derive(Debug)]
pub struct Handshake {
    pub register: Exchange,
    pub login: Exchange,
    pub authenticated: bool,
}

/// Why a task issued no request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingAccessToken,
    MissingRefreshToken,
}

/// Result of running one task
#[derive(Debug)]
pub enum TaskOutcome {
    Executed {
        exchange: Exchange,
        /// The request carried tokens already invalidated by logout
        revoked_credentials: bool,
    },
    Skipped(SkipReason),
}

impl TaskOutcome {
    pub fn exchange(&self) -> Option<&Exchange> {
        match self {
            TaskOutcome::Executed { exchange, .. } => Some(exchange),
            TaskOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            TaskOutcome::Executed { .. } => None,
            TaskOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

/// One simulated client
///
/// Owns its credentials exclusively; nothing is shared between users except
/// the HTTP connection pool inside `GatewayClient`.
pub struct VirtualUser {
    id: UserId,
    username: String,
    client: GatewayClient,
    auth: AuthState,
    refresh_policy: TokenRefreshPolicy,
}

impl VirtualUser {
    pub fn new(id: UserId, client: GatewayClient) -> Self {
        let username = id.username();
        Self {
            id,
            username,
            client,
            auth: AuthState::Anonymous,
            refresh_policy: TokenRefreshPolicy::default(),
        }
    }

    pub fn with_refresh_policy(mut self, policy: TokenRefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    pub fn email(&self) -> String {
        format!("{}@{}", self.username, EMAIL_DOMAIN)
    }

    /// Register (outcome ignored) and log in
    ///
    /// Only a 200 login response carrying both tokens authenticates the user;
    /// otherwise the user stays anonymous for the rest of its lifetime.
    pub async fn register_and_login(&mut self) -> Handshake {
        let email = self.email();
        let register = self
            .client
            .send_json(
                Endpoint::Register,
                &RegisterRequest {
                    username: &self.username,
                    name: FIRST_NAME,
                    surname: SURNAME,
                    email: &email,
                    password: PASSWORD,
                },
                None,
            )
            .await;
        if let Some(reason) = register.failure_reason() {
            debug!("Registration of {} not accepted: {}", self.username, reason);
        }

        let login = self
            .client
            .send_json(
                Endpoint::Login,
                &LoginRequest {
                    username: &self.username,
                    password: PASSWORD,
                },
                None,
            )
            .await;

        let snapshot = if login.status() == Some(StatusCode::OK) {
            login
                .json::<TokenPair>()
                .ok()
                .and_then(CredentialSnapshot::from_token_pair)
        } else {
            None
        };

        let authenticated = match snapshot {
            Some(snapshot) => {
                let state = std::mem::take(&mut self.auth);
                self.auth = state.authenticate(snapshot);
                debug!("{} authenticated", self.username);
                true
            }
            None => {
                warn!(
                    "Login for {} did not yield tokens ({}); token-gated tasks will be skipped",
                    self.username,
                    login
                        .failure_reason()
                        .unwrap_or_else(|| "missing tokens".to_string())
                );
                false
            }
        };

        Handshake {
            register,
            login,
            authenticated,
        }
    }

    /// Run one task, or skip it when its credential precondition is unmet
    pub async fn run_task(&mut self, kind: TaskKind) -> TaskOutcome {
        let endpoint = kind.endpoint();
        let creds = match (kind.precondition(), self.auth.credentials()) {
            (Precondition::None, _) => {
                return TaskOutcome::Executed {
                    exchange: self.client.send(endpoint, None).await,
                    revoked_credentials: false,
                };
            }
            (_, Some(snapshot)) => snapshot.clone(),
            (Precondition::AccessToken, None) => {
                return TaskOutcome::Skipped(SkipReason::MissingAccessToken);
            }
            (Precondition::RefreshToken, None) => {
                return TaskOutcome::Skipped(SkipReason::MissingRefreshToken);
            }
        };
        let revoked_credentials = self.auth.is_revoked();

        let exchange = match kind {
            TaskKind::TokenRefresh => {
                let exchange = self
                    .client
                    .send_json(
                        endpoint,
                        &TokenRequest {
                            token: creds.refresh_token(),
                        },
                        None,
                    )
                    .await;
                self.apply_refresh(&creds, &exchange);
                exchange
            }
            TaskKind::UpdateProfile => {
                self.client
                    .send_json(
                        endpoint,
                        &ProfileUpdate { name: UPDATED_NAME },
                        Some(creds.access_token()),
                    )
                    .await
            }
            TaskKind::ChangePassword => {
                self.client
                    .send_json(
                        endpoint,
                        &PasswordChange {
                            old_password: PASSWORD,
                            new_password: NEW_PASSWORD,
                        },
                        Some(creds.access_token()),
                    )
                    .await
            }
            TaskKind::Logout => {
                let exchange = self
                    .client
                    .send_json(
                        endpoint,
                        &TokenRequest {
                            token: creds.refresh_token(),
                        },
                        None,
                    )
                    .await;
                if exchange.is_success() && self.auth.is_authenticated() {
                    let state = std::mem::take(&mut self.auth);
                    self.auth = state.revoke();
                    debug!("{} logged out; keeping revoked tokens", self.username);
                }
                exchange
            }
            // Ungated tasks returned above
            TaskKind::HealthCheck | TaskKind::QueueProbe => self.client.send(endpoint, None).await,
        };

        TaskOutcome::Executed {
            exchange,
            revoked_credentials,
        }
    }

    fn apply_refresh(&mut self, current: &CredentialSnapshot, exchange: &Exchange) {
        if self.refresh_policy == TokenRefreshPolicy::Discard || !exchange.is_success() {
            return;
        }
        let rotated = exchange
            .json::<TokenPair>()
            .ok()
            .and_then(|pair| current.rotated(pair));
        if let Some(snapshot) = rotated {
            let state = std::mem::take(&mut self.auth);
            self.auth = state.authenticate(snapshot);
            debug!("{} adopted refreshed tokens", self.username);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_user(id: UserId) -> VirtualUser {
        // Port 9 (discard) on loopback: any request that slips through fails fast
        let client = GatewayClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        VirtualUser::new(id, client)
    }

    #[test]
    fn test_username_and_email_derivation() {
        let user = offline_user(UserId::sequential(7));
        assert_eq!(user.username(), "user_7");
        assert_eq!(user.email(), "user_7@example.com");
        assert_eq!(user.auth_state(), &AuthState::Anonymous);
    }

    #[test]
    fn test_random_ids_are_distinct() {
        let a = UserId::random();
        let b = UserId::random();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 12);
        assert!(a.username().starts_with("user_"));
    }

    #[tokio::test]
    async fn test_token_gated_tasks_skip_without_credentials() {
        let mut user = offline_user(UserId::sequential(1));

        let outcome = user.run_task(TaskKind::UpdateProfile).await;
        assert_eq!(outcome.skip_reason(), Some(SkipReason::MissingAccessToken));

        let outcome = user.run_task(TaskKind::ChangePassword).await;
        assert_eq!(outcome.skip_reason(), Some(SkipReason::MissingAccessToken));

        let outcome = user.run_task(TaskKind::TokenRefresh).await;
        assert_eq!(outcome.skip_reason(), Some(SkipReason::MissingRefreshToken));

        let outcome = user.run_task(TaskKind::Logout).await;
        assert_eq!(outcome.skip_reason(), Some(SkipReason::MissingRefreshToken));
    }

    #[tokio::test]
    async fn test_ungated_task_failure_is_recorded_not_raised() {
        let mut user = offline_user(UserId::sequential(2));
        let outcome = user.run_task(TaskKind::HealthCheck).await;
        let exchange = outcome.exchange().expect("health check always executes");
        assert_eq!(exchange.endpoint, Endpoint::Health);
        assert!(!exchange.is_success());
    }
}
