//! Gateway routes and payload definitions

use std::fmt;

use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Routes exercised by the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Register,
    Login,
    Health,
    Refresh,
    UpdateProfile,
    ChangePassword,
    QueueProbe,
    Logout,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Health | Endpoint::QueueProbe => Method::GET,
            Endpoint::UpdateProfile => Method::PATCH,
            _ => Method::POST,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Register => "/api/v1/auth/register",
            Endpoint::Login => "/api/v1/auth/login",
            Endpoint::Health => "/health",
            Endpoint::Refresh => "/api/v1/auth/refresh",
            Endpoint::UpdateProfile => "/api/v1/users/",
            Endpoint::ChangePassword => "/api/v1/users/change_password",
            Endpoint::QueueProbe => "/api/v1/users/testrabbit",
            Endpoint::Logout => "/api/v1/auth/logout",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

/// Account creation payload
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub name: &'a str,
    pub surname: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body shared by the refresh and logout routes
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

/// Token pair returned by login (and, depending on the gateway, by refresh)
///
/// Both fields are optional on the wire; callers decide what a partial pair means.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
