//! Credentials and the portal login form

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Timeouts;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::surface::{LoadState, Surface, WaitState};

pub const ENV_USERNAME: &str = "PORTAL_USERNAME";
pub const ENV_PASSWORD: &str = "PORTAL_PASSWORD";

/// Names of the environment variables holding the login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username_env: String,
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username_env: ENV_USERNAME.to_string(),
            password_env: ENV_PASSWORD.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read credentials from the process environment.
    pub fn from_env(config: &CredentialsConfig) -> E2eResult<Self> {
        Self::from_lookup(config, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(config: &CredentialsConfig, lookup: F) -> E2eResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| E2eError::Configuration(format!("{} is not set", key)))
        };
        Ok(Self {
            username: read(&config.username_env)?,
            password: read(&config.password_env)?,
        })
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Signs a fresh browsing surface into the portal
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, surface: &dyn Surface) -> E2eResult<()>;
}

/// Login page markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    /// Path of the login page, relative to the base URL
    pub path: String,
    pub username_field: String,
    pub password_field: String,
    pub submit_button: String,
    /// Element that only renders once the dashboard is usable
    pub dashboard_ready: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            path: "/login".to_string(),
            username_field: "input[name=\"username\"]".to_string(),
            password_field: "input[name=\"password\"]".to_string(),
            submit_button: "button[type=\"submit\"]".to_string(),
            dashboard_ready: "[data-testid=\"dashboard\"]".to_string(),
        }
    }
}

/// Username/password form login
pub struct FormLogin {
    credentials: Credentials,
    selectors: LoginSelectors,
    timeouts: Timeouts,
}

impl FormLogin {
    pub fn new(credentials: Credentials, selectors: LoginSelectors, timeouts: Timeouts) -> Self {
        Self {
            credentials,
            selectors,
            timeouts,
        }
    }
}

#[async_trait]
impl Authenticator for FormLogin {
    async fn authenticate(&self, surface: &dyn Surface) -> E2eResult<()> {
        info!("Logging in as {}", self.credentials.username);
        let action = self.timeouts.action();

        surface.goto(&self.selectors.path).await?;
        surface
            .fill(&Locator::css(&self.selectors.username_field), &self.credentials.username, action)
            .await?;
        surface
            .fill(&Locator::css(&self.selectors.password_field), self.credentials.password(), action)
            .await?;
        surface
            .click(&Locator::css(&self.selectors.submit_button), action)
            .await?;
        surface
            .wait_for_load(LoadState::Load, self.timeouts.navigation())
            .await?;
        surface
            .wait_for(
                &Locator::css(&self.selectors.dashboard_ready).first(),
                WaitState::Visible,
                self.timeouts.navigation(),
            )
            .await
    }
}
