//! Suite configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{CredentialsConfig, LoginSelectors};
use crate::contacts::ContactSettings;
use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;
use crate::resolver::MenuSelectors;
use crate::viewport::{LayoutRegime, DEFAULT_WIDTH};
use crate::visual::VisualSettings;

pub const ENV_BASE_URL: &str = "PORTAL_BASE_URL";
pub const ENV_WORKERS: &str = "PORTAL_WORKERS";

/// Top-level suite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Portal base URL; relative navigations resolve against it
    pub base_url: String,

    /// Where the login credentials come from
    pub credentials: CredentialsConfig,

    /// Browser and bridge settings
    pub browser: PlaywrightConfig,

    pub timeouts: Timeouts,

    pub settle: SettleDelays,

    pub visual: VisualSettings,

    /// Layout regimes to run, one project each
    pub projects: Vec<LayoutRegime>,

    /// Maximum number of serial groups running at once.
    ///
    /// The portal rejects concurrent sessions for one account with HTTP 403,
    /// so this stays at 1 unless the account is known to allow more.
    pub workers: usize,

    /// Extra attempts per failing check
    pub retries: u32,

    /// Width assumed when the page cannot report its viewport
    pub viewport_fallback_width: u32,

    /// Menu topology file; the embedded table is used when unset
    pub topology_path: Option<PathBuf>,

    /// Results, screenshots and archives go here
    pub output_dir: PathBuf,

    /// Check the base URL over HTTP before launching any browser
    pub preflight: bool,

    pub menu: MenuSelectors,

    pub login: LoginSelectors,

    pub contacts: ContactSettings,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://portal.example.com".to_string(),
            credentials: CredentialsConfig::default(),
            browser: PlaywrightConfig::default(),
            timeouts: Timeouts::default(),
            settle: SettleDelays::default(),
            visual: VisualSettings::default(),
            projects: LayoutRegime::ALL.to_vec(),
            workers: 1,
            retries: 0,
            viewport_fallback_width: DEFAULT_WIDTH,
            topology_path: None,
            output_dir: PathBuf::from("test-results"),
            preflight: true,
            menu: MenuSelectors::default(),
            login: LoginSelectors::default(),
            contacts: ContactSettings::default(),
        }
    }
}

/// Bounded waits, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Budget for a single click/hover/fill to become actionable
    pub action_ms: u64,
    /// Budget for page loads
    pub navigation_ms: u64,
    /// How long to wait for a hover or click to disclose sub-entries
    pub disclosure_ms: u64,
    /// Budget for success signals (headings, result links, empty states)
    pub assertion_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action_ms: 10_000,
            navigation_ms: 30_000,
            disclosure_ms: 2_000,
            assertion_ms: 10_000,
        }
    }
}

impl Timeouts {
    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn disclosure(&self) -> Duration {
        Duration::from_millis(self.disclosure_ms)
    }

    pub fn assertion(&self) -> Duration {
        Duration::from_millis(self.assertion_ms)
    }
}

/// Fixed waits that work around client/backend races
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    /// Pause between the delete confirmation dialog appearing and clicking
    /// confirm. Clicking earlier races the dialog's submit handler and the
    /// form posts natively, which the backend answers with 405.
    pub delete_confirm_ms: u64,

    /// Pause before capturing a screenshot that has no baseline yet
    pub first_run_screenshot_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            delete_confirm_ms: 500,
            first_run_screenshot_ms: 5_000,
        }
    }
}

impl SettleDelays {
    pub fn delete_confirm(&self) -> Duration {
        Duration::from_millis(self.delete_confirm_ms)
    }

    pub fn first_run_screenshot(&self) -> Duration {
        Duration::from_millis(self.first_run_screenshot_ms)
    }
}

impl SuiteConfig {
    /// Load configuration from a YAML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_yaml(&content)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORTAL_BASE_URL` / `PORTAL_WORKERS` from the process environment.
    pub fn apply_env(&mut self) -> E2eResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.workers = workers.trim().parse().map_err(|_| {
                E2eError::Configuration(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_WORKERS, workers
                ))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(E2eError::Configuration("base_url is empty".to_string()));
        }
        if self.workers == 0 {
            return Err(E2eError::Configuration("workers must be at least 1".to_string()));
        }
        if self.projects.is_empty() {
            return Err(E2eError::Configuration("no projects selected".to_string()));
        }
        if !(0.0..=100.0).contains(&self.visual.threshold_percent) {
            return Err(E2eError::Configuration(format!(
                "visual threshold {} is outside 0-100%",
                self.visual.threshold_percent
            )));
        }
        Ok(())
    }
}
