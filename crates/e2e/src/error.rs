//! Error types for the portal suite

use std::path::PathBuf;

use thiserror::Error;

use crate::viewport::LayoutRegime;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Menu topology error: {0}")]
    TopologyParse(String),

    #[error("Could not resolve menu element {names:?} in {regime} layout")]
    Resolution {
        names: Vec<String>,
        regime: LayoutRegime,
    },

    #[error("Timed out after {timeout_ms} ms waiting for {target} to become clickable")]
    NavigationTimeout { target: String, timeout_ms: u64 },

    #[error("Screenshot mismatch: {name} differs by {diff_percent:.2}% (threshold: {threshold:.2}%)")]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
        diff_image: Option<PathBuf>,
    },

    #[error("Visual regression: {0}")]
    VisualRegression(String),

    #[error("Backend rejected {url} with HTTP {status}")]
    BackendRejection { url: String, status: u16 },

    #[error("Session used before initialization")]
    SessionNotInitialized,

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl E2eError {
    /// True for errors that mean "the element never showed up in time".
    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout(_) | E2eError::NavigationTimeout { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
