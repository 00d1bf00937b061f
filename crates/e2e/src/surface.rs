//! The browsing surface abstraction
//!
//! A [`Surface`] is one open, possibly authenticated, page. Navigation,
//! CRUD and screenshot code only ever talk to `&dyn Surface`; the Playwright
//! bridge is the production implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::E2eResult;
use crate::locator::Locator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// Page load milestones, named as Playwright names them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    #[serde(default)]
    pub full_page: bool,
    /// Regions painted over before capture (clocks, counters, avatars)
    #[serde(default)]
    pub mask: Vec<Locator>,
}

#[async_trait]
pub trait Surface: Send + Sync {
    /// Current viewport width, if the page can report it.
    async fn viewport_width(&self) -> E2eResult<Option<u32>>;

    /// Navigate to `url` (absolute, or relative to the base URL).
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn reload(&self) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Number of attached elements matching `locator`.
    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    /// Whether the locator currently matches a visible element. Never waits.
    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool>;

    async fn click(&self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    async fn hover(&self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    async fn scroll_into_view(&self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str, timeout: Duration) -> E2eResult<()>;

    async fn check(&self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    async fn uncheck(&self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    async fn press(&self, locator: &Locator, key: &str, timeout: Duration) -> E2eResult<()>;

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration)
        -> E2eResult<()>;

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> E2eResult<()>;

    async fn screenshot(&self, path: &Path, options: &ScreenshotOptions) -> E2eResult<()>;

    /// Close the browsing context. Further calls fail.
    async fn close(&self) -> E2eResult<()>;
}

/// Visibility check that treats any error as "not visible".
pub async fn visible_or_false(surface: &dyn Surface, locator: &Locator) -> bool {
    match surface.is_visible(locator).await {
        Ok(visible) => visible,
        Err(e) => {
            debug!("Visibility check for {} failed: {}", locator, e);
            false
        }
    }
}

/// Scroll an element into view, ignoring failures.
///
/// Elements that are already in view, or that are about to be re-rendered,
/// regularly make this fail.
pub async fn scroll_best_effort(surface: &dyn Surface, locator: &Locator, timeout: Duration) {
    if let Err(e) = surface.scroll_into_view(locator, timeout).await {
        debug!("Scroll into view skipped for {}: {}", locator, e);
    }
}

/// Wait for a locator, reporting whether it reached `state` in time.
pub async fn wait_quietly(
    surface: &dyn Surface,
    locator: &Locator,
    state: WaitState,
    timeout: Duration,
) -> bool {
    surface.wait_for(locator, state, timeout).await.is_ok()
}
