//! Playwright browser automation
//!
//! Playwright has no Rust API, so the suite runs a small Node script
//! (`bridge.js`) that owns the browser and answers JSON requests over
//! stdin/stdout. One bridge process is one browsing context; a session keeps
//! it alive for a whole serial group.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::session::SurfaceFactory;
use crate::surface::{LoadState, ScreenshotOptions, Surface, WaitState};
use crate::viewport::DeviceProfile;

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");
const BRIDGE_CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Configuration(format!("unsupported browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    /// `node` executable
    pub node_binary: PathBuf,
    /// Directory holding the `playwright` package; `./node_modules` if unset
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            node_binary: PathBuf::from("node"),
            node_path: None,
        }
    }
}

impl PlaywrightConfig {
    fn node_path(&self) -> PathBuf {
        self.node_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("node_modules"))
    }
}

/// Everything the bridge needs to open a context
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub base_url: String,
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeOp<'a> {
    Launch {
        browser: &'a str,
        headless: bool,
        base_url: &'a str,
        width: u32,
        height: u32,
        is_mobile: bool,
        has_touch: bool,
        device_scale_factor: f64,
        user_agent: Option<&'a str>,
        action_timeout_ms: u64,
        navigation_timeout_ms: u64,
    },
    ViewportWidth,
    Goto { url: &'a str },
    Reload,
    CurrentUrl,
    Count { locator: &'a Locator },
    IsVisible { locator: &'a Locator },
    Click { locator: &'a Locator, timeout_ms: u64 },
    Hover { locator: &'a Locator, timeout_ms: u64 },
    ScrollIntoView { locator: &'a Locator, timeout_ms: u64 },
    Fill { locator: &'a Locator, value: &'a str, timeout_ms: u64 },
    Check { locator: &'a Locator, timeout_ms: u64 },
    Uncheck { locator: &'a Locator, timeout_ms: u64 },
    Press { locator: &'a Locator, key: &'a str, timeout_ms: u64 },
    WaitFor { locator: &'a Locator, state: WaitState, timeout_ms: u64 },
    WaitForLoad { state: LoadState, timeout_ms: u64 },
    Screenshot { path: &'a Path, full_page: bool, mask: &'a [Locator] },
    Close,
}

#[derive(Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    op: BridgeOp<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<BridgeFailure>,
}

#[derive(Debug, Deserialize)]
struct BridgeFailure {
    name: String,
    message: String,
}

impl BridgeFailure {
    fn into_error(self) -> E2eError {
        if self.name == "TimeoutError" {
            E2eError::Timeout(self.message)
        } else {
            E2eError::Playwright(format!("{}: {}", self.name, self.message))
        }
    }
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Playwright browser handle backed by a bridge process
pub struct PlaywrightBridge {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    // Keeps the script on disk for the lifetime of the process.
    _script_dir: tempfile::TempDir,
}

impl PlaywrightBridge {
    /// Check that node can load the playwright package
    pub fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let status = Command::new(&config.node_binary)
            .args(["-e", "require.resolve('playwright')"])
            .env("NODE_PATH", config.node_path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Start a bridge and open a browsing context for `profile`.
    pub async fn launch(
        config: &PlaywrightConfig,
        launch: &LaunchOptions,
        profile: &DeviceProfile,
    ) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .env("NODE_PATH", config.node_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to start node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".to_string()))?;

        let bridge = Self {
            io: Mutex::new(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            _script_dir: script_dir,
        };

        bridge
            .call(BridgeOp::Launch {
                browser: config.browser.as_str(),
                headless: config.headless,
                base_url: &launch.base_url,
                width: profile.viewport.width,
                height: profile.viewport.height,
                is_mobile: profile.is_mobile,
                has_touch: profile.has_touch,
                device_scale_factor: profile.device_scale_factor,
                user_agent: profile.user_agent.as_deref(),
                action_timeout_ms: launch.action_timeout_ms,
                navigation_timeout_ms: launch.navigation_timeout_ms,
            })
            .await?;

        info!(
            "Launched {} for project '{}' ({}x{})",
            config.browser.as_str(),
            profile.project,
            profile.viewport.width,
            profile.viewport.height
        );
        Ok(bridge)
    }

    /// Send one request and wait for its response.
    async fn call(&self, op: BridgeOp<'_>) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&BridgeRequest { id, op })?;
        line.push('\n');

        let mut io = self.io.lock().await;
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        loop {
            let Some(reply) = io.stdout.next_line().await? else {
                return Err(E2eError::Playwright("bridge exited unexpectedly".to_string()));
            };
            let response: BridgeResponse = match serde_json::from_str(&reply) {
                Ok(response) => response,
                Err(_) => {
                    debug!("[bridge] {}", reply);
                    continue;
                }
            };
            if response.id != id {
                warn!("Discarding stale bridge response {}", response.id);
                continue;
            }
            return if response.ok {
                Ok(response.value)
            } else {
                Err(response
                    .error
                    .map(BridgeFailure::into_error)
                    .unwrap_or_else(|| E2eError::Playwright("unknown bridge failure".to_string())))
            };
        }
    }

    async fn call_unit(&self, op: BridgeOp<'_>) -> E2eResult<()> {
        self.call(op).await.map(|_| ())
    }

    /// Turn a main-frame response status into an error when the backend
    /// refused the request.
    async fn check_status(&self, value: serde_json::Value) -> E2eResult<()> {
        match value.as_u64() {
            Some(status) if status >= 400 => {
                let url = self.current_url().await.unwrap_or_default();
                Err(E2eError::BackendRejection {
                    url,
                    status: status as u16,
                })
            }
            _ => Ok(()),
        }
    }

    async fn terminate(&self) {
        let mut child = self.child.lock().await;
        match tokio::time::timeout(BRIDGE_CLOSE_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!("Bridge exited with {}", status),
            Ok(Err(e)) => warn!("Waiting for bridge failed: {}", e),
            Err(_) => {
                warn!("Bridge did not exit after close, terminating");
                #[cfg(unix)]
                {
                    use nix::sys::signal::{kill, Signal};
                    use nix::unistd::Pid;

                    if let Some(pid) = child.id() {
                        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                    }
                }
                let _ = child.kill().await;
            }
        }
    }
}

fn millis(timeout: Duration) -> u64 {
    timeout.as_millis() as u64
}

#[async_trait]
impl Surface for PlaywrightBridge {
    async fn viewport_width(&self) -> E2eResult<Option<u32>> {
        let value = self.call(BridgeOp::ViewportWidth).await?;
        Ok(value.as_u64().map(|w| w as u32))
    }

    async fn goto(&self, url: &str) -> E2eResult<()> {
        let status = self.call(BridgeOp::Goto { url }).await?;
        self.check_status(status).await
    }

    async fn reload(&self) -> E2eResult<()> {
        let status = self.call(BridgeOp::Reload).await?;
        self.check_status(status).await
    }

    async fn current_url(&self) -> E2eResult<String> {
        let value = self.call(BridgeOp::CurrentUrl).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let value = self.call(BridgeOp::Count { locator }).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        let value = self.call(BridgeOp::IsVisible { locator }).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::Click { locator, timeout_ms: millis(timeout) })
            .await
    }

    async fn hover(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::Hover { locator, timeout_ms: millis(timeout) })
            .await
    }

    async fn scroll_into_view(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::ScrollIntoView { locator, timeout_ms: millis(timeout) })
            .await
    }

    async fn fill(&self, locator: &Locator, value: &str, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::Fill { locator, value, timeout_ms: millis(timeout) })
            .await
    }

    async fn check(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::Check { locator, timeout_ms: millis(timeout) })
            .await
    }

    async fn uncheck(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::Uncheck { locator, timeout_ms: millis(timeout) })
            .await
    }

    async fn press(&self, locator: &Locator, key: &str, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::Press { locator, key, timeout_ms: millis(timeout) })
            .await
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::WaitFor { locator, state, timeout_ms: millis(timeout) })
            .await
    }

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeOp::WaitForLoad { state, timeout_ms: millis(timeout) })
            .await
    }

    async fn screenshot(&self, path: &Path, options: &ScreenshotOptions) -> E2eResult<()> {
        self.call_unit(BridgeOp::Screenshot {
            path,
            full_page: options.full_page,
            mask: &options.mask,
        })
        .await
    }

    async fn close(&self) -> E2eResult<()> {
        let result = self.call_unit(BridgeOp::Close).await;
        self.terminate().await;
        result
    }
}

/// Opens one bridge per session
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
    launch: LaunchOptions,
}

impl PlaywrightFactory {
    pub fn new(config: PlaywrightConfig, launch: LaunchOptions) -> E2eResult<Self> {
        PlaywrightBridge::check_playwright_installed(&config)?;
        Ok(Self { config, launch })
    }
}

#[async_trait]
impl SurfaceFactory for PlaywrightFactory {
    async fn open(&self, profile: &DeviceProfile) -> E2eResult<Box<dyn Surface>> {
        let bridge = PlaywrightBridge::launch(&self.config, &self.launch, profile).await?;
        Ok(Box::new(bridge))
    }
}
