//! In-memory page used by the integration tests
//!
//! Elements are keyed by their locator's display form with `nth=0` steps
//! removed, so `Locator::text("Billing", true).first()` and
//! `Locator::text("Billing", true)` name the same element.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use portal_e2e::auth::Authenticator;
use portal_e2e::config::SuiteConfig;
use portal_e2e::locator::Locator;
use portal_e2e::session::SurfaceFactory;
use portal_e2e::surface::{LoadState, ScreenshotOptions, Surface, WaitState};
use portal_e2e::viewport::DeviceProfile;
use portal_e2e::{E2eError, E2eResult};

pub fn key(locator: &Locator) -> String {
    locator.to_string().replace(" >> nth=0", "")
}

/// Elements shown or hidden as a side effect of an action
#[derive(Debug, Clone, Default)]
pub struct Effect {
    pub show: Vec<String>,
    pub hide: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Action {
    pub kind: String,
    pub target: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct PageState {
    pub width: Option<u32>,
    pub visible: HashSet<String>,
    pub attached: HashSet<String>,
    pub on_click: HashMap<String, Effect>,
    pub on_hover: HashMap<String, Effect>,
    /// Elements whose hover never becomes actionable
    pub hover_times_out: HashSet<String>,
    pub actions: Vec<Action>,
    pub closed: bool,
}

impl PageState {
    fn apply(&mut self, effect: Option<Effect>) {
        if let Some(effect) = effect {
            for k in effect.hide {
                self.visible.remove(&k);
            }
            for k in effect.show {
                self.visible.insert(k);
            }
        }
    }

    fn record(&mut self, kind: &str, target: impl Into<String>) {
        self.actions.push(Action {
            kind: kind.to_string(),
            target: target.into(),
            at: Instant::now(),
        });
    }

    fn present(&self, k: &str) -> bool {
        self.visible.contains(k) || self.attached.contains(k)
    }
}

/// A scripted page. Clones share state, so a test keeps one handle while
/// the code under test owns another.
#[derive(Clone, Default)]
pub struct FakeSurface {
    pub state: Arc<Mutex<PageState>>,
}

impl FakeSurface {
    pub fn with_width(width: u32) -> Self {
        let surface = Self::default();
        surface.state.lock().unwrap().width = Some(width);
        surface
    }

    pub fn show(&self, locator: &Locator) -> &Self {
        self.state.lock().unwrap().visible.insert(key(locator));
        self
    }

    pub fn attach(&self, locator: &Locator) -> &Self {
        self.state.lock().unwrap().attached.insert(key(locator));
        self
    }

    pub fn on_click(&self, locator: &Locator, show: &[&Locator], hide: &[&Locator]) -> &Self {
        self.state.lock().unwrap().on_click.insert(
            key(locator),
            Effect {
                show: show.iter().map(|l| key(l)).collect(),
                hide: hide.iter().map(|l| key(l)).collect(),
            },
        );
        self
    }

    pub fn on_hover(&self, locator: &Locator, show: &[&Locator]) -> &Self {
        self.state.lock().unwrap().on_hover.insert(
            key(locator),
            Effect {
                show: show.iter().map(|l| key(l)).collect(),
                hide: Vec::new(),
            },
        );
        self
    }

    pub fn hover_times_out(&self, locator: &Locator) -> &Self {
        self.state.lock().unwrap().hover_times_out.insert(key(locator));
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    /// `kind target` strings, in order.
    pub fn log(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .map(|a| format!("{} {}", a.kind, a.target))
            .collect()
    }

    pub fn clicked(&self, locator: &Locator) -> bool {
        let k = key(locator);
        self.actions().iter().any(|a| a.kind == "click" && a.target == k)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn act(&self, kind: &str, locator: &Locator) -> E2eResult<()> {
        let k = key(locator);
        let mut state = self.state.lock().unwrap();
        if !state.present(&k) {
            return Err(E2eError::Timeout(format!("{} {}", kind, k)));
        }
        state.record(kind, k);
        Ok(())
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn viewport_width(&self) -> E2eResult<Option<u32>> {
        Ok(self.state.lock().unwrap().width)
    }

    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.state.lock().unwrap().record("goto", url);
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        self.state.lock().unwrap().record("reload", "");
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok("https://portal.test/".to_string())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        Ok(usize::from(self.state.lock().unwrap().present(&key(locator))))
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.state.lock().unwrap().visible.contains(&key(locator)))
    }

    async fn click(&self, locator: &Locator, _timeout: Duration) -> E2eResult<()> {
        self.act("click", locator)?;
        let mut state = self.state.lock().unwrap();
        let effect = state.on_click.get(&key(locator)).cloned();
        state.apply(effect);
        Ok(())
    }

    async fn hover(&self, locator: &Locator, _timeout: Duration) -> E2eResult<()> {
        let k = key(locator);
        if self.state.lock().unwrap().hover_times_out.contains(&k) {
            return Err(E2eError::Timeout(format!("hover {}", k)));
        }
        self.act("hover", locator)?;
        let mut state = self.state.lock().unwrap();
        let effect = state.on_hover.get(&k).cloned();
        state.apply(effect);
        Ok(())
    }

    async fn scroll_into_view(&self, locator: &Locator, _timeout: Duration) -> E2eResult<()> {
        self.act("scroll", locator)
    }

    async fn fill(&self, locator: &Locator, value: &str, _timeout: Duration) -> E2eResult<()> {
        let k = key(locator);
        self.state.lock().unwrap().record("fill", format!("{}={}", k, value));
        Ok(())
    }

    async fn check(&self, locator: &Locator, _timeout: Duration) -> E2eResult<()> {
        self.act("check", locator)
    }

    async fn uncheck(&self, locator: &Locator, _timeout: Duration) -> E2eResult<()> {
        self.act("uncheck", locator)
    }

    async fn press(&self, locator: &Locator, key_name: &str, _timeout: Duration) -> E2eResult<()> {
        let k = key(locator);
        self.state.lock().unwrap().record("press", format!("{}:{}", k, key_name));
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, _timeout: Duration) -> E2eResult<()> {
        let k = key(locator);
        let mut page = self.state.lock().unwrap();
        page.record("wait_for", format!("{} {:?}", k, state));
        let reached = match state {
            WaitState::Visible => page.visible.contains(&k),
            WaitState::Hidden => !page.visible.contains(&k),
            WaitState::Attached => page.present(&k),
            WaitState::Detached => !page.present(&k),
        };
        if reached {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} {:?}", k, state)))
        }
    }

    async fn wait_for_load(&self, state: LoadState, _timeout: Duration) -> E2eResult<()> {
        self.state.lock().unwrap().record("load", format!("{:?}", state));
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _options: &ScreenshotOptions) -> E2eResult<()> {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255]));
        img.save(path)?;
        self.state.lock().unwrap().record("screenshot", path.display().to_string());
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.record("close", "");
        Ok(())
    }
}

/// Hands out clones of one scripted page and counts how often it was asked.
pub struct FakeFactory {
    pub page: FakeSurface,
    pub opened: AtomicUsize,
}

impl FakeFactory {
    pub fn new(page: FakeSurface) -> Self {
        Self {
            page,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurfaceFactory for FakeFactory {
    async fn open(&self, _profile: &DeviceProfile) -> E2eResult<Box<dyn Surface>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.page.clone()))
    }
}

#[derive(Default)]
pub struct FakeAuth {
    pub logins: AtomicUsize,
    pub fail: bool,
}

impl FakeAuth {
    pub fn failing() -> Self {
        Self {
            logins: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for FakeAuth {
    async fn authenticate(&self, _surface: &dyn Surface) -> E2eResult<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(E2eError::BackendRejection {
                url: "/login".to_string(),
                status: 403,
            })
        } else {
            Ok(())
        }
    }
}

/// Configuration with every wait shortened and no network or disk side
/// effects.
pub fn quick_config() -> SuiteConfig {
    let mut config = SuiteConfig::default();
    config.preflight = false;
    config.visual.enabled = false;
    config.timeouts.action_ms = 50;
    config.timeouts.disclosure_ms = 20;
    config.timeouts.assertion_ms = 50;
    config.settle.delete_confirm_ms = 30;
    config.settle.first_run_screenshot_ms = 0;
    config
}
