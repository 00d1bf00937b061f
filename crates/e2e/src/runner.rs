//! Suite runner: plans checks from the menu topology and runs them in serial
//! groups, each group sharing one authenticated session

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::Authenticator;
use crate::config::SuiteConfig;
use crate::contacts::{ContactRecord, ContactsWidget};
use crate::error::{E2eError, E2eResult};
use crate::navigator::MenuNavigator;
use crate::session::{Session, SurfaceFactory};
use crate::surface::{Surface, WaitState};
use crate::topology::{MenuTopology, NavigationTarget};
use crate::viewport::{DeviceProfile, LayoutRegime};
use crate::visual::{ScreenshotVerifier, VisualDiff, VisualTester};

/// What a check does
#[derive(Debug, Clone)]
pub enum CheckKind {
    /// Reach a menu leaf, confirm the heading, optionally compare a screenshot
    Navigate {
        target: NavigationTarget,
        heading: String,
        screenshot: Option<String>,
    },
    /// Create a contact, find it, delete it, confirm it is gone
    ContactLifecycle,
    /// Create a contact, edit it, confirm only the new name is listed
    ContactEdit,
}

#[derive(Debug, Clone)]
pub struct PlannedCheck {
    pub name: String,
    pub kind: CheckKind,
}

/// Checks that run strictly in order on one shared session
#[derive(Debug, Clone)]
pub struct CheckGroup {
    pub name: String,
    pub profile: DeviceProfile,
    pub checks: Vec<PlannedCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiffResult {
    pub name: String,
    pub matches: bool,
    pub baseline_created: bool,
    pub diff_percent: f64,
    pub diff_image_path: Option<String>,
}

/// Result of running a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub project: String,
    pub success: bool,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub visual_diff: Option<VisualDiffResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResult {
    pub name: String,
    pub project: String,
    pub duration_ms: u64,
    pub results: Vec<CheckResult>,
}

/// Result of running all groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub groups: Vec<GroupResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

pub struct SuiteRunner {
    config: SuiteConfig,
    topology: MenuTopology,
    factory: Arc<dyn SurfaceFactory>,
    authenticator: Arc<dyn Authenticator>,
    visual: Option<VisualTester>,
    filter: Option<String>,
    updating_baselines: bool,
}

impl SuiteRunner {
    pub fn new(
        config: SuiteConfig,
        topology: MenuTopology,
        factory: Arc<dyn SurfaceFactory>,
        authenticator: Arc<dyn Authenticator>,
    ) -> E2eResult<Self> {
        let visual = if config.visual.enabled {
            Some(VisualTester::new(&config.visual)?)
        } else {
            None
        };
        Ok(Self {
            config,
            topology,
            factory,
            authenticator,
            visual,
            filter: None,
            updating_baselines: false,
        })
    }

    /// Only run checks whose name contains `filter`.
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Capture screenshots without comparing them, so that
    /// [`SuiteRunner::update_baselines`] can promote them afterwards.
    pub fn with_baseline_updates(mut self, updating: bool) -> Self {
        self.updating_baselines = updating;
        self
    }

    fn selected(&self, name: &str) -> bool {
        self.filter.as_deref().map_or(true, |f| name.contains(f))
    }

    /// One navigation group per project, plus a contacts group where enabled.
    pub fn plan(&self) -> Vec<CheckGroup> {
        let mut groups = Vec::new();

        for regime in &self.config.projects {
            let profile = regime.device_profile();

            let checks: Vec<PlannedCheck> = self
                .topology
                .leaves()
                .iter()
                .map(|leaf| {
                    let name = format!("navigation/{}", leaf.check_name());
                    PlannedCheck {
                        kind: CheckKind::Navigate {
                            target: leaf.target(*regime),
                            heading: leaf.expected_heading().to_string(),
                            screenshot: self.visual.as_ref().map(|_| name.clone()),
                        },
                        name,
                    }
                })
                .filter(|check| self.selected(&check.name))
                .collect();
            if !checks.is_empty() {
                groups.push(CheckGroup {
                    name: format!("{}/navigation", profile.project),
                    profile: profile.clone(),
                    checks,
                });
            }

            let contacts = &self.config.contacts;
            if contacts.enabled && contacts.projects.contains(regime) {
                let checks: Vec<PlannedCheck> = [
                    ("contacts/create-delete", CheckKind::ContactLifecycle),
                    ("contacts/edit", CheckKind::ContactEdit),
                ]
                .into_iter()
                .filter(|(name, _)| self.selected(name))
                .map(|(name, kind)| PlannedCheck {
                    name: name.to_string(),
                    kind,
                })
                .collect();
                if !checks.is_empty() {
                    groups.push(CheckGroup {
                        name: format!("{}/contacts", profile.project),
                        profile,
                        checks,
                    });
                }
            }
        }

        groups
    }

    /// Make sure the portal answers before any browser is started.
    pub async fn preflight(&self) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let resp = client.get(&self.config.base_url).send().await?;
        if resp.status().is_server_error() {
            return Err(E2eError::BackendRejection {
                url: self.config.base_url.clone(),
                status: resp.status().as_u16(),
            });
        }
        debug!("Preflight {} -> {}", self.config.base_url, resp.status());
        Ok(())
    }

    /// Run every planned group.
    pub async fn run(&self) -> E2eResult<TestSuiteResult> {
        if self.config.preflight {
            self.preflight().await?;
        }
        let groups = self.plan();
        Ok(self.run_groups(groups).await)
    }

    /// Run groups with at most `workers` in flight; checks within a group
    /// never overlap.
    pub async fn run_groups(&self, groups: Vec<CheckGroup>) -> TestSuiteResult {
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();
        let total: usize = groups.iter().map(|g| g.checks.len()).sum();

        info!(
            "Running {} check(s) in {} group(s), {} worker(s)...",
            total,
            groups.len(),
            self.config.workers
        );

        let group_results: Vec<GroupResult> = stream::iter(groups)
            .map(|group| self.run_group(group))
            .buffered(self.config.workers.max(1))
            .collect()
            .await;

        let passed = group_results
            .iter()
            .flat_map(|g| &g.results)
            .filter(|r| r.success)
            .count();
        let failed = total - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!("Test Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        TestSuiteResult {
            started_at,
            total,
            passed,
            failed,
            duration_ms,
            groups: group_results,
        }
    }

    /// Run a group's checks in order on one session, then close it whatever
    /// happened.
    pub async fn run_group(&self, group: CheckGroup) -> GroupResult {
        let start = Instant::now();
        let mut session = Session::new(group.name.clone());
        let mut results = Vec::with_capacity(group.checks.len());

        info!("Group '{}' ({} checks)", group.name, group.checks.len());

        for check in &group.checks {
            let result = self.run_with_retries(&mut session, &group, check).await;
            if result.success {
                info!("✓ {} [{}] ({} ms)", result.name, result.project, result.duration_ms);
            } else {
                error!(
                    "✗ {} [{}] - {}",
                    result.name,
                    result.project,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        if let Err(e) = session.close().await {
            warn!("Closing session for '{}' failed: {}", group.name, e);
        }

        GroupResult {
            name: group.name,
            project: group.profile.project,
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        }
    }

    async fn run_with_retries(
        &self,
        session: &mut Session,
        group: &CheckGroup,
        check: &PlannedCheck,
    ) -> CheckResult {
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.run_check(session, group, check).await {
                Ok(diff) => {
                    return CheckResult {
                        name: check.name.clone(),
                        project: group.profile.project.clone(),
                        success: true,
                        attempts,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: None,
                        visual_diff: diff.map(|d| visual_result(&check.name, d)),
                    };
                }
                Err(e) if attempts <= self.config.retries => {
                    warn!("{} attempt {} failed, retrying: {}", check.name, attempts, e);
                }
                Err(e) => {
                    let visual_diff = match &e {
                        E2eError::ScreenshotMismatch {
                            diff_percent,
                            diff_image,
                            ..
                        } => Some(VisualDiffResult {
                            name: check.name.clone(),
                            matches: false,
                            baseline_created: false,
                            diff_percent: *diff_percent,
                            diff_image_path: diff_image
                                .as_ref()
                                .map(|p| p.to_string_lossy().to_string()),
                        }),
                        _ => None,
                    };
                    return CheckResult {
                        name: check.name.clone(),
                        project: group.profile.project.clone(),
                        success: false,
                        attempts,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: Some(e.to_string()),
                        visual_diff,
                    };
                }
            }
        }
    }

    async fn run_check(
        &self,
        session: &mut Session,
        group: &CheckGroup,
        check: &PlannedCheck,
    ) -> E2eResult<Option<VisualDiff>> {
        session
            .init(self.factory.as_ref(), self.authenticator.as_ref(), &group.profile)
            .await?;
        let surface = session.surface()?;

        let config = &self.config;
        let navigator = MenuNavigator::new(
            surface,
            &config.menu,
            &config.timeouts,
            config.viewport_fallback_width,
        );

        match &check.kind {
            CheckKind::Navigate {
                target,
                heading,
                screenshot,
            } => {
                navigator.navigate_to(target).await?;
                self.expect_heading(surface, heading).await?;

                match (screenshot, &self.visual) {
                    (Some(name), Some(tester)) => {
                        let verifier = ScreenshotVerifier::new(
                            surface,
                            tester,
                            &config.visual,
                            config.settle.first_run_screenshot(),
                            config.timeouts.navigation(),
                        );
                        let project = &group.profile.project;
                        if self.updating_baselines {
                            verifier.capture(project, name).await?;
                            Ok(None)
                        } else {
                            verifier.verify(project, name).await.map(Some)
                        }
                    }
                    _ => Ok(None),
                }
            }
            CheckKind::ContactLifecycle => {
                let widget = self.contacts_widget(surface);
                let record = ContactRecord::unique(&config.contacts.name_prefix);
                widget
                    .create_and_delete(&navigator, &config.contacts.widget, &record)
                    .await?;
                Ok(None)
            }
            CheckKind::ContactEdit => {
                let widget = self.contacts_widget(surface);
                let original = ContactRecord {
                    company: Some("Original Co".to_string()),
                    ..ContactRecord::unique(&config.contacts.name_prefix)
                };
                let updated = ContactRecord {
                    company: Some("Edited Co".to_string()),
                    ..ContactRecord::unique(&format!("{}Ed", config.contacts.name_prefix))
                };
                widget
                    .edit_round_trip(&navigator, &config.contacts.widget, &original, &updated)
                    .await?;
                Ok(None)
            }
        }
    }

    fn contacts_widget<'a>(&'a self, surface: &'a dyn Surface) -> ContactsWidget<'a> {
        ContactsWidget::new(
            surface,
            &self.config.contacts.selectors,
            &self.config.timeouts,
            &self.config.settle,
        )
    }

    async fn expect_heading(&self, surface: &dyn Surface, heading: &str) -> E2eResult<()> {
        let locator = self.config.menu.heading(heading);
        surface
            .wait_for(&locator, WaitState::Visible, self.config.timeouts.assertion())
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    E2eError::AssertionFailed(format!("heading '{}' not shown", heading))
                } else {
                    e
                }
            })
    }

    /// Replace baselines with the latest captures.
    pub fn update_baselines(&self) -> E2eResult<usize> {
        match &self.visual {
            Some(tester) => tester.update_baselines(),
            None => Ok(0),
        }
    }

    /// Write test results to a JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

fn visual_result(name: &str, diff: VisualDiff) -> VisualDiffResult {
    VisualDiffResult {
        name: name.to_string(),
        matches: diff.matches,
        baseline_created: diff.baseline_created,
        diff_percent: diff.diff_percent,
        diff_image_path: diff
            .diff_image_path
            .map(|p| p.to_string_lossy().to_string()),
    }
}

/// Parse a project given on the command line (`mobile`, `icon_only`, ...).
pub fn parse_project(value: &str) -> E2eResult<LayoutRegime> {
    let lowered = value.to_lowercase();
    LayoutRegime::ALL
        .into_iter()
        .find(|r| r.as_str() == lowered || r.project() == lowered)
        .ok_or_else(|| E2eError::Configuration(format!("unknown project '{}'", value)))
}
