//! Visual regression testing with screenshot comparison
//!
//! Baselines are stored per project and hierarchical check name:
//! `<baseline_dir>/<project>/<name>.png`. A missing baseline is a first run,
//! not a failure: the capture is given extra time to settle and becomes the
//! baseline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{GenericImageView, Pixel, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::surface::{wait_quietly, LoadState, ScreenshotOptions, Surface, WaitState};

/// Result of a visual comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiff {
    /// Whether the images match (within threshold)
    pub matches: bool,

    /// True when no baseline existed and this capture became one
    pub baseline_created: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    pub diff_pixels: u64,

    pub total_pixels: u64,

    /// Path to the diff image (if generated)
    pub diff_image_path: Option<PathBuf>,

    pub actual_hash: String,

    pub baseline_hash: String,
}

/// Screenshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    pub enabled: bool,
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    /// Maximum share of differing pixels, in percent
    pub threshold_percent: f64,
    pub full_page: bool,
    /// Dynamic regions painted over before capture
    pub mask: Vec<Locator>,
    /// Spinners and skeletons that must be gone before capture
    pub loading_indicators: Vec<Locator>,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            baseline_dir: PathBuf::from("test-results/baselines"),
            actual_dir: PathBuf::from("test-results/screenshots"),
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold_percent: 5.0,
            full_page: false,
            mask: Vec::new(),
            loading_indicators: vec![Locator::css(".spinner"), Locator::css("[aria-busy=\"true\"]")],
        }
    }
}

/// Visual regression testing utilities
pub struct VisualTester {
    baseline_dir: PathBuf,
    actual_dir: PathBuf,
    diff_dir: PathBuf,
    /// Default threshold (0.0 - 100.0 percent)
    threshold: f64,
}

impl VisualTester {
    pub fn new(settings: &VisualSettings) -> E2eResult<Self> {
        std::fs::create_dir_all(&settings.baseline_dir)?;
        std::fs::create_dir_all(&settings.actual_dir)?;
        std::fs::create_dir_all(&settings.diff_dir)?;

        Ok(Self {
            baseline_dir: settings.baseline_dir.clone(),
            actual_dir: settings.actual_dir.clone(),
            diff_dir: settings.diff_dir.clone(),
            threshold: settings.threshold_percent,
        })
    }

    pub fn baseline_path(&self, project: &str, name: &str) -> PathBuf {
        self.baseline_dir.join(project).join(format!("{}.png", name))
    }

    pub fn actual_path(&self, project: &str, name: &str) -> PathBuf {
        self.actual_dir.join(project).join(format!("{}.png", name))
    }

    fn diff_path(&self, project: &str, name: &str) -> PathBuf {
        self.diff_dir.join(project).join(format!("{}-diff.png", name))
    }

    pub fn has_baseline(&self, project: &str, name: &str) -> bool {
        self.baseline_path(project, name).exists()
    }

    /// Compare the latest capture against its baseline, creating the
    /// baseline if there is none.
    pub fn compare(&self, project: &str, name: &str, threshold: Option<f64>) -> E2eResult<VisualDiff> {
        let threshold = threshold.unwrap_or(self.threshold);

        let actual_path = self.actual_path(project, name);
        let baseline_path = self.baseline_path(project, name);

        if !actual_path.exists() {
            return Err(E2eError::VisualRegression(format!(
                "Actual screenshot not found: {}",
                actual_path.display()
            )));
        }

        if !baseline_path.exists() {
            info!("Creating baseline for '{}/{}' (first run)", project, name);
            copy_creating_parent(&actual_path, &baseline_path)?;
            let actual_hash = hash_file(&actual_path)?;
            return Ok(VisualDiff {
                matches: true,
                baseline_created: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: 0,
                diff_image_path: None,
                actual_hash: actual_hash.clone(),
                baseline_hash: actual_hash,
            });
        }

        let actual_hash = hash_file(&actual_path)?;
        let baseline_hash = hash_file(&baseline_path)?;

        let actual_img = image::open(&actual_path)?;

        // Quick hash comparison
        if actual_hash == baseline_hash {
            debug!("Screenshots match exactly (same hash)");
            return Ok(VisualDiff {
                matches: true,
                baseline_created: false,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: (actual_img.width() as u64) * (actual_img.height() as u64),
                diff_image_path: None,
                actual_hash,
                baseline_hash,
            });
        }

        let baseline_img = image::open(&baseline_path)?;

        if actual_img.dimensions() != baseline_img.dimensions() {
            warn!(
                "Screenshot dimensions differ: actual {:?} vs baseline {:?}",
                actual_img.dimensions(),
                baseline_img.dimensions()
            );
        }

        // Compare over the union of both sizes; pixels outside the overlap
        // count as different.
        let width = actual_img.width().max(baseline_img.width());
        let height = actual_img.height().max(baseline_img.height());
        let actual_rgba = actual_img.to_rgba8();
        let baseline_rgba = baseline_img.to_rgba8();

        let mut diff_img = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;
        let total_pixels = (width as u64) * (height as u64);

        for y in 0..height {
            for x in 0..width {
                let in_actual = x < actual_rgba.width() && y < actual_rgba.height();
                let in_baseline = x < baseline_rgba.width() && y < baseline_rgba.height();

                if !(in_actual && in_baseline) {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                    continue;
                }

                let actual_pixel = actual_rgba.get_pixel(x, y);
                let baseline_pixel = baseline_rgba.get_pixel(x, y);

                if pixels_differ(actual_pixel, baseline_pixel) {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                } else {
                    let channels = actual_pixel.channels();
                    diff_img.put_pixel(
                        x,
                        y,
                        image::Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                    );
                }
            }
        }

        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            (diff_pixels as f64 / total_pixels as f64) * 100.0
        };
        let matches = diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.diff_path(project, name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression detected in '{}/{}': {:.2}% pixels differ (threshold: {:.2}%)",
                project, name, diff_percent, threshold
            );
        }

        Ok(VisualDiff {
            matches,
            baseline_created: false,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
            actual_hash,
            baseline_hash,
        })
    }

    /// Replace every baseline with its latest capture.
    pub fn update_baselines(&self) -> E2eResult<usize> {
        let mut updated = 0;
        for entry in walkdir::WalkDir::new(&self.actual_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|ext| ext == "png").unwrap_or(false))
        {
            let relative = entry
                .path()
                .strip_prefix(&self.actual_dir)
                .map_err(|e| E2eError::VisualRegression(e.to_string()))?;
            copy_creating_parent(entry.path(), &self.baseline_dir.join(relative))?;
            updated += 1;
        }
        info!("Updated {} baseline(s)", updated);
        Ok(updated)
    }

    /// Baselines as `project/name` strings.
    pub fn list_baselines(&self) -> Vec<String> {
        let mut baselines: Vec<String> = walkdir::WalkDir::new(&self.baseline_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|ext| ext == "png").unwrap_or(false))
            .filter_map(|e| {
                let relative = e.path().strip_prefix(&self.baseline_dir).ok()?;
                Some(relative.with_extension("").to_string_lossy().replace('\\', "/"))
            })
            .collect();
        baselines.sort();
        baselines
    }
}

/// Check if two pixels differ beyond anti-aliasing noise
fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    const TOLERANCE: i32 = 5;

    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > TOLERANCE)
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn copy_creating_parent(from: &Path, to: &Path) -> E2eResult<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to)?;
    Ok(())
}

/// Captures a settled page and compares it against the baseline
pub struct ScreenshotVerifier<'a> {
    surface: &'a dyn Surface,
    tester: &'a VisualTester,
    settings: &'a VisualSettings,
    first_run_settle: Duration,
    settle_timeout: Duration,
}

impl<'a> ScreenshotVerifier<'a> {
    pub fn new(
        surface: &'a dyn Surface,
        tester: &'a VisualTester,
        settings: &'a VisualSettings,
        first_run_settle: Duration,
        settle_timeout: Duration,
    ) -> Self {
        Self {
            surface,
            tester,
            settings,
            first_run_settle,
            settle_timeout,
        }
    }

    /// Wait for network quiet and loading indicators to disappear. Best
    /// effort: a page that never idles is still captured.
    async fn settle(&self) {
        if let Err(e) = self
            .surface
            .wait_for_load(LoadState::NetworkIdle, self.settle_timeout)
            .await
        {
            debug!("Network did not go idle: {}", e);
        }
        for indicator in &self.settings.loading_indicators {
            if !wait_quietly(self.surface, indicator, WaitState::Hidden, self.settle_timeout).await {
                warn!("Loading indicator {} still visible, capturing anyway", indicator);
            }
        }
    }

    /// Settle the page and write the capture, without comparing it.
    pub async fn capture(&self, project: &str, name: &str) -> E2eResult<PathBuf> {
        self.settle().await;

        if !self.tester.has_baseline(project, name) {
            info!(
                "No baseline for '{}/{}', waiting {:?} before first capture",
                project, name, self.first_run_settle
            );
            tokio::time::sleep(self.first_run_settle).await;
        }

        let path = self.tester.actual_path(project, name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = ScreenshotOptions {
            full_page: self.settings.full_page,
            mask: self.settings.mask.clone(),
        };
        self.surface.screenshot(&path, &options).await?;
        Ok(path)
    }

    pub async fn verify(&self, project: &str, name: &str) -> E2eResult<VisualDiff> {
        self.capture(project, name).await?;

        let diff = self
            .tester
            .compare(project, name, Some(self.settings.threshold_percent))?;
        if diff.matches {
            Ok(diff)
        } else {
            Err(E2eError::ScreenshotMismatch {
                name: format!("{}/{}", project, name),
                diff_percent: diff.diff_percent,
                threshold: self.settings.threshold_percent,
                diff_image: diff.diff_image_path,
            })
        }
    }
}
