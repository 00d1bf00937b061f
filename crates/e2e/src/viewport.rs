//! Viewport classification and per-regime device profiles
//!
//! The portal renders its side menu in three structurally different ways
//! depending on the width of the page. Everything that touches the menu asks
//! this module which layout it is dealing with.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Widths below this render the hamburger overlay menu.
pub const COMPACT_MAX_WIDTH: u32 = 768;

/// Widths at or above this render the fully expanded sidebar.
pub const EXPANDED_MIN_WIDTH: u32 = 1200;

/// Width assumed when the surface cannot report one.
pub const DEFAULT_WIDTH: u32 = 1920;

/// Layout regime of the side menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutRegime {
    /// Mobile: overlay panel behind a single toggle
    Compact,
    /// Narrow desktop: collapsed sidebar showing icons only
    IconOnly,
    /// Wide desktop: sidebar with visible labels
    Expanded,
}

impl LayoutRegime {
    pub const ALL: [LayoutRegime; 3] = [
        LayoutRegime::Compact,
        LayoutRegime::IconOnly,
        LayoutRegime::Expanded,
    ];

    /// Classify a surface width.
    pub fn classify(width: u32) -> Self {
        if width < COMPACT_MAX_WIDTH {
            LayoutRegime::Compact
        } else if width < EXPANDED_MIN_WIDTH {
            LayoutRegime::IconOnly
        } else {
            LayoutRegime::Expanded
        }
    }

    /// Classify, substituting `fallback` when the width is unknown.
    pub fn classify_or(width: Option<u32>, fallback: u32) -> Self {
        Self::classify(width.unwrap_or(fallback))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutRegime::Compact => "compact",
            LayoutRegime::IconOnly => "icon_only",
            LayoutRegime::Expanded => "expanded",
        }
    }

    /// Project name used for grouping results and baselines.
    pub fn project(&self) -> &'static str {
        match self {
            LayoutRegime::Compact => "mobile",
            LayoutRegime::IconOnly => "tablet",
            LayoutRegime::Expanded => "desktop",
        }
    }

    /// Default device emulation for this regime.
    pub fn device_profile(&self) -> DeviceProfile {
        match self {
            LayoutRegime::Compact => DeviceProfile {
                project: self.project().to_string(),
                viewport: Viewport { width: 390, height: 844 },
                is_mobile: true,
                has_touch: true,
                device_scale_factor: 3.0,
                user_agent: None,
            },
            LayoutRegime::IconOnly => DeviceProfile {
                project: self.project().to_string(),
                viewport: Viewport { width: 1024, height: 768 },
                is_mobile: false,
                has_touch: false,
                device_scale_factor: 1.0,
                user_agent: None,
            },
            LayoutRegime::Expanded => DeviceProfile {
                project: self.project().to_string(),
                viewport: Viewport { width: 1920, height: 1080 },
                is_mobile: false,
                has_touch: false,
                device_scale_factor: 1.0,
                user_agent: None,
            },
        }
    }
}

impl fmt::Display for LayoutRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Browser context emulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Project name (`mobile`, `tablet`, `desktop`)
    pub project: String,
    pub viewport: Viewport,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub has_touch: bool,
    #[serde(default = "default_scale_factor")]
    pub device_scale_factor: f64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_scale_factor() -> f64 {
    1.0
}

impl DeviceProfile {
    /// Regime this profile's viewport lands in.
    pub fn regime(&self) -> LayoutRegime {
        LayoutRegime::classify(self.viewport.width)
    }
}
