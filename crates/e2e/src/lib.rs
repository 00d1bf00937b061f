//! Portal E2E Test Framework
//!
//! A Rust-controlled end-to-end suite for the customer portal that:
//! - Drives a real browser through a long-lived Playwright bridge process
//! - Navigates the responsive side menu in all three layouts
//! - Exercises the contacts widget (create, search, edit, delete)
//! - Performs visual regression testing with per-project baselines
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Suite Runner (portal-e2e)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteRunner                                                │
//! │    ├── plan() -> [CheckGroup]     (from MenuTopology)       │
//! │    └── run_group(group)           (serial, one Session)     │
//! │          ├── Session::init(factory, authenticator)          │
//! │          ├── MenuNavigator::navigate_to(target)             │
//! │          │     ├── LayoutRegime::classify(width)            │
//! │          │     └── ElementResolver::resolve(names)          │
//! │          ├── ContactsWidget (create / edit / delete)        │
//! │          ├── ScreenshotVerifier::verify(project, name)      │
//! │          └── Session::close()                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Surface (trait)  <──  PlaywrightBridge (node + bridge.js)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod auth;
pub mod config;
pub mod contacts;
pub mod error;
pub mod locator;
pub mod navigator;
pub mod playwright;
pub mod resolver;
pub mod runner;
pub mod session;
pub mod surface;
pub mod topology;
pub mod viewport;
pub mod visual;

pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult};
pub use locator::Locator;
pub use navigator::MenuNavigator;
pub use resolver::ElementResolver;
pub use runner::SuiteRunner;
pub use session::{Session, SurfaceFactory};
pub use surface::Surface;
pub use topology::{MenuTopology, NavigationTarget};
pub use viewport::LayoutRegime;
