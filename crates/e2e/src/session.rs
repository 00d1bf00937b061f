//! Shared authenticated session for a serial group of checks
//!
//! The portal treats concurrent logins from one account as abuse (HTTP 403),
//! and logging in is slow. A serial group therefore logs in once, on its
//! first check, and every later check in the group reuses the same surface.
//! The group runner owns the [`Session`] and is the only thing that closes it.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::error::{E2eError, E2eResult};
use crate::surface::Surface;
use crate::viewport::DeviceProfile;

/// Opens new browsing surfaces
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn open(&self, profile: &DeviceProfile) -> E2eResult<Box<dyn Surface>>;
}

/// One group's browsing context
pub struct Session {
    name: String,
    surface: Option<Box<dyn Surface>>,
    initialized: bool,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surface: None,
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The authenticated surface.
    pub fn surface(&self) -> E2eResult<&dyn Surface> {
        match (&self.surface, self.initialized) {
            (Some(surface), true) => Ok(surface.as_ref()),
            _ => Err(E2eError::SessionNotInitialized),
        }
    }

    /// Open and authenticate the surface. Does nothing if already done.
    ///
    /// A failed login closes the half-open context and leaves the session
    /// uninitialized, so the next check tries again from scratch.
    pub async fn init(
        &mut self,
        factory: &dyn SurfaceFactory,
        authenticator: &dyn Authenticator,
        profile: &DeviceProfile,
    ) -> E2eResult<()> {
        if self.initialized {
            return Ok(());
        }

        info!("Initializing session '{}' ({})", self.name, profile.project);
        let surface = factory.open(profile).await?;

        if let Err(e) = authenticator.authenticate(surface.as_ref()).await {
            if let Err(close_err) = surface.close().await {
                warn!("Closing surface after failed login: {}", close_err);
            }
            return Err(e);
        }

        self.surface = Some(surface);
        self.initialized = true;
        Ok(())
    }

    /// Tear the session down. Safe to call any number of times.
    pub async fn close(&mut self) -> E2eResult<()> {
        self.initialized = false;
        match self.surface.take() {
            Some(surface) => {
                info!("Closing session '{}'", self.name);
                surface.close().await
            }
            None => Ok(()),
        }
    }
}
