//! Menu navigation across the three layouts
//!
//! Each layout gets its own strategy; they share the same input and all end
//! by waiting for the page to finish loading. No menu state is tracked here:
//! whether a panel is open or a sub-list disclosed is read back from the page
//! every time.

use tracing::{debug, info, warn};

use crate::config::Timeouts;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::resolver::{ElementResolver, MenuSelectors};
use crate::surface::{scroll_best_effort, visible_or_false, wait_quietly, LoadState, Surface, WaitState};
use crate::topology::NavigationTarget;
use crate::viewport::LayoutRegime;

pub struct MenuNavigator<'a> {
    surface: &'a dyn Surface,
    selectors: &'a MenuSelectors,
    timeouts: &'a Timeouts,
    fallback_width: u32,
}

impl<'a> MenuNavigator<'a> {
    pub fn new(
        surface: &'a dyn Surface,
        selectors: &'a MenuSelectors,
        timeouts: &'a Timeouts,
        fallback_width: u32,
    ) -> Self {
        Self {
            surface,
            selectors,
            timeouts,
            fallback_width,
        }
    }

    /// Layout of the surface right now.
    pub async fn regime(&self) -> LayoutRegime {
        let width = match self.surface.viewport_width().await {
            Ok(width) => width,
            Err(e) => {
                debug!("Viewport width unavailable: {}", e);
                None
            }
        };
        LayoutRegime::classify_or(width, self.fallback_width)
    }

    /// Navigate to the target's entry, or its sub-entry when one is given.
    pub async fn navigate_to(&self, target: &NavigationTarget) -> E2eResult<()> {
        let regime = self.regime().await;
        info!("Navigating to {} ({})", target.describe(), regime);

        match regime {
            LayoutRegime::Compact => self.navigate_compact(target).await?,
            LayoutRegime::IconOnly => self.navigate_icon_only(target).await?,
            LayoutRegime::Expanded => self.navigate_expanded(target).await?,
        }

        self.surface
            .wait_for_load(LoadState::Load, self.timeouts.navigation())
            .await
    }

    async fn navigate_compact(&self, target: &NavigationTarget) -> E2eResult<()> {
        let panel = self.selectors.overlay_panel();
        if !visible_or_false(self.surface, &panel).await {
            debug!("Opening overlay menu");
            self.click(&self.selectors.overlay_toggle()).await?;
            self.surface
                .wait_for(&panel, WaitState::Visible, self.timeouts.action())
                .await
                .map_err(|e| self.actionable(&panel, e))?;
        }

        let resolver = ElementResolver::new(self.surface, self.selectors).scoped(panel);
        let entry = resolver
            .resolve(&target.entry_names, LayoutRegime::Compact, false)
            .await?;
        let resolver = resolver.excluding(entry.clone());

        let final_target = match target.sub_entry() {
            None => entry,
            Some(sub_names) => {
                match resolver.find_visible(sub_names, LayoutRegime::Compact, true).await {
                    Some(sub) => sub,
                    None => {
                        debug!("Disclosing sub-entries of {}", entry);
                        self.click(&entry).await?;
                        self.await_disclosure(sub_names).await;
                        resolver.resolve(sub_names, LayoutRegime::Compact, true).await?
                    }
                }
            }
        };

        self.scroll_and_click(&final_target).await
    }

    async fn navigate_icon_only(&self, target: &NavigationTarget) -> E2eResult<()> {
        let resolver = ElementResolver::new(self.surface, self.selectors);
        let entry = resolver
            .resolve(&target.entry_names, LayoutRegime::IconOnly, false)
            .await?;
        let resolver = resolver.excluding(entry.clone());

        self.hover(&entry).await?;

        match target.sub_entry() {
            None => self.click(&entry).await?,
            Some(sub_names) => {
                self.await_disclosure(sub_names).await;
                let sub = match resolver.find_visible(sub_names, LayoutRegime::IconOnly, true).await {
                    Some(sub) => sub,
                    None => {
                        // Hover does not always open the flyout.
                        debug!("Hover did not disclose {:?}, clicking {}", sub_names, entry);
                        self.click(&entry).await?;
                        self.await_disclosure(sub_names).await;
                        resolver.resolve(sub_names, LayoutRegime::IconOnly, true).await?
                    }
                };
                self.click(&sub).await?;
            }
        }

        self.close_flyout().await;
        Ok(())
    }

    async fn navigate_expanded(&self, target: &NavigationTarget) -> E2eResult<()> {
        let resolver = ElementResolver::new(self.surface, self.selectors);
        let entry = resolver
            .resolve(&target.entry_names, LayoutRegime::Expanded, false)
            .await?;
        let resolver = resolver.excluding(entry.clone());

        let final_target = match target.sub_entry() {
            None => entry,
            Some(sub_names) => {
                match resolver.find_visible(sub_names, LayoutRegime::Expanded, true).await {
                    Some(sub) => sub,
                    None => {
                        self.scroll_and_click(&entry).await?;
                        self.await_disclosure(sub_names).await;
                        resolver.resolve(sub_names, LayoutRegime::Expanded, true).await?
                    }
                }
            }
        };

        self.scroll_and_click(&final_target).await
    }

    /// Give a hover or click a moment to render the sub-entry list.
    async fn await_disclosure(&self, sub_names: &[String]) {
        if let Some(primary) = sub_names.first() {
            let disclosed = self.selectors.text(primary, true).first();
            if !wait_quietly(self.surface, &disclosed, WaitState::Visible, self.timeouts.disclosure()).await {
                debug!("'{}' not disclosed within {:?}", primary, self.timeouts.disclosure());
            }
        }
    }

    /// Move the pointer onto the anchor entry so no flyout stays open over
    /// the content.
    async fn close_flyout(&self) {
        let anchor = self.selectors.anchor();
        if let Err(e) = self.surface.hover(&anchor, self.timeouts.action()).await {
            warn!("Could not hover anchor {} to close flyout: {}", anchor, e);
        }
    }

    async fn scroll_and_click(&self, locator: &Locator) -> E2eResult<()> {
        scroll_best_effort(self.surface, locator, self.timeouts.action()).await;
        self.click(locator).await
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.surface
            .click(locator, self.timeouts.action())
            .await
            .map_err(|e| self.actionable(locator, e))
    }

    async fn hover(&self, locator: &Locator) -> E2eResult<()> {
        self.surface
            .hover(locator, self.timeouts.action())
            .await
            .map_err(|e| self.actionable(locator, e))
    }

    fn actionable(&self, locator: &Locator, err: E2eError) -> E2eError {
        if err.is_timeout() {
            E2eError::NavigationTimeout {
                target: locator.to_string(),
                timeout_ms: self.timeouts.action_ms,
            }
        } else {
            err
        }
    }
}
