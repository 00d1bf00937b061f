//! Menu element resolution
//!
//! Finding "the Billing entry" is not one selector. Depending on the layout
//! the label is plain text, visually hidden text inside a list item, or an
//! image with alt text inside a link. The resolver walks an ordered table of
//! matchers, trying every candidate name at each step before relaxing to the
//! next, and returns the first match that is actually visible.
//!
//! Exact matchers come first so a sub-entry whose name is a substring of
//! another entry's name cannot win by accident.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::locator::{xpath_literal, Locator, LocatorStep};
use crate::surface::{visible_or_false, Surface};
use crate::viewport::LayoutRegime;

/// Selectors describing the portal's side menu markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuSelectors {
    /// Hamburger button that opens the compact overlay menu
    pub overlay_toggle: String,

    /// Overlay panel containing the compact menu
    pub overlay_panel: String,

    /// XPath name test of a collapsed-sidebar menu item
    pub item_element: String,

    /// XPath name test of the (visually hidden) label inside an item
    pub label_element: String,

    /// Entry hovered after icon-only navigation to close open flyouts
    pub anchor_entry: String,
}

impl Default for MenuSelectors {
    fn default() -> Self {
        Self {
            overlay_toggle: "button.navbar-toggler".to_string(),
            overlay_panel: "#mobile-menu".to_string(),
            item_element: "li".to_string(),
            label_element: "span".to_string(),
            anchor_entry: "Dashboard".to_string(),
        }
    }
}

impl MenuSelectors {
    pub fn overlay_toggle(&self) -> Locator {
        Locator::css(&self.overlay_toggle).first()
    }

    pub fn overlay_panel(&self) -> Locator {
        Locator::css(&self.overlay_panel).first()
    }

    /// List item whose label text equals (or contains) `name`.
    pub fn structural_label(&self, name: &str, exact: bool) -> Locator {
        let literal = xpath_literal(name);
        let predicate = if exact {
            format!("normalize-space(.)={}", literal)
        } else {
            format!("contains(normalize-space(.), {})", literal)
        };
        Locator::xpath(format!(
            "//{}[.//{}[{}]]",
            self.item_element, self.label_element, predicate
        ))
    }

    pub fn text(&self, name: &str, exact: bool) -> Locator {
        Locator::text(name, exact)
    }

    pub fn link(&self, name: &str, exact: bool) -> Locator {
        Locator::role("link", name, exact)
    }

    /// Link wrapping an image whose alt text is `name`.
    pub fn image_link(&self, name: &str) -> Locator {
        Locator::alt_text(name, true).then(LocatorStep::XPath {
            xpath: "ancestor::a[1]".to_string(),
        })
    }

    /// Flyout-closing anchor for the icon-only layout.
    pub fn anchor(&self) -> Locator {
        self.structural_label(&self.anchor_entry, true).first()
    }

    /// Page heading that confirms where navigation landed.
    pub fn heading(&self, text: &str) -> Locator {
        Locator::role("heading", text, true).first()
    }
}

type BuildFn = fn(&MenuSelectors, &str) -> Locator;

/// One step of the resolution cascade
struct Matcher {
    label: &'static str,
    build: BuildFn,
}

fn label_exact(s: &MenuSelectors, name: &str) -> Locator {
    s.structural_label(name, true)
}

fn label_partial(s: &MenuSelectors, name: &str) -> Locator {
    s.structural_label(name, false)
}

fn text_exact(s: &MenuSelectors, name: &str) -> Locator {
    s.text(name, true)
}

fn text_partial(s: &MenuSelectors, name: &str) -> Locator {
    s.text(name, false)
}

fn link_exact(s: &MenuSelectors, name: &str) -> Locator {
    s.link(name, true)
}

fn link_partial(s: &MenuSelectors, name: &str) -> Locator {
    s.link(name, false)
}

fn alt_text_link(s: &MenuSelectors, name: &str) -> Locator {
    s.image_link(name)
}

/// Collapsed sidebar: labels exist in the markup but are hidden.
const ICON_ONLY_CASCADE: &[Matcher] = &[
    Matcher { label: "label exact", build: label_exact },
    Matcher { label: "label partial", build: label_partial },
];

const TEXT_CASCADE: &[Matcher] = &[
    Matcher { label: "text exact", build: text_exact },
    Matcher { label: "link exact", build: link_exact },
    Matcher { label: "image alt exact", build: alt_text_link },
    Matcher { label: "text partial", build: text_partial },
    Matcher { label: "link partial", build: link_partial },
];

/// Locates menu entries on a surface
pub struct ElementResolver<'a> {
    surface: &'a dyn Surface,
    selectors: &'a MenuSelectors,
    scope: Option<Locator>,
    excluded: Vec<Locator>,
}

impl<'a> ElementResolver<'a> {
    pub fn new(surface: &'a dyn Surface, selectors: &'a MenuSelectors) -> Self {
        Self {
            surface,
            selectors,
            scope: None,
            excluded: Vec::new(),
        }
    }

    /// Only consider elements inside `scope`.
    pub fn scoped(mut self, scope: Locator) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Never return `locator`. Sub-entry lookups exclude their parent entry,
    /// whose label may equal a sub-entry's compact label.
    pub fn excluding(mut self, locator: Locator) -> Self {
        self.excluded.push(locator);
        self
    }

    fn cascade(regime: LayoutRegime, is_sub_entry: bool) -> &'static [Matcher] {
        match (regime, is_sub_entry) {
            (LayoutRegime::IconOnly, false) => ICON_ONLY_CASCADE,
            _ => TEXT_CASCADE,
        }
    }

    fn place(&self, locator: Locator) -> Locator {
        match &self.scope {
            Some(scope) => locator.within(scope).first(),
            None => locator.first(),
        }
    }

    /// Run the cascade and return the first visible match, if any.
    ///
    /// Never fails: a visibility check that errors counts as a miss.
    pub async fn find_visible(
        &self,
        names: &[String],
        regime: LayoutRegime,
        is_sub_entry: bool,
    ) -> Option<Locator> {
        for matcher in Self::cascade(regime, is_sub_entry) {
            for name in names {
                let candidate = self.place((matcher.build)(self.selectors, name));
                if self.excluded.contains(&candidate) {
                    debug!("Skipping '{}' via {}: excluded", name, matcher.label);
                    continue;
                }
                if visible_or_false(self.surface, &candidate).await {
                    debug!("Resolved '{}' via {} ({})", name, matcher.label, regime);
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Resolve a menu entry, falling back to an unguaranteed match on the
    /// primary name when nothing visible matches.
    ///
    /// Fails with [`E2eError::Resolution`] only when even the fallback matches
    /// no attached element.
    pub async fn resolve(
        &self,
        names: &[String],
        regime: LayoutRegime,
        is_sub_entry: bool,
    ) -> E2eResult<Locator> {
        let Some(primary) = names.first() else {
            return Err(E2eError::Resolution {
                names: Vec::new(),
                regime,
            });
        };

        if let Some(found) = self.find_visible(names, regime, is_sub_entry).await {
            return Ok(found);
        }

        let fallback = match (regime, is_sub_entry) {
            (LayoutRegime::IconOnly, false) => label_exact(self.selectors, primary),
            _ => text_partial(self.selectors, primary),
        };
        let fallback = self.place(fallback);
        if self.excluded.contains(&fallback) {
            return Err(E2eError::Resolution {
                names: names.to_vec(),
                regime,
            });
        }

        match self.surface.count(&fallback).await {
            Ok(n) if n > 0 => {
                debug!("Falling back to non-visible match {} for '{}'", fallback, primary);
                Ok(fallback)
            }
            Ok(_) => Err(E2eError::Resolution {
                names: names.to_vec(),
                regime,
            }),
            Err(e) => {
                debug!("Fallback lookup for '{}' failed: {}", primary, e);
                Err(E2eError::Resolution {
                    names: names.to_vec(),
                    regime,
                })
            }
        }
    }
}
