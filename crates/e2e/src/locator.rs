//! Element locators
//!
//! A [`Locator`] is a description of how to find an element, not a live
//! reference. It is re-evaluated by the browser every time it is used, so a
//! resolved menu entry stays valid across re-renders. The bridge script turns
//! each step into the equivalent Playwright locator call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One refinement step of a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocatorStep {
    Css { css: String },
    XPath { xpath: String },
    Text { text: String, exact: bool },
    Role { role: String, name: String, exact: bool },
    AltText { text: String, exact: bool },
    Label { text: String, exact: bool },
    /// Keep only matches containing this text
    HasText { text: String },
    First,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub steps: Vec<LocatorStep>,
}

impl Locator {
    fn from_step(step: LocatorStep) -> Self {
        Self { steps: vec![step] }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::from_step(LocatorStep::Css { css: css.into() })
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self::from_step(LocatorStep::XPath { xpath: xpath.into() })
    }

    pub fn text(text: impl Into<String>, exact: bool) -> Self {
        Self::from_step(LocatorStep::Text { text: text.into(), exact })
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>, exact: bool) -> Self {
        Self::from_step(LocatorStep::Role {
            role: role.into(),
            name: name.into(),
            exact,
        })
    }

    pub fn alt_text(text: impl Into<String>, exact: bool) -> Self {
        Self::from_step(LocatorStep::AltText { text: text.into(), exact })
    }

    pub fn label(text: impl Into<String>, exact: bool) -> Self {
        Self::from_step(LocatorStep::Label { text: text.into(), exact })
    }

    /// Append a step.
    pub fn then(mut self, step: LocatorStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append all steps of `inner`, searching inside the current matches.
    pub fn child(mut self, inner: &Locator) -> Self {
        self.steps.extend(inner.steps.iter().cloned());
        self
    }

    /// Restrict this locator to descendants of `scope`.
    pub fn within(self, scope: &Locator) -> Self {
        scope.clone().child(&self)
    }

    pub fn has_text(self, text: impl Into<String>) -> Self {
        self.then(LocatorStep::HasText { text: text.into() })
    }

    /// Narrow to the first match. Idempotent.
    pub fn first(self) -> Self {
        if self.steps.last() == Some(&LocatorStep::First) {
            self
        } else {
            self.then(LocatorStep::First)
        }
    }
}

impl fmt::Display for LocatorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorStep::Css { css } => write!(f, "css={}", css),
            LocatorStep::XPath { xpath } => write!(f, "xpath={}", xpath),
            LocatorStep::Text { text, exact: true } => write!(f, "text=\"{}\"", text),
            LocatorStep::Text { text, exact: false } => write!(f, "text={}", text),
            LocatorStep::Role { role, name, exact: true } => {
                write!(f, "role={}[name=\"{}\"]", role, name)
            }
            LocatorStep::Role { role, name, exact: false } => {
                write!(f, "role={}[name=\"{}\"i]", role, name)
            }
            LocatorStep::AltText { text, exact: true } => write!(f, "alt=\"{}\"", text),
            LocatorStep::AltText { text, exact: false } => write!(f, "alt={}", text),
            LocatorStep::Label { text, exact: true } => write!(f, "label=\"{}\"", text),
            LocatorStep::Label { text, exact: false } => write!(f, "label={}", text),
            LocatorStep::HasText { text } => write!(f, "has-text=\"{}\"", text),
            LocatorStep::First => f.write_str("nth=0"),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

/// Quote a string as an XPath 1.0 literal.
///
/// XPath has no escape sequences, so a value containing both quote kinds is
/// split and rebuilt with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
