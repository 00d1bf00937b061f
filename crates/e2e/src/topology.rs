//! Declarative menu topology
//!
//! The side menu is described once, in YAML, and every navigation check is
//! generated from it.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::viewport::LayoutRegime;

const DEFAULT_TOPOLOGY: &str = include_str!("../config/menu.yaml");

/// The full menu table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuTopology {
    pub entries: Vec<MenuEntry>,
}

/// A top-level menu entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntry {
    /// Canonical label, always tried first
    pub name: String,

    /// Other labels the entry renders under, in fallback order
    #[serde(default)]
    pub alternate_names: Vec<String>,

    #[serde(default)]
    pub sub_entries: Vec<SubEntry>,

    /// Page heading when it differs from the label
    #[serde(default)]
    pub heading: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubEntry {
    pub label: String,

    /// Label in the compact (mobile) layout
    #[serde(default)]
    pub mobile_label: Option<String>,

    #[serde(default)]
    pub heading: Option<String>,
}

/// Where to navigate: an entry and optionally one of its sub-entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub entry_names: Vec<String>,
    #[serde(default)]
    pub sub_entry_names: Option<Vec<String>>,
}

impl NavigationTarget {
    pub fn entry(names: &[&str]) -> Self {
        Self {
            entry_names: names.iter().map(|n| n.to_string()).collect(),
            sub_entry_names: None,
        }
    }

    pub fn with_sub_entry(mut self, names: &[&str]) -> Self {
        self.sub_entry_names = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Requested sub-entry names; `None` when the entry itself is the target.
    pub fn sub_entry(&self) -> Option<&[String]> {
        self.sub_entry_names
            .as_deref()
            .filter(|names| !names.is_empty())
    }

    pub fn describe(&self) -> String {
        let entry = self.entry_names.first().map(String::as_str).unwrap_or("?");
        match self.sub_entry().and_then(|names| names.first()) {
            Some(sub) => format!("{} > {}", entry, sub),
            None => entry.to_string(),
        }
    }
}

/// A navigable leaf of the topology
#[derive(Debug, Clone, Copy)]
pub struct MenuLeaf<'a> {
    pub entry: &'a MenuEntry,
    pub sub_entry: Option<&'a SubEntry>,
}

impl<'a> MenuLeaf<'a> {
    /// Hierarchical check name, e.g. `billing/invoices`.
    pub fn check_name(&self) -> String {
        let mut name = slug(&self.entry.name);
        if let Some(sub) = self.sub_entry {
            name.push('/');
            name.push_str(&slug(&sub.label));
        }
        name
    }

    /// Heading expected once navigation lands.
    pub fn expected_heading(&self) -> &'a str {
        match self.sub_entry {
            Some(sub) => sub.heading.as_deref().unwrap_or(&sub.label),
            None => self.entry.heading.as_deref().unwrap_or(&self.entry.name),
        }
    }

    pub fn target(&self, regime: LayoutRegime) -> NavigationTarget {
        let mut entry_names = vec![self.entry.name.clone()];
        entry_names.extend(self.entry.alternate_names.iter().cloned());

        let sub_entry_names = self.sub_entry.map(|sub| {
            let mut names = Vec::with_capacity(2);
            if regime == LayoutRegime::Compact {
                if let Some(mobile) = &sub.mobile_label {
                    names.push(mobile.clone());
                }
            }
            if !names.contains(&sub.label) {
                names.push(sub.label.clone());
            }
            names
        });

        NavigationTarget {
            entry_names,
            sub_entry_names,
        }
    }
}

impl MenuTopology {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let topology: Self = serde_yaml::from_str(yaml)?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// The portal menu as shipped with the suite.
    pub fn builtin() -> E2eResult<Self> {
        Self::from_yaml(DEFAULT_TOPOLOGY)
    }

    /// Load from `path` when given, otherwise the built-in table.
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    fn validate(&self) -> E2eResult<()> {
        if self.entries.is_empty() {
            return Err(E2eError::TopologyParse("menu has no entries".to_string()));
        }
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                return Err(E2eError::TopologyParse("entry with empty name".to_string()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(E2eError::TopologyParse(format!(
                    "duplicate entry '{}'",
                    entry.name
                )));
            }
            let parent_names: Vec<&str> = std::iter::once(entry.name.as_str())
                .chain(entry.alternate_names.iter().map(String::as_str))
                .collect();
            let mut labels = HashSet::new();
            for sub in &entry.sub_entries {
                let clash = std::iter::once(sub.label.as_str())
                    .chain(sub.mobile_label.as_deref())
                    .find(|label| {
                        parent_names
                            .iter()
                            .any(|parent| parent.trim().eq_ignore_ascii_case(label.trim()))
                    });
                if let Some(label) = clash {
                    return Err(E2eError::TopologyParse(format!(
                        "sub-entry label '{}' repeats its parent '{}'",
                        label, entry.name
                    )));
                }
                if sub.label.trim().is_empty() {
                    return Err(E2eError::TopologyParse(format!(
                        "empty sub-entry label under '{}'",
                        entry.name
                    )));
                }
                if !labels.insert(sub.label.as_str()) {
                    return Err(E2eError::TopologyParse(format!(
                        "duplicate sub-entry '{}' under '{}'",
                        sub.label, entry.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every navigable leaf, in menu order.
    pub fn leaves(&self) -> Vec<MenuLeaf<'_>> {
        let mut leaves = Vec::new();
        for entry in &self.entries {
            if entry.sub_entries.is_empty() {
                leaves.push(MenuLeaf { entry, sub_entry: None });
            } else {
                leaves.extend(entry.sub_entries.iter().map(|sub| MenuLeaf {
                    entry,
                    sub_entry: Some(sub),
                }));
            }
        }
        leaves
    }

    pub fn find(&self, entry: &str, sub_entry: Option<&str>) -> Option<MenuLeaf<'_>> {
        let entry = self.entries.iter().find(|e| e.name == entry)?;
        match sub_entry {
            None => Some(MenuLeaf { entry, sub_entry: None }),
            Some(label) => entry
                .sub_entries
                .iter()
                .find(|s| s.label == label)
                .map(|sub| MenuLeaf { entry, sub_entry: Some(sub) }),
        }
    }
}

fn slug(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn builtin_topology_parses() {
        let topology = MenuTopology::builtin().unwrap();
        assert!(topology.find("Monitoring", Some("Healthchecks")).is_some());
        assert!(topology.find("Billing", Some("Invoices")).is_some());
        assert!(topology.find("Dashboard", None).is_some());
    }

    #[test]
    fn leaves_expand_sub_entries() {
        let topology = MenuTopology::from_yaml(
            r#"
entries:
  - name: Dashboard
  - name: Billing
    sub_entries:
      - label: Invoices
      - label: Payment Methods
"#,
        )
        .unwrap();
        let names: Vec<String> = topology.leaves().iter().map(|l| l.check_name()).collect();
        assert_eq!(names, vec!["dashboard", "billing/invoices", "billing/payment-methods"]);
    }

    #[test]
    fn mobile_label_is_tried_first_only_in_compact() {
        let topology = MenuTopology::from_yaml(
            r#"
entries:
  - name: Account
    alternate_names: [Profile]
    sub_entries:
      - label: API Tokens
        mobile_label: API
"#,
        )
        .unwrap();
        let leaf = topology.find("Account", Some("API Tokens")).unwrap();

        let compact = leaf.target(LayoutRegime::Compact);
        assert_eq!(compact.entry_names, vec!["Account", "Profile"]);
        assert_eq!(compact.sub_entry().unwrap(), ["API", "API Tokens"]);

        let expanded = leaf.target(LayoutRegime::Expanded);
        assert_eq!(expanded.sub_entry().unwrap(), ["API Tokens"]);
    }

    #[test]
    fn empty_sub_entry_list_targets_the_entry() {
        let target = NavigationTarget {
            entry_names: vec!["Dashboard".into()],
            sub_entry_names: Some(vec![]),
        };
        assert!(target.sub_entry().is_none());
        assert_eq!(target.describe(), "Dashboard");
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let err = MenuTopology::from_yaml(
            r#"
entries:
  - name: Billing
  - name: Billing
"#,
        )
        .unwrap_err();
        assert!(matches!(err, E2eError::TopologyParse(_)));
    }

    #[test_case("Domains", None ; "label equals parent")]
    #[test_case("Domain List", Some("Domains") ; "mobile label equals parent")]
    #[test_case("Domain List", Some("zones") ; "mobile label equals alternate")]
    fn sub_entry_labels_must_differ_from_parent(label: &str, mobile: Option<&str>) {
        let mobile = mobile
            .map(|m| format!("\n        mobile_label: {}", m))
            .unwrap_or_default();
        let yaml = format!(
            "entries:\n  - name: Domains\n    alternate_names: [Zones]\n    sub_entries:\n      - label: {}{}\n",
            label, mobile
        );
        let err = MenuTopology::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, E2eError::TopologyParse(_)), "{err}");
    }

    #[test]
    fn builtin_sub_entries_never_repeat_their_parent() {
        let topology = MenuTopology::builtin().unwrap();
        for regime in LayoutRegime::ALL {
            for leaf in topology.leaves() {
                let target = leaf.target(regime);
                if let Some(subs) = target.sub_entry() {
                    assert!(
                        subs.iter().all(|s| !target.entry_names.contains(s)),
                        "{} in {}",
                        leaf.check_name(),
                        regime
                    );
                }
            }
        }
    }

    #[test]
    fn heading_override() {
        let topology = MenuTopology::from_yaml(
            r#"
entries:
  - name: Dashboard
    heading: Welcome back
"#,
        )
        .unwrap();
        assert_eq!(topology.leaves()[0].expected_heading(), "Welcome back");
    }
}
