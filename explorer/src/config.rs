//! Configuration for the explorer.

use serde::{Deserialize, Serialize};
use tidy_selectors::SectionKeys;

/// Configuration for the explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Configuration section names.
    pub sections: SectionKeys,

    /// Rescan every live cache after the exclude filter changes.
    pub rescan_on_exclude_change: bool,
}

impl ExplorerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            sections: SectionKeys::default(),
            rescan_on_exclude_change: true,
        }
    }

    /// Set the configuration section names.
    pub fn with_sections(mut self, sections: SectionKeys) -> Self {
        self.sections = sections;
        self
    }

    /// Set whether caches are rescanned after exclude filter changes.
    pub fn with_rescan_on_exclude_change(mut self, rescan: bool) -> Self {
        self.rescan_on_exclude_change = rescan;
        self
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sections touched by a configuration change, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationChange {
    sections: Vec<String>,
}

impl ConfigurationChange {
    pub fn new<S: Into<String>>(sections: impl IntoIterator<Item = S>) -> Self {
        Self {
            sections: sections.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the change touches `section`, a parent of it, or a child of it.
    pub fn affects(&self, section: &str) -> bool {
        self.sections.iter().any(|changed| {
            changed == section
                || nested_in(section, changed)
                || nested_in(changed, section)
        })
    }
}

fn nested_in(child: &str, parent: &str) -> bool {
    child
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('.'))
}
