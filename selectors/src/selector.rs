//! A glob pattern bound to one configuration scope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectorError};
use crate::scope::ConfigScope;

/// What a selector does to the files it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorSetting {
    /// Folded into the host's exclude filter.
    Hidden,

    /// No effect.
    #[default]
    Inactive,

    /// Shown in the curated file view.
    Display,
}

impl SelectorSetting {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Inactive => "inactive",
            Self::Display => "display",
        }
    }
}

impl fmt::Display for SelectorSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a selector: its scope and glob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectorKey {
    pub scope: ConfigScope,
    pub glob: String,
}

impl SelectorKey {
    pub fn new(scope: ConfigScope, glob: impl Into<String>) -> Self {
        Self {
            scope,
            glob: glob.into(),
        }
    }

    /// Collision-free string identifying this (scope, glob) pair.
    ///
    /// Used as the persisted-store key and as the glob identity of file caches
    /// and index contributors.
    pub fn id_string(&self) -> String {
        id_string(&self.scope, &self.glob)
    }
}

/// Glob identity string of `glob` at `scope`.
pub fn id_string(scope: &ConfigScope, glob: &str) -> String {
    format!("[{}]...{glob}", scope.key())
}

/// Split a glob identity string back into scope key and glob.
pub fn split_id_string(id: &str) -> Option<(&str, &str)> {
    let rest = id.strip_prefix('[')?;
    rest.split_once("]...")
}

/// One glob within one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    key: SelectorKey,
    id: String,
    setting: SelectorSetting,
    default_hidden: bool,
    inert: bool,
}

impl Selector {
    pub(crate) fn new(scope: ConfigScope, glob: impl Into<String>) -> Self {
        let key = SelectorKey::new(scope, glob);
        Self {
            id: key.id_string(),
            key,
            setting: SelectorSetting::Inactive,
            default_hidden: false,
            inert: false,
        }
    }

    pub fn key(&self) -> &SelectorKey {
        &self.key
    }

    pub fn scope(&self) -> &ConfigScope {
        &self.key.scope
    }

    pub fn glob(&self) -> &str {
        &self.key.glob
    }

    /// Glob identity string.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The local, authoritative setting (before scope inheritance).
    pub fn setting(&self) -> SelectorSetting {
        self.setting
    }

    /// Synthesized from an exclude entry that no pocket declares.
    pub fn is_default_hidden(&self) -> bool {
        self.default_hidden
    }

    /// Declared in a way that can never match a file.
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    pub(crate) fn set_local(&mut self, setting: SelectorSetting) {
        self.setting = setting;
    }

    pub(crate) fn mark_inert(&mut self) {
        self.inert = true;
    }

    /// Reclassify an inactive selector as hidden by an undeclared exclude entry.
    pub fn set_default_hidden(&mut self) -> Result<()> {
        if self.setting != SelectorSetting::Inactive {
            return Err(SelectorError::InvalidStateTransition {
                id: self.id.clone(),
                current: self.setting,
            });
        }
        self.setting = SelectorSetting::Hidden;
        self.default_hidden = true;
        Ok(())
    }
}
