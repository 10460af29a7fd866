//! Configuration data types read from the host's settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::scope::ConfigScope;

/// Names of the configuration sections this crate reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionKeys {
    /// Section holding the pocket declarations.
    pub pockets: String,

    /// The host's exclude filter section.
    pub files_exclude: String,

    /// Reserved pocket name for exclude entries no pocket declares.
    pub default_exclude_pocket: String,
}

impl Default for SectionKeys {
    fn default() -> Self {
        Self {
            pockets: "tidyExplorer".to_string(),
            files_exclude: "files.exclude".to_string(),
            default_exclude_pocket: "Default Excludes".to_string(),
        }
    }
}

/// Value of the pockets section at one scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorerSettings {
    #[serde(default)]
    pub pockets: Vec<Value>,
}

/// A named group of selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocketConfiguration {
    pub name: String,

    #[serde(default)]
    pub selectors: Vec<SelectorConfiguration>,
}

/// One selector entry: a bare glob, or a glob with an optional base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorConfiguration {
    Glob(String),
    #[serde(rename_all = "camelCase")]
    Scoped {
        base_path: Option<String>,
        include_glob: String,
    },
}

/// A selector entry resolved against the scope that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGlob {
    pub glob: String,

    /// The entry contradicts its scope and must never match anything.
    pub inert: bool,
}

impl SelectorConfiguration {
    /// Resolve the glob this entry selects at `scope`.
    ///
    /// A base path only makes sense relative to a workspace folder; declared at
    /// Global or Workspace scope it leaves the selector inert.
    pub fn resolve(&self, scope: &ConfigScope) -> ResolvedGlob {
        match self {
            Self::Glob(glob) => ResolvedGlob {
                glob: glob.clone(),
                inert: glob.trim().is_empty(),
            },
            Self::Scoped {
                base_path: None,
                include_glob,
            } => ResolvedGlob {
                glob: include_glob.clone(),
                inert: include_glob.trim().is_empty(),
            },
            Self::Scoped {
                base_path: Some(base),
                include_glob,
            } => match scope {
                ConfigScope::Folder(_) => {
                    let base = base.trim_matches('/');
                    let glob = if base.is_empty() {
                        include_glob.clone()
                    } else {
                        format!("{base}/{}", include_glob.trim_start_matches('/'))
                    };
                    ResolvedGlob {
                        inert: include_glob.trim().is_empty(),
                        glob,
                    }
                }
                _ => ResolvedGlob {
                    glob: include_glob.clone(),
                    inert: true,
                },
            },
        }
    }
}

/// Parse the pockets section, skipping malformed entries.
pub fn parse_pockets(value: Option<&Value>) -> Vec<PocketConfiguration> {
    let Some(value) = value else {
        return Vec::new();
    };
    let settings: ExplorerSettings = match serde_json::from_value(value.clone()) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Ignoring malformed pockets section: {e}");
            return Vec::new();
        }
    };
    settings
        .pockets
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(pocket) => Some(pocket),
            Err(e) => {
                warn!("Ignoring malformed pocket entry: {e}");
                None
            }
        })
        .collect()
}

/// Globs an exclude-filter value actively hides.
///
/// Entries explicitly set to `false` are not exclusions.
pub fn enabled_excludes(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Bool(false)))
            .map(|(glob, _)| glob.clone())
            .collect(),
        _ => Vec::new(),
    }
}
