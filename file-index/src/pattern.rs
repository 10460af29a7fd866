//! Selector glob patterns and their compiled matchers.

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use tidy_selectors::{ConfigScope, ScopeRegistry, SelectorKey};

use crate::error::{IndexError, Result};

/// What a file search or watch matches against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobPattern {
    /// Applies inside every workspace folder, relative to that folder.
    Plain(String),

    /// Applies below `base` only, relative to it.
    Relative { base: PathBuf, glob: String },
}

impl GlobPattern {
    /// The pattern a selector scans with.
    ///
    /// Returns `None` for a folder selector whose folder left the workspace.
    pub fn for_selector(scopes: &ScopeRegistry, key: &SelectorKey) -> Option<Self> {
        match &key.scope {
            ConfigScope::Global | ConfigScope::Workspace => Some(Self::Plain(key.glob.clone())),
            ConfigScope::Folder(_) => scopes.folder_of(&key.scope).map(|folder| Self::Relative {
                base: folder.path.clone(),
                glob: key.glob.clone(),
            }),
        }
    }

    pub fn glob(&self) -> &str {
        match self {
            Self::Plain(glob) | Self::Relative { glob, .. } => glob,
        }
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(glob) => f.write_str(glob),
            Self::Relative { base, glob } => write!(f, "{}/{glob}", base.display()),
        }
    }
}

/// Compile a glob with path-aware semantics: `*` stays within one segment.
pub fn compile_glob(glob: &str) -> Result<Glob> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map_err(|e| IndexError::InvalidPattern(format!("{glob}: {e}")))
}

/// Join the components of a relative path with `/`.
pub(crate) fn slash_path(rel: &Path) -> String {
    let segments: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    segments.join("/")
}

/// A [`GlobPattern`] ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: GlobPattern,
    matcher: GlobMatcher,
}

impl CompiledPattern {
    pub fn new(pattern: GlobPattern) -> Result<Self> {
        let matcher = compile_glob(pattern.glob())?.compile_matcher();
        Ok(Self { pattern, matcher })
    }

    pub fn pattern(&self) -> &GlobPattern {
        &self.pattern
    }

    /// Directories a scan for this pattern starts from.
    pub fn roots(&self, scopes: &ScopeRegistry) -> Vec<PathBuf> {
        match &self.pattern {
            GlobPattern::Plain(_) => scopes
                .folders()
                .iter()
                .map(|folder| folder.path.clone())
                .collect(),
            GlobPattern::Relative { base, .. } => vec![base.clone()],
        }
    }

    /// Whether `path` matches, ignoring exclusion rules.
    pub fn matches(&self, scopes: &ScopeRegistry, path: &Path) -> bool {
        let rel = match &self.pattern {
            GlobPattern::Plain(_) => scopes
                .folder_for_path(path)
                .and_then(|folder| folder.relative(path)),
            GlobPattern::Relative { base, .. } => path.strip_prefix(base).ok().map(slash_path),
        };
        rel.is_some_and(|rel| !rel.is_empty() && self.matcher.is_match(rel))
    }
}
