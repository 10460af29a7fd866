//! Configuration scopes and the workspace folders they resolve to.
//!
//! Scopes are ordered from broadest to narrowest: `Global < Workspace < Folder`.
//! Every scope has a stable string key, and [`ScopeRegistry::resolve_key`] maps a
//! key back to its scope for as long as the folder stays in the workspace.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectorError};

const GLOBAL_KEY: &str = "Global";
const WORKSPACE_KEY: &str = "Workspace";

/// A configuration scope.
///
/// The derived ordering follows variant order, so broader scopes sort first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigScope {
    /// User-level settings.
    Global,

    /// Settings of the workspace file.
    Workspace,

    /// Settings of one workspace folder, identified by its URI.
    Folder(String),
}

impl ConfigScope {
    /// Stable, serializable key of this scope.
    pub fn key(&self) -> &str {
        match self {
            Self::Global => GLOBAL_KEY,
            Self::Workspace => WORKSPACE_KEY,
            Self::Folder(uri) => uri,
        }
    }

    /// The scope whose settings this one inherits from, if any.
    pub fn parent(&self) -> Option<ConfigScope> {
        match self {
            Self::Global => None,
            Self::Workspace => Some(Self::Global),
            Self::Folder(_) => Some(Self::Workspace),
        }
    }

    /// Folder URI for folder scopes.
    pub fn folder_uri(&self) -> Option<&str> {
        match self {
            Self::Folder(uri) => Some(uri),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A root folder of the open workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    /// Stable URI of the folder.
    pub uri: String,

    /// Display name, also the first segment of folder-relative paths.
    pub name: String,

    /// Absolute path of the folder on disk.
    pub path: PathBuf,
}

impl WorkspaceFolder {
    /// Create a folder whose URI is derived from its path.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            uri: format!("file://{}", path.display()),
            name: name.into(),
            path,
        }
    }

    /// Use an explicit URI instead of the path-derived one.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// The configuration scope of this folder.
    pub fn scope(&self) -> ConfigScope {
        ConfigScope::Folder(self.uri.clone())
    }

    /// Path of `path` relative to this folder, joined with `/`.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.path).ok()?;
        let segments: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }
}

/// Enumerates the scopes of the current workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRegistry {
    folders: Vec<WorkspaceFolder>,
}

impl ScopeRegistry {
    /// Create a registry for a workspace with the given folders.
    pub fn new(folders: Vec<WorkspaceFolder>) -> Self {
        Self { folders }
    }

    /// Workspace folders in workspace order.
    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    /// Replace the folder list.
    pub fn set_folders(&mut self, folders: Vec<WorkspaceFolder>) {
        self.folders = folders;
    }

    /// All scopes, Global first, then Workspace, then each folder.
    pub fn scopes(&self) -> Vec<ConfigScope> {
        let mut scopes = vec![ConfigScope::Global, ConfigScope::Workspace];
        scopes.extend(self.folders.iter().map(WorkspaceFolder::scope));
        scopes
    }

    /// Look up a folder by URI.
    pub fn folder(&self, uri: &str) -> Option<&WorkspaceFolder> {
        self.folders.iter().find(|f| f.uri == uri)
    }

    /// The folder a scope is bound to (`None` for Global and Workspace).
    pub fn folder_of(&self, scope: &ConfigScope) -> Option<&WorkspaceFolder> {
        scope.folder_uri().and_then(|uri| self.folder(uri))
    }

    /// Check that a scope refers to something present in the workspace.
    pub fn ensure_resolvable(&self, scope: &ConfigScope) -> Result<()> {
        match scope {
            ConfigScope::Folder(uri) if self.folder(uri).is_none() => {
                Err(SelectorError::UnresolvableScope(uri.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Map a scope key back to its scope.
    pub fn resolve_key(&self, key: &str) -> Result<ConfigScope> {
        match key {
            GLOBAL_KEY => Ok(ConfigScope::Global),
            WORKSPACE_KEY => Ok(ConfigScope::Workspace),
            uri => self
                .folder(uri)
                .map(WorkspaceFolder::scope)
                .ok_or_else(|| SelectorError::UnresolvableScope(uri.to_string())),
        }
    }

    /// The innermost workspace folder containing `path`.
    pub fn folder_for_path(&self, path: &Path) -> Option<&WorkspaceFolder> {
        self.folders
            .iter()
            .filter(|f| path.starts_with(&f.path))
            .max_by_key(|f| f.path.components().count())
    }

    /// Workspace-relative path of `path`, prefixed by the folder name.
    ///
    /// `/ws/app/src/main.rs` inside folder `app` at `/ws/app` becomes `app/src/main.rs`.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let folder = self.folder_for_path(path)?;
        let rel = folder.relative(path)?;
        if rel.is_empty() {
            Some(folder.name.clone())
        } else {
            Some(format!("{}/{rel}", folder.name))
        }
    }
}
