//! The host's active exclude filter.
//!
//! Rules for a file inside folder F are the union of the enabled exclude
//! entries at Global, Workspace and F. A file is excluded when its
//! folder-relative path, or the path of any directory above it, matches.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use globset::{GlobSet, GlobSetBuilder};
use tidy_selectors::{
    ConfigScope, ConfigurationService, ScopeRegistry, WorkspaceFolder, enabled_excludes,
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pattern::{CompiledPattern, compile_glob};

/// Live view of workspace folders and the exclude configuration section.
pub struct ExcludeFilter {
    config: Arc<dyn ConfigurationService>,
    section: String,
    scopes: RwLock<ScopeRegistry>,
}

impl ExcludeFilter {
    pub fn new(
        config: Arc<dyn ConfigurationService>,
        section: impl Into<String>,
        scopes: ScopeRegistry,
    ) -> Self {
        Self {
            config,
            section: section.into(),
            scopes: RwLock::new(scopes),
        }
    }

    /// Current workspace folders.
    pub async fn scopes(&self) -> ScopeRegistry {
        self.scopes.read().await.clone()
    }

    pub async fn set_folders(&self, folders: Vec<WorkspaceFolder>) {
        self.scopes.write().await.set_folders(folders);
    }

    /// Snapshot the exclusion rules as currently configured.
    pub async fn rules(&self) -> Result<ExcludeRules> {
        let scopes = self.scopes().await;

        let mut shared = Vec::new();
        for scope in [ConfigScope::Global, ConfigScope::Workspace] {
            let value = self.config.inspect(&scope, &self.section).await?;
            shared.extend(enabled_excludes(value.as_ref()));
        }

        let mut sets = HashMap::new();
        for folder in scopes.folders() {
            let value = self.config.inspect(&folder.scope(), &self.section).await?;
            let globs = shared
                .iter()
                .cloned()
                .chain(enabled_excludes(value.as_ref()));
            sets.insert(folder.uri.clone(), build_set(globs));
        }

        Ok(ExcludeRules { scopes, sets })
    }
}

fn build_set(globs: impl IntoIterator<Item = String>) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        match compile_glob(&glob) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Ignoring exclude entry: {e}"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("Failed to build exclude set: {e}");
        GlobSet::empty()
    })
}

/// Exclusion rules at one point in time.
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    scopes: ScopeRegistry,
    sets: HashMap<String, GlobSet>,
}

impl ExcludeRules {
    /// The workspace folders these rules were built for.
    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    /// Whether `path` is hidden by the exclude filter.
    ///
    /// Paths outside every workspace folder are never excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let Some(folder) = self.scopes.folder_for_path(path) else {
            return false;
        };
        let (Some(set), Some(rel)) = (self.sets.get(&folder.uri), folder.relative(path)) else {
            return false;
        };
        if set.is_empty() || rel.is_empty() {
            return false;
        }

        let excluded = rel
            .match_indices('/')
            .map(|(i, _)| &rel[..i])
            .chain(std::iter::once(rel.as_str()))
            .any(|prefix| set.is_match(prefix));
        if excluded {
            debug!("Excluded {}", path.display());
        }
        excluded
    }

    /// Whether `path` matches `pattern` and is not excluded.
    pub fn is_visible_match(&self, pattern: &CompiledPattern, path: &Path) -> bool {
        pattern.matches(&self.scopes, path) && !self.is_excluded(path)
    }
}
