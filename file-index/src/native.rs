//! [`FileSource`] backed by the local file system.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use tidy_selectors::WorkspaceFolder;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::exclude::{ExcludeFilter, ExcludeRules};
use crate::pattern::{CompiledPattern, GlobPattern};
use crate::source::{FileSource, FileWatch, WatchEvent};

/// Scans with `walkdir` and watches with `notify`.
pub struct NativeFileSource {
    filter: Arc<ExcludeFilter>,
}

impl NativeFileSource {
    pub fn new(filter: Arc<ExcludeFilter>) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &Arc<ExcludeFilter> {
        &self.filter
    }
}

#[async_trait]
impl FileSource for NativeFileSource {
    async fn find_files(&self, pattern: &GlobPattern) -> Result<Vec<PathBuf>> {
        let compiled = CompiledPattern::new(pattern.clone())?;
        let rules = self.filter.rules().await?;

        let files = tokio::task::spawn_blocking(move || scan(&compiled, &rules)).await?;
        debug!("Found {} files for {pattern}", files.len());
        Ok(files)
    }

    async fn recheck(&self, path: &Path) -> Result<bool> {
        let is_file = match fs::metadata(path).await {
            Ok(metadata) => metadata.is_file(),
            Err(_) => false,
        };
        if !is_file {
            return Ok(false);
        }
        Ok(!self.filter.rules().await?.is_excluded(path))
    }

    async fn watch(&self, pattern: &GlobPattern) -> Result<FileWatch> {
        let compiled = CompiledPattern::new(pattern.clone())?;
        let scopes = self.filter.scopes().await;
        let roots = compiled.roots(&scopes);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for change in translate(event) {
                        let wanted = match &change {
                            WatchEvent::Created(path) => compiled.matches(&scopes, path),
                            WatchEvent::Deleted(_) => true,
                        };
                        if wanted && event_tx.send(change).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("Watch error: {e}");
                }
            },
        )?;

        for root in &roots {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => debug!("Started watching: {}", root.display()),
                Err(e) => warn!("Failed to watch {}: {e}", root.display()),
            }
        }
        info!("Watching {pattern} under {} roots", roots.len());

        Ok(FileWatch::new(event_rx).with_guard(watcher))
    }

    async fn set_workspace_folders(&self, folders: Vec<WorkspaceFolder>) {
        self.filter.set_folders(folders).await;
    }
}

/// Walk the pattern's roots, pruning excluded directories.
fn scan(pattern: &CompiledPattern, rules: &ExcludeRules) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();

    for root in pattern.roots(rules.scopes()) {
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !rules.is_excluded(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", root.display());
                    continue;
                }
            };
            if entry.file_type().is_file() && pattern.matches(rules.scopes(), entry.path()) {
                files.insert(entry.into_path());
            }
        }
    }

    files.into_iter().collect()
}

/// Map a raw notify event onto creations and deletions.
fn translate(event: notify::Event) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.into_iter().map(WatchEvent::Created).collect()
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.into_iter().map(WatchEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let from = paths.next().map(WatchEvent::Deleted);
            from.into_iter().chain(paths.map(WatchEvent::Created)).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .map(|path| {
                if path.exists() {
                    WatchEvent::Created(path)
                } else {
                    WatchEvent::Deleted(path)
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}
