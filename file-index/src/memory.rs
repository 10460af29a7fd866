//! In-memory [`FileSource`] for embedding hosts and tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tidy_selectors::WorkspaceFolder;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::exclude::ExcludeFilter;
use crate::pattern::{CompiledPattern, GlobPattern};
use crate::source::{FileSource, FileWatch, WatchEvent};

type Watchers = Vec<(CompiledPattern, mpsc::UnboundedSender<WatchEvent>)>;

/// A file set held in memory.
///
/// [`create_file`](Self::create_file) and [`delete_file`](Self::delete_file)
/// notify active watches the way file system events would. Scans can be held
/// pending with [`hold_scans`](Self::hold_scans).
pub struct MemoryFileSource {
    filter: Arc<ExcludeFilter>,
    files: RwLock<BTreeSet<PathBuf>>,
    watchers: Mutex<Watchers>,
    gate: watch::Sender<bool>,
    scans: AtomicUsize,
}

impl MemoryFileSource {
    pub fn new(filter: Arc<ExcludeFilter>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            filter,
            files: RwLock::new(BTreeSet::new()),
            watchers: Mutex::new(Vec::new()),
            gate,
            scans: AtomicUsize::new(0),
        }
    }

    pub fn filter(&self) -> &Arc<ExcludeFilter> {
        &self.filter
    }

    /// Add a file, notifying watches whose pattern matches it.
    ///
    /// Returns `false` if the file already existed.
    pub async fn create_file(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if !self.files.write().await.insert(path.clone()) {
            return false;
        }

        let scopes = self.filter.scopes().await;
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|(_, tx)| !tx.is_closed());
        for (pattern, tx) in watchers.iter() {
            if pattern.matches(&scopes, &path) {
                let _ = tx.send(WatchEvent::Created(path.clone()));
            }
        }
        true
    }

    /// Remove a file, or every file below a directory path.
    ///
    /// Returns the number of files removed.
    pub async fn delete_file(&self, path: &Path) -> usize {
        let removed = {
            let mut files = self.files.write().await;
            let before = files.len();
            files.retain(|file| !file.starts_with(path));
            before - files.len()
        };
        if removed == 0 {
            return 0;
        }

        let mut watchers = self.watchers.lock().await;
        watchers.retain(|(_, tx)| tx.send(WatchEvent::Deleted(path.to_path_buf())).is_ok());
        removed
    }

    /// Make every subsequent scan wait until [`release_scans`](Self::release_scans).
    pub fn hold_scans(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_scans(&self) {
        self.gate.send_replace(true);
    }

    /// Number of scans started so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSource for MemoryFileSource {
    async fn find_files(&self, pattern: &GlobPattern) -> Result<Vec<PathBuf>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let mut open = self.gate.subscribe();
        open.wait_for(|open| *open)
            .await
            .map(|_| ())
            .map_err(|_| IndexError::Disposed("memory file source".to_string()))?;

        let compiled = CompiledPattern::new(pattern.clone())?;
        let rules = self.filter.rules().await?;
        let files: Vec<PathBuf> = self
            .files
            .read()
            .await
            .iter()
            .filter(|path| rules.is_visible_match(&compiled, path))
            .cloned()
            .collect();
        debug!("Found {} files for {pattern}", files.len());
        Ok(files)
    }

    async fn recheck(&self, path: &Path) -> Result<bool> {
        if !self.files.read().await.contains(path) {
            return Ok(false);
        }
        Ok(!self.filter.rules().await?.is_excluded(path))
    }

    async fn watch(&self, pattern: &GlobPattern) -> Result<FileWatch> {
        let compiled = CompiledPattern::new(pattern.clone())?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.watchers.lock().await.push((compiled, event_tx));
        Ok(FileWatch::new(event_rx))
    }

    async fn set_workspace_folders(&self, folders: Vec<WorkspaceFolder>) {
        self.filter.set_folders(folders).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tidy_selectors::{ConfigScope, MemoryConfiguration, ScopeRegistry};

    fn source(config: Arc<MemoryConfiguration>) -> MemoryFileSource {
        let scopes = ScopeRegistry::new(vec![WorkspaceFolder::new("app", "/ws/app")]);
        MemoryFileSource::new(Arc::new(ExcludeFilter::new(config, "files.exclude", scopes)))
    }

    #[tokio::test]
    async fn test_find_files_honors_excludes() {
        let config = Arc::new(MemoryConfiguration::new());
        config
            .set(ConfigScope::Global, "files.exclude", json!({ "src/gen/**": true }))
            .await;
        let source = source(config);
        source.create_file("/ws/app/src/main.rs").await;
        source.create_file("/ws/app/src/gen/out.rs").await;
        source.create_file("/ws/app/docs/guide.md").await;

        let files = source
            .find_files(&GlobPattern::Plain("src/**".into()))
            .await
            .unwrap();

        assert_eq!(files, vec![PathBuf::from("/ws/app/src/main.rs")]);
    }

    #[tokio::test]
    async fn test_watch_reports_matching_changes() {
        let source = source(Arc::new(MemoryConfiguration::new()));
        let mut watch = source
            .watch(&GlobPattern::Plain("*.rs".into()))
            .await
            .unwrap();

        source.create_file("/ws/app/notes.txt").await;
        source.create_file("/ws/app/build.rs").await;
        assert_eq!(source.delete_file(Path::new("/ws/app")).await, 2);

        assert_eq!(
            watch.recv().await,
            Some(WatchEvent::Created(PathBuf::from("/ws/app/build.rs")))
        );
        assert_eq!(
            watch.recv().await,
            Some(WatchEvent::Deleted(PathBuf::from("/ws/app")))
        );
    }

    #[tokio::test]
    async fn test_held_scan_waits_for_release() {
        let source = Arc::new(source(Arc::new(MemoryConfiguration::new())));
        source.create_file("/ws/app/a.rs").await;
        source.hold_scans();

        let scan = tokio::spawn({
            let source = source.clone();
            async move { source.find_files(&GlobPattern::Plain("*.rs".into())).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!scan.is_finished());

        source.release_scans();
        let files = scan.await.unwrap().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(source.scan_count(), 1);
    }
}
