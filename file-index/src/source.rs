//! Glob file enumeration and change watching, as provided by the host.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tidy_selectors::WorkspaceFolder;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::pattern::GlobPattern;

/// A change reported by a watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum WatchEvent {
    /// A path matching the watched pattern appeared.
    Created(PathBuf),

    /// A path, or a directory containing watched paths, went away.
    Deleted(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(path) | Self::Deleted(path) => path,
        }
    }
}

/// A running watch. Watching stops when this is dropped.
pub struct FileWatch {
    events: mpsc::UnboundedReceiver<WatchEvent>,
    _guard: Option<Box<dyn Send>>,
}

impl FileWatch {
    pub fn new(events: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        Self {
            events,
            _guard: None,
        }
    }

    /// Keep `guard` alive for as long as the watch.
    pub fn with_guard(mut self, guard: impl Send + 'static) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    /// The next event, or `None` once the watch has ended.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}

/// The host's glob search and file watching services.
///
/// Both honor the host's active exclude filter: `find_files` never returns an
/// excluded file, and `recheck` reports whether a created path should count.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Every visible file matching `pattern`.
    async fn find_files(&self, pattern: &GlobPattern) -> Result<Vec<PathBuf>>;

    /// Whether `path` is an existing file not hidden by the exclude filter.
    async fn recheck(&self, path: &Path) -> Result<bool>;

    /// Start watching for files matching `pattern`.
    ///
    /// `Created` events are only sent for matching paths and are not filtered
    /// by exclusion. `Deleted` events may name any path below the watched roots.
    async fn watch(&self, pattern: &GlobPattern) -> Result<FileWatch>;

    /// Replace the workspace folders searches and watches apply to.
    async fn set_workspace_folders(&self, folders: Vec<WorkspaceFolder>);
}
