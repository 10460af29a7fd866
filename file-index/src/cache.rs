//! Per-glob file caches shared by every subscriber of the same glob.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{IndexError, Result};
use crate::pattern::GlobPattern;
use crate::source::{FileSource, FileWatch, WatchEvent};

#[derive(Default)]
struct Shared {
    files: BTreeSet<PathBuf>,
    subscribers: Vec<mpsc::UnboundedSender<WatchEvent>>,
}

impl Shared {
    fn publish(&mut self, event: &WatchEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn insert(&mut self, path: PathBuf) {
        if self.files.insert(path.clone()) {
            self.publish(&WatchEvent::Created(path));
        }
    }

    fn remove(&mut self, path: &Path) {
        if self.files.remove(path) {
            self.publish(&WatchEvent::Deleted(path.to_path_buf()));
        }
    }

    /// Remove `path` and, when it names a directory, every cached file below it.
    fn remove_below(&mut self, path: &Path) {
        let gone: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|file| file.starts_with(path))
            .cloned()
            .collect();
        for file in gone {
            self.remove(&file);
        }
    }
}

/// The files currently matched by one selector glob.
///
/// The watch starts before the initial scan so nothing created in between is
/// missed. Created paths are re-validated against the exclude filter before
/// they count. Once disposed, no further events reach subscribers and a scan
/// still in flight is discarded.
pub struct SelectorFileCache {
    id: String,
    pattern: GlobPattern,
    source: Arc<dyn FileSource>,
    shared: Arc<Mutex<Shared>>,
    cancel: CancellationToken,
    ready: OnceCell<()>,
}

impl SelectorFileCache {
    pub fn new(id: impl Into<String>, pattern: GlobPattern, source: Arc<dyn FileSource>) -> Self {
        Self {
            id: id.into(),
            pattern,
            source,
            shared: Arc::new(Mutex::new(Shared::default())),
            cancel: CancellationToken::new(),
            ready: OnceCell::new(),
        }
    }

    /// Glob identity string.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &GlobPattern {
        &self.pattern
    }

    /// Start watching and wait for the initial scan.
    ///
    /// Concurrent callers share one start; later calls return at once.
    pub async fn ready(&self) -> Result<()> {
        self.ready.get_or_try_init(|| self.start()).await?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(IndexError::Disposed(self.id.clone()));
        }

        let watch = self.source.watch(&self.pattern).await?;
        tokio::spawn(pump(
            watch,
            self.source.clone(),
            self.shared.clone(),
            self.cancel.clone(),
            self.id.clone(),
        ));

        let files = self.scan().await?;
        let mut shared = self.shared.lock().await;
        if self.is_disposed() {
            return Err(IndexError::Disposed(self.id.clone()));
        }
        for file in files {
            shared.insert(file);
        }
        info!("Cache {} ready with {} files", self.id, shared.files.len());
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<PathBuf>> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(IndexError::Disposed(self.id.clone())),
            files = self.source.find_files(&self.pattern) => files,
        }
    }

    /// Snapshot of the cached files plus a stream of every later change.
    pub async fn subscribe(&self) -> (Vec<PathBuf>, mpsc::UnboundedReceiver<WatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = self.shared.lock().await;
        if !self.is_disposed() {
            shared.subscribers.push(tx);
        }
        (shared.files.iter().cloned().collect(), rx)
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        let mut shared = self.shared.lock().await;
        shared.subscribers.retain(|tx| !tx.is_closed());
        shared.subscribers.len()
    }

    pub async fn files(&self) -> Vec<PathBuf> {
        self.shared.lock().await.files.iter().cloned().collect()
    }

    /// Scan again and publish the difference.
    ///
    /// Does nothing before the initial scan has completed or after disposal.
    pub async fn rescan(&self) -> Result<()> {
        if self.is_disposed() || self.ready.get().is_none() {
            return Ok(());
        }

        let current: BTreeSet<PathBuf> = match self.scan().await {
            Ok(files) => files.into_iter().collect(),
            Err(IndexError::Disposed(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut shared = self.shared.lock().await;
        if self.is_disposed() {
            return Ok(());
        }
        let gone: Vec<PathBuf> = shared.files.difference(&current).cloned().collect();
        let added = current.len() + gone.len() - shared.files.len();
        for file in &gone {
            shared.remove(file);
        }
        for file in current {
            shared.insert(file);
        }
        debug!("Rescanned {}: {added} added, {} removed", self.id, gone.len());
        Ok(())
    }

    /// Stop watching and drop all subscribers.
    pub fn dispose(&self) {
        if !self.cancel.is_cancelled() {
            debug!("Disposing cache {}", self.id);
            self.cancel.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SelectorFileCache {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Apply watch events to the cache until it is disposed or the watch ends.
async fn pump(
    mut watch: FileWatch,
    source: Arc<dyn FileSource>,
    shared: Arc<Mutex<Shared>>,
    cancel: CancellationToken,
    id: String,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = watch.recv() => event,
        };
        let Some(event) = event else {
            debug!("Watch for {id} ended");
            break;
        };

        match event {
            WatchEvent::Created(path) => {
                let visible = source.recheck(&path).await.unwrap_or_else(|e| {
                    warn!("Failed to recheck {}: {e}", path.display());
                    false
                });
                let mut shared = shared.lock().await;
                if cancel.is_cancelled() {
                    break;
                }
                if visible {
                    shared.insert(path);
                }
            }
            WatchEvent::Deleted(path) => {
                let mut shared = shared.lock().await;
                if cancel.is_cancelled() {
                    break;
                }
                shared.remove_below(&path);
            }
        }
    }

    shared.lock().await.subscribers.clear();
}

/// Live caches by glob identity.
#[derive(Default)]
pub struct CacheRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    caches: HashMap<String, Arc<SelectorFileCache>>,
    closed: bool,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache for `id`, created (not yet started) if absent.
    pub async fn get_or_create(
        &self,
        id: &str,
        pattern: GlobPattern,
        source: &Arc<dyn FileSource>,
    ) -> Result<Arc<SelectorFileCache>> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(IndexError::Disposed("cache registry".to_string()));
        }
        let cache = inner.caches.entry(id.to_string()).or_insert_with(|| {
            debug!("Creating cache {id} for {pattern}");
            Arc::new(SelectorFileCache::new(id, pattern, source.clone()))
        });
        Ok(cache.clone())
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SelectorFileCache>> {
        self.inner.lock().await.caches.get(id).cloned()
    }

    /// Identities of the live caches, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().await.caches.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn live(&self) -> Vec<Arc<SelectorFileCache>> {
        self.inner.lock().await.caches.values().cloned().collect()
    }

    /// Dispose and evict the cache for `id`.
    pub async fn remove(&self, id: &str) -> bool {
        match self.inner.lock().await.caches.remove(id) {
            Some(cache) => {
                cache.dispose();
                true
            }
            None => false,
        }
    }

    /// Dispose and evict every cache `keep` rejects. Returns the evicted ids.
    pub async fn retain(&self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let evicted: Vec<String> = inner
            .caches
            .keys()
            .filter(|id| !keep(id))
            .cloned()
            .collect();
        for id in &evicted {
            if let Some(cache) = inner.caches.remove(id) {
                cache.dispose();
            }
        }
        evicted
    }

    /// Dispose and evict every cache.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        for (_, cache) in inner.caches.drain() {
            cache.dispose();
        }
    }

    /// Clear, and refuse to create caches from now on.
    pub async fn close(&self) {
        self.clear().await;
        self.inner.lock().await.closed = true;
    }
}
