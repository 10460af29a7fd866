//! Keeps the display file index in step with selector state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tidy_file_index::{
    CacheRegistry, FileIndex, FileSource, GlobPattern, IndexError, NodeId, WatchEvent,
};
use tidy_selectors::{
    ConfigScope, ConfigurationService, Pocket, ScopeRegistry, Selector, SelectorKey,
    SelectorSetting, SelectorState, StateStores, StateTarget, WorkspaceFolder,
};

use crate::change::{ChangeNotifier, IndexChange};
use crate::config::{ConfigurationChange, ExplorerConfig};
use crate::error::{ExplorerError, Result};

/// Owns selector state, the file caches and the display index.
///
/// Passes that change selector state (reloads, state changes, workspace
/// changes) are serialized on the state lock and run in arrival order. All
/// index mutations, from passes or from watch events, take the index write
/// lock and never await while holding it.
pub struct Explorer {
    config: ExplorerConfig,
    state: Mutex<SelectorState>,
    source: Arc<dyn FileSource>,
    caches: CacheRegistry,
    index: Arc<RwLock<FileIndex>>,
    subscriptions: Mutex<HashMap<String, JoinHandle<()>>>,
    notifier: ChangeNotifier,
    disposed: AtomicBool,
}

impl Explorer {
    /// Create an explorer and the receiving end of its change channel.
    ///
    /// `source` must already be set up for `folders`. Nothing is loaded until
    /// [`reload`](Self::reload).
    pub fn new(
        config: ExplorerConfig,
        folders: Vec<WorkspaceFolder>,
        configuration: Arc<dyn ConfigurationService>,
        stores: StateStores,
        source: Arc<dyn FileSource>,
    ) -> (Self, mpsc::UnboundedReceiver<IndexChange>) {
        let index = FileIndex::new();
        let (notifier, changes) = ChangeNotifier::channel(index.root());
        let state = SelectorState::new(
            ScopeRegistry::new(folders),
            configuration,
            stores,
            config.sections.clone(),
        );

        let explorer = Self {
            config,
            state: Mutex::new(state),
            source,
            caches: CacheRegistry::new(),
            index: Arc::new(RwLock::new(index)),
            subscriptions: Mutex::new(HashMap::new()),
            notifier,
            disposed: AtomicBool::new(false),
        };
        (explorer, changes)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ExplorerError::Disposed);
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Rebuild selector state from configuration and storage, then the index.
    pub async fn reload(&self) -> Result<()> {
        self.full_reload(false).await
    }

    async fn full_reload(&self, excludes_changed: bool) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.state.lock().await;
        state.reload().await?;
        self.reconcile(&state).await?;
        if excludes_changed && self.config.rescan_on_exclude_change {
            self.rescan_caches().await;
        }
        Ok(())
    }

    /// Refresh after a change confined to the exclude filter.
    async fn reload_excludes(&self) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.state.lock().await;
        state.reload_excludes().await?;
        self.reconcile(&state).await?;
        if self.config.rescan_on_exclude_change {
            self.rescan_caches().await;
        }
        Ok(())
    }

    /// Route a host configuration change to the pass it requires.
    pub async fn on_configuration_changed(&self, change: &ConfigurationChange) -> Result<()> {
        let sections = &self.config.sections;
        let excludes_changed = change.affects(&sections.files_exclude);
        if change.affects(&sections.pockets) {
            info!("Pocket configuration changed, reloading");
            self.full_reload(excludes_changed).await
        } else if excludes_changed {
            info!("Exclude filter changed, refreshing hidden state");
            self.reload_excludes().await
        } else {
            debug!("Ignoring unrelated configuration change");
            Ok(())
        }
    }

    /// Apply `setting` to a pocket or selector and write hidden state back.
    ///
    /// Returns the selectors whose setting was applied.
    pub async fn set_selector_state(
        &self,
        setting: SelectorSetting,
        target: &StateTarget,
    ) -> Result<Vec<SelectorKey>> {
        self.ensure_live()?;
        let mut state = self.state.lock().await;
        let changed = state.set_target_state(setting, target).await?;
        let written = state.sync_files_exclude().await?;
        self.reconcile(&state).await?;
        if written && self.config.rescan_on_exclude_change {
            self.rescan_caches().await;
        }
        info!("Set {} selectors to {setting}", changed.len());
        Ok(changed)
    }

    /// Replace the workspace folders and rebuild everything.
    pub async fn set_workspace_folders(&self, folders: Vec<WorkspaceFolder>) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.state.lock().await;
        self.teardown().await;
        self.caches.clear().await;

        self.source.set_workspace_folders(folders.clone()).await;
        info!("Workspace now has {} folders", folders.len());
        state.set_scopes(ScopeRegistry::new(folders));
        state.reload().await?;
        self.reconcile(&state).await
    }

    /// Stop every watch, drop every cache and empty the index.
    ///
    /// Scans still pending are abandoned. Later passes fail with
    /// [`ExplorerError::Disposed`].
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.caches.close().await;
        self.teardown().await;
        info!("Explorer disposed");
    }

    async fn teardown(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        for (_, pump) in subscriptions.drain() {
            pump.abort();
        }
        self.index.write().await.clear();
        self.notifier.notify(IndexChange::FullRefresh);
    }

    /// Subscribe every selector that should be displayed and drop the rest.
    async fn reconcile(&self, state: &SelectorState) -> Result<()> {
        let desired = state.display_selectors();
        let scopes = Arc::new(state.scopes().clone());
        let mut subscriptions = self.subscriptions.lock().await;

        let stale: Vec<String> = subscriptions
            .keys()
            .filter(|id| !desired.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(pump) = subscriptions.remove(&id) {
                pump.abort();
            }
            let affected = self.index.write().await.del_children_from_glob(&id);
            self.notifier.affected(affected);
            debug!("Unsubscribed {id}");
        }

        let evicted = self.caches.retain(|id| desired.contains_key(id)).await;
        if !evicted.is_empty() {
            debug!("Disposed {} caches no selector displays", evicted.len());
        }

        for (id, key) in &desired {
            if subscriptions.contains_key(id) {
                continue;
            }
            self.ensure_live()?;

            let Some(pattern) = GlobPattern::for_selector(&scopes, key) else {
                debug!("Selector {id} belongs to no workspace folder");
                continue;
            };
            let cache = match self.caches.get_or_create(id, pattern, &self.source).await {
                Ok(cache) => cache,
                Err(IndexError::Disposed(_)) => return Err(ExplorerError::Disposed),
                Err(e) => return Err(e.into()),
            };
            match cache.ready().await {
                Ok(()) => {}
                Err(IndexError::Disposed(_)) => {
                    debug!("Cache {id} disposed before its scan finished");
                    continue;
                }
                Err(e) => {
                    warn!("Failed to scan files for {id}: {e}");
                    self.caches.remove(id).await;
                    continue;
                }
            }

            let (files, events) = cache.subscribe().await;
            let affected: BTreeSet<NodeId> = {
                let mut index = self.index.write().await;
                files
                    .iter()
                    .filter_map(|file| {
                        let relative = scopes.relative_path(file)?;
                        index.add_file(file, id, &relative)
                    })
                    .collect()
            };
            self.notifier.affected_all(affected);

            let pump = tokio::spawn(apply_events(
                events,
                id.clone(),
                self.index.clone(),
                scopes.clone(),
                self.notifier.clone(),
            ));
            subscriptions.insert(id.clone(), pump);
            info!("Subscribed {id} with {} files", files.len());
        }

        Ok(())
    }

    async fn rescan_caches(&self) {
        for cache in self.caches.live().await {
            if let Err(e) = cache.rescan().await {
                warn!("Failed to rescan {}: {e}", cache.id());
            }
        }
    }

    /// Effective setting of the selector for (scope, glob), if declared.
    pub async fn effective_setting(
        &self,
        scope: &ConfigScope,
        glob: &str,
    ) -> Option<SelectorSetting> {
        self.state.lock().await.effective_setting(scope, glob)
    }

    pub async fn is_default_hidden(&self, key: &SelectorKey) -> bool {
        self.state
            .lock()
            .await
            .registry()
            .get_by_key(key)
            .is_some_and(Selector::is_default_hidden)
    }

    pub async fn is_default_exclude(&self, scope: &ConfigScope, name: &str) -> bool {
        self.state
            .lock()
            .await
            .registry()
            .pocket(scope, name)
            .is_some_and(Pocket::is_default_exclude)
    }

    /// Selector state, for the pocket view. Holding the guard blocks passes.
    pub async fn state(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().await
    }

    /// The display index, for the file view. Holding the guard blocks mutations.
    pub async fn index(&self) -> RwLockReadGuard<'_, FileIndex> {
        self.index.read().await
    }

    /// Glob identities currently feeding the index, sorted.
    pub async fn subscribed(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.subscriptions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }
}

/// Apply one subscription's cache events to the index.
async fn apply_events(
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    id: String,
    index: Arc<RwLock<FileIndex>>,
    scopes: Arc<ScopeRegistry>,
    notifier: ChangeNotifier,
) {
    while let Some(event) = events.recv().await {
        let Some(relative) = scopes.relative_path(event.path()) else {
            continue;
        };
        let affected = {
            let mut index = index.write().await;
            match &event {
                WatchEvent::Created(path) => index.add_file(path, &id, &relative),
                WatchEvent::Deleted(_) => index.del_file(&relative),
            }
        };
        notifier.affected(affected);
    }
    debug!("Event stream for {id} closed");
}
