//! Host services consumed by the selector engine.
//!
//! The engine never parses settings files or owns durable storage itself. It
//! talks to a scoped [`ConfigurationService`] and per-scope [`StateStore`]s,
//! and ships in-memory and JSON-file implementations of both.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, SelectorError};
use crate::scope::ConfigScope;

/// Scoped configuration access.
#[async_trait]
pub trait ConfigurationService: Send + Sync {
    /// The value of `section` defined exactly at `scope`, not merged with parents.
    async fn inspect(&self, scope: &ConfigScope, section: &str) -> Result<Option<Value>>;

    /// Replace the value of `section` at `scope`; `None` removes it.
    async fn update(&self, scope: &ConfigScope, section: &str, value: Option<Value>)
    -> Result<()>;
}

/// A small persistent key-value store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// All stored keys.
    async fn keys(&self) -> Result<Vec<String>>;

    /// The value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`; `None` deletes the key.
    async fn update(&self, key: &str, value: Option<Value>) -> Result<()>;
}

/// The stores backing each scope.
///
/// Global scope persists to the global store; the workspace and all of its
/// folders share the workspace store.
#[derive(Clone)]
pub struct StateStores {
    pub global: Arc<dyn StateStore>,
    pub workspace: Arc<dyn StateStore>,
}

impl StateStores {
    pub fn new(global: Arc<dyn StateStore>, workspace: Arc<dyn StateStore>) -> Self {
        Self { global, workspace }
    }

    /// Two fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryStateStore::new()),
        )
    }

    /// The store persisting state of `scope`.
    pub fn for_scope(&self, scope: &ConfigScope) -> &Arc<dyn StateStore> {
        match scope {
            ConfigScope::Global => &self.global,
            ConfigScope::Workspace | ConfigScope::Folder(_) => &self.workspace,
        }
    }

    /// Both stores, each listed once.
    pub fn all(&self) -> [&Arc<dyn StateStore>; 2] {
        [&self.global, &self.workspace]
    }
}

/// In-memory configuration, keyed by scope and section.
#[derive(Debug, Default)]
pub struct MemoryConfiguration {
    values: RwLock<HashMap<(ConfigScope, String), Value>>,
    writes: AtomicUsize,
    read_only: AtomicBool,
}

impl MemoryConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value directly, as an external edit would. Not counted as a write.
    pub async fn set(&self, scope: ConfigScope, section: &str, value: Value) {
        self.values
            .write()
            .await
            .insert((scope, section.to_string()), value);
    }

    /// Remove a value directly.
    pub async fn remove(&self, scope: &ConfigScope, section: &str) {
        self.values
            .write()
            .await
            .remove(&(scope.clone(), section.to_string()));
    }

    /// Number of successful [`ConfigurationService::update`] calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent update fail with a transient error.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigurationService for MemoryConfiguration {
    async fn inspect(&self, scope: &ConfigScope, section: &str) -> Result<Option<Value>> {
        Ok(self
            .values
            .read()
            .await
            .get(&(scope.clone(), section.to_string()))
            .cloned())
    }

    async fn update(
        &self,
        scope: &ConfigScope,
        section: &str,
        value: Option<Value>,
    ) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(SelectorError::TransientIoFailure(format!(
                "configuration is read-only: {section} at {scope}"
            )));
        }

        let key = (scope.clone(), section.to_string());
        let mut values = self.values.write().await;
        match value {
            Some(value) => {
                values.insert(key, value);
            }
            None => {
                values.remove(&key);
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!("Updated {section} at {scope}");
        Ok(())
    }
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<()> {
        let mut entries = self.entries.write().await;
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

/// Key-value store persisted as a JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            entries: RwLock::new(BTreeMap::new()),
        };
        store.load().await?;
        Ok(store)
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<()> {
        if fs::try_exists(&self.path).await? {
            let content = fs::read_to_string(&self.path).await?;
            let loaded: BTreeMap<String, Value> = serde_json::from_str(&content)?;
            let mut entries = self.entries.write().await;
            *entries = loaded;
            info!(
                "Loaded {} state entries from {}",
                entries.len(),
                self.path.display()
            );
        }
        Ok(())
    }

    async fn save(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&self.path, content).await.map_err(|e| {
            SelectorError::TransientIoFailure(format!("{}: {e}", self.path.display()))
        })?;
        debug!("Saved {} state entries", entries.len());
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        let changed = match value {
            Some(value) => next.insert(key.to_string(), value.clone()) != Some(value),
            None => next.remove(key).is_some(),
        };
        if changed {
            // Memory only follows once the file holds the new entries.
            self.save(&next).await?;
            *entries = next;
        }
        Ok(())
    }
}
