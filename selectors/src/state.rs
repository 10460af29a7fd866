//! Selector state resolution against host configuration and storage.
//!
//! A selector's local setting comes from two places:
//!
//! - `hidden`: the selector's glob is present in the exclude filter at its scope.
//! - `display`: the selector's identity string is present in the persisted store
//!   for its scope (unless the selector is hidden, which always wins).
//! - `inactive`: neither.
//!
//! [`SelectorState::sync_files_exclude`] projects hidden selectors back onto the
//! exclude filter, so the filter stays a pure function of selector state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{SectionKeys, enabled_excludes, parse_pockets};
use crate::error::{Result, SelectorError};
use crate::host::{ConfigurationService, StateStores};
use crate::pocket::Pocket;
use crate::registry::SelectorRegistry;
use crate::scope::{ConfigScope, ScopeRegistry};
use crate::selector::{Selector, SelectorKey, SelectorSetting, split_id_string};

/// What a state change applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateTarget {
    /// Every selector of a pocket.
    Pocket { scope: ConfigScope, name: String },

    /// A single selector.
    Selector(SelectorKey),
}

/// Registries plus the host services they are loaded from and saved to.
pub struct SelectorState {
    scopes: ScopeRegistry,
    registry: SelectorRegistry,
    config: Arc<dyn ConfigurationService>,
    stores: StateStores,
    sections: SectionKeys,
}

impl SelectorState {
    pub fn new(
        scopes: ScopeRegistry,
        config: Arc<dyn ConfigurationService>,
        stores: StateStores,
        sections: SectionKeys,
    ) -> Self {
        Self {
            scopes,
            registry: SelectorRegistry::new(),
            config,
            stores,
            sections,
        }
    }

    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    pub fn set_scopes(&mut self, scopes: ScopeRegistry) {
        self.scopes = scopes;
    }

    pub fn registry(&self) -> &SelectorRegistry {
        &self.registry
    }

    pub fn sections(&self) -> &SectionKeys {
        &self.sections
    }

    pub fn configuration(&self) -> &Arc<dyn ConfigurationService> {
        &self.config
    }

    /// Effective setting of the selector for (scope, glob), if registered.
    pub fn effective_setting(&self, scope: &ConfigScope, glob: &str) -> Option<SelectorSetting> {
        self.registry.effective_setting(scope, glob)
    }

    /// Wipe the registries and rebuild them from configuration and storage.
    pub async fn reload(&mut self) -> Result<()> {
        self.load_pockets().await?;
        self.load_state_hidden_from_files_exclude().await?;
        self.load_state_display_from_storage().await?;
        info!("Reloaded {} selectors", self.registry.len());
        Ok(())
    }

    /// Refresh state after a change that only touched the exclude filter.
    ///
    /// Declared selectors survive; only those synthesized from undeclared
    /// exclude entries are rebuilt.
    pub async fn reload_excludes(&mut self) -> Result<()> {
        self.registry.clear_default_hidden();
        self.load_state_hidden_from_files_exclude().await?;
        self.load_state_display_from_storage().await?;
        Ok(())
    }

    /// Clear the registries and declare the pockets configured at every scope.
    pub async fn load_pockets(&mut self) -> Result<()> {
        self.registry.clear();

        for scope in self.scopes.scopes() {
            let value = self.config.inspect(&scope, &self.sections.pockets).await?;
            let mut claimed: HashSet<String> = HashSet::new();

            for pocket_config in parse_pockets(value.as_ref()) {
                if pocket_config.name == self.sections.default_exclude_pocket {
                    warn!(
                        "Pocket name '{}' is reserved, skipping it at {scope}",
                        pocket_config.name
                    );
                    continue;
                }
                if self.registry.pocket(&scope, &pocket_config.name).is_some() {
                    warn!("Duplicate pocket '{}' at {scope}", pocket_config.name);
                }

                let mut globs = Vec::with_capacity(pocket_config.selectors.len());
                for entry in &pocket_config.selectors {
                    let resolved = entry.resolve(&scope);
                    if !claimed.insert(resolved.glob.clone()) {
                        warn!(
                            "Selector '{}' already declared at {scope}, skipping it in pocket '{}'",
                            resolved.glob, pocket_config.name
                        );
                        continue;
                    }
                    let selector = self.registry.get_or_create(&scope, &resolved.glob);
                    if resolved.inert {
                        debug!("Selector {} is inert", selector.id());
                        selector.mark_inert();
                    }
                    globs.push(resolved.glob);
                }

                self.registry
                    .insert_pocket(Pocket::new(scope.clone(), pocket_config.name, globs));
            }
        }

        Ok(())
    }

    /// Derive `hidden` state from the exclude filter at each scope.
    ///
    /// Exclude entries with no declared selector are gathered into the scope's
    /// default-exclude pocket as default-hidden selectors.
    pub async fn load_state_hidden_from_files_exclude(&mut self) -> Result<()> {
        for scope in self.scopes.scopes() {
            let value = self
                .config
                .inspect(&scope, &self.sections.files_exclude)
                .await?;
            let mut excluded: IndexSet<String> =
                enabled_excludes(value.as_ref()).into_iter().collect();

            let known: Vec<(String, SelectorSetting)> = self
                .registry
                .selectors_in(&scope)
                .map(|s| (s.glob().to_string(), s.setting()))
                .collect();

            for (glob, setting) in known {
                let key = SelectorKey::new(scope.clone(), glob);
                if excluded.shift_remove(&key.glob) {
                    if setting != SelectorSetting::Hidden {
                        self.set_setting(&key, SelectorSetting::Hidden).await?;
                    }
                } else if setting == SelectorSetting::Hidden {
                    self.set_setting(&key, SelectorSetting::Inactive).await?;
                }
            }

            if excluded.is_empty() {
                continue;
            }

            let mut globs = Vec::with_capacity(excluded.len());
            for glob in excluded {
                let selector = self.registry.get_or_create(&scope, &glob);
                match selector.set_default_hidden() {
                    Ok(()) => globs.push(glob),
                    Err(e) => warn!("Skipping undeclared exclude entry: {e}"),
                }
            }
            debug!("{} undeclared exclude entries at {scope}", globs.len());
            self.registry.insert_pocket(Pocket::default_exclude(
                scope.clone(),
                self.sections.default_exclude_pocket.clone(),
                globs,
            ));
        }

        Ok(())
    }

    /// Derive `display` state from the persisted stores and collect orphaned entries.
    pub async fn load_state_display_from_storage(&mut self) -> Result<()> {
        for scope in self.scopes.scopes() {
            let store = self.stores.for_scope(&scope).clone();
            let prefix = format!("[{}]...", scope.key());
            let mut stored: HashSet<String> = store
                .keys()
                .await?
                .into_iter()
                .filter(|k| k.starts_with(&prefix))
                .collect();

            let known: Vec<(String, String)> = self
                .registry
                .selectors_in(&scope)
                .map(|s| (s.glob().to_string(), s.id().to_string()))
                .collect();

            for (glob, id) in known {
                if !stored.remove(&id) {
                    continue;
                }
                let Some(selector) = self.registry.get_mut(&scope, &glob) else {
                    continue;
                };
                if selector.setting() == SelectorSetting::Hidden {
                    debug!("Dropping stale display state of hidden selector {id}");
                    store.update(&id, None).await?;
                } else {
                    selector.set_local(SelectorSetting::Display);
                }
            }

            for key in stored {
                debug!("Dropping display state of undeclared selector {key}");
                store.update(&key, None).await?;
            }
        }

        // Entries of folders that have left the workspace.
        for store in self.stores.all() {
            for key in store.keys().await? {
                let Some((scope_key, _)) = split_id_string(&key) else {
                    continue;
                };
                if let Err(e) = self.scopes.resolve_key(scope_key) {
                    debug!("Dropping display state {key}: {e}");
                    store.update(&key, None).await?;
                }
            }
        }

        Ok(())
    }

    /// Write every scope's hidden selectors to its exclude filter.
    ///
    /// Only scopes whose filter differs from the hidden set are written.
    /// Returns whether any write happened.
    pub async fn sync_files_exclude(&self) -> Result<bool> {
        let mut written = false;

        for scope in self.scopes.scopes() {
            let hidden: Vec<&str> = self
                .registry
                .selectors_in(&scope)
                .filter(|s| s.setting() == SelectorSetting::Hidden)
                .map(Selector::glob)
                .collect();

            let value = self
                .config
                .inspect(&scope, &self.sections.files_exclude)
                .await?;
            let current: HashSet<String> = enabled_excludes(value.as_ref()).into_iter().collect();

            if current.len() == hidden.len() && hidden.iter().all(|g| current.contains(*g)) {
                continue;
            }

            let projected: Map<String, Value> = hidden
                .iter()
                .map(|g| (g.to_string(), Value::Bool(true)))
                .collect();
            self.config
                .update(
                    &scope,
                    &self.sections.files_exclude,
                    Some(Value::Object(projected)),
                )
                .await?;
            info!("Wrote {} exclude entries at {scope}", hidden.len());
            written = true;
        }

        Ok(written)
    }

    /// Set a selector's local setting, persisting only `display`.
    pub async fn set_setting(&mut self, key: &SelectorKey, setting: SelectorSetting) -> Result<()> {
        let selector = self
            .registry
            .get_mut(&key.scope, &key.glob)
            .ok_or_else(|| SelectorError::Config(format!("unknown selector {}", key.id_string())))?;
        selector.set_local(setting);
        let id = selector.id().to_string();

        let value = (setting == SelectorSetting::Display)
            .then(|| Value::String(setting.as_str().to_string()));
        self.stores.for_scope(&key.scope).update(&id, value).await
    }

    /// Apply `setting` to every selector the target covers.
    ///
    /// Default-hidden selectors cannot be changed and are skipped, as are
    /// targets whose scope has left the workspace. Returns the keys changed.
    pub async fn set_target_state(
        &mut self,
        setting: SelectorSetting,
        target: &StateTarget,
    ) -> Result<Vec<SelectorKey>> {
        let keys: Vec<SelectorKey> = match target {
            StateTarget::Pocket { scope, name } => match self.registry.pocket(scope, name) {
                Some(pocket) => pocket.selector_keys().collect(),
                None => {
                    debug!("No pocket '{name}' at {scope}");
                    Vec::new()
                }
            },
            StateTarget::Selector(key) => vec![key.clone()],
        };

        let mut changed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Err(e) = self.scopes.ensure_resolvable(&key.scope) {
                debug!("Ignoring state change for {}: {e}", key.id_string());
                continue;
            }
            match self.registry.get_by_key(&key) {
                Some(selector) if selector.is_default_hidden() => continue,
                Some(_) => {}
                None => {
                    debug!("Ignoring state change for unknown selector {}", key.id_string());
                    continue;
                }
            }
            self.set_setting(&key, setting).await?;
            changed.push(key);
        }

        Ok(changed)
    }

    /// Selectors that should currently feed the display index, by glob identity.
    pub fn display_selectors(&self) -> BTreeMap<String, SelectorKey> {
        self.registry
            .iter()
            .filter(|s| !s.is_inert())
            .filter(|s| self.registry.effective_setting_of(s) == SelectorSetting::Display)
            .map(|s| (s.id().to_string(), s.key().clone()))
            .collect()
    }
}
