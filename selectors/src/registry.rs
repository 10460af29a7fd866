//! Per-scope registries of selectors and pockets.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::pocket::Pocket;
use crate::scope::ConfigScope;
use crate::selector::{Selector, SelectorKey, SelectorSetting};

/// Owns every selector and pocket, keyed by scope.
#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    selectors: BTreeMap<ConfigScope, IndexMap<String, Selector>>,
    pockets: BTreeMap<ConfigScope, IndexMap<String, Pocket>>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selector for (scope, glob), created inactive if absent.
    pub fn get_or_create(&mut self, scope: &ConfigScope, glob: &str) -> &mut Selector {
        self.selectors
            .entry(scope.clone())
            .or_default()
            .entry(glob.to_string())
            .or_insert_with(|| Selector::new(scope.clone(), glob))
    }

    pub fn get(&self, scope: &ConfigScope, glob: &str) -> Option<&Selector> {
        self.selectors.get(scope)?.get(glob)
    }

    pub fn get_mut(&mut self, scope: &ConfigScope, glob: &str) -> Option<&mut Selector> {
        self.selectors.get_mut(scope)?.get_mut(glob)
    }

    pub fn get_by_key(&self, key: &SelectorKey) -> Option<&Selector> {
        self.get(&key.scope, &key.glob)
    }

    /// Selectors registered at `scope`, in registration order.
    pub fn selectors_in(&self, scope: &ConfigScope) -> impl Iterator<Item = &Selector> {
        self.selectors.get(scope).into_iter().flat_map(IndexMap::values)
    }

    /// Every registered selector.
    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.selectors.values().flat_map(IndexMap::values)
    }

    pub fn len(&self) -> usize {
        self.selectors.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every selector and pocket.
    pub fn clear(&mut self) {
        self.selectors.clear();
        self.pockets.clear();
        debug!("Cleared selector registry");
    }

    /// Drop the selectors and pockets synthesized from undeclared exclude entries.
    pub fn clear_default_hidden(&mut self) {
        for registry in self.selectors.values_mut() {
            registry.retain(|_, s| {
                !(s.is_default_hidden() && s.setting() == SelectorSetting::Hidden)
            });
        }
        for pockets in self.pockets.values_mut() {
            pockets.retain(|_, p| !p.is_default_exclude());
        }
    }

    pub(crate) fn insert_pocket(&mut self, pocket: Pocket) {
        self.pockets
            .entry(pocket.scope().clone())
            .or_default()
            .insert(pocket.name().to_string(), pocket);
    }

    /// Pockets declared at `scope`, in declaration order.
    pub fn pockets_in(&self, scope: &ConfigScope) -> impl Iterator<Item = &Pocket> {
        self.pockets.get(scope).into_iter().flat_map(IndexMap::values)
    }

    pub fn pocket(&self, scope: &ConfigScope, name: &str) -> Option<&Pocket> {
        self.pockets.get(scope)?.get(name)
    }

    /// Effective setting of the selector for (scope, glob), if registered.
    pub fn effective_setting(&self, scope: &ConfigScope, glob: &str) -> Option<SelectorSetting> {
        self.get(scope, glob).map(|s| self.effective_setting_of(s))
    }

    /// Resolve a selector's visibility across the scope chain.
    ///
    /// `Hidden` at a broader scope can never be undone by a narrower one.
    /// `Display` at a broader scope carries down only to selectors that are
    /// themselves inactive.
    pub fn effective_setting_of(&self, selector: &Selector) -> SelectorSetting {
        use SelectorSetting::{Display, Hidden, Inactive};

        let own = selector.setting();
        let glob = selector.glob();
        let global = self.get(&ConfigScope::Global, glob).map(Selector::setting);

        match selector.scope() {
            ConfigScope::Global => own,
            ConfigScope::Workspace => {
                if global == Some(Hidden) || own == Hidden {
                    Hidden
                } else if global == Some(Display) {
                    Display
                } else {
                    own
                }
            }
            ConfigScope::Folder(_) => {
                let parent = self
                    .get(&ConfigScope::Workspace, glob)
                    .map(|workspace| self.effective_setting_of(workspace))
                    .or(global);
                match parent {
                    Some(Hidden) => Hidden,
                    Some(Display) if own == Inactive => Display,
                    _ => own,
                }
            }
        }
    }
}
