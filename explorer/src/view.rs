//! Read model for the pocket tree view.

use tidy_selectors::{ConfigScope, SelectorKey, SelectorSetting, SelectorState, StateTarget};

/// One row of the pocket tree: scopes hold pockets, pockets hold selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PocketViewNode {
    Scope(ConfigScope),
    Pocket { scope: ConfigScope, name: String },
    Selector { scope: ConfigScope, glob: String },
}

impl PocketViewNode {
    /// Every scope that declares at least one pocket.
    pub fn roots(state: &SelectorState) -> Vec<Self> {
        state
            .scopes()
            .scopes()
            .into_iter()
            .filter(|scope| state.registry().pockets_in(scope).next().is_some())
            .map(Self::Scope)
            .collect()
    }

    pub fn children(&self, state: &SelectorState) -> Vec<Self> {
        let registry = state.registry();
        match self {
            Self::Scope(scope) => registry
                .pockets_in(scope)
                .map(|pocket| Self::Pocket {
                    scope: scope.clone(),
                    name: pocket.name().to_string(),
                })
                .collect(),
            Self::Pocket { scope, name } => registry
                .pocket(scope, name)
                .map(|pocket| {
                    pocket
                        .globs()
                        .iter()
                        .map(|glob| Self::Selector {
                            scope: scope.clone(),
                            glob: glob.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            Self::Selector { .. } => Vec::new(),
        }
    }

    pub fn label(&self, state: &SelectorState) -> String {
        match self {
            Self::Scope(ConfigScope::Global) => "User".to_string(),
            Self::Scope(ConfigScope::Workspace) => "Workspace".to_string(),
            Self::Scope(ConfigScope::Folder(uri)) => state
                .scopes()
                .folder(uri)
                .map_or_else(|| uri.clone(), |folder| folder.name.clone()),
            Self::Pocket { name, .. } => name.clone(),
            Self::Selector { glob, .. } => glob.clone(),
        }
    }

    /// Whether the user may change this node's state.
    pub fn is_actionable(&self, state: &SelectorState) -> bool {
        let registry = state.registry();
        match self {
            Self::Scope(_) => false,
            Self::Pocket { scope, name } => registry
                .pocket(scope, name)
                .is_some_and(|pocket| !pocket.is_default_exclude()),
            Self::Selector { scope, glob } => registry
                .get(scope, glob)
                .is_some_and(|selector| !selector.is_default_hidden()),
        }
    }

    /// Local and effective setting of a selector row.
    pub fn settings(&self, state: &SelectorState) -> Option<(SelectorSetting, SelectorSetting)> {
        let Self::Selector { scope, glob } = self else {
            return None;
        };
        let registry = state.registry();
        let selector = registry.get(scope, glob)?;
        Some((selector.setting(), registry.effective_setting_of(selector)))
    }

    /// A selector whose effective setting comes from a broader scope.
    pub fn is_overridden(&self, state: &SelectorState) -> bool {
        self.settings(state)
            .is_some_and(|(local, effective)| local != effective)
    }

    /// What a state change on this row applies to.
    pub fn target(&self) -> Option<StateTarget> {
        match self {
            Self::Scope(_) => None,
            Self::Pocket { scope, name } => Some(StateTarget::Pocket {
                scope: scope.clone(),
                name: name.clone(),
            }),
            Self::Selector { scope, glob } => Some(StateTarget::Selector(SelectorKey::new(
                scope.clone(),
                glob.clone(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tidy_selectors::{
        MemoryConfiguration, ScopeRegistry, SectionKeys, StateStores, WorkspaceFolder,
    };

    fn app() -> ConfigScope {
        ConfigScope::Folder("file:///ws/app".into())
    }

    async fn state() -> SelectorState {
        let config = Arc::new(MemoryConfiguration::new());
        config
            .set(
                ConfigScope::Global,
                "tidyExplorer",
                json!({ "pockets": [{ "name": "Sources", "selectors": ["src/**"] }] }),
            )
            .await;
        config
            .set(
                app(),
                "tidyExplorer",
                json!({ "pockets": [{ "name": "App", "selectors": ["src/**", "assets/**"] }] }),
            )
            .await;
        config
            .set(ConfigScope::Workspace, "files.exclude", json!({ "out/**": true }))
            .await;

        let scopes = ScopeRegistry::new(vec![WorkspaceFolder::new("app", "/ws/app")]);
        let mut state = SelectorState::new(
            scopes,
            config,
            StateStores::in_memory(),
            SectionKeys::default(),
        );
        state.reload().await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_tree_shape_and_labels() {
        let state = state().await;

        let roots = PocketViewNode::roots(&state);
        let labels: Vec<String> = roots.iter().map(|n| n.label(&state)).collect();
        assert_eq!(labels, vec!["User", "Workspace", "app"]);

        let pockets = roots[2].children(&state);
        assert_eq!(
            pockets,
            vec![PocketViewNode::Pocket {
                scope: app(),
                name: "App".into()
            }]
        );
        let selectors: Vec<String> = pockets[0]
            .children(&state)
            .iter()
            .map(|n| n.label(&state))
            .collect();
        assert_eq!(selectors, vec!["src/**", "assets/**"]);
    }

    #[tokio::test]
    async fn test_default_excludes_are_not_actionable() {
        let state = state().await;

        let pocket = PocketViewNode::Pocket {
            scope: ConfigScope::Workspace,
            name: "Default Excludes".into(),
        };
        assert!(!pocket.is_actionable(&state));
        assert!(!pocket.children(&state)[0].is_actionable(&state));
        assert!(!PocketViewNode::Scope(ConfigScope::Global).is_actionable(&state));

        let declared = PocketViewNode::Pocket {
            scope: app(),
            name: "App".into(),
        };
        assert!(declared.is_actionable(&state));
    }

    #[tokio::test]
    async fn test_overridden_selector() {
        let mut state = state().await;
        state
            .set_setting(
                &SelectorKey::new(ConfigScope::Global, "src/**"),
                SelectorSetting::Display,
            )
            .await
            .unwrap();

        let inherited = PocketViewNode::Selector {
            scope: app(),
            glob: "src/**".into(),
        };
        assert_eq!(
            inherited.settings(&state),
            Some((SelectorSetting::Inactive, SelectorSetting::Display))
        );
        assert!(inherited.is_overridden(&state));

        let own = PocketViewNode::Selector {
            scope: app(),
            glob: "assets/**".into(),
        };
        assert!(!own.is_overridden(&state));
        assert_eq!(
            own.target(),
            Some(StateTarget::Selector(SelectorKey::new(app(), "assets/**")))
        );
    }
}
