//! Named groups of selectors.

use crate::scope::ConfigScope;
use crate::selector::SelectorKey;

/// A named, ordered group of selectors declared at one scope.
///
/// Pockets refer to their selectors by glob; the selectors themselves live in
/// the scope's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pocket {
    scope: ConfigScope,
    name: String,
    globs: Vec<String>,
    default_exclude: bool,
}

impl Pocket {
    pub(crate) fn new(scope: ConfigScope, name: impl Into<String>, globs: Vec<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            globs,
            default_exclude: false,
        }
    }

    pub(crate) fn default_exclude(
        scope: ConfigScope,
        name: impl Into<String>,
        globs: Vec<String>,
    ) -> Self {
        Self {
            default_exclude: true,
            ..Self::new(scope, name, globs)
        }
    }

    pub fn scope(&self) -> &ConfigScope {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Globs of this pocket's selectors, in declaration order.
    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    /// Keys of this pocket's selectors.
    pub fn selector_keys(&self) -> impl Iterator<Item = SelectorKey> + '_ {
        self.globs
            .iter()
            .map(|glob| SelectorKey::new(self.scope.clone(), glob.clone()))
    }

    /// Holds the exclude entries no declared selector accounts for.
    pub fn is_default_exclude(&self) -> bool {
        self.default_exclude
    }
}
