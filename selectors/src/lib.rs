//! # Tidy Selectors
//!
//! Scoped selector state for Tidy Explorer.
//!
//! A **selector** is a glob declared at one configuration scope (Global,
//! Workspace, or a single workspace folder). Selectors are grouped into named
//! **pockets** and each carries a tri-state setting:
//!
//! - **hidden**: folded into the host's `files.exclude` filter
//! - **inactive**: no effect
//! - **display**: shown in the curated file view
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │  ConfigurationService    │      │  StateStores             │
//! │  (pockets, files.exclude)│      │  (global, workspace)     │
//! └────────────┬─────────────┘      └────────────┬─────────────┘
//!              │ hidden                          │ display
//!              ▼                                 ▼
//!        ┌──────────────────────────────────────────────┐
//!        │               SelectorState                  │
//!        │  ScopeRegistry + SelectorRegistry            │
//!        └──────────────────────┬───────────────────────┘
//!                               │ effective setting
//!                               ▼
//!                   Global ─▶ Workspace ─▶ Folder
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tidy_selectors::{SelectorState, SelectorSetting, StateTarget};
//!
//! let mut state = SelectorState::new(scopes, config, stores, SectionKeys::default());
//! state.reload().await?;
//! state
//!     .set_target_state(SelectorSetting::Hidden, &StateTarget::Selector(key))
//!     .await?;
//! state.sync_files_exclude().await?;
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod pocket;
pub mod registry;
pub mod scope;
pub mod selector;
pub mod state;

pub use config::{SectionKeys, SelectorConfiguration, enabled_excludes};
pub use error::{Result, SelectorError};
pub use host::{
    ConfigurationService, JsonFileStore, MemoryConfiguration, MemoryStateStore, StateStore,
    StateStores,
};
pub use pocket::Pocket;
pub use registry::SelectorRegistry;
pub use scope::{ConfigScope, ScopeRegistry, WorkspaceFolder};
pub use selector::{Selector, SelectorKey, SelectorSetting, id_string, split_id_string};
pub use state::{SelectorState, StateTarget};
