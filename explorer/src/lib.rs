//! # Tidy Explorer
//!
//! Curated file view driven by scoped selectors.
//!
//! Selectors set to **display** each feed one file cache; the explorer merges
//! every cache into a single [`FileIndex`](tidy_file_index::FileIndex) and
//! reports which subtree changed. Selectors set to **hidden** are written back
//! to the host's `files.exclude` filter.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  state changes  ┌──────────────────────────────┐
//! │ PocketViewNode │ ──────────────▶ │           Explorer           │
//! └────────────────┘                 │  SelectorState  (passes)     │
//!                                    │  CacheRegistry  (scans)      │
//!                                    │  FileIndex      (merged)     │
//!                                    └──────┬───────────────┬───────┘
//!                              files.exclude│               │ IndexChange
//!                                           ▼               ▼
//!                                  ConfigurationService   view layer
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tidy_explorer::{Explorer, ExplorerConfig, SelectorSetting, StateTarget};
//!
//! let (explorer, mut changes) =
//!     Explorer::new(ExplorerConfig::default(), folders, config, stores, source);
//! explorer.reload().await?;
//! explorer
//!     .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(key))
//!     .await?;
//!
//! while let Some(change) = changes.recv().await {
//!     redraw(change);
//! }
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod logging;
pub mod reconciler;
pub mod view;

pub use change::{ChangeNotifier, IndexChange};
pub use config::{ConfigurationChange, ExplorerConfig};
pub use error::{ExplorerError, Result};
pub use logging::init_logging;
pub use reconciler::Explorer;
pub use view::PocketViewNode;

// Re-export from dependencies for convenience
pub use tidy_file_index::{FileIndex, FileSource, MemoryFileSource, NativeFileSource, NodeId};
pub use tidy_selectors::{ConfigScope, SelectorKey, SelectorSetting, StateTarget, WorkspaceFolder};
