//! # Tidy File Index
//!
//! The files matched by every "display" selector, assembled into one tree.
//!
//! ## Features
//!
//! - **Shared Caches**: one scan and one watch per selector glob, however many consumers
//! - **Exclude Aware**: scans and created files are checked against the host's exclude filter
//! - **Multi-Source Nodes**: each tree node records every glob that contributes it
//! - **Minimal Refresh**: mutations report the shallowest node whose children changed
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        File Index                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  FileSource ──► SelectorFileCache ──► WatchEvent                │
//! │  (scan/watch)        │                     │                    │
//! │       │              ▼                     ▼                    │
//! │  ExcludeFilter   CacheRegistry        FileIndex (UriNode)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod exclude;
pub mod memory;
pub mod native;
pub mod node;
pub mod pattern;
pub mod source;

pub use cache::{CacheRegistry, SelectorFileCache};
pub use error::{IndexError, Result};
pub use exclude::{ExcludeFilter, ExcludeRules};
pub use memory::MemoryFileSource;
pub use native::NativeFileSource;
pub use node::{FileIndex, NodeId, UriNode};
pub use pattern::{CompiledPattern, GlobPattern};
pub use source::{FileSource, FileWatch, WatchEvent};
