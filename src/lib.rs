//! Dockhand: watched-folder upload daemon.
//!
//! Folder watchers accept dropped files (dedup by content hash, type-specific
//! validation), a SQLite-backed queue holds delivery state, and a periodic
//! driver reconciles watchers against configuration and drains upload batches
//! with bounded retries.

pub mod cli;
pub mod filter;
pub mod orchestrate;
pub mod store;
pub mod types;
pub mod upload;
pub mod utils;
pub mod watch;

/// Re-export types for API
pub use types::*;

/// Result alias used by the public dockhand API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
