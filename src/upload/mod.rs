//! Delivery boundary: the blob upload capability consumed by the processor.
//!
//! The real blob client lives outside this crate; the [`BlobUploader`] trait
//! is the seam. The binary ships with a directory-backed implementation so
//! the pipeline is operable (and testable) stand-alone.

pub mod processor;
pub mod remote;

pub use processor::UploadProcessor;
pub use remote::remote_name_for;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Result of a successful upload call.
#[derive(Clone, Debug)]
pub struct UploadReceipt {
    pub url: String,
}

/// Opaque `upload(file) → success|failure` capability. Retry, backoff, and
/// auth internals of the remote store are not dockhand's concern.
pub trait BlobUploader: Send + Sync {
    /// Cheap liveness probe; when false the processor skips the tick's items
    /// without consuming a retry.
    fn is_reachable(&self) -> bool;

    fn upload(&self, local: &Path, container: &str, remote_name: &str) -> Result<UploadReceipt>;
}

/// Filesystem-backed uploader: copies into `{root}/{container}/{remote_name}`.
pub struct DirUploader {
    root: PathBuf,
}

impl DirUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobUploader for DirUploader {
    fn is_reachable(&self) -> bool {
        self.root.exists()
    }

    fn upload(&self, local: &Path, container: &str, remote_name: &str) -> Result<UploadReceipt> {
        let dest = self.root.join(container).join(remote_name);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::copy(local, &dest).with_context(|| {
            format!("copy {} to {}", local.display(), dest.display())
        })?;
        Ok(UploadReceipt {
            url: dest.display().to_string(),
        })
    }
}
