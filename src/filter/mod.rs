//! Duplicate/validity filter: the pure decision function a watcher runs on
//! every candidate path before enqueueing it.
//!
//! Checks run in a fixed order: readiness wait, missing/empty, size ceiling,
//! type-specific structural validation, fingerprint, duplicate lookup. The
//! filter never mutates the queue.

pub mod fingerprint;
pub mod readiness;
pub mod validate;

pub use fingerprint::fingerprint_file;
pub use readiness::wait_until_stable;
pub use validate::{classify, validate_structure};

use anyhow::Result;
use log::warn;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::store::Store;
use crate::types::FileKind;
use crate::utils::config::FilterConsts;

/// Outcome of [`accept`].
#[derive(Clone, Debug)]
pub enum Verdict {
    Accepted(Accepted),
    Rejected(Reject),
}

/// A file the filter cleared for enqueueing.
#[derive(Clone, Debug)]
pub struct Accepted {
    pub fingerprint: [u8; 32],
    pub size: u64,
    pub kind: FileKind,
}

/// Why a file was not accepted. Rejections are dropped silently (logged at
/// debug/info by the caller), never enqueued, and never counted as retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reject {
    Missing,
    Empty,
    Oversized { size: u64, limit: u64 },
    Malformed(String),
    Duplicate,
}

impl fmt::Display for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reject::Missing => write!(f, "file missing"),
            Reject::Empty => write!(f, "zero-length file"),
            Reject::Oversized { size, limit } => {
                write!(f, "file size {size} exceeds limit {limit}")
            }
            Reject::Malformed(reason) => write!(f, "structural validation failed: {reason}"),
            Reject::Duplicate => write!(f, "duplicate of a non-terminal queue item"),
        }
    }
}

/// Decide whether `path` is new, valid, and not already queued or in flight.
///
/// Pure over current state: queries the store for duplicates but writes
/// nothing. Errors here are I/O errors, not rejections; the caller logs them
/// and moves on.
pub fn accept(path: &Path, store: &Store, max_file_size: u64) -> Result<Verdict> {
    let ready = wait_until_stable(
        path,
        Duration::from_millis(FilterConsts::READY_POLL_MS),
        Duration::from_millis(FilterConsts::READY_TIMEOUT_MS),
    );
    if !ready {
        // Still being written after the timeout; proceed anyway.
        warn!(
            "{} not stable after {}ms, processing anyway",
            path.display(),
            FilterConsts::READY_TIMEOUT_MS
        );
    }

    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Ok(Verdict::Rejected(Reject::Missing)),
    };
    let size = meta.len();
    if size == 0 {
        return Ok(Verdict::Rejected(Reject::Empty));
    }
    if size > max_file_size {
        return Ok(Verdict::Rejected(Reject::Oversized {
            size,
            limit: max_file_size,
        }));
    }

    let kind = classify(path);
    if let Err(reason) = validate_structure(path, kind) {
        return Ok(Verdict::Rejected(Reject::Malformed(reason)));
    }

    let fingerprint = fingerprint_file(path, size)?;
    if store.find_active_by_fingerprint(&fingerprint)?.is_some() {
        return Ok(Verdict::Rejected(Reject::Duplicate));
    }

    Ok(Verdict::Accepted(Accepted {
        fingerprint,
        size,
        kind,
    }))
}
