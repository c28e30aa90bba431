//! Wait for a file to stop changing before reading it.
//!
//! Writers that drop files into a watched folder may still be streaming bytes
//! when the notification arrives. The file counts as stable once it opens for
//! reading and its size and mtime are unchanged between two consecutive polls.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

fn snapshot(path: &Path) -> Option<(u64, SystemTime)> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.len(), meta.modified().ok()?))
}

/// Poll every `poll` until `path` is stable or `timeout` elapses.
/// Returns true when stable, false on timeout (caller decides to proceed).
pub fn wait_until_stable(path: &Path, poll: Duration, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut last = snapshot(path);

    loop {
        std::thread::sleep(poll);
        let current = snapshot(path);
        match (&last, &current) {
            // Gone on two consecutive polls: nothing to wait for.
            (None, None) => return false,
            (Some(prev), Some(cur)) if prev == cur && File::open(path).is_ok() => return true,
            _ => {}
        }
        if Instant::now() >= deadline {
            return false;
        }
        last = current;
    }
}
