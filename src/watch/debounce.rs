//! Per-path debounce window: drops duplicate notifications fired in quick
//! succession by the OS, with periodic age-based purging to bound memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct DebounceWindow {
    seen: HashMap<PathBuf, Instant>,
    window: Duration,
    max_age: Duration,
    purge_interval: Duration,
    last_purge: Instant,
}

impl DebounceWindow {
    pub fn new(window: Duration, max_age: Duration, purge_interval: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            window,
            max_age,
            purge_interval,
            last_purge: Instant::now(),
        }
    }

    /// True when `path` has not been seen within the window. Records the
    /// sighting either way, so a burst of notifications collapses to one.
    pub fn should_process(&mut self, path: &Path) -> bool {
        self.maybe_purge();
        let now = Instant::now();
        let fresh = match self.seen.get(path) {
            Some(last) => now.duration_since(*last) >= self.window,
            None => true,
        };
        self.seen.insert(path.to_path_buf(), now);
        fresh
    }

    /// Number of tracked paths (purge visibility for tests).
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn maybe_purge(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_purge) < self.purge_interval {
            return;
        }
        let max_age = self.max_age;
        self.seen.retain(|_, last| now.duration_since(*last) < max_age);
        self.last_purge = now;
    }
}
