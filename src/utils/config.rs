//! Runtime settings and tuning constants.
//! Layering: built-in defaults → `dockhand.toml` → `DOCKHAND_*` environment
//! (a `.env` file is honored) → CLI flags applied by the caller.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Tunables for the whole pipeline. One instance is built at startup and
/// passed by reference; components copy out what they need.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Store path. Default: `dockhand.db` in the working directory.
    pub db_path: PathBuf,
    /// Driver tick interval in seconds (reconcile → upload batch → heartbeat).
    pub tick_interval_secs: u64,
    /// Upload batch size, which is also the per-tick concurrency bound.
    pub max_concurrent_uploads: usize,
    /// Attempt ceiling before an item goes terminally Failed.
    pub max_retries: u32,
    /// In-slot backoff after a failed attempt, seconds.
    pub retry_delay_secs: u64,
    /// Files larger than this are rejected at the filter.
    pub max_file_size_bytes: u64,
    /// Remote container name passed to the upload capability.
    pub container: String,
    /// Root directory of the directory-backed uploader.
    pub upload_root: PathBuf,
    /// Move delivered files here when archive_on_success is set.
    pub archive_dir: Option<PathBuf>,
    /// Delete the source file after a successful upload.
    pub delete_on_success: bool,
    /// Archive the source file after a successful upload (delete wins if both set).
    pub archive_on_success: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("dockhand.db"),
            tick_interval_secs: 5,
            max_concurrent_uploads: 4,
            max_retries: 3,
            retry_delay_secs: 10,
            max_file_size_bytes: 100 * 1024 * 1024,
            container: "ingest".to_string(),
            upload_root: PathBuf::from("uploads"),
            archive_dir: None,
            delete_on_success: false,
            archive_on_success: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    db_path: Option<String>,
    tick_interval_secs: Option<u64>,
    max_concurrent_uploads: Option<usize>,
    max_retries: Option<u32>,
    retry_delay_secs: Option<u64>,
    max_file_size_bytes: Option<u64>,
    container: Option<String>,
    upload_root: Option<String>,
    archive_dir: Option<String>,
    delete_on_success: Option<bool>,
    archive_on_success: Option<bool>,
}

/// Overwrite a settings field from the file section when present.
macro_rules! apply_file_opt {
    ($sec:expr, $settings:expr, $field:ident) => {
        if let Some(v) = $sec.$field {
            $settings.$field = v;
        }
    };
}

/// Overwrite a settings field from `DOCKHAND_<NAME>` when set and parseable.
macro_rules! apply_env_opt {
    ($settings:expr, $field:ident, $var:literal, $ty:ty) => {
        if let Ok(raw) = std::env::var($var)
            && let Ok(v) = raw.parse::<$ty>()
        {
            $settings.$field = v;
        }
    };
}

impl Settings {
    /// Build settings for `dir`: defaults, then `dockhand.toml` in `dir` if
    /// present, then environment overrides.
    pub fn load(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        if let Some(file) = load_settings_toml(dir) {
            apply_file(&file, &mut settings);
        }
        dotenvy::dotenv().ok();
        apply_env(&mut settings);
        settings
    }
}

/// Load `dockhand.toml` from `dir` if present. Returns None if missing or unreadable.
fn load_settings_toml(dir: &Path) -> Option<SettingsToml> {
    let path = dir.join("dockhand.toml");
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

fn apply_file(file: &SettingsToml, settings: &mut Settings) {
    let sec = &file.settings;
    if let Some(ref p) = sec.db_path {
        settings.db_path = PathBuf::from(p);
    }
    apply_file_opt!(sec, settings, tick_interval_secs);
    apply_file_opt!(sec, settings, max_concurrent_uploads);
    apply_file_opt!(sec, settings, max_retries);
    apply_file_opt!(sec, settings, retry_delay_secs);
    apply_file_opt!(sec, settings, max_file_size_bytes);
    if let Some(ref c) = sec.container {
        settings.container = c.clone();
    }
    if let Some(ref p) = sec.upload_root {
        settings.upload_root = PathBuf::from(p);
    }
    if let Some(ref p) = sec.archive_dir {
        settings.archive_dir = Some(PathBuf::from(p));
    }
    apply_file_opt!(sec, settings, delete_on_success);
    apply_file_opt!(sec, settings, archive_on_success);
}

fn apply_env(settings: &mut Settings) {
    if let Ok(p) = std::env::var("DOCKHAND_DB") {
        settings.db_path = PathBuf::from(p);
    }
    apply_env_opt!(settings, tick_interval_secs, "DOCKHAND_TICK_INTERVAL_SECS", u64);
    apply_env_opt!(
        settings,
        max_concurrent_uploads,
        "DOCKHAND_MAX_CONCURRENT_UPLOADS",
        usize
    );
    apply_env_opt!(settings, max_retries, "DOCKHAND_MAX_RETRIES", u32);
    apply_env_opt!(settings, retry_delay_secs, "DOCKHAND_RETRY_DELAY_SECS", u64);
    apply_env_opt!(settings, max_file_size_bytes, "DOCKHAND_MAX_FILE_SIZE", u64);
    if let Ok(c) = std::env::var("DOCKHAND_CONTAINER") {
        settings.container = c;
    }
    if let Ok(p) = std::env::var("DOCKHAND_UPLOAD_ROOT") {
        settings.upload_root = PathBuf::from(p);
    }
    if let Ok(p) = std::env::var("DOCKHAND_ARCHIVE_DIR") {
        settings.archive_dir = Some(PathBuf::from(p));
    }
    apply_env_opt!(settings, delete_on_success, "DOCKHAND_DELETE_ON_SUCCESS", bool);
    apply_env_opt!(settings, archive_on_success, "DOCKHAND_ARCHIVE_ON_SUCCESS", bool);
}

// ---- Filter ----

/// Readiness polling: how long to wait for a file that is still being written.
pub struct FilterConsts;

impl FilterConsts {
    /// Interval between readiness polls.
    pub const READY_POLL_MS: u64 = 250;
    /// Give up waiting after this long; log a warning and proceed anyway.
    pub const READY_TIMEOUT_MS: u64 = 10_000;
    /// Bytes read from the head of a file for image-header recognition.
    pub const IMAGE_HEADER_BYTES: usize = 64;
}

// ---- Hashing ----

/// Fingerprint I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// Files above this size are memory-mapped instead of read in chunks.
    pub const HASH_MMAP_THRESHOLD: u64 = 8 * 1024 * 1024;
    /// Chunk size for buffered reads below the mmap threshold.
    pub const HASH_READ_CHUNK_SIZE: usize = 64 * 1024;
}

// ---- Watching ----

/// Debounce window and sweep pacing.
pub struct WatchConsts;

impl WatchConsts {
    /// Repeat notifications for the same path inside this window are dropped.
    pub const DEBOUNCE_WINDOW_SECS: u64 = 3;
    /// Debounce entries older than this are purged to bound memory.
    pub const DEBOUNCE_MAX_AGE_SECS: u64 = 300;
    /// Minimum interval between purge passes.
    pub const DEBOUNCE_PURGE_INTERVAL_SECS: u64 = 60;
    /// Inter-file pacing delay during the initial full-directory sweep.
    pub const SWEEP_PACING_MS: u64 = 50;
}
