//! Remote blob naming convention:
//! `{source}/{YYYYMMDD}/{source}_{YYYYMMDD_HHMMSS}_{originalFileName}`.
//! A presentation detail of the upload call; deployments may vary it.

use chrono::{DateTime, Utc};

pub fn remote_name_for(source: &str, file_name: &str, when: DateTime<Utc>) -> String {
    let day = when.format("%Y%m%d");
    let stamp = when.format("%Y%m%d_%H%M%S");
    format!("{source}/{day}/{source}_{stamp}_{file_name}")
}
