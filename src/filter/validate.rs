//! File-type classification and type-specific structural validation.

use std::io::Read;
use std::path::Path;

use crate::types::FileKind;
use crate::utils::config::FilterConsts;

/// Classify by extension. Unrecognized extensions are `Other` and skip
/// structural validation.
pub fn classify(path: &Path) -> FileKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("json") => FileKind::Json,
        Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff") => FileKind::Image,
        _ => FileKind::Other,
    }
}

/// Type-specific structural check. `Ok(())` means the file may be enqueued;
/// `Err(reason)` is a validation rejection, not an I/O failure.
pub fn validate_structure(path: &Path, kind: FileKind) -> Result<(), String> {
    match kind {
        FileKind::Json => validate_json(path),
        FileKind::Image => validate_image(path),
        FileKind::Other => Ok(()),
    }
}

/// A JSON file must parse as well-formed JSON.
fn validate_json(path: &Path) -> Result<(), String> {
    let bytes = std::fs::read(path).map_err(|e| format!("read failed: {e}"))?;
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .map(|_| ())
        .map_err(|e| format!("not well-formed JSON: {e}"))
}

/// An image file must start with a recognizable image header.
fn validate_image(path: &Path) -> Result<(), String> {
    let mut head = vec![0u8; FilterConsts::IMAGE_HEADER_BYTES];
    let n = std::fs::File::open(path)
        .and_then(|mut f| f.read(&mut head))
        .map_err(|e| format!("read failed: {e}"))?;
    image::guess_format(&head[..n])
        .map(|_| ())
        .map_err(|_| "no recognizable image header".to_string())
}
