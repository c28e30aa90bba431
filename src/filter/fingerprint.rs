//! Content fingerprinting: SHA-256 over file bytes.

use anyhow::Result;
use memmap2::Mmap;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::Path;

use crate::utils::config::HashingConsts;

/// Fingerprint a file with SHA-256. Uses memory-mapped I/O for files above
/// threshold, chunked reading otherwise. Computed once at enqueue time and
/// never recomputed.
pub fn fingerprint_file(path: &Path, size: u64) -> Result<[u8; 32]> {
    let file = File::open(path)?;
    let mut hasher = Sha256::new();

    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&file)? };
        hasher.update(&mmap);
    } else {
        use std::io::Read;
        let mut reader =
            std::io::BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(hasher.finalize().into())
}
