//! In-memory ZIP extraction with security features.

use crate::error::ExtractError;
use crate::safety::{check_entry_count, check_size_limits, resolve_within_sandbox, validate_entry_path};
use crate::types::{ArchiveEntry, ExtractionLimits};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Extract every file of a ZIP buffer into memory.
///
/// This function performs secure extraction with the following features:
/// - Entry count checked against the central directory before any read
/// - Path validation to prevent zip-slip attacks, applied before decompression
/// - Incremental size limit enforcement while decompressing
/// - Directory entries skipped
///
/// `sandbox_root` is only used for path arithmetic; nothing touches the disk.
/// Entries come back in the archive's enumeration order with normalized
/// forward-slash paths. Any failure aborts the whole extraction.
pub fn extract_archive(
    buffer: &[u8],
    sandbox_root: &Path,
    limits: &ExtractionLimits,
) -> Result<Vec<ArchiveEntry>, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(buffer))
        .map_err(|e| ExtractError::InvalidArchive(e.to_string()))?;

    if let Err(e) = check_entry_count(archive.len(), limits.max_entries()) {
        warn!(entries = archive.len(), limit = limits.max_entries(), "Rejecting archive");
        return Err(e);
    }

    let max_total = limits.max_total_bytes();
    let mut entries = Vec::new();
    let mut total_bytes: u64 = 0;

    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .map_err(|e| ExtractError::ExtractionFailed {
                path: format!("#{}", index),
                reason: e.to_string(),
            })?;

        if file.is_dir() {
            continue;
        }

        let raw_path = file.name().to_string();
        let path = validate_entry_path(&raw_path)
            .and_then(|normalized| {
                resolve_within_sandbox(sandbox_root, &normalized)?;
                Ok(normalized)
            })
            .inspect_err(|_| warn!(path = %raw_path, "Zip-slip attempt rejected"))?;

        // Never decompress more than the remaining budget plus one byte.
        let budget = (max_total - total_bytes).saturating_add(1);
        let mut bytes = Vec::new();
        file.take(budget)
            .read_to_end(&mut bytes)
            .map_err(|e| ExtractError::ExtractionFailed {
                path: raw_path.clone(),
                reason: e.to_string(),
            })?;

        let size = bytes.len() as u64;
        total_bytes += size;
        if let Err(e) = check_size_limits(total_bytes, max_total) {
            warn!(path = %raw_path, total_bytes, limit = max_total, "Extraction size limit exceeded");
            return Err(e);
        }

        entries.push(ArchiveEntry { path, bytes, size });
    }

    debug!(files = entries.len(), total_bytes, "Archive extracted");
    Ok(entries)
}
