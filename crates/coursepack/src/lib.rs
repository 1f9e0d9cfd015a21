//! # Coursepack
//!
//! Secure ingestion of H5P and SCORM e-learning packages.
//!
//! Both formats ship as ZIP archives. This library unpacks an untrusted
//! archive entirely in memory, with protection against path traversal
//! (zip-slip) and entry-count or size abuse, then interprets the contents
//! to find a renderable entry point and metadata.
//!
//! ## Pipeline
//!
//! - [`extract`] turns a ZIP buffer into ordered [`ArchiveEntry`] values
//! - [`parse_h5p`] reads `h5p.json` / `content/content.json`
//! - [`parse_scorm`] reads `imsmanifest.xml`, wherever it sits
//! - [`classify_by_extension`] and [`classify_by_contents`] decide the type
//! - [`resolve_asset_path`] maps a request onto the extracted assets
//!
//! ## Example
//!
//! ```rust,no_run
//! use coursepack::{classify_by_contents, parse_scorm, PackageType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let buffer = std::fs::read("course.zip")?;
//!
//! let verdict = classify_by_contents(&buffer, None);
//! if verdict.package_type == Some(PackageType::Scorm) {
//!     let package = parse_scorm(&buffer)?;
//!     println!("{} (SCORM {}) -> {}", package.title, package.version, package.launch_file);
//! }
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod classify;
pub mod error;
pub mod extract;
pub mod h5p;
pub mod safety;
pub mod scorm;
pub mod service;
pub mod storage;
pub mod types;
pub mod validate;

// Re-export main types
pub use error::{ExtractError, ScormError, ServiceError, ValidationError};
pub use service::{AssetResponse, PackageService, PackageSummary, ServiceConfig, UploadRequest};
pub use storage::{InMemoryStorage, PackageRecord, StorageOptions, StorageProvider};
pub use types::{
    ArchiveEntry, AssetMap, Classification, ExtractionLimits, H5pMetadata, PackageType,
    ParsedH5p, ParsedScorm, ScormVersion,
};
pub use validate::{FileInput, ValidationConfig};

use std::path::Path;

/// Extract a ZIP buffer into memory.
///
/// # Arguments
///
/// * `buffer` - Raw archive bytes
/// * `sandbox_root` - Directory entries must stay inside (path arithmetic only)
/// * `limits` - Entry count and total size limits
///
/// # Errors
///
/// Returns an error if:
/// - The buffer is not a ZIP archive
/// - An entry path escapes `sandbox_root`
/// - The entry count or cumulative size exceeds `limits`
/// - An entry fails to decompress
pub fn extract(
    buffer: &[u8],
    sandbox_root: &Path,
    limits: &ExtractionLimits,
) -> Result<Vec<ArchiveEntry>, ExtractError> {
    extract::extract_archive(buffer, sandbox_root, limits)
}

/// Resolve an H5P package with default limits.
///
/// Missing or malformed metadata degrades to defaults; only extraction
/// errors are returned.
pub fn parse_h5p(buffer: &[u8]) -> Result<ParsedH5p, ExtractError> {
    h5p::parse_h5p_archive(buffer, &std::env::temp_dir(), &ExtractionLimits::default())
}

/// Resolve a SCORM package with default limits.
///
/// # Errors
///
/// Returns an error if extraction fails, the manifest is missing or
/// malformed, or the manifest does not lead to a launch file in the archive.
pub fn parse_scorm(buffer: &[u8]) -> Result<ParsedScorm, ScormError> {
    scorm::parse_scorm_archive(buffer, &std::env::temp_dir(), &ExtractionLimits::default())
}

/// Route an upload by explicit choice or filename extension.
pub fn classify_by_extension(filename: &str, override_type: Option<&str>) -> Option<PackageType> {
    classify::classify_by_extension(filename, override_type)
}

/// Verify archive contents carry the marker file of a package type.
///
/// `expected == None` auto-detects, preferring H5P.
pub fn classify_by_contents(buffer: &[u8], expected: Option<PackageType>) -> Classification {
    classify::classify_by_contents(buffer, expected)
}

/// Resolve a requested asset path against a package's assets.
pub fn resolve_asset_path(
    assets: &AssetMap,
    main_file: &str,
    requested: Option<&str>,
) -> Option<String> {
    assets::resolve_asset_path(assets, main_file, requested)
}
