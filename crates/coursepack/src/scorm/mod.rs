//! SCORM package resolution.
//!
//! Unlike H5P, a SCORM package without a usable manifest cannot be previewed,
//! so every structural problem is a hard error.

pub mod manifest;
pub mod shim;

use crate::assets::collapse_segments;
use crate::error::ScormError;
use crate::extract::extract_archive;
use crate::types::{AssetMap, ExtractionLimits, ParsedScorm};
use manifest::Manifest;
use std::path::Path;
use tracing::info;

const MANIFEST_NAME: &str = "imsmanifest.xml";
const DEFAULT_TITLE: &str = "SCORM Package";

/// Extract and resolve a SCORM archive.
pub fn parse_scorm_archive(
    buffer: &[u8],
    sandbox_root: &Path,
    limits: &ExtractionLimits,
) -> Result<ParsedScorm, ScormError> {
    let assets: AssetMap = extract_archive(buffer, sandbox_root, limits)?
        .into_iter()
        .collect();

    let manifest_path = locate_manifest(&assets).ok_or(ScormError::ManifestMissing)?;
    let base_path = base_path(manifest_path);

    let xml = assets
        .get(manifest_path)
        .map(std::str::from_utf8)
        .ok_or(ScormError::ManifestMissing)?
        .map_err(|e| ScormError::InvalidManifest(format!("manifest is not UTF-8: {}", e)))?;
    let manifest = Manifest::parse(xml)?;

    if manifest.organizations.is_none() {
        return Err(ScormError::InvalidManifest(
            "missing <organizations> element".to_string(),
        ));
    }

    let organization = manifest.active_organization();
    let item = organization
        .and_then(|org| org.launch_item())
        .ok_or(ScormError::ManifestMissingLaunchItem)?;
    let identifierref = item
        .identifierref
        .as_deref()
        .ok_or(ScormError::ManifestMissingLaunchItem)?;

    let href = manifest
        .resource(identifierref)
        .and_then(|res| res.href.as_deref())
        .ok_or_else(|| ScormError::ResourceMissingHref(identifierref.to_string()))?;

    let launch_file = launch_path(base_path, href);
    if !assets.contains(strip_query(&launch_file)) {
        return Err(ScormError::LaunchFileMissing(launch_file));
    }

    let organization_title = organization.and_then(|org| org.title.clone());
    let title = item
        .title
        .clone()
        .or_else(|| organization_title.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let version = manifest.version();

    info!(
        %version,
        launch_file = %launch_file,
        manifest = manifest_path,
        assets = assets.len(),
        "Parsed SCORM package"
    );

    Ok(ParsedScorm {
        version,
        launch_file,
        title,
        organization: organization_title,
        assets,
    })
}

/// Finds `imsmanifest.xml` at the root or in any subdirectory.
///
/// The shallowest match wins; among equally deep matches, the first in
/// archive order.
pub fn locate_manifest(assets: &AssetMap) -> Option<&str> {
    assets
        .paths()
        .filter(|path| is_manifest_path(path))
        .min_by_key(|path| path.matches('/').count())
}

pub(crate) fn is_manifest_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower == MANIFEST_NAME || lower.ends_with(&format!("/{}", MANIFEST_NAME))
}

/// Directory holding the manifest, with a trailing slash, or `""` at the root.
fn base_path(manifest_path: &str) -> &str {
    match manifest_path.rfind('/') {
        Some(at) => &manifest_path[..=at],
        None => "",
    }
}

/// Joins a manifest href onto the manifest directory.
///
/// `.` segments and backslashes are folded and `..` stops at the archive
/// root; a `?query` or `#fragment` suffix is carried over untouched.
pub(crate) fn launch_path(base_path: &str, href: &str) -> String {
    let path = strip_query(href);
    let suffix = &href[path.len()..];
    format!("{}{}", collapse_segments(base_path, path), suffix)
}

/// Drops a `?query` or `#fragment` suffix from a manifest href.
pub(crate) fn strip_query(path: &str) -> &str {
    match path.find(['?', '#']) {
        Some(at) => &path[..at],
        None => path,
    }
}
