//! Package type classification.
//!
//! Two independent strategies that are never reconciled here: the filename
//! extension decides how an upload is routed, the archive contents decide
//! whether it actually is what it claims to be.

use crate::safety::normalize_archive_path;
use crate::types::{Classification, PackageType};
use std::io::Cursor;
use tracing::debug;
use zip::ZipArchive;

const SCORM_MANIFEST: &str = "imsmanifest.xml";
const H5P_CONFIG: &str = "h5p.json";

/// Lowercased extension including the leading dot, or `""`.
///
/// # Examples
///
/// ```
/// use coursepack::classify::file_extension;
///
/// assert_eq!(file_extension("Course.ZIP"), ".zip");
/// assert_eq!(file_extension("archive.tar.gz"), ".gz");
/// assert_eq!(file_extension("README"), "");
/// assert_eq!(file_extension("v1.2/LICENSE"), "");
/// ```
pub fn file_extension(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    name.rfind('.')
        .map(|at| name[at..].to_lowercase())
        .unwrap_or_default()
}

/// Routes an upload by explicit choice, then by extension.
///
/// An override other than `"h5p"` or `"scorm"` (for example `"auto"`) is
/// ignored.
pub fn classify_by_extension(filename: &str, override_type: Option<&str>) -> Option<PackageType> {
    if let Some(explicit) = override_type.and_then(|value| value.parse().ok()) {
        return Some(explicit);
    }

    match file_extension(filename).as_str() {
        ".h5p" => Some(PackageType::H5p),
        ".zip" => Some(PackageType::Scorm),
        _ => None,
    }
}

/// Checks archive entry names for the marker file of each format.
///
/// `expected == None` means "auto": H5P is checked before SCORM. Failure is
/// reported in the returned value, never as an error.
pub fn classify_by_contents(buffer: &[u8], expected: Option<PackageType>) -> Classification {
    let archive = match ZipArchive::new(Cursor::new(buffer)) {
        Ok(archive) => archive,
        Err(e) => return Classification::invalid(format!("Invalid archive: {}.", e)),
    };

    let names: Vec<String> = archive
        .file_names()
        .map(|name| normalize_archive_path(name).to_lowercase())
        .collect();
    let has_scorm_manifest = names.iter().any(|name| has_marker(name, SCORM_MANIFEST));
    let has_h5p_config = names.iter().any(|name| has_marker(name, H5P_CONFIG));

    debug!(
        entries = names.len(),
        has_scorm_manifest, has_h5p_config, "Classified archive contents"
    );

    match expected {
        Some(PackageType::Scorm) if !has_scorm_manifest => {
            Classification::invalid("Invalid SCORM package: missing imsmanifest.xml file.")
        }
        Some(PackageType::H5p) if !has_h5p_config => {
            Classification::invalid("Invalid H5P package: missing h5p.json file.")
        }
        Some(package_type) => Classification::valid(package_type),
        None if has_h5p_config => Classification::valid(PackageType::H5p),
        None if has_scorm_manifest => Classification::valid(PackageType::Scorm),
        None => Classification::invalid(
            "Invalid package: missing required files. SCORM packages need imsmanifest.xml, H5P packages need h5p.json.",
        ),
    }
}

fn has_marker(name: &str, marker: &str) -> bool {
    name == marker
        || name
            .strip_suffix(marker)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify_by_extension("x.h5p", None), Some(PackageType::H5p));
        assert_eq!(classify_by_extension("x.zip", None), Some(PackageType::Scorm));
        assert_eq!(classify_by_extension("X.H5P", None), Some(PackageType::H5p));
        assert_eq!(classify_by_extension("x.exe", None), None);
        assert_eq!(classify_by_extension("noextension", None), None);
    }

    #[test]
    fn test_classify_by_extension_override_wins() {
        assert_eq!(classify_by_extension("x.zip", Some("h5p")), Some(PackageType::H5p));
        assert_eq!(classify_by_extension("x.h5p", Some("scorm")), Some(PackageType::Scorm));
        assert_eq!(classify_by_extension("x.exe", Some("scorm")), Some(PackageType::Scorm));
        assert_eq!(classify_by_extension("x.h5p", Some("auto")), Some(PackageType::H5p));
        assert_eq!(classify_by_extension("x.exe", Some("bogus")), None);
    }

    #[test]
    fn test_has_marker() {
        assert!(has_marker("h5p.json", "h5p.json"));
        assert!(has_marker("pkg/h5p.json", "h5p.json"));
        assert!(!has_marker("noth5p.json", "h5p.json"));
        assert!(!has_marker("h5p.json.bak", "h5p.json"));
    }

    #[test]
    fn test_classify_by_contents_garbage() {
        let result = classify_by_contents(b"nope", None);
        assert!(!result.valid);
        assert!(result.package_type.is_none());
        assert!(result.reason.unwrap().starts_with("Invalid archive"));
    }
}
