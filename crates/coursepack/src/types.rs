//! Type definitions shared by the extractor, resolvers and service layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::{NonZeroU64, NonZeroUsize};
use std::str::FromStr;

/// Default maximum number of entries in an archive.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default maximum cumulative decompressed size (500 MiB).
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 500 * 1024 * 1024;

/// A single decompressed file from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized forward-slash path relative to the archive root
    pub path: String,

    /// Decompressed contents
    pub bytes: Vec<u8>,

    /// Decompressed size in bytes
    pub size: u64,
}

/// Resource limits applied while extracting an untrusted archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    max_entries: NonZeroUsize,
    max_total_bytes: NonZeroU64,
}

impl ExtractionLimits {
    /// Build limits, returning `None` if either limit is zero.
    pub fn new(max_entries: usize, max_total_bytes: u64) -> Option<Self> {
        Some(Self {
            max_entries: NonZeroUsize::new(max_entries)?,
            max_total_bytes: NonZeroU64::new(max_total_bytes)?,
        })
    }

    /// Maximum number of entries (directories included) an archive may declare.
    pub fn max_entries(&self) -> usize {
        self.max_entries.get()
    }

    /// Maximum cumulative decompressed size in bytes.
    pub fn max_total_bytes(&self) -> u64 {
        self.max_total_bytes.get()
    }
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_entries: NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
            max_total_bytes: NonZeroU64::new(DEFAULT_MAX_TOTAL_BYTES).unwrap_or(NonZeroU64::MIN),
        }
    }
}

/// The two supported package formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// H5P interactive content
    H5p,
    /// SCORM 1.2 / 2004 content
    Scorm,
}

impl PackageType {
    /// Lowercase name used in routes and form fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::H5p => "h5p",
            PackageType::Scorm => "scorm",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h5p" => Ok(PackageType::H5p),
            "scorm" => Ok(PackageType::Scorm),
            other => Err(format!("Invalid package type: {}", other)),
        }
    }
}

/// Ordered map of archive path to file contents.
///
/// Iteration follows insertion order (the ZIP enumeration order). Inserting a
/// path twice replaces its bytes but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap {
    entries: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: String, bytes: Vec<u8>) {
        match self.index.get(&path) {
            Some(&slot) => self.entries[slot].1 = bytes,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, bytes));
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&slot| self.entries[slot].1.as_slice())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First path in insertion order.
    pub fn first_path(&self) -> Option<&str> {
        self.entries.first().map(|(path, _)| path.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, bytes)| (path.as_str(), bytes.as_slice()))
    }
}

impl FromIterator<ArchiveEntry> for AssetMap {
    fn from_iter<I: IntoIterator<Item = ArchiveEntry>>(iter: I) -> Self {
        let mut assets = AssetMap::new();
        for entry in iter {
            assets.insert(entry.path, entry.bytes);
        }
        assets
    }
}

/// Metadata derived from `h5p.json` and `content/content.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H5pMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_library: Option<String>,
    pub main_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A resolved H5P package.
#[derive(Debug, Clone)]
pub struct ParsedH5p {
    pub metadata: H5pMetadata,
    pub assets: AssetMap,
}

/// SCORM edition declared by the manifest metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScormVersion {
    #[serde(rename = "1.2")]
    Scorm12,
    #[serde(rename = "2004")]
    Scorm2004,
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for ScormVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScormVersion::Scorm12 => "1.2",
            ScormVersion::Scorm2004 => "2004",
            ScormVersion::Unknown => "unknown",
        })
    }
}

/// A resolved SCORM package.
#[derive(Debug, Clone)]
pub struct ParsedScorm {
    pub version: ScormVersion,
    /// Launch file path relative to the archive root
    pub launch_file: String,
    pub title: String,
    pub organization: Option<String>,
    pub assets: AssetMap,
}

/// Outcome of content-based classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub valid: bool,
    pub package_type: Option<PackageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Classification {
    pub(crate) fn valid(package_type: PackageType) -> Self {
        Self {
            valid: true,
            package_type: Some(package_type),
            reason: None,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            package_type: None,
            reason: Some(reason.into()),
        }
    }
}
