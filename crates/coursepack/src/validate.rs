//! Upload descriptor validation.
//!
//! Runs before a single byte of an upload is handed to the extractor.

use crate::classify::file_extension;
use crate::error::ValidationError;
use crate::types::PackageType;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default upload size limit in megabytes.
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// Environment variable overriding [`DEFAULT_MAX_SIZE_MB`].
pub const MAX_SIZE_ENV: &str = "MAX_FILE_SIZE_MB";

pub const BYTES_PER_MB: u64 = 1024 * 1024;

const ALLOWED_MIME_TYPES: [&str; 3] = [
    "application/zip",
    "application/x-zip-compressed",
    "application/octet-stream",
];

/// Description of an inbound file, before its bytes are trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInput {
    pub size: u64,
    pub filename: String,
    #[serde(default)]
    pub declared_mime_type: Option<String>,
}

/// Upload acceptance policy.
///
/// Always has a positive size limit and non-empty allow-lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    max_size_bytes: u64,
    allowed_extensions: Vec<String>,
    allowed_mime_types: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::with_extensions(DEFAULT_MAX_SIZE_MB * BYTES_PER_MB, &[".h5p", ".zip"])
    }
}

impl ValidationConfig {
    /// Build a policy, returning `None` if the size limit is zero or either
    /// allow-list is empty.
    pub fn new(
        max_size_bytes: u64,
        allowed_extensions: Vec<String>,
        allowed_mime_types: Vec<String>,
    ) -> Option<Self> {
        if max_size_bytes == 0 || allowed_extensions.is_empty() || allowed_mime_types.is_empty() {
            return None;
        }
        Some(Self {
            max_size_bytes,
            allowed_extensions,
            allowed_mime_types,
        })
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Lowercased extensions including the dot.
    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn allowed_mime_types(&self) -> &[String] {
        &self.allowed_mime_types
    }

    // A zero limit is raised to one byte.
    fn with_extensions(max_size_bytes: u64, extensions: &[&str]) -> Self {
        Self {
            max_size_bytes: max_size_bytes.max(1),
            allowed_extensions: extensions.iter().map(|e| e.to_string()).collect(),
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Policy accepting only the extension of one package type.
    pub fn for_package_type(package_type: PackageType, max_size_bytes: u64) -> Self {
        match package_type {
            PackageType::H5p => Self::with_extensions(max_size_bytes, &[".h5p"]),
            PackageType::Scorm => Self::with_extensions(max_size_bytes, &[".zip"]),
        }
    }

    /// Default policy with the size limit taken from `MAX_FILE_SIZE_MB`.
    pub fn from_env() -> Self {
        let max_size_bytes = max_size_bytes_from(std::env::var(MAX_SIZE_ENV).ok().as_deref());
        Self {
            max_size_bytes,
            ..Self::default()
        }
    }
}

/// Parses a megabyte override; missing, invalid or zero values fall back to
/// the default.
pub fn max_size_bytes_from(value: Option<&str>) -> u64 {
    let mb = match value.map(|v| v.trim().parse::<u64>()) {
        Some(Ok(mb)) if mb > 0 => mb,
        Some(_) => {
            warn!(env = MAX_SIZE_ENV, "Ignoring invalid upload size override");
            DEFAULT_MAX_SIZE_MB
        }
        None => DEFAULT_MAX_SIZE_MB,
    };
    mb.saturating_mul(BYTES_PER_MB)
}

/// Validates size, extension and declared MIME type, in that order.
///
/// An absent or empty MIME type is tolerated since browsers often omit it.
pub fn validate_file(file: &FileInput, config: &ValidationConfig) -> Result<(), ValidationError> {
    if file.filename.trim().is_empty() {
        return Err(ValidationError::MissingFile);
    }

    if file.size > config.max_size_bytes {
        return Err(ValidationError::SizeExceeded {
            size_mb: format!("{:.2}", file.size as f64 / BYTES_PER_MB as f64),
            max_mb: format!("{:.0}", config.max_size_bytes as f64 / BYTES_PER_MB as f64),
        });
    }

    let extension = file_extension(&file.filename);
    if !config.allowed_extensions.iter().any(|allowed| *allowed == extension) {
        return Err(ValidationError::InvalidExtension {
            extension,
            allowed: config.allowed_extensions.join(", "),
        });
    }

    if let Some(mime) = file.declared_mime_type.as_deref().filter(|m| !m.is_empty()) {
        if !config.allowed_mime_types.iter().any(|allowed| allowed == mime) {
            return Err(ValidationError::InvalidMime {
                mime: mime.to_string(),
                allowed: config.allowed_mime_types.join(", "),
            });
        }
    }

    Ok(())
}
