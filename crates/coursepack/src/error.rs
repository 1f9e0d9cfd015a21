//! Error types for package ingestion operations.

use thiserror::Error;

/// Errors raised by the safe archive extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The buffer is not a readable ZIP container.
    #[error("Invalid ZIP file: {0}")]
    InvalidArchive(String),

    /// An entry path would escape the sandbox directory.
    #[error("Zip-slip attack detected: entry path \"{0}\" resolves outside target directory")]
    ZipSlipDetected(String),

    /// The archive declares more entries than allowed.
    #[error("ZIP contains too many entries ({count}). Maximum allowed: {limit}")]
    TooManyEntries {
        /// Number of entries in the central directory
        count: usize,
        /// Configured entry limit
        limit: usize,
    },

    /// Cumulative decompressed size went over the configured budget.
    #[error("Total extracted size ({current} bytes) exceeds maximum allowed size ({limit} bytes)")]
    SizeExceeded {
        /// Bytes decompressed so far
        current: u64,
        /// Configured size limit in bytes
        limit: u64,
    },

    /// An entry could not be decompressed.
    #[error("Failed to extract entry \"{path}\": {reason}")]
    ExtractionFailed {
        /// Entry path as stored in the archive
        path: String,
        /// Underlying decompression error
        reason: String,
    },
}

impl ExtractError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::InvalidArchive(_) => "INVALID_ZIP",
            ExtractError::ZipSlipDetected(_) => "ZIP_SLIP_DETECTED",
            ExtractError::TooManyEntries { .. } => "TOO_MANY_ENTRIES",
            ExtractError::SizeExceeded { .. } => "SIZE_EXCEEDED",
            ExtractError::ExtractionFailed { .. } => "EXTRACTION_FAILED",
        }
    }
}

/// Errors raised while resolving a SCORM package.
#[derive(Debug, Error)]
pub enum ScormError {
    /// The archive could not be extracted.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// No `imsmanifest.xml` anywhere in the archive.
    #[error("SCORM package missing imsmanifest.xml")]
    ManifestMissing,

    /// The manifest is not well-formed or lacks `<organizations>`.
    #[error("Invalid SCORM manifest: {0}")]
    InvalidManifest(String),

    /// The selected organization has no launchable item.
    #[error("Manifest missing launch item")]
    ManifestMissingLaunchItem,

    /// The launch item references no resource, or the resource has no href.
    #[error("Manifest resource missing href (identifierref \"{0}\")")]
    ResourceMissingHref(String),

    /// The manifest points at a launch file the archive does not contain.
    #[error("Launch file \"{0}\" not found in package")]
    LaunchFileMissing(String),
}

impl ScormError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            ScormError::Extract(e) => e.kind(),
            ScormError::ManifestMissing => "MANIFEST_MISSING",
            ScormError::InvalidManifest(_) => "INVALID_MANIFEST",
            ScormError::ManifestMissingLaunchItem => "MANIFEST_MISSING_LAUNCH_ITEM",
            ScormError::ResourceMissingHref(_) => "RESOURCE_MISSING_HREF",
            ScormError::LaunchFileMissing(_) => "LAUNCH_FILE_MISSING",
        }
    }
}

/// Errors raised when an inbound upload descriptor fails policy checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Upload is larger than the configured maximum.
    #[error("File size ({size_mb}MB) exceeds maximum allowed size ({max_mb}MB)")]
    SizeExceeded {
        /// Upload size in megabytes, two decimals
        size_mb: String,
        /// Limit in whole megabytes
        max_mb: String,
    },

    /// Declared MIME type is not allow-listed.
    #[error("MIME type \"{mime}\" is not allowed. Allowed types: {allowed}")]
    InvalidMime {
        /// Declared MIME type
        mime: String,
        /// Comma separated allow-list
        allowed: String,
    },

    /// Filename extension is not allow-listed.
    #[error("File extension \"{extension}\" is not allowed. Allowed extensions: {allowed}")]
    InvalidExtension {
        /// Lowercased extension including the dot (may be empty)
        extension: String,
        /// Comma separated allow-list
        allowed: String,
    },

    /// No usable file was supplied.
    #[error("File is missing or invalid")]
    MissingFile,
}

impl ValidationError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::SizeExceeded { .. } => "SIZE_EXCEEDED",
            ValidationError::InvalidMime { .. } => "INVALID_MIME",
            ValidationError::InvalidExtension { .. } => "INVALID_EXTENSION",
            ValidationError::MissingFile => "MISSING_FILE",
        }
    }
}

/// Errors surfaced by [`crate::service::PackageService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Filename extension maps to no package type and no override was given.
    #[error("Unsupported file extension. Upload .h5p or .zip archives.")]
    UnsupportedExtension,

    /// The upload descriptor failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Archive contents do not match the claimed package type.
    #[error("{0}")]
    ContentMismatch(String),

    /// No stored package with that id and type.
    #[error("Package not found: {0}")]
    NotFound(String),

    /// The package exists but the requested asset does not.
    #[error("Asset \"{0}\" not found")]
    AssetNotFound(String),

    /// Extraction of a stored package failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A stored SCORM package could not be resolved.
    #[error(transparent)]
    Scorm(#[from] ScormError),
}
