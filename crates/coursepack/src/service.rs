//! Upload, describe and serve operations over an injected storage handle.

use crate::assets::{content_type_for, is_html, resolve_asset_path};
use crate::classify::{classify_by_contents, classify_by_extension};
use crate::error::ServiceError;
use crate::h5p::parse_h5p_archive;
use crate::scorm::parse_scorm_archive;
use crate::scorm::shim::{build_scorm_api_script, inject_shim};
use crate::storage::{
    generate_id, PackageInput, PackageRecord, StorageProvider, StoredFile, DEFAULT_ID_SIZE,
};
use crate::types::{AssetMap, ExtractionLimits, H5pMetadata, PackageType, ScormVersion};
use crate::validate::{validate_file, FileInput, ValidationConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Content-Security-Policy sent with every previewed asset.
pub const PREVIEW_CSP: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; \
style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub limits: ExtractionLimits,
    /// Only used for zip-slip path arithmetic
    pub sandbox_root: PathBuf,
    /// Upload size limit, applied with the per-type extension policy
    pub max_upload_bytes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            limits: ExtractionLimits::default(),
            sandbox_root: std::env::temp_dir(),
            max_upload_bytes: ValidationConfig::default().max_size_bytes(),
        }
    }
}

impl ServiceConfig {
    /// Defaults with the upload limit read from `MAX_FILE_SIZE_MB`.
    pub fn from_env() -> Self {
        Self {
            max_upload_bytes: ValidationConfig::from_env().max_size_bytes(),
            ..Self::default()
        }
    }
}

/// An upload as received from a form or API call.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
    /// Explicit `"h5p"` / `"scorm"` choice; anything else means auto
    pub package_type: Option<String>,
}

/// Format-specific metadata of a stored package.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PackageMetadata {
    H5p(H5pMetadata),
    #[serde(rename_all = "camelCase")]
    Scorm {
        title: String,
        version: ScormVersion,
        #[serde(skip_serializing_if = "Option::is_none")]
        organization: Option<String>,
        launch_file: String,
    },
}

/// Serializable description of a stored package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub filename: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch
    pub uploaded_at: u64,
    pub metadata: Option<PackageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A resolved asset ready to be written to an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
    pub path: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub headers: Vec<(&'static str, String)>,
}

/// Upload, describe and serve packages held by a [`StorageProvider`].
pub struct PackageService {
    storage: Arc<dyn StorageProvider>,
    config: ServiceConfig,
}

impl PackageService {
    pub fn new(storage: Arc<dyn StorageProvider>, config: ServiceConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    /// Routes, validates, verifies and stores an upload.
    ///
    /// The extension (or explicit choice) decides the claimed type; the
    /// archive contents must then carry that type's marker file.
    pub fn upload(&self, request: UploadRequest) -> Result<PackageRecord, ServiceError> {
        let package_type =
            classify_by_extension(&request.filename, request.package_type.as_deref())
                .ok_or(ServiceError::UnsupportedExtension)?;

        let input = FileInput {
            size: request.bytes.len() as u64,
            filename: request.filename.clone(),
            declared_mime_type: request.mime_type.clone(),
        };
        let policy =
            ValidationConfig::for_package_type(package_type, self.config.max_upload_bytes);
        validate_file(&input, &policy)?;

        let classification = classify_by_contents(&request.bytes, Some(package_type));
        if !classification.valid {
            let reason = classification.reason.unwrap_or_default();
            warn!(filename = %request.filename, %package_type, %reason, "Rejected upload");
            return Err(ServiceError::ContentMismatch(reason));
        }

        let record = self.storage.store(PackageInput {
            id: generate_id(None, DEFAULT_ID_SIZE),
            package_type,
            file: StoredFile {
                filename: request.filename,
                mime_type: request
                    .mime_type
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                size: input.size,
                bytes: Arc::from(request.bytes),
            },
            uploaded_at: None,
        });

        info!(id = %record.id, %package_type, "Package uploaded");
        Ok(record)
    }

    /// Summarizes a stored package. Parse failures are reported in the
    /// summary's `error` field rather than as an `Err`.
    pub fn describe(&self, id: &str) -> Result<PackageSummary, ServiceError> {
        let record = self
            .storage
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        let metadata = self.parse_metadata(&record);
        let (metadata, error) = match metadata {
            Ok(metadata) => (Some(metadata), None),
            Err(e) => {
                warn!(id, error = %e, "Stored package failed to parse");
                (None, Some(e.to_string()))
            }
        };

        Ok(PackageSummary {
            id: record.id,
            package_type: record.package_type,
            filename: record.file.filename,
            size: record.file.size,
            uploaded_at: epoch_millis(record.uploaded_at),
            metadata,
            error,
        })
    }

    /// Resolves one asset of a stored package of the given type.
    ///
    /// With no `asset` the entry point is served. SCORM HTML gets the
    /// runtime shim injected.
    pub fn serve_asset(
        &self,
        package_type: PackageType,
        id: &str,
        asset: Option<&str>,
    ) -> Result<AssetResponse, ServiceError> {
        let record = self
            .storage
            .get(id)
            .filter(|record| record.package_type == package_type)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        render_asset(package_type, &record.id, &record.file.bytes, asset, &self.config)
    }

    fn parse_metadata(&self, record: &PackageRecord) -> Result<PackageMetadata, ServiceError> {
        package_metadata(record.package_type, &record.file.bytes, &self.config)
    }
}

/// Resolves the format-specific metadata of a package archive.
pub fn package_metadata(
    package_type: PackageType,
    bytes: &[u8],
    config: &ServiceConfig,
) -> Result<PackageMetadata, ServiceError> {
    let root = &config.sandbox_root;
    let limits = &config.limits;
    Ok(match package_type {
        PackageType::H5p => PackageMetadata::H5p(parse_h5p_archive(bytes, root, limits)?.metadata),
        PackageType::Scorm => {
            let parsed = parse_scorm_archive(bytes, root, limits)?;
            PackageMetadata::Scorm {
                title: parsed.title,
                version: parsed.version,
                organization: parsed.organization,
                launch_file: parsed.launch_file,
            }
        }
    })
}

/// Resolves one asset of a package archive and builds its response.
///
/// With no `asset` the entry point is rendered. SCORM HTML gets the runtime
/// shim for `package_id` injected.
pub fn render_asset(
    package_type: PackageType,
    package_id: &str,
    bytes: &[u8],
    asset: Option<&str>,
    config: &ServiceConfig,
) -> Result<AssetResponse, ServiceError> {
    let (assets, main_file): (AssetMap, String) = match package_type {
        PackageType::H5p => {
            let parsed = parse_h5p_archive(bytes, &config.sandbox_root, &config.limits)?;
            (parsed.assets, parsed.metadata.main_file)
        }
        PackageType::Scorm => {
            let parsed = parse_scorm_archive(bytes, &config.sandbox_root, &config.limits)?;
            (parsed.assets, parsed.launch_file)
        }
    };

    let path = resolve_asset_path(&assets, &main_file, asset)
        .ok_or_else(|| ServiceError::AssetNotFound(asset.unwrap_or(&main_file).to_string()))?;
    let found = assets.get(&path).unwrap_or_default();

    let body = if package_type == PackageType::Scorm && is_html(&path) {
        let html = String::from_utf8_lossy(found);
        inject_shim(&html, &build_scorm_api_script(package_id)).into_bytes()
    } else {
        found.to_vec()
    };

    let content_type = content_type_for(&path);
    Ok(AssetResponse {
        headers: vec![
            ("Content-Type", content_type.to_string()),
            ("Cache-Control", "no-store".to_string()),
            ("Content-Security-Policy", PREVIEW_CSP.to_string()),
        ],
        path,
        content_type,
        body,
    })
}

/// Viewer route for a package.
pub fn viewer_route(package_type: PackageType, id: &str) -> String {
    format!("/{}/{}", package_type, id)
}

fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_route() {
        assert_eq!(viewer_route(PackageType::H5p, "abc"), "/h5p/abc");
        assert_eq!(viewer_route(PackageType::Scorm, "xyz"), "/scorm/xyz");
    }
}
