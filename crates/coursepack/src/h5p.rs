//! H5P package resolution.
//!
//! Metadata problems never fail a parse: a missing or malformed `h5p.json`
//! or `content/content.json` only degrades the title and optional fields.

use crate::error::ExtractError;
use crate::extract::extract_archive;
use crate::types::{AssetMap, ExtractionLimits, H5pMetadata, ParsedH5p};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

const H5P_CONFIG: &str = "h5p.json";
const CONTENT_CONFIG: &str = "content/content.json";
const DEFAULT_TITLE: &str = "H5P Package";
const DEFAULT_MAIN_FILE: &str = "content/index.html";

/// Candidate entry points, in order of preference.
const MAIN_FILE_CANDIDATES: [&str; 4] = [
    "content/index.html",
    "content/content.html",
    "content/content.json",
    "h5p.json",
];

/// Extract and resolve an H5P archive.
///
/// Only extraction errors are fatal.
pub fn parse_h5p_archive(
    buffer: &[u8],
    sandbox_root: &Path,
    limits: &ExtractionLimits,
) -> Result<ParsedH5p, ExtractError> {
    let assets: AssetMap = extract_archive(buffer, sandbox_root, limits)?
        .into_iter()
        .collect();

    let h5p_config = assets.get(H5P_CONFIG).and_then(|bytes| parse_json_object(H5P_CONFIG, bytes));
    let content_config = assets
        .get(CONTENT_CONFIG)
        .and_then(|bytes| parse_json_object(CONTENT_CONFIG, bytes));

    let title = string_field(content_config.as_ref(), "title")
        .or_else(|| string_field(h5p_config.as_ref(), "title"))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let metadata = H5pMetadata {
        title,
        main_library: string_field(h5p_config.as_ref(), "mainLibrary"),
        main_file: resolve_main_file(&assets),
        language: string_field(h5p_config.as_ref(), "language"),
    };

    info!(
        title = %metadata.title,
        main_file = %metadata.main_file,
        assets = assets.len(),
        "Parsed H5P package"
    );

    Ok(ParsedH5p { metadata, assets })
}

/// Picks the entry point: a known candidate, then the first asset, then the
/// conventional default even though it does not exist.
pub fn resolve_main_file(assets: &AssetMap) -> String {
    MAIN_FILE_CANDIDATES
        .iter()
        .find(|candidate| assets.contains(candidate))
        .map(|candidate| candidate.to_string())
        .or_else(|| assets.first_path().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_MAIN_FILE.to_string())
}

fn parse_json_object(name: &str, bytes: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(file = name, "Ignoring non-object H5P metadata");
            None
        }
        Err(e) => {
            warn!(file = name, error = %e, "Ignoring malformed H5P metadata");
            None
        }
    }
}

fn string_field(config: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    config?.get(key)?.as_str().map(str::to_string)
}
