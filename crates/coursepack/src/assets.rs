//! Serve-time asset lookup.

use crate::classify::file_extension;
use crate::scorm::strip_query;
use crate::types::AssetMap;

/// Content type used when the extension is not in the table.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Resolves a requested asset against a package's asset map.
///
/// Without a request the main file itself is looked up. With one, the
/// request is first tried as-is (backslashes converted, one leading `/`
/// stripped, `?` and `#` kept as part of the name); on a miss it is resolved relative to the main file's directory
/// with `.` and `..` collapsed. Resolution never climbs above the archive
/// root. Returns the matching asset key.
///
/// # Examples
///
/// ```
/// use coursepack::assets::resolve_asset_path;
/// use coursepack::AssetMap;
///
/// let mut assets = AssetMap::new();
/// assets.insert("content/index.html".to_string(), Vec::new());
/// assets.insert("styles/app.css".to_string(), Vec::new());
///
/// let found = resolve_asset_path(&assets, "content/index.html", Some("../styles/app.css"));
/// assert_eq!(found.as_deref(), Some("styles/app.css"));
/// ```
pub fn resolve_asset_path(assets: &AssetMap, main_file: &str, requested: Option<&str>) -> Option<String> {
    let Some(requested) = requested else {
        let main = normalize_request(main_file);
        let main = strip_query(&main);
        return assets.contains(main).then(|| main.to_string());
    };

    let raw = normalize_request(requested);
    if assets.contains(&raw) {
        return Some(raw);
    }

    let base = if is_root_relative(requested) {
        ""
    } else {
        parent_dir(main_file)
    };
    let resolved = collapse_segments(base, &raw);
    assets.contains(&resolved).then_some(resolved)
}

/// Maps a path's extension to the `Content-Type` used when serving it.
pub fn content_type_for(path: &str) -> &'static str {
    match file_extension(path).as_str() {
        ".html" | ".htm" => "text/html; charset=utf-8",
        ".js" => "application/javascript; charset=utf-8",
        ".json" => "application/json; charset=utf-8",
        ".css" => "text/css; charset=utf-8",
        ".svg" => "image/svg+xml",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".woff" => "font/woff",
        ".woff2" => "font/woff2",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Whether the path is an HTML document (the only kind that gets the shim).
pub fn is_html(path: &str) -> bool {
    matches!(file_extension(path).as_str(), ".html" | ".htm")
}

fn is_root_relative(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\')
}

/// Converts backslashes and drops a single leading `/`.
fn normalize_request(path: &str) -> String {
    let path = path.replace('\\', "/");
    match path.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

fn parent_dir(path: &str) -> &str {
    let path = strip_query(path);
    match path.rfind(['/', '\\']) {
        Some(at) => &path[..at],
        None => "",
    }
}

/// Joins `relative` onto `base` and folds `.`/`..` segments, never climbing
/// above the root.
pub(crate) fn collapse_segments(base: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in base.split(['/', '\\']).chain(relative.split(['/', '\\'])) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
