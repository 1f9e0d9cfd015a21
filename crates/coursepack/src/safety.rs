//! Security and safety checks for archive extraction.
//!
//! This module validates archive entry paths and enforces resource limits to
//! prevent attacks like zip-slip (path traversal) and decompression bombs.
//! Entry paths are treated as plain strings, independent of the host's
//! separator conventions, so `a\..\b` is rejected on every platform.

use crate::error::ExtractError;
use std::path::{Component, Path, PathBuf};

/// Splits a raw archive path on both separator styles.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\'])
}

/// Returns `true` for `/foo`, `\foo` and drive-letter prefixes like `C:`.
fn is_absolute_like(path: &str) -> bool {
    let bytes = path.as_bytes();
    if bytes.first().is_some_and(|b| *b == b'/' || *b == b'\\') {
        return true;
    }
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Converts an archive path to forward-slash form and drops `.` and empty
/// segments. `..` segments are kept verbatim; callers reject them first.
///
/// # Examples
///
/// ```
/// use coursepack::safety::normalize_archive_path;
///
/// assert_eq!(normalize_archive_path("content\\img\\a.png"), "content/img/a.png");
/// assert_eq!(normalize_archive_path("./dir//file.txt"), "dir/file.txt");
/// ```
pub fn normalize_archive_path(path: &str) -> String {
    segments(path)
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Validates a raw archive entry path and returns its normalized form.
///
/// This function performs the following checks:
/// - Rejects absolute paths (`/etc/passwd`, `\share`, `C:\Windows`)
/// - Rejects any `..` segment, whichever separator surrounds it
/// - Rejects paths that normalize to nothing (`.`, `./`)
///
/// # Examples
///
/// ```
/// use coursepack::safety::validate_entry_path;
///
/// assert_eq!(validate_entry_path("dir/file.txt").unwrap(), "dir/file.txt");
/// assert!(validate_entry_path("../../etc/passwd").is_err());
/// assert!(validate_entry_path("C:\\Windows\\win.ini").is_err());
/// ```
pub fn validate_entry_path(path: &str) -> Result<String, ExtractError> {
    if is_absolute_like(path) {
        return Err(ExtractError::ZipSlipDetected(path.to_string()));
    }

    if segments(path).any(|part| part == "..") {
        return Err(ExtractError::ZipSlipDetected(path.to_string()));
    }

    let normalized = normalize_archive_path(path);
    if normalized.is_empty() {
        return Err(ExtractError::ZipSlipDetected(path.to_string()));
    }

    Ok(normalized)
}

/// Lexically normalizes a filesystem path, folding `.` and `..` components.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves a normalized entry path against the sandbox root and checks that
/// the result stays inside it.
///
/// Nothing is written or read from disk; this is pure path arithmetic.
pub fn resolve_within_sandbox(root: &Path, entry_path: &str) -> Result<PathBuf, ExtractError> {
    let root = lexical_normalize(root);
    let mut resolved = root.clone();
    for part in entry_path.split('/') {
        resolved.push(part);
    }
    let resolved = lexical_normalize(&resolved);

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(ExtractError::ZipSlipDetected(entry_path.to_string()))
    }
}

/// Checks the declared entry count before any entry is read.
pub fn check_entry_count(count: usize, limit: usize) -> Result<(), ExtractError> {
    if count > limit {
        return Err(ExtractError::TooManyEntries { count, limit });
    }
    Ok(())
}

/// Checks if the running decompressed total exceeds the configured limit.
///
/// # Examples
///
/// ```
/// use coursepack::safety::check_size_limits;
///
/// assert!(check_size_limits(1000, 2000).is_ok());
/// assert!(check_size_limits(2000, 2000).is_ok());
/// assert!(check_size_limits(3000, 2000).is_err());
/// ```
pub fn check_size_limits(current_bytes: u64, limit: u64) -> Result<(), ExtractError> {
    if current_bytes > limit {
        return Err(ExtractError::SizeExceeded {
            current: current_bytes,
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_zip_slip(result: Result<String, ExtractError>) -> bool {
        matches!(result, Err(ExtractError::ZipSlipDetected(_)))
    }

    #[test]
    fn test_validate_entry_path_valid() {
        assert_eq!(validate_entry_path("file.txt").unwrap(), "file.txt");
        assert_eq!(
            validate_entry_path("dir/subdir/file.txt").unwrap(),
            "dir/subdir/file.txt"
        );
        assert_eq!(validate_entry_path("./dir/file.txt").unwrap(), "dir/file.txt");
        assert_eq!(validate_entry_path("dir\\file.txt").unwrap(), "dir/file.txt");
    }

    #[test]
    fn test_validate_entry_path_absolute() {
        assert!(is_zip_slip(validate_entry_path("/etc/passwd")));
        assert!(is_zip_slip(validate_entry_path("\\windows\\system32")));
        assert!(is_zip_slip(validate_entry_path("C:\\Windows\\win.ini")));
        assert!(is_zip_slip(validate_entry_path("c:/temp/file.txt")));
    }

    #[test]
    fn test_validate_entry_path_traversal() {
        assert!(is_zip_slip(validate_entry_path("../etc/passwd")));
        assert!(is_zip_slip(validate_entry_path("../../etc/passwd")));
        assert!(is_zip_slip(validate_entry_path("dir/../etc/passwd")));
        assert!(is_zip_slip(validate_entry_path("dir/..")));
        assert!(is_zip_slip(validate_entry_path("./../../etc/passwd")));
    }

    #[test]
    fn test_validate_entry_path_backslash_traversal() {
        assert!(is_zip_slip(validate_entry_path("..\\..\\etc\\passwd")));
        assert!(is_zip_slip(validate_entry_path("safe\\..\\..\\evil.txt")));
        assert!(is_zip_slip(validate_entry_path("mixed/..\\evil.txt")));
    }

    #[test]
    fn test_validate_entry_path_dots_inside_names_are_fine() {
        assert_eq!(
            validate_entry_path("lib/jquery..min.js").unwrap(),
            "lib/jquery..min.js"
        );
        assert_eq!(validate_entry_path("...").unwrap(), "...");
    }

    #[test]
    fn test_validate_entry_path_edge_cases() {
        assert_eq!(validate_entry_path("dir//file.txt").unwrap(), "dir/file.txt");
        assert_eq!(validate_entry_path("./././file.txt").unwrap(), "file.txt");
        assert!(is_zip_slip(validate_entry_path(".")));
        assert!(is_zip_slip(validate_entry_path("")));
    }

    #[test]
    fn test_validate_entry_path_unicode() {
        assert_eq!(
            validate_entry_path("日本語/ファイル.txt").unwrap(),
            "日本語/ファイル.txt"
        );
        assert!(is_zip_slip(validate_entry_path("日本語/../etc/passwd")));
    }

    #[test]
    fn test_resolve_within_sandbox() {
        let root = Path::new("/tmp/sandbox");
        let resolved = resolve_within_sandbox(root, "content/index.html").unwrap();
        assert_eq!(resolved, Path::new("/tmp/sandbox/content/index.html"));

        let root = Path::new("/tmp/./sandbox/");
        let resolved = resolve_within_sandbox(root, "a.txt").unwrap();
        assert_eq!(resolved, Path::new("/tmp/sandbox/a.txt"));
    }

    #[test]
    fn test_resolve_within_sandbox_rejects_escape() {
        // validate_entry_path never produces this, the sandbox check still catches it
        let result = resolve_within_sandbox(Path::new("/tmp/sandbox"), "../outside.txt");
        assert!(matches!(result, Err(ExtractError::ZipSlipDetected(_))));
    }

    #[test]
    fn test_check_entry_count() {
        assert!(check_entry_count(10, 10).is_ok());
        assert!(matches!(
            check_entry_count(11, 10),
            Err(ExtractError::TooManyEntries { count: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_check_size_limits_boundary() {
        assert!(check_size_limits(1000, 1000).is_ok());
        assert!(matches!(
            check_size_limits(1001, 1000),
            Err(ExtractError::SizeExceeded { current: 1001, limit: 1000 })
        ));
    }
}
