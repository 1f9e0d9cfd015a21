use coursepack::{extract, ExtractError, ExtractionLimits};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// Helper to build a ZIP archive in memory
fn create_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

fn sandbox() -> &'static Path {
    Path::new("/tmp/coursepack-sandbox")
}

#[test]
fn test_extract_zip_basic() {
    let buffer = create_zip(&[
        ("test.txt", b"Hello, World!"),
        ("subdir/nested.txt", b"Nested content"),
        ("data.json", b"{\"key\": \"value\"}"),
    ]);

    let entries = extract(&buffer, sandbox(), &ExtractionLimits::default()).unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].path, "test.txt");
    assert_eq!(entries[0].bytes, b"Hello, World!");
    assert_eq!(entries[0].size, 13);
    assert_eq!(entries[1].path, "subdir/nested.txt");
    assert_eq!(entries[2].path, "data.json");
}

#[test]
fn test_extract_normalizes_backslashes() {
    let buffer = create_zip(&[("content\\images\\logo.png", b"png")]);

    let entries = extract(&buffer, sandbox(), &ExtractionLimits::default()).unwrap();

    assert_eq!(entries[0].path, "content/images/logo.png");
}

#[test]
fn test_extract_skips_directories() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.add_directory("only-a-directory/", SimpleFileOptions::default())
        .unwrap();
    let buffer = zip.finish().unwrap().into_inner();

    let entries = extract(&buffer, sandbox(), &ExtractionLimits::default()).unwrap();

    assert!(entries.is_empty());
}

#[test]
fn test_extract_directories_mixed_with_files() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.add_directory("content/", SimpleFileOptions::default())
        .unwrap();
    zip.start_file("content/index.html", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"<html></html>").unwrap();
    let buffer = zip.finish().unwrap().into_inner();

    let entries = extract(&buffer, sandbox(), &ExtractionLimits::default()).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "content/index.html");
}

#[test]
fn test_extract_zip_slip_variants() {
    let malicious = [
        "../evil.txt",
        "../../etc/passwd",
        "safe/../../evil.txt",
        "./../evil.txt",
        "..\\evil.txt",
        "safe\\..\\..\\evil.txt",
        "/etc/passwd",
        "\\server\\share\\evil.txt",
        "C:\\Windows\\evil.txt",
        "c:/evil.txt",
    ];

    for name in malicious {
        let buffer = create_zip(&[("ok.txt", b"fine"), (name, b"evil")]);
        let result = extract(&buffer, sandbox(), &ExtractionLimits::default());
        assert!(
            matches!(result, Err(ExtractError::ZipSlipDetected(ref path)) if path == name),
            "expected zip-slip rejection for {:?}, got {:?}",
            name,
            result
        );
    }
}

#[test]
fn test_extract_too_many_entries_checked_first() {
    // The traversal entry would fail path validation if it were ever read.
    let buffer = create_zip(&[("a.txt", b"a"), ("../evil.txt", b"b"), ("c.txt", b"c")]);
    let limits = ExtractionLimits::new(2, 1024).unwrap();

    let result = extract(&buffer, sandbox(), &limits);

    assert!(matches!(
        result,
        Err(ExtractError::TooManyEntries { count: 3, limit: 2 })
    ));
}

#[test]
fn test_extract_entry_count_at_limit() {
    let buffer = create_zip(&[("a.txt", b"a"), ("b.txt", b"b")]);
    let limits = ExtractionLimits::new(2, 1024).unwrap();

    assert_eq!(extract(&buffer, sandbox(), &limits).unwrap().len(), 2);
}

#[test]
fn test_extract_size_limit_exceeded() {
    let buffer = create_zip(&[("a.bin", &[1u8; 600]), ("b.bin", &[2u8; 600])]);
    let limits = ExtractionLimits::new(100, 1000).unwrap();

    let result = extract(&buffer, sandbox(), &limits);

    assert!(matches!(
        result,
        Err(ExtractError::SizeExceeded { limit: 1000, .. })
    ));
}

#[test]
fn test_extract_compression_bomb_stops_early() {
    // A megabyte of zeros compresses to a few kilobytes.
    let zeros = vec![0u8; 1024 * 1024];
    let buffer = create_zip(&[("bomb.bin", &zeros)]);
    assert!(buffer.len() < 64 * 1024);
    let limits = ExtractionLimits::new(10, 64 * 1024).unwrap();

    let result = extract(&buffer, sandbox(), &limits);

    match result {
        Err(ExtractError::SizeExceeded { current, limit }) => {
            assert_eq!(limit, 64 * 1024);
            assert_eq!(current, limit + 1);
        }
        other => panic!("expected SizeExceeded, got {:?}", other),
    }
}

#[test]
fn test_extract_invalid_archive() {
    let result = extract(b"PK\x03\x04 but not really", sandbox(), &ExtractionLimits::default());
    assert!(matches!(result, Err(ExtractError::InvalidArchive(_))));

    let result = extract(&[], sandbox(), &ExtractionLimits::default());
    assert!(matches!(result, Err(ExtractError::InvalidArchive(_))));
}

#[test]
fn test_extract_corrupted_entry() {
    let content = b"corruptible payload corruptible payload";
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("data.txt", options).unwrap();
    zip.write_all(content).unwrap();
    let mut buffer = zip.finish().unwrap().into_inner();

    // Flip a byte of the stored payload so the CRC no longer matches.
    let at = buffer
        .windows(content.len())
        .position(|window| window == content)
        .unwrap();
    buffer[at] ^= 0xff;

    let result = extract(&buffer, sandbox(), &ExtractionLimits::default());

    assert!(matches!(
        result,
        Err(ExtractError::ExtractionFailed { ref path, .. }) if path == "data.txt"
    ));
}

#[test]
fn test_extract_concurrently() {
    let buffer = create_zip(&[("a.txt", b"a"), ("b/c.txt", b"c")]);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| extract(&buffer, sandbox(), &ExtractionLimits::default())))
            .collect();
        for handle in handles {
            let entries = handle.join().unwrap().unwrap();
            assert_eq!(entries.len(), 2);
        }
    });
}

#[test]
fn test_error_kinds() {
    let buffer = create_zip(&[("../x", b"x")]);
    let err = extract(&buffer, sandbox(), &ExtractionLimits::default()).unwrap_err();
    assert_eq!(err.kind(), "ZIP_SLIP_DETECTED");
}

#[test]
fn test_extract_writes_nothing_to_sandbox() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let buffer = create_zip(&[("content/index.html", b"<html/>"), ("a.txt", b"a")]);

    let entries = extract(&buffer, temp_dir.path(), &ExtractionLimits::default()).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}
