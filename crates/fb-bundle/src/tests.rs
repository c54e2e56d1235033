use crate::*;
use crate::part::COMPRESSION_PREFIX;
use fb_compress::{CompressionConfig, Selector};

fn selector() -> Selector {
    Selector::with_defaults(&CompressionConfig::default())
}

fn similar_entries() -> Vec<BundleEntry> {
    let a: Vec<String> = (0..15).map(|i| format!("setting_{i} = default value for every profile")).collect();
    let mut b = a.clone();
    b[3] = "setting_3 = overridden".to_string();
    vec![
        BundleEntry::new("conf/a.ini", a.join("\n")),
        BundleEntry::new("conf/b.ini", b.join("\n")),
    ]
}

// ========== Format ==========

#[test]
fn test_render_single_entry() {
    let text = render_bundle(&[BundleEntry::new("src/main.rs", "fn main() {}")]);
    assert_eq!(
        text,
        "## File: src/main.rs\n\nSize: 12 bytes\n\n--- FILE CONTENT BEGIN ---\nfn main() {}\n@CONTENT-END@\n--- FILE CONTENT END ---\n\n"
    );
}

#[test]
fn test_parse_render_entries() {
    let entries = vec![
        BundleEntry::new("a.txt", "one\ntwo\n"),
        BundleEntry::new("empty.txt", ""),
        BundleEntry::new("nested/c.md", "## File: not a header\n--- FILE CONTENT BEGIN ---\nstill content"),
    ];
    assert_eq!(parse_bundle(&render_bundle(&entries)), entries);
}

#[test]
fn test_parse_ignores_unclosed_block() {
    let text = "## File: a.txt\n--- FILE CONTENT BEGIN ---\ndangling";
    assert!(parse_bundle(text).is_empty());
}

// ========== Part header ==========

#[test]
fn test_header_render() {
    let header = PartHeader {
        metadata: "dictionary:4".into(),
        original_size: Some(1000),
        compressed_size: Some(500),
        ratio_pct: Some(50.0),
    };
    assert_eq!(
        header.render(),
        "# Compression: dictionary:4\n# Original Size: 1000 bytes\n# Compressed Size: 500 bytes\n# Ratio: 50.00%\n\n"
    );
}

#[test]
fn test_read_part_full_header() {
    let bytes = b"# Compression: delta:2\n# Original Size: 10 bytes\n# Compressed Size: 5 bytes\n# Ratio: 50.00%\n\npayload";
    let (header, payload) = read_part(bytes);
    let header = header.unwrap();
    assert_eq!(header.metadata, "delta:2");
    assert_eq!(header.original_size, Some(10));
    assert_eq!(header.compressed_size, Some(5));
    assert!((header.ratio_pct.unwrap() - 50.0).abs() < 1e-9);
    assert_eq!(payload, b"payload");
}

#[test]
fn test_read_part_without_blank_line() {
    let (header, payload) = read_part(b"# Compression: template:1\n===TEMPLATES_START===\nrest");
    assert_eq!(header.unwrap().metadata, "template:1");
    assert_eq!(payload, b"===TEMPLATES_START===\nrest");
}

#[test]
fn test_read_part_no_header() {
    let (header, payload) = read_part(b"## File: a.txt\n");
    assert!(header.is_none());
    assert_eq!(payload, b"## File: a.txt\n");
}

#[test]
fn test_read_part_only_header_lines() {
    let bytes = b"# Compression: delta:1\n# Ratio: 10.00%";
    let (header, payload) = read_part(bytes);
    assert!(header.is_none());
    assert_eq!(payload, bytes);
}

#[test]
fn test_read_part_empty_metadata() {
    let bytes = b"# Compression: \n\npayload";
    assert!(read_part(bytes).0.is_none());
}

#[test]
fn test_write_part_skips_header_for_none() {
    let result = selector().compress_with(b"plain", "none").unwrap();
    assert_eq!(write_part(&result), b"plain");
}

// ========== Pack / unpack ==========

#[test]
fn test_pack_unpack_delta() {
    let entries = similar_entries();
    let text = render_bundle(&entries);
    let sel = selector();
    let (bytes, result) = pack_part(&sel, text.as_bytes(), "delta").unwrap();
    assert_eq!(result.metadata, "delta:1");

    let prefix = format!("{COMPRESSION_PREFIX}delta:1\n# Original Size: {} bytes\n", text.len());
    assert!(bytes.starts_with(prefix.as_bytes()));
    let (header, _) = read_part(&bytes);
    assert_eq!(header.unwrap().compressed_size, Some(result.compressed_len()));

    let restored = unpack_part(&sel, &bytes).unwrap();
    assert_eq!(restored, text.as_bytes());
    assert_eq!(parse_bundle(std::str::from_utf8(&restored).unwrap()), entries);
}

#[test]
fn test_pack_unpack_auto() {
    let text = render_bundle(&similar_entries());
    let sel = selector();
    let (bytes, _) = pack_part(&sel, text.as_bytes(), "auto").unwrap();
    assert_eq!(unpack_part(&sel, &bytes).unwrap(), text.as_bytes());
}

#[test]
fn test_pack_unknown_strategy() {
    let err = pack_part(&selector(), b"x", "zip").unwrap_err();
    assert!(err.to_string().contains("zip"));
}

#[test]
fn test_unpack_uncompressed_part() {
    let text = render_bundle(&similar_entries());
    assert_eq!(unpack_part(&selector(), text.as_bytes()).unwrap(), text.as_bytes());
}

#[test]
fn test_unpack_size_mismatch() {
    let bytes = b"# Compression: none\n# Original Size: 99 bytes\n\nhello";
    let err = unpack_part(&selector(), bytes).unwrap_err();
    assert!(err.to_string().contains("does not match"));
}

#[test]
fn test_unpack_bad_metadata() {
    let bytes = b"# Compression: bogus:3\n\npayload";
    assert!(unpack_part(&selector(), bytes).is_err());
}

#[test]
fn test_header_serializes() {
    let header = PartHeader {
        metadata: "delta:1".into(),
        original_size: Some(10),
        compressed_size: None,
        ratio_pct: None,
    };
    let json = serde_json::to_string(&header).unwrap();
    let back: PartHeader = serde_json::from_str(&json).unwrap();
    assert_eq!(back, header);
}
