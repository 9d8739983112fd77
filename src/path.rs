//! Entry path decoding and normalization
//!
//! Patch archives store entry paths as raw bytes in whatever code page the
//! authoring tool used, most commonly code page 949 (Korean). Containers key
//! entries by a case-folded, slash-normalized form of the decoded path while
//! preserving the original casing for re-emission.

use encoding_rs::{Encoding, EUC_KR, WINDOWS_1252};

/// Decode raw path bytes from a patch archive entry.
///
/// Attempts, in order: code page 949 (Korean), code page 1252 (Western
/// European), UTF-8, and finally a per-byte identity mapping. The first
/// strict decode wins; the identity fallback means this never fails.
pub fn decode_path(raw: &[u8]) -> String {
    if let Some(path) = decode_strict(EUC_KR, raw) {
        return path;
    }
    if let Some(path) = decode_strict(WINDOWS_1252, raw) {
        return path;
    }
    if let Ok(path) = std::str::from_utf8(raw) {
        return path.to_owned();
    }
    raw.iter().map(|&b| char::from(b)).collect()
}

fn decode_strict(encoding: &'static Encoding, raw: &[u8]) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(raw);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Normalize a decoded entry path into logical form.
///
/// Backslashes become forward slashes, repeated separators collapse, `.`
/// segments are dropped and `..` pops the previous segment (or is dropped at
/// the root, so no path can escape it). Paths that arrived absolute are
/// re-anchored under the `data` root segment. Returns an empty string when
/// nothing survives; callers skip such entries.
///
/// # Examples
///
/// ```
/// use ro_patch::path::normalize_path;
///
/// assert_eq!(normalize_path("data\\texture\\a.bmp"), "data/texture/a.bmp");
/// assert_eq!(normalize_path("..\\..\\evil.bin"), "evil.bin");
/// assert_eq!(normalize_path("/sprite/npc.spr"), "data/sprite/npc.spr");
/// ```
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return String::new();
    }

    let joined = segments.join("/");
    if absolute {
        format!("data/{joined}")
    } else {
        joined
    }
}

/// Case-fold a logical path for use as a container key.
pub fn fold_path(path: &str) -> String {
    path.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cp949() {
        // "한글.txt" in EUC-KR / code page 949
        let raw = b"\xC7\xD1\xB1\xDB.txt";
        assert_eq!(decode_path(raw), "\u{D55C}\u{AE00}.txt");
    }

    #[test]
    fn test_decode_cp1252_fallback() {
        // 0xE9 followed by an ASCII trail byte is invalid in code page 949,
        // so decoding falls through to 1252.
        let raw = b"caf\xE9.txt";
        assert_eq!(decode_path(raw), "caf\u{E9}.txt");
    }

    #[test]
    fn test_cp949_encode_round_trip() {
        let raw = b"\xC7\xD1\xB1\xDB.txt";
        let decoded = decode_path(raw);
        let (encoded, _, had_errors) = EUC_KR.encode(&decoded);
        assert!(!had_errors);
        assert_eq!(encoded.as_ref(), raw.as_slice());
        assert_eq!(decode_path(&encoded), decoded);
    }

    #[test]
    fn test_decode_ascii() {
        assert_eq!(decode_path(b"data/texture/a.bmp"), "data/texture/a.bmp");
    }

    #[test]
    fn test_decode_never_fails() {
        // Arbitrary byte soup still yields a string via one of the fallbacks.
        let raw: Vec<u8> = (0u8..=255).collect();
        assert!(!decode_path(&raw).is_empty());
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_path("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(normalize_path("a//b///c.txt"), "a/b/c.txt");
        assert_eq!(normalize_path("a/./b/./c.txt"), "a/b/c.txt");
    }

    #[test]
    fn test_normalize_parent_segments() {
        assert_eq!(normalize_path("a/b/../c.txt"), "a/c.txt");
        assert_eq!(normalize_path("..\\..\\evil.bin"), "evil.bin");
        assert_eq!(normalize_path("a/../../../b.txt"), "b.txt");
    }

    #[test]
    fn test_normalize_anchors_absolute() {
        assert_eq!(normalize_path("/texture/a.bmp"), "data/texture/a.bmp");
        assert_eq!(normalize_path("\\texture\\a.bmp"), "data/texture/a.bmp");
    }

    #[test]
    fn test_normalize_empty_results() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("../.."), "");
        assert_eq!(normalize_path("///"), "");
    }

    #[test]
    fn test_fold_path() {
        assert_eq!(fold_path("Data/Texture/A.bmp"), "data/texture/a.bmp");
        assert_eq!(fold_path("data/texture/a.bmp"), "data/texture/a.bmp");
    }
}
