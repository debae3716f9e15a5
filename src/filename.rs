//! File name derivation for download jobs.
//!
//! Names are built from the owner label, source id, and the URL's extension,
//! sanitized for cross-platform file systems. Retried jobs get a regenerated
//! name with a fresh random suffix so a stale partial never collides.

use url::Url;

/// Longest accepted extension, including the dot.
const MAX_EXTENSION_LEN: usize = 12;

/// Builds a file name for one media URL of a reference.
///
/// Pattern: `{owner}_{source_id}_{index}{ext}`, falling back to the URL host
/// when no owner label is known and `.bin` when no extension can be derived.
#[must_use]
pub fn build_file_name(
    owner_label: Option<&str>,
    source_id: &str,
    index: usize,
    url: &str,
) -> String {
    let extension = extension_from_url(url).unwrap_or_else(|| ".bin".to_string());
    let owner = owner_label
        .map(sanitize_component)
        .filter(|owner| !owner.is_empty())
        .or_else(|| {
            Url::parse(url).ok().and_then(|parsed| {
                parsed
                    .host_str()
                    .map(|host| sanitize_component(&host.replace('.', "-")))
            })
        })
        .unwrap_or_else(|| "media".to_string());
    let source_id = sanitize_component(source_id);

    format!("{owner}_{source_id}_{index}{extension}")
}

/// Regenerates a file name for a retried job.
///
/// Keeps the original stem and extension but appends a short random suffix,
/// so the retried transfer never lands on top of a stale partial.
#[must_use]
pub fn regenerate_file_name(file_name: &str) -> String {
    let suffix: u16 = rand::random();
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, ext) = file_name.split_at(dot);
            format!("{stem}-r{suffix:04x}{ext}")
        }
        _ => format!("{file_name}-r{suffix:04x}"),
    }
}

pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index..];
    if ext.len() <= 1 || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    Some(ext.to_lowercase())
}

pub(crate) fn sanitize_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_file_name_with_owner() {
        let name = build_file_name(
            Some("Alice W."),
            "12345",
            0,
            "https://img.example.com/media/photo.jpg",
        );
        assert_eq!(name, "Alice_W._12345_0.jpg");
    }

    #[test]
    fn test_build_file_name_falls_back_to_host() {
        let name = build_file_name(None, "99", 2, "https://video.twimg.com/vid/clip.mp4");
        assert_eq!(name, "video-twimg-com_99_2.mp4");
    }

    #[test]
    fn test_build_file_name_without_extension_uses_bin() {
        let name = build_file_name(Some("bob"), "7", 0, "https://example.com/stream");
        assert_eq!(name, "bob_7_0.bin");
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            extension_from_url("https://example.com/a/b/photo.JPG"),
            Some(".jpg".to_string())
        );
        assert_eq!(extension_from_url("https://example.com/noext"), None);
        // Query strings are not part of the path segment
        assert_eq!(
            extension_from_url("https://example.com/v.mp4?tag=12"),
            Some(".mp4".to_string())
        );
    }

    #[test]
    fn test_extension_rejects_absurd_lengths() {
        assert_eq!(
            extension_from_url("https://example.com/file.reallylongextension"),
            None
        );
        assert_eq!(extension_from_url("https://example.com/file."), None);
    }

    #[test]
    fn test_sanitize_component_collapses_separators() {
        assert_eq!(sanitize_component("a  b//c"), "a_b_c");
        assert_eq!(sanitize_component("__edge__"), "edge");
        assert_eq!(sanitize_component("日本語ok"), "日本語ok");
    }

    #[test]
    fn test_regenerate_keeps_extension() {
        let regenerated = regenerate_file_name("alice_1_0.jpg");
        assert!(regenerated.starts_with("alice_1_0-r"), "got: {regenerated}");
        assert!(regenerated.ends_with(".jpg"), "got: {regenerated}");
        assert_ne!(regenerated, "alice_1_0.jpg");
    }

    #[test]
    fn test_regenerate_without_extension() {
        let regenerated = regenerate_file_name("blob");
        assert!(regenerated.starts_with("blob-r"), "got: {regenerated}");
    }

    #[test]
    fn test_regenerate_is_randomized() {
        let a = regenerate_file_name("x.png");
        let b = regenerate_file_name("x.png");
        // Two u16 draws colliding is possible but vanishingly unlikely to
        // happen repeatedly; one inequality check keeps this deterministic
        // enough in practice.
        if a == b {
            let c = regenerate_file_name("x.png");
            assert!(a != c || b != c);
        }
    }
}
