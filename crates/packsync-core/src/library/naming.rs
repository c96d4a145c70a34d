//! File naming: suggested names from responses and safe path components.

use std::path::Path;

/// Longest file name Linux accepts (NAME_MAX), in bytes.
const NAME_MAX: usize = 255;

/// Name used when a title sanitizes down to nothing.
const UNTITLED: &str = "untitled";

/// Suggested file name for a download: `Content-Disposition` first, then the
/// last URL path segment.
pub fn suggested_filename(url: &str, content_disposition: Option<&str>) -> Option<String> {
    content_disposition
        .and_then(disposition_filename)
        .or_else(|| url_filename(url))
}

/// Extension (with leading dot) of a file name, e.g. `".zip"`.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e))
}

/// Last non-empty path segment of `url`, ignoring query and fragment.
pub fn url_filename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(decode_percent(segment))
}

/// File name from a `Content-Disposition` value. `filename*` (RFC 5987) wins
/// over `filename`.
pub fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';') {
        let Some((name, v)) = param.trim().split_once('=') else {
            continue;
        };
        let v = v.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = v
                    .split_once("''")
                    .filter(|(charset, _)| charset.eq_ignore_ascii_case("utf-8"))
                    .map(|(_, rest)| rest);
                if let Some(decoded) = encoded.map(decode_percent).filter(|s| !s.is_empty()) {
                    return Some(decoded);
                }
            }
            "filename" => {
                let unquoted = v
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .map(|s| s.replace("\\\"", "\"").replace("\\\\", "\\"))
                    .unwrap_or_else(|| v.to_string());
                if !unquoted.is_empty() {
                    plain = Some(unquoted);
                }
            }
            _ => {}
        }
    }
    plain
}

fn decode_percent(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(b) = hex {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Make `name` safe as a single path component: path separators, NUL and
/// control characters become `_`, surrounding dots and whitespace are
/// trimmed, and the result is capped at NAME_MAX bytes.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());

    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let capped = &trimmed[..take];
    if capped.is_empty() {
        UNTITLED.to_string()
    } else {
        capped.to_string()
    }
}
