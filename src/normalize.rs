//! City-name normalization and percent-coding helpers.
//!
//! A city name arrives URL-encoded and mixed-case, possibly with the
//! Swedish letters Å/Ä/Ö. The normalized form is the cache key used by
//! both on-disk caches, so the pipeline here must stay byte-stable.

/// Decode `%HH` escapes. Malformed escapes pass through unchanged.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = hex_val(bytes[i + 1]);
            let lo = hex_val(bytes[i + 2]);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Encode everything but unreserved characters as uppercase `%HH`.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Normalize a requested city name into its cache key:
/// percent-decode, ASCII lower-case, lower-case Å/Ä/Ö by their two-byte
/// UTF-8 sequences, then trim ASCII whitespace at both ends.
pub fn normalize_city(raw: &str) -> String {
    let decoded = percent_decode(raw);
    let bytes = decoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_uppercase() {
            out.push(b + 32);
            i += 1;
        } else if b == 0xC3 && i + 1 < bytes.len() {
            // Å -> å, Ä -> ä, Ö -> ö
            let next = match bytes[i + 1] {
                0x85 => 0xA5,
                0x84 => 0xA4,
                0x96 => 0xB6,
                other => other,
            };
            out.push(b);
            out.push(next);
            i += 2;
        } else {
            out.push(b);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out)
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .to_string()
}

/// Make a cache key safe to embed in a file name.
pub fn sanitize_key_for_path(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect()
}
