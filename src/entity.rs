//! HTML entity and numeric character reference decoding
use std::collections::HashMap;
use std::sync::OnceLock;

/// Longest named entity in the HTML5 table, without `&` and `;`.
const MAX_ENTITY_NAME: usize = 32;

fn named_entities() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        entities::ENTITIES
            .iter()
            .filter_map(|e| {
                // Only the `&name;` spellings count in CommonMark
                let name = e.entity.strip_prefix('&')?.strip_suffix(';')?;
                Some((name, e.characters))
            })
            .collect()
    })
}

/// Decode one entity starting just after `&`.
///
/// Returns the decoded text and the number of bytes consumed, including
/// the terminating `;`.
pub(crate) fn unescape_entity(text: &[u8]) -> Option<(String, usize)> {
    if text.first() == Some(&b'#') {
        return unescape_numeric(text);
    }

    let name_len = text
        .iter()
        .take(MAX_ENTITY_NAME + 1)
        .take_while(|c| c.is_ascii_alphanumeric())
        .count();
    if name_len == 0 || text.get(name_len) != Some(&b';') {
        return None;
    }
    let name = std::str::from_utf8(&text[..name_len]).ok()?;
    let decoded = named_entities().get(name)?;
    Some((decoded.to_string(), name_len + 1))
}

/// `#123;` or `#x1F;`; out-of-range and zero code points become U+FFFD.
fn unescape_numeric(text: &[u8]) -> Option<(String, usize)> {
    let (radix, start, max_digits) = match text.get(1) {
        Some(b'x' | b'X') => (16, 2, 6),
        _ => (10, 1, 7),
    };
    let digits = text[start..]
        .iter()
        .take_while(|c| match radix {
            16 => c.is_ascii_hexdigit(),
            _ => c.is_ascii_digit(),
        })
        .count();
    if digits == 0 || digits > max_digits || text.get(start + digits) != Some(&b';') {
        return None;
    }
    let raw = std::str::from_utf8(&text[start..start + digits]).ok()?;
    let codepoint = u32::from_str_radix(raw, radix).ok()?;
    let c = match codepoint {
        0 => '\u{fffd}',
        cp => char::from_u32(cp).unwrap_or('\u{fffd}'),
    };
    Some((c.to_string(), start + digits + 1))
}

/// Decode every entity in `text`, leaving malformed ones verbatim.
pub(crate) fn unescape_html(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&'
            && let Some((decoded, len)) = unescape_entity(&bytes[i + 1..])
        {
            out.push_str(&text[last..i]);
            out.push_str(&decoded);
            i += 1 + len;
            last = i;
            continue;
        }
        i += 1;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_entities() {
        assert_eq!(unescape_entity(b"amp;x"), Some(("&".to_string(), 4)));
        assert_eq!(unescape_entity(b"ngE;"), Some(("\u{2267}\u{338}".to_string(), 4)));
        assert_eq!(unescape_entity(b"amp"), None);
        assert_eq!(unescape_entity(b"madeup;"), None);
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(unescape_entity(b"#35;"), Some(("#".to_string(), 4)));
        assert_eq!(unescape_entity(b"#X22;"), Some(("\"".to_string(), 5)));
        assert_eq!(unescape_entity(b"#0;"), Some(("\u{fffd}".to_string(), 3)));
        assert_eq!(unescape_entity(b"#87654321;"), None);
        assert_eq!(unescape_entity(b"#xD800;"), Some(("\u{fffd}".to_string(), 7)));
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("a &copy; b &bogus; &#42;"), "a \u{a9} b &bogus; *");
    }
}
