//! Link reference definitions, labels, destinations and titles
use crate::entity;
use crate::scanners;
use std::collections::HashMap;
use unicode_casefold::UnicodeCaseFold;

/// A link label may hold at most 999 characters between its brackets.
pub(crate) const MAX_LINK_LABEL_LENGTH: usize = 1000;

/// Budget for reference expansion, so a few definitions used many times
/// cannot blow up the output quadratically.
const MIN_REFERENCE_BUDGET: usize = 100_000;

/// A resolved `[label]: url "title"` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub url: String,
    pub title: String,
}

/// Label to destination map; the first definition of a label wins.
#[derive(Debug, Default)]
pub struct RefMap {
    map: HashMap<String, Reference>,
    /// Bytes of url and title handed out by lookups so far.
    used: usize,
    budget: usize,
}

impl RefMap {
    pub fn new() -> Self {
        RefMap {
            map: HashMap::new(),
            used: 0,
            budget: MIN_REFERENCE_BUDGET,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Raise the expansion budget to the document size when it is larger.
    pub(crate) fn set_document_size(&mut self, size: usize) {
        self.budget = size.max(MIN_REFERENCE_BUDGET);
    }

    /// Add a definition unless the label is already defined or normalizes
    /// to nothing.
    pub fn insert(&mut self, label: &str, reference: Reference) -> bool {
        let key = normalize_label(label);
        if key.is_empty() || self.map.contains_key(&key) {
            return false;
        }
        self.map.insert(key, reference);
        true
    }

    /// Look up a raw label, charging its size against the budget.
    pub fn lookup(&mut self, label: &str) -> Option<Reference> {
        let key = normalize_label(label);
        let reference = self.map.get(&key)?;
        let size = reference.url.len() + reference.title.len();
        if self.used + size > self.budget {
            return None;
        }
        self.used += size;
        Some(reference.clone())
    }
}

/// Case-fold, trim and collapse internal whitespace to single spaces.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label.trim().case_fold().collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove backslash escapes and decode entities in one pass.
pub(crate) fn unescape(text: &str) -> String {
    if !text.contains(['\\', '&']) {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => {
                out.push_str(&text[last..i]);
                last = i + 1;
                i += 2;
            }
            b'&' => match entity::unescape_entity(&bytes[i + 1..]) {
                Some((decoded, len)) => {
                    out.push_str(&text[last..i]);
                    out.push_str(&decoded);
                    i += 1 + len;
                    last = i;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Normalize a link destination taken from source.
pub(crate) fn clean_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    unescape(url)
}

/// Strip the title's delimiters and unescape the rest.
pub(crate) fn clean_title(title: &str) -> String {
    if title.len() < 2 {
        return String::new();
    }
    unescape(&title[1..title.len() - 1])
}

/// Scan a link destination at `pos`, either `<...>` or a bare run with
/// balanced parentheses.
///
/// Returns the matched length and the destination text without brackets.
pub(crate) fn scan_link_destination(s: &str, pos: usize) -> Option<(usize, &str)> {
    let bytes = s.as_bytes();
    if bytes.get(pos) == Some(&b'<') {
        let mut i = pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'>' => return Some((i + 1 - pos, &s[pos + 1..i])),
                b'\\' => i += 2,
                b'\n' | b'\r' | b'<' => return None,
                _ => i += 1,
            }
        }
        return None;
    }

    let mut i = pos;
    let mut parens = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => i += 2,
            b'(' => {
                parens += 1;
                // Deep nesting is almost certainly not a destination
                if parens > 32 {
                    return None;
                }
                i += 1;
            }
            b')' => {
                if parens == 0 {
                    break;
                }
                parens -= 1;
                i += 1;
            }
            c if scanners::is_space(c) || c.is_ascii_control() => {
                if i == pos {
                    return None;
                }
                break;
            }
            _ => i += 1,
        }
    }
    if i >= bytes.len() || parens != 0 {
        return None;
    }
    Some((i - pos, &s[pos..i]))
}

/// Scan `[label]` at `pos`. Returns the byte length consumed and the raw
/// label between the brackets, trimmed.
pub(crate) fn scan_link_label(s: &str, pos: usize) -> Option<(usize, &str)> {
    let bytes = s.as_bytes();
    if bytes.get(pos) != Some(&b'[') {
        return None;
    }
    let mut i = pos + 1;
    let mut length = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => return None,
            b']' => {
                let raw = s[pos + 1..i].trim_matches(|c: char| c.is_ascii() && scanners::is_space(c as u8));
                return Some((i + 1 - pos, raw));
            }
            b'\\' => {
                i += 1;
                length += 1;
                if bytes.get(i).is_some_and(u8::is_ascii_punctuation) {
                    i += 1;
                    length += 1;
                }
            }
            _ => {
                i += 1;
                length += 1;
            }
        }
        if length > MAX_LINK_LABEL_LENGTH {
            return None;
        }
    }
    None
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|&c| scanners::is_space_or_tab(c)) {
        i += 1;
    }
    i
}

/// Spaces, at most one line ending, then spaces.
fn skip_spnl(bytes: &[u8], i: usize) -> usize {
    let mut i = skip_spaces(bytes, i);
    if bytes.get(i) == Some(&b'\r') {
        i += 1;
    }
    if bytes.get(i) == Some(&b'\n') {
        i += 1;
    }
    skip_spaces(bytes, i)
}

/// The line ends here (or the input does); returns the index after it.
fn skip_line_end(bytes: &[u8], mut i: usize) -> Option<usize> {
    let start = i;
    if bytes.get(i) == Some(&b'\r') {
        i += 1;
    }
    if bytes.get(i) == Some(&b'\n') {
        i += 1;
    }
    (i > start || i >= bytes.len()).then_some(i)
}

/// Try to parse one reference definition at the start of `s`.
///
/// Returns the number of bytes consumed and the parsed definition.
pub(crate) fn parse_reference_definition(s: &str) -> Option<(usize, String, Reference)> {
    let bytes = s.as_bytes();

    // Label, then a colon
    let (label_len, label) = scan_link_label(s, 0)?;
    if label.is_empty() || normalize_label(label).is_empty() {
        return None;
    }
    let mut i = label_len;
    if bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;

    // Destination
    i = skip_spnl(bytes, i);
    let (dest_len, dest) = scan_link_destination(s, i)?;
    let angle = bytes.get(i) == Some(&b'<');
    if dest_len == 0 && !angle {
        return None;
    }
    i += dest_len;

    // Optional title, separated from the destination by whitespace
    let before_title = i;
    let title_start = skip_spnl(bytes, i);
    let mut title = "";
    if title_start != before_title
        && let Some(title_len) = scanners::link_title(bytes, title_start)
    {
        title = &s[title_start..title_start + title_len];
        i = title_start + title_len;
    }

    // Only spaces may follow on the same line
    let end = match skip_line_end(bytes, skip_spaces(bytes, i)) {
        Some(end) => end,
        None if !title.is_empty() => {
            // A bad title may still leave a definition without one
            title = "";
            skip_line_end(bytes, skip_spaces(bytes, before_title))?
        }
        None => return None,
    };

    let reference = Reference {
        url: clean_url(dest),
        title: clean_title(title),
    };
    Some((end, label.to_string(), reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Foo \n  BAR "), "foo bar");
        assert_eq!(normalize_label("ẞ"), normalize_label("ss"));
    }

    #[test]
    fn test_first_definition_wins() {
        let mut map = RefMap::new();
        let first = Reference {
            url: "/first".into(),
            title: String::new(),
        };
        let second = Reference {
            url: "/second".into(),
            title: String::new(),
        };
        assert!(map.insert("Foo", first.clone()));
        assert!(!map.insert("FOO", second));
        assert_eq!(map.lookup("foo"), Some(first));
    }

    #[test]
    fn test_parse_reference_definition() {
        let (len, label, reference) =
            parse_reference_definition("[foo]: /url \"title\"\nrest").unwrap();
        assert_eq!(len, 20);
        assert_eq!(label, "foo");
        assert_eq!(reference.url, "/url");
        assert_eq!(reference.title, "title");
    }

    #[test]
    fn test_reference_title_on_next_line() {
        let (_, _, reference) = parse_reference_definition("[foo]:\n<my url>\n'the title'\n").unwrap();
        assert_eq!(reference.url, "my url");
        assert_eq!(reference.title, "the title");
    }

    #[test]
    fn test_reference_with_trailing_garbage_is_rejected() {
        assert!(parse_reference_definition("[foo]: /url \"title\" ok\n").is_none());
        // The title belongs to the next line, so the definition stands alone
        let (len, _, reference) = parse_reference_definition("[foo]: /url\n\"title\" ok\n").unwrap();
        assert_eq!(len, 12);
        assert_eq!(reference.title, "");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\*b &amp; \q"), r"a*b & \q");
    }
}
