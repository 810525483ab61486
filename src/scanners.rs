//! Byte-level scanners for block starts, raw HTML, autolinks and titles
//!
//! Every scanner takes the subject bytes and a start index and returns the
//! number of bytes matched, or `None`.

/// Block-level HTML tag names for start condition 6.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption", "center",
    "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link", "main", "menu",
    "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param", "search", "section",
    "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "track", "ul",
];

/// Tags whose content is raw text (start condition 1).
const RAW_TAGS: &[&str] = &["script", "pre", "style", "textarea"];

#[inline]
pub(crate) fn is_space_or_tab(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

#[inline]
pub(crate) fn is_line_end(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

/// Whitespace as the reference grammar's `spacechar`.
#[inline]
pub(crate) fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

#[inline]
fn at(s: &[u8], i: usize) -> u8 {
    s.get(i).copied().unwrap_or(0)
}

/// Case-insensitive ASCII prefix test.
fn starts_with_ci(s: &[u8], pos: usize, prefix: &str) -> bool {
    s.len() >= pos + prefix.len() && s[pos..pos + prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Case-insensitive ASCII substring search.
fn contains_ci(s: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    s.windows(needle.len()).any(|w| w.eq_ignore_ascii_case(needle))
}

/// Count of `spacechar`s starting at `pos`.
pub(crate) fn spacechars(s: &[u8], pos: usize) -> usize {
    s[pos.min(s.len())..].iter().take_while(|&&c| is_space(c)).count()
}

/// `#{1,6}` followed by spaces/tabs or the line end. Returns the matched
/// length (including trailing blanks) and the heading level.
pub(crate) fn atx_heading_start(s: &[u8], pos: usize) -> Option<(usize, u8)> {
    let level = s[pos.min(s.len())..].iter().take_while(|&&c| c == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let after = pos + level;
    match at(s, after) {
        b' ' | b'\t' => {
            let blanks = s[after..].iter().take_while(|&&c| is_space_or_tab(c)).count();
            Some((level + blanks, level as u8))
        }
        b'\n' | b'\r' => Some((level + 1, level as u8)),
        _ => None,
    }
}

/// A setext underline: `=+` gives level 1, `-+` level 2.
pub(crate) fn setext_heading_line(s: &[u8], pos: usize) -> Option<u8> {
    let c = at(s, pos);
    let level = match c {
        b'=' => 1,
        b'-' => 2,
        _ => return None,
    };
    let mut i = pos;
    while at(s, i) == c {
        i += 1;
    }
    while is_space_or_tab(at(s, i)) {
        i += 1;
    }
    is_line_end(at(s, i)).then_some(level)
}

/// Opening code fence; returns the fence length.
pub(crate) fn open_code_fence(s: &[u8], pos: usize) -> Option<usize> {
    let c = at(s, pos);
    if c != b'`' && c != b'~' {
        return None;
    }
    let len = s[pos..].iter().take_while(|&&b| b == c).count();
    if len < 3 {
        return None;
    }
    // Backtick fences cannot carry a backtick in their info string
    if c == b'`' && s[pos + len..].contains(&b'`') {
        return None;
    }
    Some(len)
}

/// Closing code fence; returns the fence length.
pub(crate) fn close_code_fence(s: &[u8], pos: usize) -> Option<usize> {
    let c = at(s, pos);
    if c != b'`' && c != b'~' {
        return None;
    }
    let len = s[pos..].iter().take_while(|&&b| b == c).count();
    if len < 3 {
        return None;
    }
    let mut i = pos + len;
    while is_space_or_tab(at(s, i)) {
        i += 1;
    }
    (is_line_end(at(s, i)) || i >= s.len()).then_some(len)
}

/// HTML block start conditions 1 to 6, with `pos` at `<`.
pub(crate) fn html_block_start(s: &[u8], pos: usize) -> Option<u8> {
    if at(s, pos) != b'<' {
        return None;
    }
    let i = pos + 1;

    if let Some(tag) = RAW_TAGS.iter().find(|t| starts_with_ci(s, i, t)) {
        let next = at(s, i + tag.len());
        if is_space(next) || next == b'>' || next == 0 {
            return Some(1);
        }
    }
    if s[i..].starts_with(b"!--") {
        return Some(2);
    }
    if at(s, i) == b'?' {
        return Some(3);
    }
    if at(s, i) == b'!' && at(s, i + 1).is_ascii_alphabetic() {
        return Some(4);
    }
    if s[i..].starts_with(b"![CDATA[") {
        return Some(5);
    }

    let name_start = if at(s, i) == b'/' { i + 1 } else { i };
    let name_len = s[name_start..]
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric())
        .count();
    if name_len > 0 {
        let name = &s[name_start..name_start + name_len];
        if BLOCK_TAGS.iter().any(|t| name.eq_ignore_ascii_case(t.as_bytes())) {
            let next = name_start + name_len;
            let c = at(s, next);
            if is_space(c) || c == b'>' || c == 0 || (c == b'/' && at(s, next + 1) == b'>') {
                return Some(6);
            }
        }
    }
    None
}

/// HTML block start condition 7: a complete tag alone on its line.
pub(crate) fn html_block_start_7(s: &[u8], pos: usize) -> Option<u8> {
    if at(s, pos) != b'<' {
        return None;
    }
    let end = if at(s, pos + 1) == b'/' {
        closing_tag(s, pos + 2)?
    } else {
        open_tag(s, pos + 1)?
    };
    let mut i = end;
    while is_space_or_tab(at(s, i)) {
        i += 1;
    }
    is_line_end(at(s, i)).then_some(7)
}

/// Whether the rest of the line closes an HTML block of `kind`.
pub(crate) fn html_block_end(kind: u8, s: &[u8], pos: usize) -> bool {
    let rest = &s[pos.min(s.len())..];
    match kind {
        1 => RAW_TAGS
            .iter()
            .any(|t| contains_ci(rest, &format!("</{}>", t))),
        2 => memchr::memmem::find(rest, b"-->").is_some(),
        3 => memchr::memmem::find(rest, b"?>").is_some(),
        4 => rest.contains(&b'>'),
        5 => memchr::memmem::find(rest, b"]]>").is_some(),
        _ => false,
    }
}

/// Tag name: `[A-Za-z][A-Za-z0-9-]*`. Returns the end index.
fn tag_name(s: &[u8], i: usize) -> Option<usize> {
    if !at(s, i).is_ascii_alphabetic() {
        return None;
    }
    let len = s[i..]
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == b'-')
        .count();
    Some(i + len)
}

fn skip_spaces(s: &[u8], i: usize) -> usize {
    i + spacechars(s, i)
}

/// Attribute name plus optional value, starting at the name.
fn attribute(s: &[u8], i: usize) -> Option<usize> {
    let c = at(s, i);
    if !(c.is_ascii_alphabetic() || c == b'_' || c == b':') {
        return None;
    }
    let mut end = i + 1;
    while matches!(at(s, end), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'.' | b':' | b'-') {
        end += 1;
    }

    let eq = skip_spaces(s, end);
    if at(s, eq) != b'=' {
        return Some(end);
    }
    let v = skip_spaces(s, eq + 1);
    match at(s, v) {
        q @ (b'"' | b'\'') => {
            let close = s[v + 1..].iter().position(|&c| c == q)?;
            Some(v + 1 + close + 1)
        }
        _ => {
            let len = s[v..]
                .iter()
                .take_while(|&&c| !matches!(c, b'"' | b'\'' | b'=' | b'<' | b'>' | b'`' | 0..=b' '))
                .count();
            (len > 0).then_some(v + len)
        }
    }
}

/// Open tag body with `i` just past `<`. Returns the index after `>`.
fn open_tag(s: &[u8], i: usize) -> Option<usize> {
    let mut j = tag_name(s, i)?;
    loop {
        let k = skip_spaces(s, j);
        if k == j {
            break;
        }
        match attribute(s, k) {
            Some(end) => j = end,
            None => {
                j = k;
                break;
            }
        }
    }
    if at(s, j) == b'/' {
        j += 1;
    }
    (at(s, j) == b'>').then_some(j + 1)
}

/// Closing tag body with `i` just past `</`.
fn closing_tag(s: &[u8], i: usize) -> Option<usize> {
    let j = skip_spaces(s, tag_name(s, i)?);
    (at(s, j) == b'>').then_some(j + 1)
}

/// Inline raw HTML with `pos` just past `<`. Returns the matched length.
pub(crate) fn html_tag(s: &[u8], pos: usize) -> Option<usize> {
    let end = match at(s, pos) {
        b'/' => closing_tag(s, pos + 1)?,
        b'?' => {
            let close = memchr::memmem::find(&s[pos + 1..], b"?>")?;
            pos + 1 + close + 2
        }
        b'!' => {
            let rest = &s[pos + 1..];
            if rest.starts_with(b"--") {
                if rest[2..].starts_with(b">") {
                    pos + 4
                } else if rest[2..].starts_with(b"->") {
                    pos + 5
                } else {
                    let close = memchr::memmem::find(&rest[2..], b"-->")?;
                    pos + 3 + close + 3
                }
            } else if rest.starts_with(b"[CDATA[") {
                let close = memchr::memmem::find(&rest[7..], b"]]>")?;
                pos + 8 + close + 3
            } else if at(rest, 0).is_ascii_alphabetic() {
                let close = rest.iter().position(|&c| c == b'>')?;
                pos + 1 + close + 1
            } else {
                return None;
            }
        }
        _ => open_tag(s, pos)?,
    };
    Some(end - pos)
}

/// `<scheme:rest>` with `pos` just past `<`; the length includes `>`.
pub(crate) fn autolink_uri(s: &[u8], pos: usize) -> Option<usize> {
    if !at(s, pos).is_ascii_alphabetic() {
        return None;
    }
    let scheme_len = s[pos..]
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, b'+' | b'.' | b'-'))
        .count();
    if !(2..=32).contains(&scheme_len) || at(s, pos + scheme_len) != b':' {
        return None;
    }
    let mut i = pos + scheme_len + 1;
    loop {
        match at(s, i) {
            b'>' => return Some(i + 1 - pos),
            b'<' | 0..=b' ' => return None,
            _ => i += 1,
        }
        if i >= s.len() {
            return None;
        }
    }
}

/// `<local@domain>` with `pos` just past `<`; the length includes `>`.
pub(crate) fn autolink_email(s: &[u8], pos: usize) -> Option<usize> {
    const LOCAL_PUNCT: &[u8] = b".!#$%&'*+/=?^_`{|}~-";
    let local = s[pos.min(s.len())..]
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || LOCAL_PUNCT.contains(c))
        .count();
    if local == 0 || at(s, pos + local) != b'@' {
        return None;
    }
    let mut i = pos + local + 1;
    loop {
        // One domain label: alphanumeric ends, hyphens inside, at most 63 bytes
        let label = s[i.min(s.len())..]
            .iter()
            .take_while(|c| c.is_ascii_alphanumeric() || **c == b'-')
            .count();
        if label == 0 || label > 63 || s[i] == b'-' || s[i + label - 1] == b'-' {
            return None;
        }
        i += label;
        match at(s, i) {
            b'.' => i += 1,
            b'>' => return Some(i + 1 - pos),
            _ => return None,
        }
    }
}

/// Link title in `"…"`, `'…'` or `(…)`; the length includes delimiters.
pub(crate) fn link_title(s: &[u8], pos: usize) -> Option<usize> {
    let close = match at(s, pos) {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut i = pos + 1;
    while i < s.len() {
        let c = s[i];
        if c == b'\\' && at(s, i + 1).is_ascii_punctuation() {
            i += 2;
            continue;
        }
        if c == close {
            return Some(i + 1 - pos);
        }
        if close == b')' && c == b'(' {
            return None;
        }
        i += 1;
    }
    None
}

/// Footnote definition start `[^label]:` plus trailing blanks.
pub(crate) fn footnote_definition(s: &[u8], pos: usize) -> Option<usize> {
    if !s[pos.min(s.len())..].starts_with(b"[^") {
        return None;
    }
    let label = s[pos + 2..]
        .iter()
        .take_while(|&&c| !matches!(c, b']' | b' ' | b'\t' | b'\r' | b'\n' | 0))
        .count();
    if label == 0 {
        return None;
    }
    let mut i = pos + 2 + label;
    if at(s, i) != b']' || at(s, i + 1) != b':' {
        return None;
    }
    i += 2;
    while is_space_or_tab(at(s, i)) {
        i += 1;
    }
    Some(i - pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atx_heading_start() {
        assert_eq!(atx_heading_start(b"## foo\n", 0), Some((3, 2)));
        assert_eq!(atx_heading_start(b"#\n", 0), Some((2, 1)));
        assert_eq!(atx_heading_start(b"####### foo\n", 0), None);
        assert_eq!(atx_heading_start(b"#5 bolt\n", 0), None);
    }

    #[test]
    fn test_code_fences() {
        assert_eq!(open_code_fence(b"```rust\n", 0), Some(3));
        assert_eq!(open_code_fence(b"``` a`b\n", 0), None);
        assert_eq!(open_code_fence(b"~~~~ a`b\n", 0), Some(4));
        assert_eq!(close_code_fence(b"````  \n", 0), Some(4));
        assert_eq!(close_code_fence(b"``` x\n", 0), None);
    }

    #[test]
    fn test_html_block_starts() {
        assert_eq!(html_block_start(b"<script>\n", 0), Some(1));
        assert_eq!(html_block_start(b"<!-- c\n", 0), Some(2));
        assert_eq!(html_block_start(b"<?php\n", 0), Some(3));
        assert_eq!(html_block_start(b"<!DOCTYPE html>\n", 0), Some(4));
        assert_eq!(html_block_start(b"<![CDATA[\n", 0), Some(5));
        assert_eq!(html_block_start(b"<DIV class=\"x\">\n", 0), Some(6));
        assert_eq!(html_block_start(b"<span>\n", 0), None);
        assert_eq!(html_block_start_7(b"<span class=\"x\">  \n", 0), Some(7));
        assert_eq!(html_block_start_7(b"<span> text\n", 0), None);
    }

    #[test]
    fn test_html_tag() {
        assert_eq!(html_tag(b"<a href='x'>", 1), Some(11));
        assert_eq!(html_tag(b"</a >", 1), Some(4));
        assert_eq!(html_tag(b"<!-- x -->", 1), Some(9));
        assert_eq!(html_tag(b"<!-->", 1), Some(4));
        assert_eq!(html_tag(b"<a h=\"x>", 1), None);
        assert_eq!(html_tag(b"<33>", 1), None);
    }

    #[test]
    fn test_autolinks() {
        assert_eq!(autolink_uri(b"<http://a.b>", 1), Some(11));
        assert_eq!(autolink_uri(b"<m:abc>", 1), None);
        assert_eq!(autolink_uri(b"<http://a b>", 1), None);
        assert_eq!(autolink_email(b"<foo@bar.example.com>", 1), Some(20));
        assert_eq!(autolink_email(b"<foo@-bar.com>", 1), None);
    }

    #[test]
    fn test_link_title() {
        assert_eq!(link_title(b"\"a \\\" b\"", 0), Some(8));
        assert_eq!(link_title(b"(a (b))", 0), None);
        assert_eq!(link_title(b"'open", 0), None);
    }

    #[test]
    fn test_footnote_definition() {
        assert_eq!(footnote_definition(b"[^note]: text\n", 0), Some(9));
        assert_eq!(footnote_definition(b"[^no te]: text\n", 0), None);
    }
}
