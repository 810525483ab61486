//! Escape raw HTML tags that are not on a fixed allow-list
use super::Extension;
use crate::options::Options;

const ALLOWED_TAGS: [&str; 51] = [
    "template", "h1", "h2", "h3", "h4", "h5", "h6", "h7", "h8", "br", "b", "i", "strong", "em", "a", "pre",
    "code", "img", "tt", "div", "ins", "del", "sup", "sub", "p", "ol", "ul", "table", "thead", "tbody",
    "tfoot", "blockquote", "dl", "dt", "dd", "kbd", "q", "samp", "var", "hr", "ruby", "rt", "rp", "li", "tr",
    "td", "th", "s", "strike", "summary", "details",
];

pub fn extension() -> Extension {
    Extension::new("whitelist", Options::TAGWHITELIST).with_html_filter(filter)
}

/// Whether the tag at `html[0] == b'<'` is an opening or closing allowed
/// tag. Names match case-sensitively and must end in whitespace or `>`.
fn is_allowed(html: &[u8]) -> bool {
    let start = if html.get(1) == Some(&b'/') { 2 } else { 1 };
    ALLOWED_TAGS.iter().any(|tag| {
        let end = start + tag.len();
        html.get(start..end) == Some(tag.as_bytes())
            && html.get(end).is_some_and(|&c| c.is_ascii_whitespace() || c == b'>')
    })
}

/// Replace the `<` of every tag not on the list with `&lt;`.
fn filter(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for i in memchr::memchr_iter(b'<', bytes) {
        if !is_allowed(&bytes[i..]) {
            out.push_str(&html[last..i]);
            out.push_str("&lt;");
            last = i + 1;
        }
    }
    out.push_str(&html[last..]);
    out
}
