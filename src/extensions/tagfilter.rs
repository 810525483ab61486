//! Disarm raw HTML tags that change how the rest of a page is parsed
use super::Extension;
use crate::options::Options;

const FILTERED_TAGS: [&str; 9] = [
    "title",
    "textarea",
    "style",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "script",
    "plaintext",
];

pub fn extension() -> Extension {
    Extension::new("tagfilter", Options::TAGFILTER).with_html_filter(filter)
}

/// Whether the tag starting at `html[0] == b'<'` is one to disarm. The
/// name must be followed by whitespace, `>` or `/>`.
fn is_filtered(html: &[u8]) -> bool {
    let mut i = 1;
    if html.get(i) == Some(&b'/') {
        i += 1;
    }
    FILTERED_TAGS.iter().any(|tag| {
        let end = i + tag.len();
        let Some(name) = html.get(i..end) else {
            return false;
        };
        if !name.eq_ignore_ascii_case(tag.as_bytes()) {
            return false;
        }
        match html.get(end) {
            Some(c) if c.is_ascii_whitespace() || *c == b'>' => true,
            Some(b'/') => html.get(end + 1) == Some(&b'>'),
            _ => false,
        }
    })
}

/// Replace the `<` of every filtered tag with `&lt;`.
fn filter(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for i in memchr::memchr_iter(b'<', bytes) {
        if is_filtered(&bytes[i..]) {
            out.push_str(&html[last..i]);
            out.push_str("&lt;");
            last = i + 1;
        }
    }
    out.push_str(&html[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Parser, RenderOptions};
    use crate::options::Format;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter_tags() {
        assert_eq!(filter("<script>"), "&lt;script>");
        assert_eq!(filter("</SCRIPT >"), "&lt;/SCRIPT >");
        assert_eq!(filter("<xmp/>"), "&lt;xmp/>");
        assert_eq!(filter("<scripts>"), "<scripts>");
        assert_eq!(filter("<em><title>"), "<em>&lt;title>");
    }

    #[test]
    fn test_only_unsafe_html_output_is_filtered() {
        let mut parser = Parser::new(Options::TAGFILTER);
        parser.feed("<strong> <title> <style> <em>\n\n<xmp>\n");
        let doc = parser.finish();
        assert_eq!(
            doc.render(Format::Html, &RenderOptions::default().with_unsafe(true)),
            "<p><strong> &lt;title> &lt;style> <em></p>\n&lt;xmp>\n"
        );
        assert_eq!(
            doc.render(Format::Html, &RenderOptions::default()),
            "<p><!-- raw HTML omitted --> <!-- raw HTML omitted --> <!-- raw HTML omitted --> \
             <!-- raw HTML omitted --></p>\n<!-- raw HTML omitted -->\n"
        );
    }
}
