//! HTML output
use super::Renderer;
use crate::ast::{ListType, NodeValue};
use crate::document::Document;
use indextree::NodeId;
use std::collections::HashMap;
use std::fmt::Write;

const RAW_HTML_OMITTED: &str = "<!-- raw HTML omitted -->";

/// Escape `&`, `<`, `>` and `"`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Bytes that stay as they are inside an `href`.
fn is_href_safe(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"-_.+!*(),%#@?=;:/$~".contains(&c)
}

/// Percent-encode a URL for an attribute, keeping reserved characters.
pub fn escape_href(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for &c in url.as_bytes() {
        match c {
            _ if is_href_safe(c) => out.push(char::from(c)),
            b'&' => out.push_str("&amp;"),
            b'\'' => out.push_str("&#x27;"),
            _ => {
                let _ = write!(out, "%{c:02X}");
            }
        }
    }
    out
}

/// `javascript:`, `vbscript:`, `file:` and non-image `data:` URLs.
pub fn is_dangerous_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    if lower.starts_with("data:") {
        return !["png", "gif", "jpeg", "webp"]
            .iter()
            .any(|ty| lower["data:".len()..].starts_with(&format!("image/{ty}")));
    }
    ["javascript:", "vbscript:", "file:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// ` data-sourcepos="l:c-l:c"` when source positions are requested.
pub fn write_sourcepos(r: &mut Renderer<'_>, node: NodeId) {
    if r.options().sourcepos {
        let pos = r.node(node).sourcepos;
        r.write_raw(&format!(" data-sourcepos=\"{pos}\""));
    }
}

/// Highest reference index per footnote number.
pub(crate) fn count_footnote_refs(doc: &Document) -> HashMap<usize, usize> {
    let mut counts = HashMap::new();
    for id in doc.root().descendants(doc.arena()) {
        if let NodeValue::FootnoteReference(r) = &doc.get(id).value {
            let count = counts.entry(r.ix).or_insert(0);
            *count = (*count).max(r.ref_ix);
        }
    }
    counts
}

/// Inside an image only text reaches the `alt` attribute. Returns true
/// when the event was consumed.
pub(crate) fn render_plain(r: &mut Renderer<'_>, node: NodeId, _entering: bool) -> bool {
    let Some(plain) = r.plain else {
        return false;
    };
    if plain == node {
        r.plain = None;
        return false;
    }
    match r.value(node) {
        NodeValue::Text(s) | NodeValue::Code(s) | NodeValue::HtmlInline(s) => {
            let escaped = escape_html(s);
            r.write_raw(&escaped);
        }
        NodeValue::LineBreak | NodeValue::SoftBreak => r.write_raw(" "),
        _ => {}
    }
    true
}

/// Raw HTML as written, filtered, or replaced by a placeholder in safe mode.
fn write_raw_html(r: &mut Renderer<'_>, literal: &str) {
    if !r.options().unsafe_ {
        r.write_raw(RAW_HTML_OMITTED);
        return;
    }
    match r.registry().filter_html(r.parse_options(), literal) {
        Some(filtered) => r.write_raw(&filtered),
        None => r.write_raw(literal),
    }
}

fn write_link_target(r: &mut Renderer<'_>, url: &str) {
    if r.options().unsafe_ || !is_dangerous_url(url) {
        let escaped = escape_href(url);
        r.write_raw(&escaped);
    }
}

/// Back links from a footnote to its references. Only the first call per
/// footnote writes anything.
fn write_footnote_backrefs(r: &mut Renderer<'_>, label: &str) -> bool {
    if r.written_footnote_ix >= r.footnote_ix {
        return false;
    }
    r.written_footnote_ix = r.footnote_ix;
    let ix = r.footnote_ix;
    let href = escape_href(label);
    r.write_raw(&format!(
        "<a href=\"#fnref-{href}\" class=\"footnote-backref\" data-footnote-backref \
         data-footnote-backref-idx=\"{ix}\" aria-label=\"Back to reference {ix}\">\u{21a9}</a>"
    ));
    let refs = r.footnote_refs.get(&ix).copied().unwrap_or(1);
    for n in 2..=refs {
        r.write_raw(&format!(
            " <a href=\"#fnref-{href}-{n}\" class=\"footnote-backref\" data-footnote-backref \
             data-footnote-backref-idx=\"{ix}-{n}\" aria-label=\"Back to reference {ix}-{n}\">\
             \u{21a9}<sup class=\"footnote-ref\">{n}</sup></a>"
        ));
    }
    true
}

fn in_tight_list(r: &Renderer<'_>, node: NodeId) -> bool {
    let arena = r.arena();
    arena[node]
        .parent()
        .and_then(|item| arena[item].parent())
        .is_some_and(|list| matches!(arena[list].get().value, NodeValue::List(l) if l.tight))
}

pub(crate) fn render_node(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> Option<bool> {
    match r.value(node) {
        NodeValue::Document => {
            if !entering && r.footnote_ix > 0 {
                r.write_raw("</ol>\n</section>\n");
            }
        }
        NodeValue::BlockQuote => {
            r.html_cr();
            if entering {
                r.write_raw("<blockquote");
                write_sourcepos(r, node);
                r.write_raw(">\n");
            } else {
                r.write_raw("</blockquote>\n");
            }
        }
        NodeValue::List(list) => {
            let ordered = list.list_type == ListType::Ordered;
            if entering {
                r.html_cr();
                match (ordered, list.start) {
                    (false, _) => r.write_raw("<ul"),
                    (true, 1) => r.write_raw("<ol"),
                    (true, start) => r.write_raw(&format!("<ol start=\"{start}\"")),
                }
                write_sourcepos(r, node);
                r.write_raw(">\n");
            } else {
                r.write_raw(if ordered { "</ol>\n" } else { "</ul>\n" });
            }
        }
        NodeValue::Item(_) => {
            if entering {
                r.html_cr();
                r.write_raw("<li");
                write_sourcepos(r, node);
                r.write_raw(">");
            } else {
                r.write_raw("</li>\n");
            }
        }
        NodeValue::Heading(heading) => {
            let level = heading.level;
            if entering {
                r.html_cr();
                r.write_raw(&format!("<h{level}"));
                write_sourcepos(r, node);
                r.write_raw(">");
            } else {
                r.write_raw(&format!("</h{level}>\n"));
            }
        }
        NodeValue::CodeBlock(cb) => {
            r.html_cr();
            r.write_raw("<pre");
            write_sourcepos(r, node);
            let lang = cb.info.split([' ', '\t']).next().unwrap_or_default();
            if lang.is_empty() {
                r.write_raw("><code>");
            } else {
                r.write_raw(&format!("><code class=\"language-{}\">", escape_html(lang)));
            }
            let literal = escape_html(&cb.literal);
            r.write_raw(&literal);
            r.write_raw("</code></pre>\n");
        }
        NodeValue::HtmlBlock(hb) => {
            r.html_cr();
            write_raw_html(r, &hb.literal);
            r.html_cr();
        }
        NodeValue::ThematicBreak => {
            r.html_cr();
            r.write_raw("<hr");
            write_sourcepos(r, node);
            r.write_raw(" />\n");
        }
        NodeValue::Paragraph => {
            if !in_tight_list(r, node) {
                if entering {
                    r.html_cr();
                    r.write_raw("<p");
                    write_sourcepos(r, node);
                    r.write_raw(">");
                } else {
                    let arena = r.arena();
                    if let Some(parent) = arena[node].parent()
                        && let NodeValue::FootnoteDefinition(def) = &arena[parent].get().value
                        && arena[node].next_sibling().is_none()
                    {
                        r.write_raw(" ");
                        write_footnote_backrefs(r, &def.label);
                    }
                    r.write_raw("</p>\n");
                }
            }
        }
        NodeValue::FootnoteDefinition(def) => {
            if entering {
                if r.footnote_ix == 0 {
                    r.html_cr();
                    r.write_raw("<section class=\"footnotes\" data-footnotes>\n<ol>\n");
                }
                r.footnote_ix += 1;
                r.write_raw(&format!("<li id=\"fn-{}\">\n", escape_href(&def.label)));
            } else {
                if write_footnote_backrefs(r, &def.label) {
                    r.write_raw("\n");
                }
                r.write_raw("</li>\n");
            }
        }
        NodeValue::Text(text) => {
            let escaped = escape_html(text);
            r.write_raw(&escaped);
        }
        NodeValue::LineBreak => r.write_raw("<br />\n"),
        NodeValue::SoftBreak => {
            if r.options().hardbreaks {
                r.write_raw("<br />\n");
            } else if r.options().nobreaks {
                r.write_raw(" ");
            } else {
                r.write_raw("\n");
            }
        }
        NodeValue::Code(code) => {
            r.write_raw("<code>");
            let escaped = escape_html(code);
            r.write_raw(&escaped);
            r.write_raw("</code>");
        }
        NodeValue::HtmlInline(html) => write_raw_html(r, html),
        NodeValue::Emph => r.write_raw(if entering { "<em>" } else { "</em>" }),
        NodeValue::Strong => r.write_raw(if entering { "<strong>" } else { "</strong>" }),
        NodeValue::Link(link) => {
            if entering {
                r.write_raw("<a href=\"");
                write_link_target(r, &link.url);
                r.write_raw("\"");
                if !link.title.is_empty() {
                    r.write_raw(&format!(" title=\"{}\"", escape_html(&link.title)));
                }
                r.write_raw(">");
            } else {
                r.write_raw("</a>");
            }
        }
        NodeValue::Image(link) => {
            if entering {
                r.write_raw("<img src=\"");
                write_link_target(r, &link.url);
                r.write_raw("\" alt=\"");
                r.plain = Some(node);
            } else {
                r.write_raw("\"");
                if !link.title.is_empty() {
                    r.write_raw(&format!(" title=\"{}\"", escape_html(&link.title)));
                }
                r.write_raw(" />");
            }
        }
        NodeValue::FootnoteReference(fref) => {
            let href = escape_href(&fref.label);
            let suffix = if fref.ref_ix > 1 {
                format!("-{}", fref.ref_ix)
            } else {
                String::new()
            };
            r.write_raw(&format!(
                "<sup class=\"footnote-ref\"><a href=\"#fn-{href}\" id=\"fnref-{href}{suffix}\" \
                 data-footnote-ref>{}</a></sup>",
                fref.ix
            ));
        }
        _ => return None,
    }
    Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Options, Parser, RenderOptions};
    use crate::options::Format;
    use pretty_assertions::assert_eq;

    fn html(md: &str, options: Options) -> String {
        let mut parser = Parser::new(options);
        parser.feed(md);
        parser.finish().to_html()
    }

    #[test]
    fn test_escape_href() {
        assert_eq!(escape_href("/a b?x=1&y='2'"), "/a%20b?x=1&amp;y=&#x27;2&#x27;");
        assert_eq!(escape_href("ö"), "%C3%B6");
        assert_eq!(escape_href("[x]"), "%5Bx%5D");
    }

    #[test]
    fn test_dangerous_urls() {
        assert!(is_dangerous_url("javascript:alert(1)"));
        assert!(is_dangerous_url("JAVASCRIPT:alert(1)"));
        assert!(is_dangerous_url("data:text/html;base64,xx"));
        assert!(!is_dangerous_url("data:image/png;base64,xx"));
        assert!(!is_dangerous_url("https://example.com"));
    }

    #[test]
    fn test_safe_mode_blanks_dangerous_links() {
        assert_eq!(
            html("[a](javascript:alert(1))\n", Options::empty()),
            "<p><a href=\"\">a</a></p>\n"
        );
        assert_eq!(
            html("[a](javascript:alert(1))\n", Options::UNSAFE),
            "<p><a href=\"javascript:alert(1)\">a</a></p>\n"
        );
    }

    #[test]
    fn test_raw_html_placeholder() {
        assert_eq!(
            html("<div>\nhi\n</div>\n", Options::empty()),
            "<!-- raw HTML omitted -->\n"
        );
        assert_eq!(html("a <b>c</b>\n", Options::empty()), "<p>a <!-- raw HTML omitted -->c<!-- raw HTML omitted --></p>\n");
    }

    #[test]
    fn test_image_alt_is_plain_text() {
        assert_eq!(
            html("![foo *bar* `x`](/u \"t\")\n", Options::empty()),
            "<p><img src=\"/u\" alt=\"foo bar x\" title=\"t\" /></p>\n"
        );
    }

    #[test]
    fn test_code_block_language_class() {
        assert_eq!(
            html("```rust extra\nfn main() {}\n```\n", Options::empty()),
            "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>\n"
        );
    }

    #[test]
    fn test_ordered_list_start() {
        assert_eq!(
            html("3. a\n4. b\n", Options::empty()),
            "<ol start=\"3\">\n<li>a</li>\n<li>b</li>\n</ol>\n"
        );
    }

    #[test]
    fn test_sourcepos_attributes() {
        assert_eq!(
            html("# Hi\n\n> q\n", Options::SOURCEPOS),
            "<h1 data-sourcepos=\"1:1-1:4\">Hi</h1>\n\
             <blockquote data-sourcepos=\"3:1-3:3\">\n<p data-sourcepos=\"3:3-3:3\">q</p>\n</blockquote>\n"
        );
    }

    #[test]
    fn test_footnotes_section() {
        let out = html("a[^1] b[^1]\n\n[^1]: note\n", Options::FOOTNOTES);
        assert_eq!(
            out,
            "<p>a<sup class=\"footnote-ref\"><a href=\"#fn-1\" id=\"fnref-1\" data-footnote-ref>1</a></sup> \
             b<sup class=\"footnote-ref\"><a href=\"#fn-1\" id=\"fnref-1-2\" data-footnote-ref>1</a></sup></p>\n\
             <section class=\"footnotes\" data-footnotes>\n<ol>\n<li id=\"fn-1\">\n\
             <p>note <a href=\"#fnref-1\" class=\"footnote-backref\" data-footnote-backref \
             data-footnote-backref-idx=\"1\" aria-label=\"Back to reference 1\">\u{21a9}</a> \
             <a href=\"#fnref-1-2\" class=\"footnote-backref\" data-footnote-backref \
             data-footnote-backref-idx=\"1-2\" aria-label=\"Back to reference 1-2\">\u{21a9}<sup class=\"footnote-ref\">2</sup></a></p>\n\
             </li>\n</ol>\n</section>\n"
        );
    }

    #[test]
    fn test_softbreak_modes() {
        let mut parser = Parser::new(Options::empty());
        parser.feed("a\nb\n");
        let doc = parser.finish();
        let base = RenderOptions::default();
        assert_eq!(doc.render(Format::Html, &base), "<p>a\nb</p>\n");
        assert_eq!(
            doc.render(Format::Html, &base.clone().with_hardbreaks(true)),
            "<p>a<br />\nb</p>\n"
        );
        assert_eq!(doc.render(Format::Html, &base.with_nobreaks(true)), "<p>a b</p>\n");
    }
}
