//! Plain text output: the document's words with block structure kept as
//! line breaks and indentation, and all markup dropped.
use super::commonmark::list_marker;
use super::{Escaping, Renderer};
use crate::ast::NodeValue;
use indextree::NodeId;

fn allow_wrap(r: &Renderer<'_>) -> bool {
    let opts = r.options();
    opts.width > 0 && !opts.nobreaks && !opts.hardbreaks
}

pub(crate) fn render_node(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> Option<bool> {
    let allow_wrap = allow_wrap(r);

    match r.value(node) {
        NodeValue::Document
        | NodeValue::List(_)
        | NodeValue::HtmlBlock(_)
        | NodeValue::HtmlInline(_)
        | NodeValue::Strong
        | NodeValue::Emph
        | NodeValue::Link(_)
        | NodeValue::Image(_) => {}
        NodeValue::BlockQuote | NodeValue::FootnoteDefinition(_) | NodeValue::Paragraph => {
            if !entering {
                r.blankline();
            }
        }
        NodeValue::Item(_) => {
            let marker = list_marker(r, node);
            if entering {
                r.lit(&marker, false);
                r.push_prefix(&" ".repeat(marker.len()));
            } else {
                r.truncate_prefix(marker.len());
                r.cr();
            }
        }
        NodeValue::Heading(_) => {
            if entering {
                r.set_no_linebreaks(true);
            } else {
                r.set_no_linebreaks(false);
                r.blankline();
            }
        }
        NodeValue::CodeBlock(cb) => {
            r.blankline();
            r.out(&cb.literal, false, Escaping::Literal);
            r.blankline();
        }
        NodeValue::ThematicBreak => r.blankline(),
        NodeValue::Text(text) => r.out(text, allow_wrap, Escaping::Normal),
        NodeValue::Code(code) => r.out(code, allow_wrap, Escaping::Literal),
        NodeValue::LineBreak => r.cr(),
        NodeValue::SoftBreak => {
            let opts = r.options();
            if opts.hardbreaks || (opts.width == 0 && !opts.nobreaks) {
                r.cr();
            } else {
                r.out(" ", allow_wrap, Escaping::Literal);
            }
        }
        NodeValue::FootnoteReference(fref) => r.lit(&format!("[{}]", fref.ix), false),
        _ => return None,
    }
    Some(true)
}

#[cfg(test)]
mod tests {
    use crate::options::Format;
    use crate::{Options, Parser, RenderOptions};
    use pretty_assertions::assert_eq;

    fn plain(md: &str) -> String {
        let mut parser = Parser::new(Options::empty());
        parser.feed(md);
        parser.finish().render(Format::PlainText, &RenderOptions::default())
    }

    #[test]
    fn test_markup_dropped() {
        assert_eq!(
            plain("# Title\n\nSome *emphasis* and [a link](/u) with `code`.\n"),
            "Title\n\nSome emphasis and a link with code.\n"
        );
    }

    #[test]
    fn test_lists_keep_markers() {
        assert_eq!(plain("- one\n- two\n"), "  - one\n  - two\n");
        assert_eq!(plain("1. a\n2. b\n"), "1.  a\n2.  b\n");
    }

    #[test]
    fn test_code_and_html() {
        assert_eq!(
            plain("para\n\n    code *x*\n\n<div>\nhidden\n</div>\n"),
            "para\n\ncode *x*\n"
        );
    }

    #[test]
    fn test_softbreak_follows_width() {
        let mut parser = Parser::new(Options::empty());
        parser.feed("a\nb\n");
        let doc = parser.finish();
        assert_eq!(doc.render(Format::PlainText, &RenderOptions::default()), "a\nb\n");
        assert_eq!(
            doc.render(Format::PlainText, &RenderOptions::default().with_width(40)),
            "a b\n"
        );
    }
}
