//! `==highlighted==` text
use super::{DelimiterRule, Extension};
use crate::ast::{NodeKind, NodeValue};
use crate::options::{Format, Options};
use crate::render::Renderer;
use crate::render::html::write_sourcepos;
use indextree::NodeId;

pub fn extension() -> Extension {
    Extension::new("mark", Options::MARK)
        .with_delimiter(DelimiterRule {
            ch: b'=',
            min: 2,
            max: 2,
            value: NodeValue::Mark,
        })
        .with_renderer(NodeKind::Mark, Format::Html, render_html)
        .with_renderer(NodeKind::Mark, Format::CommonMark, render_commonmark)
        .with_renderer(NodeKind::Mark, Format::Latex, render_latex)
        .with_renderer(NodeKind::Mark, Format::Man, render_man)
        .with_renderer(NodeKind::Mark, Format::PlainText, render_plaintext)
}

fn render_html(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    if entering {
        r.write_raw("<mark");
        write_sourcepos(r, node);
        r.write_raw(">");
    } else {
        r.write_raw("</mark>");
    }
    true
}

fn render_commonmark(r: &mut Renderer<'_>, _node: NodeId, _entering: bool) -> bool {
    r.lit("==", false);
    true
}

// Needs the soul package
fn render_latex(r: &mut Renderer<'_>, _node: NodeId, entering: bool) -> bool {
    r.lit(if entering { "\\hl{" } else { "}" }, false);
    true
}

fn render_man(r: &mut Renderer<'_>, _node: NodeId, entering: bool) -> bool {
    r.lit(if entering { "\\f[B]" } else { "\\f[]" }, false);
    true
}

fn render_plaintext(_r: &mut Renderer<'_>, _node: NodeId, _entering: bool) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use crate::options::Format;
    use crate::{Options, Parser, RenderOptions};
    use pretty_assertions::assert_eq;

    fn render(md: &str, format: Format) -> String {
        let mut parser = Parser::new(Options::MARK);
        parser.feed(md);
        parser.finish().render(format, &RenderOptions::default())
    }

    #[test]
    fn test_double_equals_mark() {
        assert_eq!(
            render("a ==b *c*== d\n", Format::Html),
            "<p>a <mark>b <em>c</em></mark> d</p>\n"
        );
    }

    #[test]
    fn test_single_equals_is_text() {
        assert_eq!(render("a =b= c\n", Format::Html), "<p>a =b= c</p>\n");
    }

    #[test]
    fn test_commonmark_round_trip() {
        let once = render("x ==y== z\n", Format::CommonMark);
        assert_eq!(once, "x ==y== z\n");
        assert_eq!(render(&once, Format::CommonMark), once);
    }
}
