//! `~strike~` and `~~strike~~`
use super::{DelimiterRule, Extension};
use crate::ast::{NodeKind, NodeValue};
use crate::options::{Format, Options};
use crate::render::Renderer;
use crate::render::html::write_sourcepos;
use indextree::NodeId;

pub fn extension() -> Extension {
    Extension::new("strikethrough", Options::STRIKETHROUGH)
        .with_delimiter(DelimiterRule {
            ch: b'~',
            min: 1,
            max: 2,
            value: NodeValue::Strikethrough,
        })
        .with_renderer(NodeKind::Strikethrough, Format::Html, render_html)
        .with_renderer(NodeKind::Strikethrough, Format::CommonMark, render_commonmark)
        .with_renderer(NodeKind::Strikethrough, Format::Latex, render_latex)
        .with_renderer(NodeKind::Strikethrough, Format::Man, render_man)
        .with_renderer(NodeKind::Strikethrough, Format::PlainText, render_plaintext)
}

fn render_html(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    if entering {
        r.write_raw("<del");
        write_sourcepos(r, node);
        r.write_raw(">");
    } else {
        r.write_raw("</del>");
    }
    true
}

fn render_commonmark(r: &mut Renderer<'_>, _node: NodeId, _entering: bool) -> bool {
    r.lit("~~", false);
    true
}

fn render_latex(r: &mut Renderer<'_>, _node: NodeId, entering: bool) -> bool {
    r.lit(if entering { "\\sout{" } else { "}" }, false);
    true
}

fn render_man(r: &mut Renderer<'_>, _node: NodeId, entering: bool) -> bool {
    if entering {
        r.cr();
        r.lit(".ST \"", false);
    } else {
        r.lit("\"", false);
        r.cr();
    }
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
        let mut parser = Parser::new(Options::STRIKETHROUGH);
        parser.feed(md);
        parser.finish().render(format, &RenderOptions::default())
    }

    #[test]
    fn test_single_and_double_tildes() {
        assert_eq!(
            render("~~Hi~~ Hello, ~there~ world!\n", Format::Html),
            "<p><del>Hi</del> Hello, <del>there</del> world!</p>\n"
        );
    }

    #[test]
    fn test_unequal_or_long_runs_stay_literal() {
        assert_eq!(render("x ~~~a~~~\n", Format::Html), "<p>x ~~~a~~~</p>\n");
        assert_eq!(render("~~a~\n", Format::Html), "<p>~~a~</p>\n");
    }

    #[test]
    fn test_other_formats() {
        assert_eq!(render("~a~ b\n", Format::CommonMark), "~~a~~ b\n");
        assert_eq!(render("~a~ b\n", Format::Latex), "\\sout{a} b\n");
        assert_eq!(render("~a~ b\n", Format::PlainText), "a b\n");
    }

    #[test]
    fn test_disabled_without_option() {
        let mut parser = Parser::new(Options::empty());
        parser.feed("~~a~~\n");
        assert_eq!(parser.finish().to_html(), "<p>~~a~~</p>\n");
    }
}
