//! groff man page output
use super::{Escaping, Renderer};
use crate::ast::{ListType, NodeValue};
use indextree::NodeId;

pub(crate) fn outc(r: &mut Renderer<'_>, escape: Escaping, c: char, _next: Option<char>) {
    if escape == Escaping::Literal {
        r.render_code_point(c);
        return;
    }
    match c {
        // A leading dot or quote would be read as a request
        '.' if r.begin_line() => r.render_ascii("\\&."),
        '\'' if r.begin_line() => r.render_ascii("\\&'"),
        '-' => r.render_ascii("\\-"),
        '\\' => r.render_ascii("\\e"),
        '\u{2018}' => r.render_ascii("\\[oq]"),
        '\u{2019}' => r.render_ascii("\\[cq]"),
        '\u{201c}' => r.render_ascii("\\[lq]"),
        '\u{201d}' => r.render_ascii("\\[rq]"),
        '\u{2014}' => r.render_ascii("\\[em]"),
        '\u{2013}' => r.render_ascii("\\[en]"),
        _ => r.render_code_point(c),
    }
}

fn allow_wrap(r: &Renderer<'_>) -> bool {
    let opts = r.options();
    opts.width > 0 && !opts.nobreaks && !opts.hardbreaks
}

/// `.IP` line for a list item: a bullet, or the item's number. `item` is
/// the node being rendered.
fn item_marker(r: &Renderer<'_>, item: NodeId) -> String {
    let arena = r.arena();
    let list = arena[item].parent().and_then(|p| match &arena[p].get().value {
        NodeValue::List(list) => Some(*list),
        _ => None,
    });
    match list {
        Some(list) if list.list_type == ListType::Ordered => {
            format!(".IP \"{}.\" 4", list.start + r.sibling_index())
        }
        _ => ".IP \\[bu] 2".to_string(),
    }
}

pub(crate) fn render_node(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> Option<bool> {
    let arena = r.arena();
    let allow_wrap = allow_wrap(r);

    match r.value(node) {
        NodeValue::Document | NodeValue::List(_) | NodeValue::HtmlBlock(_) | NodeValue::HtmlInline(_) => {}
        NodeValue::BlockQuote => {
            r.cr();
            r.lit(if entering { ".RS" } else { ".RE" }, false);
            r.cr();
        }
        NodeValue::Item(_) | NodeValue::TaskItem(_) => {
            r.cr();
            if entering {
                let marker = item_marker(r, node);
                r.lit(&marker, false);
                r.cr();
                if let NodeValue::TaskItem(task) = r.value(node) {
                    r.lit(if task.checked { "[x] " } else { "[ ] " }, false);
                }
            }
        }
        NodeValue::Heading(heading) => {
            r.cr();
            if entering {
                r.lit(if heading.level == 1 { ".SH" } else { ".SS" }, false);
                r.cr();
            }
        }
        NodeValue::CodeBlock(cb) => {
            r.cr();
            r.lit(".IP\n.nf\n\\f[C]\n", false);
            r.out(&cb.literal, false, Escaping::Normal);
            r.cr();
            r.lit("\\f[]\n.fi", false);
            r.cr();
        }
        NodeValue::ThematicBreak => {
            r.cr();
            r.lit(".PP\n  *  *  *  *  *", false);
            r.cr();
        }
        NodeValue::Paragraph => {
            if entering {
                // The first paragraph of an item sits on the `.IP` line
                let first_in_item = arena[node].previous_sibling().is_none()
                    && arena[node]
                        .parent()
                        .is_some_and(|p| arena[p].get().value.item_list().is_some());
                if !first_in_item {
                    r.cr();
                    r.lit(".PP", false);
                    r.cr();
                }
            } else {
                r.cr();
            }
        }
        NodeValue::FootnoteDefinition(def) => {
            r.cr();
            if entering {
                r.lit(&format!(".IP \"[{}]\" 4", def.ix), false);
                r.cr();
            }
        }
        NodeValue::Text(text) => r.out(text, allow_wrap, Escaping::Normal),
        NodeValue::LineBreak => {
            r.lit(".PD 0\n.P\n.PD", false);
            r.cr();
        }
        NodeValue::SoftBreak => {
            let opts = r.options();
            if opts.hardbreaks {
                r.lit(".PD 0\n.P\n.PD", false);
                r.cr();
            } else if opts.width == 0 && !opts.nobreaks {
                r.cr();
            } else {
                r.out(" ", allow_wrap, Escaping::Literal);
            }
        }
        NodeValue::Code(code) => {
            r.lit("\\f[C]", false);
            r.out(code, allow_wrap, Escaping::Normal);
            r.lit("\\f[]", false);
        }
        NodeValue::Strong => r.lit(if entering { "\\f[B]" } else { "\\f[]" }, false),
        NodeValue::Emph => r.lit(if entering { "\\f[I]" } else { "\\f[]" }, false),
        NodeValue::Link(link) => {
            if !entering {
                r.lit(" (", false);
                r.out(&link.url, allow_wrap, Escaping::Url);
                r.lit(")", false);
            }
        }
        NodeValue::Image(_) => r.lit(if entering { "[IMAGE: " } else { "]" }, false),
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

    fn man(md: &str) -> String {
        let mut parser = Parser::new(Options::empty());
        parser.feed(md);
        parser.finish().render(Format::Man, &RenderOptions::default())
    }

    #[test]
    fn test_headings_and_paragraphs() {
        assert_eq!(
            man("# Name\n\n## Sub\n\nSome *text* -- `x`.\n"),
            ".SH\nName\n.SS\nSub\n.PP\nSome \\f[I]text\\f[] \\-\\- \\f[C]x\\f[].\n"
        );
    }

    #[test]
    fn test_lists_and_quotes() {
        assert_eq!(
            man("- a\n- b\n\n> q\n"),
            ".IP \\[bu] 2\na\n.IP \\[bu] 2\nb\n.RS\n.PP\nq\n.RE\n"
        );
        assert_eq!(man("3. x\n"), ".IP \"3.\" 4\nx\n");
    }

    #[test]
    fn test_item_numbers_follow_position() {
        assert_eq!(
            man("3. x\n4. *y* z\n5. w\n"),
            ".IP \"3.\" 4\nx\n.IP \"4.\" 4\n\\f[I]y\\f[] z\n.IP \"5.\" 4\nw\n"
        );
    }

    #[test]
    fn test_leading_dot_escaped() {
        assert_eq!(man("\\.hidden\n"), ".PP\n\\&.hidden\n");
    }
}
