//! `- [ ] todo` and `- [x] done` list items
use super::Extension;
use crate::ast::{NodeKind, NodeTaskItem, NodeValue};
use crate::options::{Format, Options};
use crate::parser::Parser;
use crate::render::commonmark::list_marker;
use crate::render::html::write_sourcepos;
use crate::render::Renderer;
use indextree::NodeId;

pub fn extension() -> Extension {
    Extension::new("tasklist", Options::TASKLIST)
        .with_block_start(open_task_item)
        .with_renderer(NodeKind::TaskItem, Format::Html, render_html)
        .with_renderer(NodeKind::TaskItem, Format::CommonMark, render_commonmark)
        .with_renderer(NodeKind::TaskItem, Format::PlainText, render_commonmark)
}

/// `[ ]`, `[x]` or `[X]` followed by whitespace or the end of the line.
fn scan_checkbox(rest: &[u8]) -> Option<bool> {
    let checked = match rest.get(..3)? {
        b"[ ]" => false,
        b"[x]" | b"[X]" => true,
        _ => return None,
    };
    match rest.get(3) {
        None | Some(b' ' | b'\t' | b'\n' | b'\r') => Some(checked),
        _ => None,
    }
}

/// Turns a freshly opened item into a task item when its first line
/// starts with a checkbox.
///
/// Always returns `None`: no block opens after the checkbox, so the rest of
/// the line is paragraph text.
fn open_task_item(parser: &mut Parser, container: NodeId, line: &str, indented: bool) -> Option<NodeId> {
    let ast = parser.arena[container].get();
    let NodeValue::Item(list) = ast.value else {
        return None;
    };
    if indented || parser.arena[container].first_child().is_some() || ast.sourcepos.start.line != parser.line_number {
        return None;
    }

    let fns = parser.first_nonspace;
    let checked = scan_checkbox(line.as_bytes().get(fns..)?)?;
    parser.advance_offset(line, fns + 3 - parser.offset, false);
    parser.arena[container].get_mut().value = NodeValue::TaskItem(NodeTaskItem { list, checked });
    None
}

fn render_html(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let NodeValue::TaskItem(task) = r.value(node) else {
        return true;
    };
    if entering {
        r.html_cr();
        r.write_raw("<li");
        write_sourcepos(r, node);
        r.write_raw(if task.checked {
            "><input type=\"checkbox\" checked=\"\" disabled=\"\" /> "
        } else {
            "><input type=\"checkbox\" disabled=\"\" /> "
        });
    } else {
        r.write_raw("</li>\n");
    }
    true
}

/// Shared by the CommonMark and plain text formats: the list marker, then
/// the checkbox.
fn render_commonmark(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let NodeValue::TaskItem(task) = r.value(node) else {
        return true;
    };
    let marker = list_marker(r, node);
    if entering {
        r.lit(&marker, false);
        r.lit(if task.checked { "[x] " } else { "[ ] " }, false);
        r.set_begin_content(true);
        r.push_prefix(&" ".repeat(marker.len()));
    } else {
        r.truncate_prefix(marker.len());
        r.cr();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderOptions;
    use pretty_assertions::assert_eq;

    fn render(md: &str, format: Format) -> String {
        let mut parser = Parser::new(Options::TASKLIST);
        parser.feed(md);
        parser.finish().render(format, &RenderOptions::default())
    }

    #[test]
    fn test_scan_checkbox() {
        assert_eq!(scan_checkbox(b"[ ] a"), Some(false));
        assert_eq!(scan_checkbox(b"[X]\n"), Some(true));
        assert_eq!(scan_checkbox(b"[x]"), Some(true));
        assert_eq!(scan_checkbox(b"[x]a"), None);
        assert_eq!(scan_checkbox(b"[-] a"), None);
    }

    #[test]
    fn test_task_items_html() {
        assert_eq!(
            render("- [ ] foo\n- [x] bar\n", Format::Html),
            "<ul>\n<li><input type=\"checkbox\" disabled=\"\" /> foo</li>\n\
             <li><input type=\"checkbox\" checked=\"\" disabled=\"\" /> bar</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_checkbox_only_on_first_line() {
        assert_eq!(
            render("- foo\n  [x] bar\n", Format::Html),
            "<ul>\n<li>foo\n[x] bar</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_text_after_checkbox_opens_no_blocks() {
        assert_eq!(
            render("- [x] > not a quote\n- [ ] 1. not a list\n", Format::Html),
            "<ul>\n<li><input type=\"checkbox\" checked=\"\" disabled=\"\" /> &gt; not a quote</li>\n\
             <li><input type=\"checkbox\" disabled=\"\" /> 1. not a list</li>\n</ul>\n"
        );
        assert_eq!(
            render("- [ ] # title\n", Format::Html),
            "<ul>\n<li><input type=\"checkbox\" disabled=\"\" /> # title</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_task_items_commonmark_and_xml() {
        assert_eq!(render("1. [x] done\n2. [ ] todo\n", Format::CommonMark), "1.  [x] done\n2.  [ ] todo\n");
        let xml = render("- [x] done\n", Format::Xml);
        assert!(xml.contains("<item completed=\"true\">"));
    }
}
