//! CommonMark XML output
use super::Renderer;
use super::html::escape_html as escape_xml;
use crate::extensions::table::cell_alignment;
use crate::ast::{Alignment, ListDelimType, ListType, NodeKind, NodeValue};
use indextree::NodeId;

const HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE document SYSTEM \"CommonMark.dtd\">\n";

/// Element name for a node kind.
pub fn element_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Document => "document",
        NodeKind::BlockQuote => "block_quote",
        NodeKind::List => "list",
        NodeKind::Item | NodeKind::TaskItem => "item",
        NodeKind::FootnoteDefinition => "footnote_definition",
        NodeKind::Table => "table",
        NodeKind::TableRow => "table_row",
        NodeKind::TableCell => "table_cell",
        NodeKind::CodeBlock => "code_block",
        NodeKind::HtmlBlock => "html_block",
        NodeKind::Paragraph => "paragraph",
        NodeKind::Heading => "heading",
        NodeKind::ThematicBreak => "thematic_break",
        NodeKind::Text => "text",
        NodeKind::SoftBreak => "softbreak",
        NodeKind::LineBreak => "linebreak",
        NodeKind::Code => "code",
        NodeKind::HtmlInline => "html_inline",
        NodeKind::Emph => "emph",
        NodeKind::Strong => "strong",
        NodeKind::Strikethrough => "strikethrough",
        NodeKind::Mark => "mark",
        NodeKind::Link => "link",
        NodeKind::Image => "image",
        NodeKind::FootnoteReference => "footnote_reference",
    }
}

fn write_indent(r: &mut Renderer<'_>) {
    let indent = " ".repeat(r.indent);
    r.write_raw(&indent);
}

fn write_attr(r: &mut Renderer<'_>, name: &str, value: &str) {
    r.write_raw(&format!(" {name}=\"{}\"", escape_xml(value)));
}

/// Attributes carrying the node's payload. Returns the literal body for
/// nodes written as `<x xml:space="preserve">body</x>`.
fn write_attributes<'a>(r: &mut Renderer<'a>, node: NodeId) -> Option<&'a str> {
    match r.value(node) {
        NodeValue::Document => r.write_raw(" xmlns=\"http://commonmark.org/xml/1.0\""),
        NodeValue::Text(s) | NodeValue::Code(s) | NodeValue::HtmlInline(s) => return Some(s),
        NodeValue::HtmlBlock(hb) => return Some(&hb.literal),
        NodeValue::CodeBlock(cb) => {
            if !cb.info.is_empty() {
                write_attr(r, "info", &cb.info);
            }
            return Some(&cb.literal);
        }
        NodeValue::List(list) => {
            match list.list_type {
                ListType::Ordered => {
                    r.write_raw(&format!(" type=\"ordered\" start=\"{}\"", list.start));
                    r.write_raw(match list.delimiter {
                        ListDelimType::Period => " delim=\"period\"",
                        ListDelimType::Paren => " delim=\"paren\"",
                    });
                }
                ListType::Bullet => r.write_raw(" type=\"bullet\""),
            }
            r.write_raw(if list.tight { " tight=\"true\"" } else { " tight=\"false\"" });
        }
        NodeValue::TaskItem(task) => {
            r.write_raw(if task.checked { " completed=\"true\"" } else { " completed=\"false\"" });
        }
        NodeValue::Heading(heading) => r.write_raw(&format!(" level=\"{}\"", heading.level)),
        NodeValue::Link(link) | NodeValue::Image(link) => {
            write_attr(r, "destination", &link.url);
            if !link.title.is_empty() {
                write_attr(r, "title", &link.title);
            }
        }
        NodeValue::TableCell => {
            match cell_alignment(r, node) {
                Alignment::Left => r.write_raw(" align=\"left\""),
                Alignment::Center => r.write_raw(" align=\"center\""),
                Alignment::Right => r.write_raw(" align=\"right\""),
                Alignment::None => {}
            }
        }
        NodeValue::FootnoteDefinition(def) => write_attr(r, "label", &def.label),
        NodeValue::FootnoteReference(fref) => write_attr(r, "label", &fref.label),
        _ => {}
    }
    None
}

pub(crate) fn render_node(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> Option<bool> {
    let name = element_name(r.value(node).kind());
    let has_children = r.arena()[node].first_child().is_some();

    if entering {
        if r.output().is_empty() {
            r.write_raw(HEADER);
        }
        write_indent(r);
        r.write_raw(&format!("<{name}"));
        if r.options().sourcepos {
            let pos = r.node(node).sourcepos;
            r.write_raw(&format!(" sourcepos=\"{pos}\""));
        }
        let literal = write_attributes(r, node);
        if let Some(body) = literal {
            r.write_raw(" xml:space=\"preserve\">");
            let escaped = escape_xml(body);
            r.write_raw(&escaped);
            r.write_raw(&format!("</{name}"));
        }
        if has_children {
            r.indent += 2;
        } else if literal.is_none() {
            r.write_raw(" /");
        }
        r.write_raw(">\n");
    } else if has_children {
        r.indent = r.indent.saturating_sub(2);
        write_indent(r);
        r.write_raw(&format!("</{name}>\n"));
    }
    Some(true)
}

#[cfg(test)]
mod tests {
    use crate::options::Format;
    use crate::{Options, Parser, RenderOptions};
    use pretty_assertions::assert_eq;

    fn xml(md: &str, options: Options, render: RenderOptions) -> String {
        let mut parser = Parser::new(options);
        parser.feed(md);
        parser.finish().render(Format::Xml, &render)
    }

    #[test]
    fn test_document_structure() {
        assert_eq!(
            xml("Hi *there*\n\n---\n", Options::empty(), RenderOptions::default()),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE document SYSTEM \"CommonMark.dtd\">\n\
             <document xmlns=\"http://commonmark.org/xml/1.0\">\n  \
             <paragraph>\n    \
             <text xml:space=\"preserve\">Hi </text>\n    \
             <emph>\n      \
             <text xml:space=\"preserve\">there</text>\n    \
             </emph>\n  \
             </paragraph>\n  \
             <thematic_break />\n\
             </document>\n"
        );
    }

    #[test]
    fn test_list_and_code_attributes() {
        let out = xml("2) a\n\n```rs\nx < y\n```\n", Options::empty(), RenderOptions::default());
        assert!(out.contains("<list type=\"ordered\" start=\"2\" delim=\"paren\" tight=\"true\">"));
        assert!(out.contains("<code_block info=\"rs\" xml:space=\"preserve\">x &lt; y\n</code_block>"));
    }

    #[test]
    fn test_sourcepos_attribute() {
        let out = xml("hi\n", Options::empty(), RenderOptions::default().with_sourcepos(true));
        assert!(out.contains("<paragraph sourcepos=\"1:1-1:2\">"));
    }
}
