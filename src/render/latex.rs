//! LaTeX output
use super::{Escaping, Renderer};
use crate::ast::{ListType, NodeValue, collect_text};
use indextree::NodeId;

pub(crate) fn outc(r: &mut Renderer<'_>, escape: Escaping, c: char, next: Option<char>) {
    if escape == Escaping::Literal {
        r.render_code_point(c);
        return;
    }
    match c {
        '{' | '}' | '#' | '%' | '&' => {
            r.render_ascii("\\");
            r.render_code_point(c);
        }
        '$' | '_' if escape == Escaping::Normal => {
            r.render_ascii("\\");
            r.render_code_point(c);
        }
        // `--` would become a dash
        '-' if next == Some('-') => r.render_ascii("-{}"),
        '~' if escape == Escaping::Normal => r.render_ascii("\\textasciitilde{}"),
        '^' => r.render_ascii("\\^{}"),
        '\\' if escape == Escaping::Url => r.render_ascii("/"),
        '\\' => r.render_ascii("\\textbackslash{}"),
        '|' => r.render_ascii("\\textbar{}"),
        '<' => r.render_ascii("\\textless{}"),
        '>' => r.render_ascii("\\textgreater{}"),
        '[' | ']' => {
            r.render_ascii("{");
            r.render_code_point(c);
            r.render_ascii("}");
        }
        '"' => r.render_ascii("\\textquotedbl{}"),
        '\'' => r.render_ascii("\\textquotesingle{}"),
        '\u{a0}' => r.render_ascii("~"),
        '\u{2026}' => r.render_ascii("\\ldots{}"),
        '\u{2018}' if escape != Escaping::Url => r.render_ascii("`"),
        '\u{2019}' if escape != Escaping::Url => r.render_ascii("'"),
        '\u{201c}' if escape != Escaping::Url => r.render_ascii("``"),
        '\u{201d}' if escape != Escaping::Url => r.render_ascii("''"),
        '\u{2014}' if escape != Escaping::Url => r.render_ascii("---"),
        '\u{2013}' if escape != Escaping::Url => r.render_ascii("--"),
        _ => r.render_code_point(c),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkType {
    /// Text equal to the destination, written as `\url{...}`.
    Url,
    /// `mailto:` link whose text is the address.
    Email,
    /// Points into the document: `#label`.
    Internal,
    Normal,
}

fn link_type(r: &Renderer<'_>, node: NodeId) -> LinkType {
    let NodeValue::Link(link) = r.value(node) else {
        return LinkType::Normal;
    };
    if link.url.is_empty() {
        return LinkType::Normal;
    }
    if link.url.starts_with('#') {
        return LinkType::Internal;
    }
    if !super::commonmark::has_scheme(&link.url) || !link.title.is_empty() {
        return LinkType::Normal;
    }
    let text = collect_text(r.arena(), node);
    if let Some(address) = link.url.strip_prefix("mailto:") {
        if address == text {
            return LinkType::Email;
        }
    } else if link.url == text {
        return LinkType::Url;
    }
    LinkType::Normal
}

/// Nesting depth of ordered lists, for the `enumi` counter names.
fn enumerate_level(r: &Renderer<'_>, node: NodeId) -> usize {
    let arena = r.arena();
    node.ancestors(arena)
        .filter(|&id| matches!(&arena[id].get().value, NodeValue::List(list) if list.list_type == ListType::Ordered))
        .count()
}

fn allow_wrap(r: &Renderer<'_>) -> bool {
    let opts = r.options();
    opts.width > 0 && !opts.nobreaks && !opts.hardbreaks
}

pub(crate) fn render_node(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> Option<bool> {
    let allow_wrap = allow_wrap(r);

    match r.value(node) {
        NodeValue::Document | NodeValue::HtmlBlock(_) | NodeValue::HtmlInline(_) => {}
        NodeValue::BlockQuote => {
            if entering {
                r.lit("\\begin{quote}", false);
                r.cr();
            } else {
                r.lit("\\end{quote}", false);
                r.blankline();
            }
        }
        NodeValue::List(list) => {
            let environment = match list.list_type {
                ListType::Ordered => "enumerate",
                ListType::Bullet => "itemize",
            };
            if entering {
                r.lit(&format!("\\begin{{{environment}}}"), false);
                r.cr();
                let level = enumerate_level(r, node);
                if list.list_type == ListType::Ordered && list.start > 1 && (1..=4).contains(&level) {
                    let roman = ["i", "ii", "iii", "iv"][level - 1];
                    r.lit(&format!("\\setcounter{{enum{roman}}}{{{}}}", list.start - 1), false);
                    r.cr();
                }
            } else {
                r.lit(&format!("\\end{{{environment}}}"), false);
                r.blankline();
            }
        }
        NodeValue::Item(_) | NodeValue::TaskItem(_) => {
            if entering {
                r.lit("\\item ", false);
                if let NodeValue::TaskItem(task) = r.value(node) {
                    r.lit(if task.checked { "$\\boxtimes$ " } else { "$\\square$ " }, false);
                }
            } else {
                r.cr();
            }
        }
        NodeValue::Heading(heading) => {
            if entering {
                let command = match heading.level {
                    1 => "\\section",
                    2 => "\\subsection",
                    3 => "\\subsubsection",
                    4 => "\\paragraph",
                    _ => "\\subparagraph",
                };
                r.lit(command, false);
                r.lit("{", false);
            } else {
                r.lit("}", false);
                r.blankline();
            }
        }
        NodeValue::CodeBlock(cb) => {
            r.cr();
            r.lit("\\begin{verbatim}", false);
            r.cr();
            r.out(&cb.literal, false, Escaping::Literal);
            r.cr();
            r.lit("\\end{verbatim}", false);
            r.blankline();
        }
        NodeValue::ThematicBreak => {
            r.blankline();
            r.lit("\\begin{center}\\rule{0.5\\linewidth}{\\linethickness}\\end{center}", false);
            r.blankline();
        }
        NodeValue::Paragraph => {
            if !entering {
                r.blankline();
            }
        }
        NodeValue::FootnoteDefinition(_) => {
            if !entering {
                r.blankline();
            }
        }
        NodeValue::Text(text) => r.out(text, allow_wrap, Escaping::Normal),
        NodeValue::LineBreak => {
            r.lit("\\\\", false);
            r.cr();
        }
        NodeValue::SoftBreak => {
            let opts = r.options();
            if opts.hardbreaks {
                r.lit("\\\\", false);
                r.cr();
            } else if opts.width == 0 && !opts.nobreaks {
                r.cr();
            } else {
                r.out(" ", allow_wrap, Escaping::Literal);
            }
        }
        NodeValue::Code(code) => {
            r.lit("\\texttt{", false);
            r.out(code, false, Escaping::Normal);
            r.lit("}", false);
        }
        NodeValue::Strong => r.lit(if entering { "\\textbf{" } else { "}" }, false),
        NodeValue::Emph => r.lit(if entering { "\\emph{" } else { "}" }, false),
        NodeValue::Link(link) => {
            let kind = link_type(r, node);
            if entering {
                match kind {
                    LinkType::Url => {
                        r.lit("\\url{", false);
                        r.out(&link.url, false, Escaping::Url);
                        r.lit("}", false);
                        return Some(false);
                    }
                    LinkType::Email => {
                        r.lit("\\href{", false);
                        r.out(&link.url, false, Escaping::Url);
                        r.lit("}\\nolinkurl{", false);
                    }
                    LinkType::Normal => {
                        r.lit("\\href{", false);
                        r.out(&link.url, false, Escaping::Url);
                        r.lit("}{", false);
                    }
                    LinkType::Internal => {
                        r.lit("\\protect\\hyperlink{", false);
                        r.out(&link.url[1..], false, Escaping::Url);
                        r.lit("}{", false);
                    }
                }
            } else if kind != LinkType::Url {
                r.lit("}", false);
            }
        }
        NodeValue::Image(link) => {
            if entering {
                r.lit("\\protect\\includegraphics{", false);
                r.out(&link.url, false, Escaping::Url);
                r.lit("}", false);
                return Some(false);
            }
        }
        NodeValue::FootnoteReference(fref) => {
            r.lit(&format!("\\textsuperscript{{{}}}", fref.ix), false);
        }
        _ => return None,
    }
    Some(true)
}

#[cfg(test)]
mod tests {
    use crate::options::Format;
    use crate::{Options, Parser, RenderOptions};
    use pretty_assertions::assert_eq;

    fn latex(md: &str) -> String {
        let mut parser = Parser::new(Options::empty());
        parser.feed(md);
        parser.finish().render(Format::Latex, &RenderOptions::default())
    }

    #[test]
    fn test_sections_and_inlines() {
        assert_eq!(
            latex("## Costs\n\n**50%** of $x_1 & {y}\n"),
            "\\subsection{Costs}\n\n\\textbf{50\\%} of \\$x\\_1 \\& \\{y\\}\n"
        );
    }

    #[test]
    fn test_ordered_list_start() {
        assert_eq!(
            latex("3. a\n4. b\n"),
            "\\begin{enumerate}\n\\setcounter{enumi}{2}\n\\item a\n\\item b\n\n\\end{enumerate}\n"
        );
    }

    #[test]
    fn test_links() {
        assert_eq!(latex("<https://a.b>\n"), "\\url{https://a.b}\n");
        assert_eq!(latex("[t](/u)\n"), "\\href{/u}{t}\n");
        assert_eq!(latex("[t](#sec)\n"), "\\protect\\hyperlink{sec}{t}\n");
    }

    #[test]
    fn test_code_block_verbatim() {
        assert_eq!(latex("```\n$a\n```\n"), "\\begin{verbatim}\n$a\n\\end{verbatim}\n");
    }
}
