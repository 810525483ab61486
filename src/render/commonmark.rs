//! CommonMark output
//!
//! Re-parsing the output yields the same tree, so one pass normalizes any
//! input.
use super::{Escaping, Renderer, parent_list_tight};
use crate::ast::{ListDelimType, ListType, NodeValue};
use crate::options::Options;
use indextree::NodeId;

pub(crate) fn outc(r: &mut Renderer<'_>, escape: Escaping, c: char, next: Option<char>) {
    let follows_digit = r.last_byte().is_some_and(|b| b.is_ascii_digit());
    let next_is_space = next.is_none_or(|n| n.is_ascii_whitespace());
    let options = r.parse_options();

    let needs_escaping = c.is_ascii()
        && match escape {
            Escaping::Literal => false,
            Escaping::Normal => {
                c < ' '
                    || matches!(c, '*' | '_' | '[' | ']' | '#' | '<' | '>' | '\\' | '`' | '!')
                    || (c == '&' && next.is_some_and(|n| n.is_ascii_alphabetic()))
                    || (r.begin_content() && matches!(c, '-' | '+' | '=') && !follows_digit)
                    || (r.begin_content() && matches!(c, '.' | ')') && follows_digit && next_is_space)
                    || (c == '|' && options.contains(Options::TABLES))
                    || (c == '~' && options.contains(Options::STRIKETHROUGH))
                    || (c == '=' && options.contains(Options::MARK))
            }
            Escaping::Url => matches!(c, '`' | '<' | '>' | '\\' | ')' | '(') || c.is_ascii_whitespace(),
            Escaping::Title => matches!(c, '`' | '<' | '>' | '"' | '\\'),
        };

    if !needs_escaping {
        r.render_code_point(c);
    } else if escape == Escaping::Url && c.is_ascii_whitespace() {
        r.render_ascii(&format!("%{:2X}", u32::from(c)));
    } else if c.is_ascii_punctuation() {
        r.render_ascii("\\");
        r.render_code_point(c);
    } else {
        r.render_ascii(&format!("&#{};", u32::from(c)));
    }
}

/// Length of the shortest backtick run that does not occur in `code`.
fn shortest_unused_backtick_run(code: &str) -> usize {
    let mut used = vec![false; 2];
    let mut current = 0;
    for c in code.chars().chain(std::iter::once('\0')) {
        if c == '`' {
            current += 1;
            continue;
        }
        if current > 0 {
            if used.len() <= current {
                used.resize(current + 1, false);
            }
            used[current] = true;
        }
        current = 0;
    }
    (1..).find(|&n| !used.get(n).copied().unwrap_or(false)).unwrap_or(1)
}

fn longest_backtick_run(code: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in code.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// `scheme:` with a 2 to 32 character scheme.
pub(crate) fn has_scheme(url: &str) -> bool {
    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = url[..colon].as_bytes();
    (2..=32).contains(&scheme.len())
        && scheme[0].is_ascii_alphabetic()
        && scheme.iter().all(|&c| c.is_ascii_alphanumeric() || matches!(c, b'.' | b'+' | b'-'))
}

/// A link whose text is its own destination, written back as `<url>`.
fn is_autolink(r: &Renderer<'_>, node: NodeId) -> bool {
    let NodeValue::Link(link) = r.value(node) else {
        return false;
    };
    if !has_scheme(&link.url) || !link.title.is_empty() {
        return false;
    }
    let text = crate::ast::collect_text(r.arena(), node);
    let url = link.url.strip_prefix("mailto:").unwrap_or(&link.url);
    !text.is_empty() && url == text
}

/// Marker for an ordered or bullet item, padded so content lines up.
/// `item` is the node being rendered.
pub(crate) fn list_marker(r: &Renderer<'_>, item: NodeId) -> String {
    let arena = r.arena();
    let list = arena[item].parent().and_then(|p| match &arena[p].get().value {
        NodeValue::List(list) => Some(*list),
        _ => None,
    });
    match list {
        Some(list) if list.list_type == ListType::Ordered => {
            let number = list.start + r.sibling_index();
            let delim = if list.delimiter == ListDelimType::Paren { ")" } else { "." };
            let pad = if number < 10 { "  " } else { " " };
            format!("{number}{delim}{pad}")
        }
        _ => "  - ".to_string(),
    }
}

/// Blank lines between blocks collapse inside tight list items. Runs for
/// every node, ahead of whichever callback renders it.
pub(crate) fn track_tight_list(r: &mut Renderer<'_>, node: NodeId, entering: bool) {
    let arena = r.arena();
    // The first item keeps the blank line separating the list from what
    // came before
    if entering && arena[node].get().value.item_list().is_some() && arena[node].previous_sibling().is_none() {
        return;
    }
    let block = r.containing_block(node);
    let tight = block.is_some_and(|block| {
        let is_item = |id: NodeId| arena[id].get().value.item_list().is_some();
        (is_item(block) && parent_list_tight(arena, block))
            || arena[block]
                .parent()
                .is_some_and(|item| is_item(item) && parent_list_tight(arena, item))
    });
    r.set_in_tight_list_item(tight);
}

/// Info strings are unescaped when parsed, so backslashes and `&` need
/// escapes to read back the same.
fn escape_info(info: &str) -> String {
    let mut escaped = String::with_capacity(info.len());
    for c in info.chars() {
        if matches!(c, '\\' | '&') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Whether a code block is written indented rather than fenced.
fn writes_indented(r: &Renderer<'_>, node: NodeId) -> bool {
    let NodeValue::CodeBlock(cb) = r.value(node) else {
        return false;
    };
    let arena = r.arena();
    let first_in_item = arena[node].previous_sibling().is_none()
        && arena[node]
            .parent()
            .is_some_and(|p| arena[p].get().value.item_list().is_some());
    let code = cb.literal.as_bytes();
    let n = code.len();
    cb.info.is_empty()
        && n > 2
        && !code[0].is_ascii_whitespace()
        && !(code[n - 1].is_ascii_whitespace() && code[n - 2].is_ascii_whitespace())
        && !first_in_item
}

fn allow_wrap(r: &Renderer<'_>) -> bool {
    let opts = r.options();
    opts.width > 0 && !opts.nobreaks && !opts.hardbreaks
}

pub(crate) fn render_node(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> Option<bool> {
    let arena = r.arena();
    let allow_wrap = allow_wrap(r);

    match r.value(node) {
        NodeValue::Document => {}
        NodeValue::BlockQuote => {
            if entering {
                r.lit("> ", false);
                r.set_begin_content(true);
                r.push_prefix("> ");
            } else {
                r.truncate_prefix(2);
                r.blankline();
            }
        }
        NodeValue::List(_) => {
            let next_breaks_list = arena[node].next_sibling().is_some_and(|next| {
                matches!(arena[next].get().value, NodeValue::List(_)) || writes_indented(r, next)
            });
            if !entering && next_breaks_list {
                // Keeps a following list or indented code block separate
                r.cr();
                r.lit("<!-- end list -->", false);
                r.blankline();
            }
        }
        NodeValue::Item(_) => {
            let marker = list_marker(r, node);
            if entering {
                r.lit(&marker, false);
                r.set_begin_content(true);
                r.push_prefix(&" ".repeat(marker.len()));
            } else {
                r.truncate_prefix(marker.len());
                r.cr();
            }
        }
        NodeValue::Heading(heading) => {
            if entering {
                r.lit(&"#".repeat(usize::from(heading.level)), false);
                r.lit(" ", false);
                r.set_no_linebreaks(true);
            } else {
                r.set_no_linebreaks(false);
                r.blankline();
            }
        }
        NodeValue::CodeBlock(cb) => {
            let first_in_item = arena[node].previous_sibling().is_none()
                && arena[node]
                    .parent()
                    .is_some_and(|p| arena[p].get().value.item_list().is_some());
            if !first_in_item {
                r.blankline();
            }
            if writes_indented(r, node) {
                r.lit("    ", false);
                r.push_prefix("    ");
                r.out(&cb.literal, false, Escaping::Literal);
                r.truncate_prefix(4);
            } else {
                let fence_char = if cb.info.contains('`') { "~" } else { "`" };
                let fence = fence_char.repeat((longest_backtick_run(&cb.literal) + 1).max(3));
                r.lit(&fence, false);
                r.lit(" ", false);
                r.lit(&escape_info(&cb.info), false);
                r.cr();
                r.out(&cb.literal, false, Escaping::Literal);
                r.cr();
                r.lit(&fence, false);
            }
            r.blankline();
        }
        NodeValue::HtmlBlock(hb) => {
            r.blankline();
            r.out(&hb.literal, false, Escaping::Literal);
            r.blankline();
        }
        NodeValue::ThematicBreak => {
            r.blankline();
            r.lit("-----", false);
            r.blankline();
        }
        NodeValue::Paragraph => {
            if !entering {
                r.blankline();
            }
        }
        NodeValue::FootnoteDefinition(def) => {
            if entering {
                r.lit("[^", false);
                r.out(&def.label, false, Escaping::Literal);
                r.lit("]:\n", false);
                r.push_prefix("    ");
            } else {
                r.truncate_prefix(4);
            }
        }
        NodeValue::Text(text) => r.out(text, allow_wrap, Escaping::Normal),
        NodeValue::LineBreak => {
            if !r.options().hardbreaks {
                r.lit("  ", false);
            }
            r.cr();
        }
        NodeValue::SoftBreak => {
            let opts = r.options();
            if opts.hardbreaks {
                r.lit("  ", false);
                r.cr();
            } else if opts.width == 0 && !opts.nobreaks && !in_heading(r, node) {
                r.cr();
            } else {
                r.out(" ", allow_wrap, Escaping::Literal);
            }
        }
        NodeValue::Code(code) => {
            let ticks = "`".repeat(shortest_unused_backtick_run(code));
            // An all-space span keeps its spaces when read back
            let all_spaces = !code.is_empty() && code.bytes().all(|b| b == b' ');
            let extra_space = !all_spaces
                && (code.is_empty()
                    || code.starts_with('`')
                    || code.ends_with('`')
                    || (code.starts_with(' ') && code.ends_with(' ')));
            r.lit(&ticks, false);
            if extra_space {
                r.lit(" ", false);
            }
            r.out(code, allow_wrap, Escaping::Literal);
            if extra_space {
                r.lit(" ", false);
            }
            r.lit(&ticks, false);
        }
        NodeValue::HtmlInline(html) => r.out(html, false, Escaping::Literal),
        NodeValue::Strong => r.lit("**", false),
        NodeValue::Emph => {
            // `**x**` would read back as strong, so a lone nested emphasis
            // switches to underscores
            let nested = arena[node]
                .parent()
                .is_some_and(|p| arena[p].get().value == NodeValue::Emph)
                && arena[node].next_sibling().is_none()
                && arena[node].previous_sibling().is_none();
            r.lit(if nested { "_" } else { "*" }, false);
        }
        NodeValue::Link(link) => {
            if is_autolink(r, node) {
                if entering {
                    r.lit("<", false);
                    r.lit(link.url.strip_prefix("mailto:").unwrap_or(&link.url), false);
                    r.lit(">", false);
                    return Some(false);
                }
            } else if entering {
                r.lit("[", false);
            } else {
                write_destination(r, &link.url, &link.title, allow_wrap);
            }
        }
        NodeValue::Image(link) => {
            if entering {
                r.lit("![", false);
            } else {
                write_destination(r, &link.url, &link.title, allow_wrap);
            }
        }
        NodeValue::FootnoteReference(fref) => {
            r.lit("[^", false);
            r.out(&fref.label, false, Escaping::Literal);
            r.lit("]", false);
        }
        _ => return None,
    }
    Some(true)
}

fn write_destination(r: &mut Renderer<'_>, url: &str, title: &str, allow_wrap: bool) {
    r.lit("](", false);
    r.out(url, false, Escaping::Url);
    if !title.is_empty() {
        r.out(" \"", allow_wrap, Escaping::Literal);
        r.out(title, false, Escaping::Title);
        r.lit("\"", false);
    }
    r.lit(")", false);
}

fn in_heading(r: &Renderer<'_>, node: NodeId) -> bool {
    let arena = r.arena();
    arena[node]
        .parent()
        .is_some_and(|p| matches!(arena[p].get().value, NodeValue::Heading(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;
    use crate::{Parser, RenderOptions};
    use pretty_assertions::assert_eq;

    fn cm(md: &str, options: Options) -> String {
        let mut parser = Parser::new(options);
        parser.feed(md);
        parser.finish().render(Format::CommonMark, &RenderOptions::default())
    }

    #[test]
    fn test_backtick_runs() {
        assert_eq!(shortest_unused_backtick_run("a"), 1);
        assert_eq!(shortest_unused_backtick_run("a`b"), 2);
        assert_eq!(shortest_unused_backtick_run("``a`"), 3);
        assert_eq!(longest_backtick_run("a```b`"), 3);
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://x"));
        assert!(has_scheme("mailto:a@b"));
        assert!(!has_scheme("a:b"));
        assert!(!has_scheme("/path"));
    }

    #[test]
    fn test_blocks() {
        assert_eq!(
            cm("# Title\n\nSome *emph* and **strong**.\n\n> quoted\n\n***\n", Options::empty()),
            "# Title\n\nSome *emph* and **strong**.\n\n> quoted\n\n-----\n"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(cm("- a\n- b\n", Options::empty()), "  - a\n  - b\n");
        assert_eq!(cm("1. a\n\n2. b\n", Options::empty()), "1.  a\n\n2.  b\n");
        assert_eq!(
            cm("- a\n- b\n\n\n- c\n", Options::empty()),
            "  - a\n\n  - b\n\n  - c\n"
        );
    }

    #[test]
    fn test_escapes_special_text() {
        assert_eq!(cm("\\*not emph\\*\n", Options::empty()), "\\*not emph\\*\n");
        assert_eq!(cm("1\\. not a list\n", Options::empty()), "1\\. not a list\n");
    }

    #[test]
    fn test_code_and_links() {
        assert_eq!(
            cm("`a`` b` [x](/u \"t\") <https://e.com>\n", Options::empty()),
            "`a`` b` [x](/u \"t\") <https://e.com>\n"
        );
        assert_eq!(
            cm("```\ncode\n```\n", Options::empty()),
            "    code\n"
        );
        assert_eq!(
            cm("```rust\nlet a = `b`;\n```\n", Options::empty()),
            "``` rust\nlet a = `b`;\n```\n"
        );
    }

    #[test]
    fn test_list_followed_by_code() {
        assert_eq!(
            cm("- a\n\n<!-- -->\n\n    code\n", Options::UNSAFE),
            "  - a\n\n<!-- -->\n\n    code\n"
        );
        assert_eq!(
            cm("- a\n- b\n\n1. c\n", Options::empty()),
            "  - a\n  - b\n\n<!-- end list -->\n\n1.  c\n"
        );
        assert_eq!(
            cm("- a\n\n```rust\ncode\n```\n", Options::empty()),
            "  - a\n\n``` rust\ncode\n```\n"
        );
    }

    #[test]
    fn test_marker_starts_content() {
        assert_eq!(cm("* \\- x\n", Options::empty()), "  - \\- x\n");
        assert_eq!(cm("> \\+ y\n", Options::empty()), "> \\+ y\n");
    }

    #[test]
    fn test_space_only_code_span_keeps_width() {
        assert_eq!(cm("` `\n", Options::empty()), "` `\n");
        assert_eq!(cm("`   `\n", Options::empty()), "`   `\n");
    }

    #[test]
    fn test_info_string_escapes() {
        assert_eq!(
            cm("```a\\&b\\\\c\nx\n```\n", Options::empty()),
            "``` a\\&b\\\\c\nx\n```\n"
        );
    }
}
