//! Output formats
//!
//! Every format walks the tree with [`NodeIter`](crate::NodeIter) and hands
//! each enter/exit event to a callback. The registry's `(kind, format)`
//! table is consulted first, then the format's built-in renderer; a kind
//! neither knows is written as its escaped literal text.
//!
//! The text formats share the line writer in [`Renderer`]: it tracks the
//! output column, pending line breaks, the prefix that starts every line
//! (block quote markers, list indentation) and the last place a long line
//! may be broken.
use crate::ast::{Ast, NodeEvent, NodeValue};
use crate::document::Document;
use crate::extensions::Registry;
use crate::options::{Format, Options, RenderOptions};
use indextree::{Arena, NodeId};
use std::collections::HashMap;
use tracing::debug;

pub mod commonmark;
pub mod html;
pub mod latex;
pub mod man;
pub mod plaintext;
pub mod xml;

/// A render callback. Returns `false` on enter to skip the node's
/// children; its exit event is still delivered.
pub type RenderFn = fn(&mut Renderer<'_>, NodeId, bool) -> bool;

/// Built-in per-format renderer; `None` for kinds the format does not know.
type BuiltinFn = fn(&mut Renderer<'_>, NodeId, bool) -> Option<bool>;

/// Per-character output hook for the text formats.
type OutcFn = fn(&mut Renderer<'_>, Escaping, char, Option<char>);

/// How [`Renderer::out`] treats special characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escaping {
    Literal,
    Normal,
    Url,
    Title,
}

/// Output buffer and line state for one render pass.
pub struct Renderer<'a> {
    doc: &'a Document,
    options: &'a RenderOptions,
    format: Format,
    buffer: String,
    prefix: String,
    column: usize,
    width: usize,
    need_cr: u8,
    /// Byte index of the last breakable space; 0 when there is none.
    last_breakable: usize,
    begin_line: bool,
    begin_content: bool,
    no_linebreaks: bool,
    in_tight_list_item: bool,
    /// Per open non-leaf node: children entered so far, and its own index.
    siblings: Vec<(usize, usize)>,
    /// Index of the current event's node among its siblings.
    index: usize,
    /// Open non-leaf blocks, innermost last.
    blocks: Vec<NodeId>,
    outc: OutcFn,
    /// Inside an image: only text is written, for the `alt` attribute.
    pub(crate) plain: Option<NodeId>,
    pub(crate) footnote_ix: usize,
    pub(crate) written_footnote_ix: usize,
    /// References per footnote number.
    pub(crate) footnote_refs: HashMap<usize, usize>,
    pub(crate) indent: usize,
}

/// Render `doc` in `format`.
pub(crate) fn render(doc: &Document, format: Format, options: &RenderOptions) -> String {
    let (builtin, outc): (BuiltinFn, OutcFn) = match format {
        Format::Html => (html::render_node, literal_outc),
        Format::Xml => (xml::render_node, literal_outc),
        Format::Man => (man::render_node, man::outc),
        Format::CommonMark => (commonmark::render_node, commonmark::outc),
        Format::Latex => (latex::render_node, latex::outc),
        Format::PlainText => (plaintext::render_node, literal_outc),
    };
    let mut renderer = Renderer::new(doc, format, options, outc);
    if format == Format::Html {
        renderer.footnote_refs = html::count_footnote_refs(doc);
    }

    let registry = doc.registry();
    let mut iter = doc.iter();
    while let Some(event) = iter.next() {
        let (node, entering) = match event {
            NodeEvent::Enter(node) => (node, true),
            NodeEvent::Exit(node) => (node, false),
        };
        renderer.track(node, entering);
        match format {
            Format::Html if html::render_plain(&mut renderer, node, entering) => continue,
            Format::CommonMark | Format::PlainText | Format::Latex => commonmark::track_tight_list(&mut renderer, node, entering),
            _ => {}
        }
        let kind = doc.get(node).value.kind();
        let descend = match registry.renderer(kind, format) {
            Some(f) => f(&mut renderer, node, entering),
            None => builtin(&mut renderer, node, entering)
                .unwrap_or_else(|| renderer.render_unknown(node, entering)),
        };
        if !descend && entering && !doc.get(node).value.is_leaf() {
            iter.resume_at_exit(node);
        }
    }

    let mut output = renderer.buffer;
    if options.trailing_newline && !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

fn literal_outc(r: &mut Renderer<'_>, _escape: Escaping, c: char, _next: Option<char>) {
    r.render_code_point(c);
}

impl<'a> Renderer<'a> {
    fn new(doc: &'a Document, format: Format, options: &'a RenderOptions, outc: OutcFn) -> Self {
        Renderer {
            doc,
            options,
            format,
            buffer: String::new(),
            prefix: String::new(),
            column: 0,
            // Hard breaks already end every source line
            width: if options.hardbreaks { 0 } else { options.width },
            need_cr: 0,
            last_breakable: 0,
            begin_line: true,
            begin_content: true,
            no_linebreaks: false,
            in_tight_list_item: false,
            siblings: Vec::new(),
            index: 0,
            blocks: Vec::new(),
            outc,
            plain: None,
            footnote_ix: 0,
            written_footnote_ix: 0,
            footnote_refs: HashMap::new(),
            indent: 0,
        }
    }

    /// Keep sibling positions and the enclosing blocks current as the walk
    /// enters and leaves nodes.
    fn track(&mut self, node: NodeId, entering: bool) {
        let value = &self.doc.get(node).value;
        if entering {
            self.index = match self.siblings.last_mut() {
                Some((seen, _)) => {
                    *seen += 1;
                    *seen - 1
                }
                None => 0,
            };
            if !value.is_leaf() {
                self.siblings.push((0, self.index));
                if value.is_block() {
                    self.blocks.push(node);
                }
            }
        } else {
            if let Some((_, own)) = self.siblings.pop() {
                self.index = own;
            }
            if value.is_block() {
                self.blocks.pop();
            }
        }
    }

    /// Position of the node being rendered among its siblings, from 0.
    pub fn sibling_index(&self) -> usize {
        self.index
    }

    /// The node itself when it is a block, else the block holding it.
    pub fn containing_block(&self, node: NodeId) -> Option<NodeId> {
        if self.value(node).is_block() {
            Some(node)
        } else {
            self.blocks.last().copied()
        }
    }

    pub fn arena(&self) -> &'a Arena<Ast> {
        self.doc.arena()
    }

    pub fn node(&self, node: NodeId) -> &'a Ast {
        self.doc.get(node)
    }

    pub fn value(&self, node: NodeId) -> &'a NodeValue {
        &self.doc.get(node).value
    }

    pub fn options(&self) -> &'a RenderOptions {
        self.options
    }

    /// Option bits the document was parsed with.
    pub fn parse_options(&self) -> Options {
        self.doc.options()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn registry(&self) -> &'a Registry {
        self.doc.registry()
    }

    /// Output written so far.
    pub fn output(&self) -> &str {
        &self.buffer
    }

    /// Append markup as is, bypassing line tracking.
    pub fn write_raw(&mut self, s: &str) {
        self.buffer.push_str(s);
    }

    /// Start a new line unless the output is empty or already at one.
    pub fn html_cr(&mut self) {
        if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
    }

    /// Ask for a line break before the next output.
    pub fn cr(&mut self) {
        self.need_cr = self.need_cr.max(1);
    }

    /// Ask for a blank line before the next output.
    pub fn blankline(&mut self) {
        self.need_cr = self.need_cr.max(2);
    }

    pub fn push_prefix(&mut self, s: &str) {
        self.prefix.push_str(s);
    }

    pub fn truncate_prefix(&mut self, by: usize) {
        let len = self.prefix.len().saturating_sub(by);
        self.prefix.truncate(len);
    }

    pub fn set_no_linebreaks(&mut self, no_linebreaks: bool) {
        self.no_linebreaks = no_linebreaks;
    }

    pub(crate) fn set_in_tight_list_item(&mut self, tight: bool) {
        self.in_tight_list_item = tight;
    }

    pub(crate) fn begin_line(&self) -> bool {
        self.begin_line
    }

    pub(crate) fn begin_content(&self) -> bool {
        self.begin_content
    }

    /// Treat the next character as the start of a block's content, for
    /// escaping after a marker written with [`lit`](Self::lit).
    pub(crate) fn set_begin_content(&mut self, begin_content: bool) {
        self.begin_content = begin_content;
    }

    pub(crate) fn last_byte(&self) -> Option<u8> {
        self.buffer.as_bytes().last().copied()
    }

    /// Write one character, counting one column.
    pub fn render_code_point(&mut self, c: char) {
        self.buffer.push(c);
        self.column += 1;
    }

    /// Write ASCII without newlines.
    pub fn render_ascii(&mut self, s: &str) {
        self.buffer.push_str(s);
        self.column += s.len();
    }

    /// Write literal text with no escaping.
    pub fn lit(&mut self, s: &str, wrap: bool) {
        self.out(s, wrap, Escaping::Literal);
    }

    /// Write text through the line writer: flush pending breaks, add the
    /// prefix at line starts, escape through the format's hook and wrap at
    /// the configured width.
    pub fn out(&mut self, text: &str, wrap: bool, escape: Escaping) {
        let wrap = wrap && !self.no_linebreaks;

        if self.in_tight_list_item && self.need_cr > 1 {
            self.need_cr = 1;
        }
        let mut k = self.buffer.len().checked_sub(1);
        while self.need_cr > 0 {
            match k {
                Some(i) if self.buffer.as_bytes()[i] != b'\n' => {
                    self.buffer.push('\n');
                    if self.need_cr > 1 {
                        self.buffer.push_str(&self.prefix);
                    }
                }
                Some(i) => k = i.checked_sub(1),
                None => {}
            }
            self.column = 0;
            self.last_breakable = 0;
            self.begin_line = true;
            self.begin_content = true;
            self.need_cr -= 1;
        }

        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if self.begin_line {
                self.buffer.push_str(&self.prefix);
                self.column = self.prefix.chars().count();
            }

            let next = chars.peek().copied();
            if c == ' ' && wrap {
                if !self.begin_line {
                    let last_nonspace = self.buffer.len();
                    self.buffer.push(' ');
                    self.column += 1;
                    self.begin_line = false;
                    self.begin_content = false;
                    while chars.peek() == Some(&' ') {
                        chars.next();
                    }
                    // A digit must never start a wrapped line
                    if !chars.peek().is_some_and(char::is_ascii_digit) {
                        self.last_breakable = last_nonspace;
                    }
                }
            } else if escape == Escaping::Literal {
                if c == '\n' {
                    self.buffer.push('\n');
                    self.column = 0;
                    self.begin_line = true;
                    self.begin_content = true;
                    self.last_breakable = 0;
                } else {
                    self.render_code_point(c);
                    self.begin_line = false;
                    // Still at content start while reading a number, so a
                    // following `.` or `)` gets escaped
                    self.begin_content = self.begin_content && c.is_ascii_digit();
                }
            } else {
                (self.outc)(self, escape, c, next);
                self.begin_line = false;
                self.begin_content = self.begin_content && c.is_ascii_digit();
            }

            if self.width > 0 && self.column > self.width && !self.begin_line && self.last_breakable > 0 {
                let remainder = self.buffer[self.last_breakable + 1..].to_string();
                self.buffer.truncate(self.last_breakable);
                self.buffer.push('\n');
                self.buffer.push_str(&self.prefix);
                self.buffer.push_str(&remainder);
                self.column = self.prefix.chars().count() + remainder.chars().count();
                self.last_breakable = 0;
                self.begin_line = false;
                self.begin_content = false;
            }
        }
    }

    /// Fallback for kinds no renderer claims.
    fn render_unknown(&mut self, node: NodeId, entering: bool) -> bool {
        let value = self.value(node);
        if entering {
            debug!(kind = ?value.kind(), format = %self.format, "no renderer, writing literal text");
            if let Some(literal) = value.literal() {
                match self.format {
                    Format::Html | Format::Xml => {
                        let escaped = html::escape_html(literal);
                        self.write_raw(&escaped);
                    }
                    _ => self.out(literal, false, Escaping::Normal),
                }
            }
        }
        true
    }
}

/// The list holding an item, and whether that list is tight.
pub(crate) fn parent_list_tight(arena: &Arena<Ast>, node: NodeId) -> bool {
    arena[node]
        .parent()
        .is_some_and(|p| matches!(arena[p].get().value, NodeValue::List(list) if list.tight))
}

#[cfg(test)]
mod tests {
    use crate::{Options, Parser, RenderOptions};
    use crate::options::Format;

    fn render(md: &str, format: Format, opts: RenderOptions) -> String {
        let mut parser = Parser::new(Options::empty());
        parser.feed(md);
        parser.finish().render(format, &opts)
    }

    #[test]
    fn test_width_wraps_at_last_space() {
        let out = render(
            "aaa bbb ccc ddd\n",
            Format::CommonMark,
            RenderOptions::default().with_width(8),
        );
        assert_eq!(out, "aaa bbb\nccc ddd\n");
    }

    #[test]
    fn test_never_wraps_before_digit() {
        let out = render("aaaa 1. bb\n", Format::CommonMark, RenderOptions::default().with_width(5));
        assert!(!out.lines().any(|line| line.starts_with("1.")));
    }

    #[test]
    fn test_trailing_newline_option() {
        let opts = RenderOptions::default().with_trailing_newline(false);
        assert_eq!(render("hi\n", Format::PlainText, opts.clone()), "hi");
        assert_eq!(render("hi\n", Format::PlainText, opts.with_trailing_newline(true)), "hi\n");
        assert_eq!(render("", Format::PlainText, RenderOptions::default()), "");
    }

    #[test]
    fn test_prefix_applied_on_every_line() {
        let out = render("> a\n> b\n>\n> c\n", Format::CommonMark, RenderOptions::default());
        assert_eq!(out, "> a\n> b\n> \n> c\n");
    }
}
