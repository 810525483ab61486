//! Streaming Markdown parser
use crate::ast::{
    Ast, LineColumn, NodeFootnoteDefinition, NodeFootnoteReference, NodeValue,
};
use crate::document::Document;
use crate::extensions::Registry;
use crate::input::LineReader;
use crate::options::Options;
use crate::references::{RefMap, normalize_label};
use indextree::{Arena, NodeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Container nesting beyond this depth is read as paragraph text.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;

/// Incremental parser: feed bytes in any chunking, then [`finish`](Parser::finish).
///
/// ```
/// use marktree::{Options, Parser};
///
/// let mut parser = Parser::new(Options::empty());
/// parser.feed("# Title\n\nSome ");
/// parser.feed("*text*\n");
/// let doc = parser.finish();
/// assert_eq!(doc.to_html(), "<h1>Title</h1>\n<p>Some <em>text</em></p>\n");
/// ```
pub struct Parser {
    pub(crate) arena: Arena<Ast>,
    pub(crate) root: NodeId,
    /// Innermost open block.
    pub(crate) current: NodeId,
    pub(crate) options: Options,
    pub(crate) registry: Arc<Registry>,
    pub(crate) refmap: RefMap,
    /// Normalized label to definition, first definition wins.
    pub(crate) footnote_defs: HashMap<String, NodeId>,
    reader: LineReader,

    // Per-line scanning state
    pub(crate) line_number: usize,
    pub(crate) offset: usize,
    pub(crate) column: usize,
    pub(crate) first_nonspace: usize,
    pub(crate) first_nonspace_column: usize,
    pub(crate) thematic_break_kill_pos: usize,
    pub(crate) indent: usize,
    pub(crate) blank: bool,
    pub(crate) partially_consumed_tab: bool,
    /// Length of the line being processed, without its newline; `None`
    /// once input has ended.
    pub(crate) line_len: Option<usize>,
    pub(crate) last_line_length: usize,
    pub(crate) max_nesting_depth: usize,
}

impl Parser {
    /// A parser using the built-in extension registry.
    pub fn new(options: Options) -> Self {
        Self::with_registry(options, Registry::builtin())
    }

    /// A parser that allocates nodes from a caller-supplied arena.
    ///
    /// The arena is cleared first; its capacity is kept.
    pub fn with_arena(options: Options, mut arena: Arena<Ast>) -> Self {
        arena.clear();
        Self::build(options, Registry::builtin(), arena)
    }

    pub fn with_registry(options: Options, registry: Arc<Registry>) -> Self {
        Self::build(options, registry, Arena::new())
    }

    fn build(options: Options, registry: Arc<Registry>, mut arena: Arena<Ast>) -> Self {
        let root = arena.new_node(Ast::new(NodeValue::Document, LineColumn::new(1, 1)));
        Parser {
            arena,
            root,
            current: root,
            options,
            registry,
            refmap: RefMap::new(),
            footnote_defs: HashMap::new(),
            reader: LineReader::new(),
            line_number: 0,
            offset: 0,
            column: 0,
            first_nonspace: 0,
            first_nonspace_column: 0,
            thematic_break_kill_pos: 0,
            indent: 0,
            blank: false,
            partially_consumed_tab: false,
            line_len: None,
            last_line_length: 0,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    pub fn set_max_nesting_depth(&mut self, depth: usize) {
        self.max_nesting_depth = depth;
    }

    /// Append input. Lines are processed as soon as their ending arrives.
    pub fn feed(&mut self, input: impl AsRef<[u8]>) {
        let mut lines = Vec::new();
        self.reader.feed(input.as_ref(), |line| lines.push(line));
        for line in lines {
            self.process_line(&line);
        }
    }

    /// Close every open block, resolve inlines and footnotes, and hand the
    /// tree over.
    pub fn finish(mut self) -> Document {
        if let Some(line) = self.reader.finish() {
            self.process_line(&line);
        }
        self.line_len = None;

        while self.current != self.root {
            self.current = self.finalize(self.current);
        }
        self.finalize(self.root);

        self.refmap.set_document_size(self.reader.total_bytes());
        self.process_inlines();
        if self.options.contains(Options::FOOTNOTES) {
            self.process_footnotes();
        }

        let registry = Arc::clone(&self.registry);
        for ext in registry.enabled(self.options) {
            if let Some(postprocess) = ext.postprocess {
                postprocess(&mut self.arena, self.root, self.options);
            }
        }

        debug!(
            lines = self.line_number,
            nodes = self.root.descendants(&self.arena).count(),
            references = self.refmap.len(),
            "parse finished"
        );

        Document::new(self.arena, self.root, self.options, self.registry)
    }

    /// Arena access for extension matchers.
    pub fn arena(&self) -> &Arena<Ast> {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena<Ast> {
        &mut self.arena
    }

    /// Byte offset of the scanning cursor in the current line.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte offset of the first non-blank character at or after the cursor.
    pub fn first_nonspace(&self) -> usize {
        self.first_nonspace
    }

    /// Columns of indentation between the cursor and the first non-blank.
    pub fn indent(&self) -> usize {
        self.indent
    }

    /// The rest of the current line is blank.
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    fn process_inlines(&mut self) {
        let leaves: Vec<NodeId> = self
            .root
            .descendants(&self.arena)
            .filter(|&id| self.arena[id].get().value.contains_inlines())
            .collect();
        for leaf in leaves {
            self.parse_inlines(leaf);
        }
    }

    /// Number footnotes by first reference, drop unreferenced definitions
    /// and move the rest to the end of the document.
    fn process_footnotes(&mut self) {
        let references: Vec<NodeId> = self
            .root
            .descendants(&self.arena)
            .filter(|&id| matches!(self.arena[id].get().value, NodeValue::FootnoteReference(_)))
            .collect();

        let mut next_ix = 0;
        let mut counts: HashMap<NodeId, usize> = HashMap::new();
        let mut ordered = Vec::new();
        for reference in references {
            let label = match &self.arena[reference].get().value {
                NodeValue::FootnoteReference(r) => normalize_label(&r.label),
                _ => continue,
            };
            let Some(&def) = self.footnote_defs.get(&label) else {
                continue;
            };
            let NodeValue::FootnoteDefinition(definition) = &mut self.arena[def].get_mut().value else {
                continue;
            };
            if definition.ix == 0 {
                next_ix += 1;
                definition.ix = next_ix;
                ordered.push(def);
            }
            let ix = definition.ix;
            let def_label = definition.label.clone();
            let count = counts.entry(def).or_default();
            *count += 1;
            let ref_ix = *count;

            self.arena[reference].get_mut().value = NodeValue::FootnoteReference(NodeFootnoteReference {
                label: def_label,
                ix,
                ref_ix,
            });
        }

        for &def in self.footnote_defs.values() {
            if !counts.contains_key(&def) {
                def.remove_subtree(&mut self.arena);
            }
        }
        // Earlier definitions with the same label never made it into the map
        let orphans: Vec<NodeId> = self
            .root
            .descendants(&self.arena)
            .filter(|&id| {
                matches!(
                    &self.arena[id].get().value,
                    NodeValue::FootnoteDefinition(NodeFootnoteDefinition { ix: 0, .. })
                )
            })
            .collect();
        for orphan in orphans {
            orphan.remove_subtree(&mut self.arena);
        }

        for def in ordered {
            def.detach(&mut self.arena);
            self.root.append(def, &mut self.arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn kinds(doc: &Document) -> Vec<NodeKind> {
        doc.root()
            .descendants(doc.arena())
            .map(|id| doc.arena()[id].get().value.kind())
            .collect()
    }

    #[test]
    fn test_feed_in_pieces_matches_single_feed() {
        let text = "> quote\n> more\n\n- a\n- b\n\n```\ncode\n```\n";
        let whole = {
            let mut p = Parser::new(Options::empty());
            p.feed(text);
            p.finish().to_html()
        };
        let pieces = {
            let mut p = Parser::new(Options::empty());
            for chunk in text.as_bytes().chunks(3) {
                p.feed(chunk);
            }
            p.finish().to_html()
        };
        assert_eq!(whole, pieces);
    }

    #[test]
    fn test_nesting_limit_degrades_to_text() {
        let mut parser = Parser::new(Options::empty());
        parser.set_max_nesting_depth(3);
        parser.feed(">>>>>> deep\n");
        let doc = parser.finish();
        let quotes = kinds(&doc).iter().filter(|k| **k == NodeKind::BlockQuote).count();
        assert_eq!(quotes, 3);
        assert_eq!(
            doc.to_html(),
            "<blockquote>\n<blockquote>\n<blockquote>\n<p>&gt;&gt;&gt; deep</p>\n</blockquote>\n</blockquote>\n</blockquote>\n"
        );
    }

    #[test]
    fn test_with_arena_reuses_allocation() {
        let mut first = Parser::new(Options::empty());
        first.feed("one\n");
        let arena = first.finish().into_arena();
        let mut second = Parser::with_arena(Options::empty(), arena);
        second.feed("two\n");
        assert_eq!(second.finish().to_html(), "<p>two</p>\n");
    }

    #[test]
    fn test_unterminated_fence_keeps_remaining_lines() {
        let mut parser = Parser::new(Options::empty());
        parser.feed("```\nline 1\n\nline 3");
        let doc = parser.finish();
        let code = doc
            .root()
            .descendants(doc.arena())
            .find_map(|id| match &doc.arena()[id].get().value {
                NodeValue::CodeBlock(cb) => Some(cb.literal.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(code, "line 1\n\nline 3\n");
    }

    #[test]
    fn test_footnotes_numbered_by_first_reference() {
        let mut parser = Parser::new(Options::FOOTNOTES);
        parser.feed("b[^b] a[^a] b[^b]\n\n[^a]: A\n[^b]: B\n[^c]: unused\n");
        let doc = parser.finish();
        let defs: Vec<(String, usize)> = doc
            .root()
            .children(doc.arena())
            .filter_map(|id| match &doc.arena()[id].get().value {
                NodeValue::FootnoteDefinition(d) => Some((d.label.clone(), d.ix)),
                _ => None,
            })
            .collect();
        assert_eq!(defs, [("b".to_string(), 1), ("a".to_string(), 2)]);
    }
}
