//! Document tree types
//!
//! Nodes live in an `indextree::Arena<Ast>`; parent, child and sibling links
//! are `NodeId`s owned by the arena, so dropping the arena tears down the
//! whole tree without recursion.
use indextree::{Arena, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based line and column pair.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

impl LineColumn {
    pub fn new(line: usize, column: usize) -> Self {
        LineColumn { line, column }
    }
}

/// Start and end of a node in the source, both inclusive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sourcepos {
    pub start: LineColumn,
    pub end: LineColumn,
}

impl Sourcepos {
    pub fn new(start: LineColumn, end: LineColumn) -> Self {
        Sourcepos { start, end }
    }

    /// True when `other` starts and ends within `self`.
    pub fn contains(&self, other: &Sourcepos) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Sourcepos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListType {
    #[default]
    Bullet,
    Ordered,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListDelimType {
    #[default]
    Period,
    Paren,
}

/// Marker data shared by lists and their items.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeList {
    pub list_type: ListType,
    /// Columns of indentation before the marker.
    pub marker_offset: usize,
    /// Columns from the marker start to the item content.
    pub padding: usize,
    pub start: usize,
    pub delimiter: ListDelimType,
    pub bullet_char: u8,
    pub tight: bool,
}

impl NodeList {
    /// Items continue a list only when type, delimiter and bullet agree.
    pub fn matches(&self, other: &NodeList) -> bool {
        self.list_type == other.list_type
            && self.delimiter == other.delimiter
            && self.bullet_char == other.bullet_char
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTaskItem {
    pub list: NodeList,
    pub checked: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCodeBlock {
    pub fenced: bool,
    pub fence_char: u8,
    pub fence_length: usize,
    pub fence_offset: usize,
    pub info: String,
    pub literal: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHtmlBlock {
    /// Start condition 1 to 7.
    pub block_type: u8,
    pub literal: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHeading {
    pub level: u8,
    pub setext: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLink {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFootnoteDefinition {
    pub label: String,
    /// 1-based number assigned in order of first reference.
    pub ix: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFootnoteReference {
    pub label: String,
    pub ix: usize,
    /// Which reference to the same footnote this is, starting at 1.
    pub ref_ix: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

/// A node's kind together with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeValue {
    Document,
    // Container blocks
    BlockQuote,
    List(NodeList),
    Item(NodeList),
    TaskItem(NodeTaskItem),
    FootnoteDefinition(NodeFootnoteDefinition),
    Table(Vec<Alignment>),
    /// `true` for the header row.
    TableRow(bool),
    TableCell,
    // Leaf blocks
    CodeBlock(NodeCodeBlock),
    HtmlBlock(NodeHtmlBlock),
    Paragraph,
    Heading(NodeHeading),
    ThematicBreak,
    // Inlines
    Text(String),
    SoftBreak,
    LineBreak,
    Code(String),
    HtmlInline(String),
    Emph,
    Strong,
    Strikethrough,
    Mark,
    Link(NodeLink),
    Image(NodeLink),
    FootnoteReference(NodeFootnoteReference),
}

/// Field-less node kind, used as the render table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    BlockQuote,
    List,
    Item,
    TaskItem,
    FootnoteDefinition,
    Table,
    TableRow,
    TableCell,
    CodeBlock,
    HtmlBlock,
    Paragraph,
    Heading,
    ThematicBreak,
    Text,
    SoftBreak,
    LineBreak,
    Code,
    HtmlInline,
    Emph,
    Strong,
    Strikethrough,
    Mark,
    Link,
    Image,
    FootnoteReference,
}

impl NodeValue {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeValue::Document => NodeKind::Document,
            NodeValue::BlockQuote => NodeKind::BlockQuote,
            NodeValue::List(_) => NodeKind::List,
            NodeValue::Item(_) => NodeKind::Item,
            NodeValue::TaskItem(_) => NodeKind::TaskItem,
            NodeValue::FootnoteDefinition(_) => NodeKind::FootnoteDefinition,
            NodeValue::Table(_) => NodeKind::Table,
            NodeValue::TableRow(_) => NodeKind::TableRow,
            NodeValue::TableCell => NodeKind::TableCell,
            NodeValue::CodeBlock(_) => NodeKind::CodeBlock,
            NodeValue::HtmlBlock(_) => NodeKind::HtmlBlock,
            NodeValue::Paragraph => NodeKind::Paragraph,
            NodeValue::Heading(_) => NodeKind::Heading,
            NodeValue::ThematicBreak => NodeKind::ThematicBreak,
            NodeValue::Text(_) => NodeKind::Text,
            NodeValue::SoftBreak => NodeKind::SoftBreak,
            NodeValue::LineBreak => NodeKind::LineBreak,
            NodeValue::Code(_) => NodeKind::Code,
            NodeValue::HtmlInline(_) => NodeKind::HtmlInline,
            NodeValue::Emph => NodeKind::Emph,
            NodeValue::Strong => NodeKind::Strong,
            NodeValue::Strikethrough => NodeKind::Strikethrough,
            NodeValue::Mark => NodeKind::Mark,
            NodeValue::Link(_) => NodeKind::Link,
            NodeValue::Image(_) => NodeKind::Image,
            NodeValue::FootnoteReference(_) => NodeKind::FootnoteReference,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeValue::Document
                | NodeValue::BlockQuote
                | NodeValue::List(_)
                | NodeValue::Item(_)
                | NodeValue::TaskItem(_)
                | NodeValue::FootnoteDefinition(_)
                | NodeValue::Table(_)
                | NodeValue::TableRow(_)
                | NodeValue::TableCell
                | NodeValue::CodeBlock(_)
                | NodeValue::HtmlBlock(_)
                | NodeValue::Paragraph
                | NodeValue::Heading(_)
                | NodeValue::ThematicBreak
        )
    }

    /// Leaves never have children; the tree iterator enters them only once.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeValue::CodeBlock(_)
                | NodeValue::HtmlBlock(_)
                | NodeValue::ThematicBreak
                | NodeValue::Text(_)
                | NodeValue::SoftBreak
                | NodeValue::LineBreak
                | NodeValue::Code(_)
                | NodeValue::HtmlInline(_)
                | NodeValue::FootnoteReference(_)
        )
    }

    /// Blocks whose raw content grows line by line.
    pub fn accepts_lines(&self) -> bool {
        matches!(
            self,
            NodeValue::Paragraph | NodeValue::Heading(_) | NodeValue::CodeBlock(_) | NodeValue::HtmlBlock(_)
        )
    }

    /// Blocks whose raw content is parsed into inline children.
    pub fn contains_inlines(&self) -> bool {
        matches!(
            self,
            NodeValue::Paragraph | NodeValue::Heading(_) | NodeValue::TableCell
        )
    }

    pub fn can_contain(&self, child: &NodeValue) -> bool {
        match self {
            NodeValue::Document
            | NodeValue::BlockQuote
            | NodeValue::FootnoteDefinition(_)
            | NodeValue::Item(_)
            | NodeValue::TaskItem(_) => {
                child.is_block()
                    && !matches!(
                        child,
                        NodeValue::Document
                            | NodeValue::Item(_)
                            | NodeValue::TaskItem(_)
                            | NodeValue::TableRow(_)
                            | NodeValue::TableCell
                    )
            }
            NodeValue::List(_) => matches!(child, NodeValue::Item(_) | NodeValue::TaskItem(_)),
            NodeValue::Table(_) => matches!(child, NodeValue::TableRow(_)),
            NodeValue::TableRow(_) => matches!(child, NodeValue::TableCell),
            NodeValue::Paragraph
            | NodeValue::Heading(_)
            | NodeValue::TableCell
            | NodeValue::Emph
            | NodeValue::Strong
            | NodeValue::Strikethrough
            | NodeValue::Mark
            | NodeValue::Link(_)
            | NodeValue::Image(_) => !child.is_block(),
            _ => false,
        }
    }

    /// List marker data for items, including task items.
    pub fn item_list(&self) -> Option<&NodeList> {
        match self {
            NodeValue::Item(list) => Some(list),
            NodeValue::TaskItem(task) => Some(&task.list),
            _ => None,
        }
    }

    /// Literal text carried by leaf inlines and literal blocks.
    pub fn literal(&self) -> Option<&str> {
        match self {
            NodeValue::Text(s) | NodeValue::Code(s) | NodeValue::HtmlInline(s) => Some(s),
            NodeValue::CodeBlock(cb) => Some(&cb.literal),
            NodeValue::HtmlBlock(hb) => Some(&hb.literal),
            _ => None,
        }
    }
}

/// Where a line of a leaf's raw content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineOffset {
    /// Byte index into the content where the line starts.
    pub pos: usize,
    pub line: usize,
    /// 1-based source column of the first content byte.
    pub column: usize,
}

/// A node stored in the arena.
#[derive(Debug, Clone)]
pub struct Ast {
    pub value: NodeValue,
    pub sourcepos: Sourcepos,
    pub(crate) content: String,
    pub(crate) line_offsets: Vec<LineOffset>,
    pub(crate) open: bool,
    pub(crate) last_line_blank: bool,
}

impl Ast {
    /// An open block starting at `start`.
    pub fn new(value: NodeValue, start: LineColumn) -> Self {
        Ast {
            value,
            sourcepos: Sourcepos::new(start, LineColumn::new(start.line, 0)),
            content: String::new(),
            line_offsets: Vec::new(),
            open: true,
            last_line_blank: false,
        }
    }

    /// A closed node with a known extent.
    pub fn with_sourcepos(value: NodeValue, sourcepos: Sourcepos) -> Self {
        Ast {
            value,
            sourcepos,
            content: String::new(),
            line_offsets: Vec::new(),
            open: false,
            last_line_blank: false,
        }
    }

    /// Raw text collected by the block parser; empty once inlines are parsed.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub(crate) fn push_line(&mut self, text: &str, line: usize, column: usize) {
        self.line_offsets.push(LineOffset {
            pos: self.content.len(),
            line,
            column,
        });
        self.content.push_str(text);
    }
}

/// Entering or leaving a node during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    Enter(NodeId),
    Exit(NodeId),
}

/// Depth-first walk yielding enter/exit events without recursion.
///
/// Leaf nodes are only entered. [`NodeIter::skip_children`] drops the rest
/// of a node's subtree, including its exit event.
pub struct NodeIter<'a> {
    arena: &'a Arena<Ast>,
    root: NodeId,
    next: Option<NodeEvent>,
}

impl<'a> NodeIter<'a> {
    pub fn new(arena: &'a Arena<Ast>, root: NodeId) -> Self {
        NodeIter {
            arena,
            root,
            next: Some(NodeEvent::Enter(root)),
        }
    }

    /// Continue after `node` as if its subtree had been fully visited.
    pub fn skip_children(&mut self, node: NodeId) {
        self.next = self.after(node);
    }

    /// Jump straight to `node`'s exit event, skipping its children.
    pub fn resume_at_exit(&mut self, node: NodeId) {
        self.next = Some(NodeEvent::Exit(node));
    }

    fn after(&self, node: NodeId) -> Option<NodeEvent> {
        if node == self.root {
            return None;
        }
        let n = &self.arena[node];
        match n.next_sibling() {
            Some(sibling) => Some(NodeEvent::Enter(sibling)),
            None => n.parent().map(NodeEvent::Exit),
        }
    }

    fn is_leaf(&self, node: NodeId) -> bool {
        self.arena[node].get().value.is_leaf()
    }
}

impl Iterator for NodeIter<'_> {
    type Item = NodeEvent;

    fn next(&mut self) -> Option<NodeEvent> {
        let event = self.next?;
        self.next = match event {
            NodeEvent::Enter(node) if !self.is_leaf(node) => match self.arena[node].first_child() {
                Some(child) => Some(NodeEvent::Enter(child)),
                None => Some(NodeEvent::Exit(node)),
            },
            NodeEvent::Enter(node) | NodeEvent::Exit(node) => self.after(node),
        };
        Some(event)
    }
}

/// Concatenated literal text below `node`, with breaks as spaces or newlines.
pub fn collect_text(arena: &Arena<Ast>, node: NodeId) -> String {
    let mut text = String::new();
    for descendant in node.descendants(arena) {
        match &arena[descendant].get().value {
            NodeValue::Text(s) | NodeValue::Code(s) => text.push_str(s),
            NodeValue::SoftBreak => text.push(' '),
            NodeValue::LineBreak => text.push('\n'),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> (Arena<Ast>, NodeId) {
        let mut arena = Arena::new();
        let root = arena.new_node(Ast::new(NodeValue::Document, LineColumn::new(1, 1)));
        let para = arena.new_node(Ast::new(NodeValue::Paragraph, LineColumn::new(1, 1)));
        let emph = arena.new_node(Ast::new(NodeValue::Emph, LineColumn::new(1, 1)));
        let text = arena.new_node(Ast::new(NodeValue::Text("a".into()), LineColumn::new(1, 2)));
        let tail = arena.new_node(Ast::new(NodeValue::Text("b".into()), LineColumn::new(1, 4)));
        root.append(para, &mut arena);
        para.append(emph, &mut arena);
        emph.append(text, &mut arena);
        para.append(tail, &mut arena);
        (arena, root)
    }

    #[test]
    fn test_iter_enters_leaves_once() {
        let (arena, root) = build();
        let kinds: Vec<_> = NodeIter::new(&arena, root)
            .map(|ev| match ev {
                NodeEvent::Enter(id) => format!("+{:?}", arena[id].get().value.kind()),
                NodeEvent::Exit(id) => format!("-{:?}", arena[id].get().value.kind()),
            })
            .collect();
        assert_eq!(
            kinds,
            ["+Document", "+Paragraph", "+Emph", "+Text", "-Emph", "+Text", "-Paragraph", "-Document"]
        );
    }

    #[test]
    fn test_iter_skip_children_drops_exit() {
        let (arena, root) = build();
        let mut iter = NodeIter::new(&arena, root);
        let mut seen = Vec::new();
        while let Some(ev) = iter.next() {
            if let NodeEvent::Enter(id) = ev
                && arena[id].get().value == NodeValue::Emph
            {
                iter.skip_children(id);
            }
            seen.push(ev);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(collect_text(&arena, root), "ab");
    }

    #[test]
    fn test_sourcepos_display() {
        let pos = Sourcepos::new(LineColumn::new(1, 1), LineColumn::new(3, 7));
        assert_eq!(pos.to_string(), "1:1-3:7");
        assert!(pos.contains(&Sourcepos::new(LineColumn::new(2, 1), LineColumn::new(2, 9))));
    }
}
