//! Line-by-line block structure
//!
//! Each line walks the open path from the root, opens new blocks in a fixed
//! precedence order, then lands its remaining text in the innermost leaf.
use crate::ast::{
    Ast, LineColumn, ListDelimType, ListType, NodeCodeBlock, NodeFootnoteDefinition, NodeHeading,
    NodeHtmlBlock, NodeList, NodeValue,
};
use crate::options::Options;
use crate::parser::Parser;
use crate::references::{self, normalize_label};
use crate::scanners::{self, is_line_end, is_space_or_tab};
use indextree::NodeId;
use std::sync::Arc;
use tracing::{debug, trace};

const TAB_STOP: usize = 4;
const CODE_INDENT: usize = 4;

#[inline]
fn peek(line: &[u8], i: usize) -> u8 {
    line.get(i).copied().unwrap_or(0)
}

/// Only whitespace remains.
fn is_blank(text: &str) -> bool {
    text.bytes().all(|c| matches!(c, b' ' | b'\t' | b'\n' | b'\r'))
}

impl Parser {
    /// Process one line; `line` always ends with `\n`.
    pub(crate) fn process_line(&mut self, line: &str) {
        self.offset = 0;
        self.column = 0;
        self.first_nonspace = 0;
        self.first_nonspace_column = 0;
        self.thematic_break_kill_pos = 0;
        self.indent = 0;
        self.blank = false;
        self.partially_consumed_tab = false;
        self.line_number += 1;
        self.line_len = Some(line.len().saturating_sub(1));

        if let Some((last_matched, all_matched)) = self.check_open_blocks(line) {
            let mut container = last_matched;
            self.open_new_blocks(&mut container, line, all_matched);
            self.add_text_to_container(container, last_matched, line);
        }

        self.last_line_length = line.len().saturating_sub(1);
    }

    fn value(&self, node: NodeId) -> &NodeValue {
        &self.arena[node].get().value
    }

    fn open_last_child(&self, node: NodeId) -> Option<NodeId> {
        let last = self.arena[node].last_child()?;
        self.arena[last].get().open.then_some(last)
    }

    fn nesting_depth(&self, node: NodeId) -> usize {
        node.ancestors(&self.arena).count() - 1
    }

    /// Walk the open path and match each block's continuation rule.
    ///
    /// Returns the last matched container and whether every open block
    /// matched, or `None` when a closing code fence ended the line.
    fn check_open_blocks(&mut self, line: &str) -> Option<(NodeId, bool)> {
        let mut should_continue = true;
        let mut all_matched = false;
        let mut container = self.root;
        let registry = Arc::clone(&self.registry);

        'done: {
            while let Some(last) = self.open_last_child(container) {
                container = last;
                self.find_first_nonspace(line);

                // Extension-owned blocks decide for themselves
                let claimed = registry
                    .enabled(self.options)
                    .filter_map(|ext| ext.block_continue)
                    .find_map(|matches| matches(self, container, line));
                if let Some(matched) = claimed {
                    if !matched {
                        break 'done;
                    }
                    continue;
                }

                let matched = match self.value(container).clone() {
                    NodeValue::BlockQuote => self.parse_block_quote_prefix(line),
                    NodeValue::Item(list) => self.parse_item_prefix(line, container, &list),
                    NodeValue::TaskItem(task) => self.parse_item_prefix(line, container, &task.list),
                    NodeValue::CodeBlock(cb) => {
                        self.parse_code_block_prefix(line, container, &cb, &mut should_continue)
                    }
                    // A heading never spans more than one line
                    NodeValue::Heading(_) => false,
                    NodeValue::HtmlBlock(hb) => hb.block_type <= 5 || !self.blank,
                    NodeValue::Paragraph => !self.blank,
                    NodeValue::FootnoteDefinition(_) => self.parse_footnote_prefix(line),
                    _ => true,
                };
                if !matched {
                    break 'done;
                }
            }
            all_matched = true;
        }

        if !all_matched {
            // Back up to the last block that did match
            container = self.arena[container].parent().unwrap_or(self.root);
        }
        should_continue.then_some((container, all_matched))
    }

    fn parse_block_quote_prefix(&mut self, line: &str) -> bool {
        let bytes = line.as_bytes();
        if self.indent > 3 || peek(bytes, self.first_nonspace) != b'>' {
            return false;
        }
        self.advance_offset(line, self.indent + 1, true);
        if is_space_or_tab(peek(bytes, self.offset)) {
            self.advance_offset(line, 1, true);
        }
        true
    }

    fn parse_item_prefix(&mut self, line: &str, container: NodeId, list: &NodeList) -> bool {
        if self.indent >= list.marker_offset + list.padding {
            self.advance_offset(line, list.marker_offset + list.padding, true);
            true
        } else if self.blank && self.arena[container].first_child().is_some() {
            // An item whose first line was blank ends at the next blank line
            self.advance_offset(line, self.first_nonspace - self.offset, false);
            true
        } else {
            false
        }
    }

    fn parse_code_block_prefix(
        &mut self,
        line: &str,
        container: NodeId,
        cb: &NodeCodeBlock,
        should_continue: &mut bool,
    ) -> bool {
        let bytes = line.as_bytes();
        if !cb.fenced {
            if self.indent >= CODE_INDENT {
                self.advance_offset(line, CODE_INDENT, true);
                return true;
            }
            if self.blank {
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                return true;
            }
            return false;
        }

        let closing = (self.indent <= 3 && peek(bytes, self.first_nonspace) == cb.fence_char)
            .then(|| scanners::close_code_fence(bytes, self.first_nonspace))
            .flatten();
        match closing {
            Some(len) if len >= cb.fence_length => {
                // Closing fence; nothing else on this line matters
                *should_continue = false;
                self.advance_offset(line, len, false);
                self.current = self.finalize(container);
            }
            _ => {
                // Strip up to the opening fence's indentation
                let mut i = cb.fence_offset;
                while i > 0 && is_space_or_tab(peek(bytes, self.offset)) {
                    self.advance_offset(line, 1, true);
                    i -= 1;
                }
            }
        }
        true
    }

    fn parse_footnote_prefix(&mut self, line: &str) -> bool {
        if self.indent >= 4 {
            self.advance_offset(line, 4, true);
            true
        } else {
            self.blank
        }
    }

    /// Try block starts in precedence order until a leaf is reached or
    /// nothing more matches.
    fn open_new_blocks(&mut self, container: &mut NodeId, line: &str, all_matched: bool) {
        let bytes = line.as_bytes();
        let mut maybe_lazy = matches!(self.value(self.current), NodeValue::Paragraph);
        let registry = Arc::clone(&self.registry);

        loop {
            let cont = self.value(*container).clone();
            if matches!(cont, NodeValue::CodeBlock(_) | NodeValue::HtmlBlock(_)) {
                break;
            }
            let is_paragraph = matches!(cont, NodeValue::Paragraph);

            self.find_first_nonspace(line);
            let indented = self.indent >= CODE_INDENT;
            let fns = self.first_nonspace;
            let depth = self.nesting_depth(*container);
            let room = depth < self.max_nesting_depth;
            if !room && !indented && peek(bytes, fns) == b'>' {
                debug!(depth, line = self.line_number, "nesting limit reached");
            }

            if !indented && peek(bytes, fns) == b'>' && room {
                // Block quote, with one optional space after the marker
                self.advance_offset(line, fns + 1 - self.offset, false);
                if is_space_or_tab(peek(bytes, self.offset)) {
                    self.advance_offset(line, 1, true);
                }
                *container = self.add_child(*container, NodeValue::BlockQuote, fns + 1);
            } else if let Some((matched, level)) =
                (!indented).then(|| scanners::atx_heading_start(bytes, fns)).flatten()
            {
                self.advance_offset(line, fns + matched - self.offset, false);
                *container = self.add_child(
                    *container,
                    NodeValue::Heading(NodeHeading { level, setext: false }),
                    fns + 1,
                );
            } else if let Some(matched) = (!indented).then(|| scanners::open_code_fence(bytes, fns)).flatten() {
                let code = NodeCodeBlock {
                    fenced: true,
                    fence_char: bytes[fns],
                    fence_length: matched,
                    fence_offset: fns - self.offset,
                    info: String::new(),
                    literal: String::new(),
                };
                *container = self.add_child(*container, NodeValue::CodeBlock(code), fns + 1);
                self.advance_offset(line, fns + matched - self.offset, false);
            } else if let Some(block_type) = (!indented)
                .then(|| {
                    scanners::html_block_start(bytes, fns).or_else(|| {
                        // Kind 7 cannot interrupt a paragraph, lazily or not
                        (!is_paragraph && !maybe_lazy)
                            .then(|| scanners::html_block_start_7(bytes, fns))
                            .flatten()
                    })
                })
                .flatten()
            {
                let html = NodeHtmlBlock {
                    block_type,
                    literal: String::new(),
                };
                // The tag stays part of the block's text
                *container = self.add_child(*container, NodeValue::HtmlBlock(html), fns + 1);
            } else if let Some(level) = (!indented && is_paragraph)
                .then(|| scanners::setext_heading_line(bytes, fns))
                .flatten()
            {
                // Reference definitions come off first; if nothing is left the
                // underline is ordinary paragraph text
                if self.resolve_reference_definitions(*container) {
                    self.arena[*container].get_mut().value =
                        NodeValue::Heading(NodeHeading { level, setext: true });
                    self.advance_offset(line, line.len() - 1 - self.offset, false);
                }
            } else if !indented
                && !(is_paragraph && !all_matched)
                && self.thematic_break_kill_pos <= fns
                && self.scan_thematic_break(bytes, fns)
            {
                *container = self.add_child(*container, NodeValue::ThematicBreak, fns + 1);
                self.advance_offset(line, line.len() - 1 - self.offset, false);
            } else if let Some(matched) = (!indented && room && self.options.contains(Options::FOOTNOTES))
                .then(|| scanners::footnote_definition(bytes, fns))
                .flatten()
            {
                let label_end = line[fns + 2..].find(']').map_or(fns + 2, |i| fns + 2 + i);
                let label = line[fns + 2..label_end].to_string();
                self.advance_offset(line, fns + matched - self.offset, false);
                *container = self.add_child(
                    *container,
                    NodeValue::FootnoteDefinition(NodeFootnoteDefinition { label, ix: 0 }),
                    fns + 1,
                );
            } else if let Some((matched, mut data)) = (self.indent < 4 && room)
                .then(|| parse_list_marker(bytes, fns, is_paragraph))
                .flatten()
            {
                self.advance_offset(line, fns + matched - self.offset, false);

                // Padding: 1 to 4 columns of spaces after the marker, or 1 if
                // there are 5 or more (the content is then indented code)
                let save_partial = self.partially_consumed_tab;
                let save_offset = self.offset;
                let save_column = self.column;
                while self.column - save_column <= 5 && is_space_or_tab(peek(bytes, self.offset)) {
                    self.advance_offset(line, 1, true);
                }
                let spaces = self.column - save_column;
                if spaces >= 5 || spaces == 0 || is_line_end(peek(bytes, self.offset)) {
                    data.padding = matched + 1;
                    self.offset = save_offset;
                    self.column = save_column;
                    self.partially_consumed_tab = save_partial;
                    if spaces > 0 {
                        self.advance_offset(line, 1, true);
                    }
                } else {
                    data.padding = matched + spaces;
                }
                data.marker_offset = self.indent;

                let continues = matches!(&cont, NodeValue::List(list) if list.matches(&data));
                if !continues {
                    *container = self.add_child(*container, NodeValue::List(data), fns + 1);
                }
                *container = self.add_child(*container, NodeValue::Item(data), fns + 1);
            } else if indented && !maybe_lazy && !self.blank {
                self.advance_offset(line, CODE_INDENT, true);
                let start = self.offset + 1;
                *container = self.add_child(*container, NodeValue::CodeBlock(NodeCodeBlock::default()), start);
            } else {
                let opened = registry
                    .enabled(self.options)
                    .filter_map(|ext| ext.block_start)
                    .find_map(|try_open| try_open(self, *container, line, indented));
                match opened {
                    Some(node) => *container = node,
                    None => break,
                }
            }

            if self.value(*container).accepts_lines() {
                break;
            }
            maybe_lazy = false;
        }
    }

    /// Put the rest of the line into the right block: a lazy paragraph
    /// continuation, the open leaf, or a new paragraph.
    fn add_text_to_container(&mut self, mut container: NodeId, last_matched: NodeId, line: &str) {
        self.find_first_nonspace(line);

        if self.blank
            && let Some(last_child) = self.arena[container].last_child()
        {
            self.arena[last_child].get_mut().last_line_blank = true;
        }

        // Block quote lines are never blank, fenced code blanks do not count
        // for list tightness, and an item's empty first line is not a gap
        let last_line_blank = self.blank
            && match self.value(container) {
                NodeValue::BlockQuote
                | NodeValue::Heading(_)
                | NodeValue::ThematicBreak
                | NodeValue::Table(_)
                | NodeValue::TableRow(_) => false,
                NodeValue::CodeBlock(cb) => !cb.fenced,
                NodeValue::Item(_) | NodeValue::TaskItem(_) => {
                    self.arena[container].first_child().is_some()
                        || self.arena[container].get().sourcepos.start.line != self.line_number
                }
                _ => true,
            };
        self.arena[container].get_mut().last_line_blank = last_line_blank;
        let ancestors: Vec<NodeId> = container.ancestors(&self.arena).skip(1).collect();
        for ancestor in ancestors {
            self.arena[ancestor].get_mut().last_line_blank = false;
        }

        if self.current != last_matched
            && container == last_matched
            && !self.blank
            && matches!(self.value(self.current), NodeValue::Paragraph)
        {
            // Lazy continuation line
            self.add_line(self.current, line);
            return;
        }

        // Close whatever the line did not continue
        while self.current != last_matched && self.current != self.root {
            self.current = self.finalize(self.current);
        }

        match self.value(container).clone() {
            NodeValue::CodeBlock(_) => self.add_line(container, line),
            NodeValue::HtmlBlock(hb) => {
                self.add_line(container, line);
                if scanners::html_block_end(hb.block_type, line.as_bytes(), self.first_nonspace) {
                    container = self.finalize(container);
                }
            }
            _ if self.blank => {}
            NodeValue::Heading(_) => {
                // Setext headings never get here; their underline ends the line
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                let text = chop_trailing_hashes(line.get(self.offset..).unwrap_or_default());
                let column = self.offset + 1;
                self.arena[container]
                    .get_mut()
                    .push_line(text, self.line_number, column);
            }
            value if value.accepts_lines() => {
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                self.add_line(container, line);
            }
            _ => {
                container = self.add_child(container, NodeValue::Paragraph, self.first_nonspace + 1);
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                self.add_line(container, line);
            }
        }
        self.current = container;
    }

    fn find_first_nonspace(&mut self, line: &str) {
        let bytes = line.as_bytes();
        let mut chars_to_tab = TAB_STOP - (self.column % TAB_STOP);

        if self.first_nonspace <= self.offset {
            self.first_nonspace = self.offset;
            self.first_nonspace_column = self.column;
            loop {
                match peek(bytes, self.first_nonspace) {
                    b' ' => {
                        self.first_nonspace += 1;
                        self.first_nonspace_column += 1;
                        chars_to_tab -= 1;
                        if chars_to_tab == 0 {
                            chars_to_tab = TAB_STOP;
                        }
                    }
                    b'\t' => {
                        self.first_nonspace += 1;
                        self.first_nonspace_column += chars_to_tab;
                        chars_to_tab = TAB_STOP;
                    }
                    _ => break,
                }
            }
        }

        self.indent = self.first_nonspace_column - self.column;
        let c = peek(bytes, self.first_nonspace);
        self.blank = c == 0 || is_line_end(c);
    }

    /// Move the cursor `count` bytes, or `count` columns when `columns` is
    /// set, splitting a tab if it straddles the target column.
    pub fn advance_offset(&mut self, line: &str, mut count: usize, columns: bool) {
        let bytes = line.as_bytes();
        while count > 0 && self.offset < bytes.len() {
            if bytes[self.offset] == b'\t' {
                let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
                if columns {
                    self.partially_consumed_tab = chars_to_tab > count;
                    let advance = count.min(chars_to_tab);
                    self.column += advance;
                    if !self.partially_consumed_tab {
                        self.offset += 1;
                    }
                    count -= advance;
                } else {
                    self.partially_consumed_tab = false;
                    self.column += chars_to_tab;
                    self.offset += 1;
                    count -= 1;
                }
            } else {
                self.partially_consumed_tab = false;
                self.offset += 1;
                self.column += 1;
                count -= 1;
            }
        }
    }

    /// Append the rest of the line to `node`'s raw content.
    fn add_line(&mut self, node: NodeId, line: &str) {
        let mut text = String::new();
        if self.partially_consumed_tab {
            // The tab was only partly used as indentation; the rest is spaces
            self.offset += 1;
            let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
            text.extend(std::iter::repeat_n(' ', chars_to_tab));
        }
        let rest = line.get(self.offset..).unwrap_or_default();
        let column = self.offset + 1 - text.len().min(self.offset);
        text.push_str(rest);
        self.arena[node].get_mut().push_line(&text, self.line_number, column);
    }

    /// Add a child block, closing ancestors that cannot hold it.
    pub fn add_child(&mut self, mut parent: NodeId, value: NodeValue, start_column: usize) -> NodeId {
        while !self.value(parent).can_contain(&value) {
            parent = self.finalize(parent);
        }
        trace!(kind = ?value.kind(), line = self.line_number, "open block");
        let child = self
            .arena
            .new_node(Ast::new(value, LineColumn::new(self.line_number, start_column)));
        parent.append(child, &mut self.arena);
        child
    }

    fn scan_thematic_break(&mut self, line: &[u8], pos: usize) -> bool {
        let c = peek(line, pos);
        if !matches!(c, b'*' | b'_' | b'-') {
            self.thematic_break_kill_pos = pos;
            return false;
        }
        let mut count = 1;
        let mut i = pos + 1;
        let mut next = peek(line, i);
        while next != 0 {
            if next == c {
                count += 1;
            } else if !is_space_or_tab(next) {
                break;
            }
            i += 1;
            next = peek(line, i);
        }
        if count >= 3 && is_line_end(next) {
            true
        } else {
            // No break can start before here on this line
            self.thematic_break_kill_pos = i;
            false
        }
    }

    /// Close `node`, run its finalization and return its parent.
    pub(crate) fn finalize(&mut self, node: NodeId) -> NodeId {
        let parent = self.arena[node].parent().unwrap_or(self.root);
        let line_number = self.line_number;
        let last_line_length = self.last_line_length;
        let line_len = self.line_len;

        let ast = self.arena[node].get_mut();
        if !ast.open {
            return parent;
        }
        ast.open = false;

        let ends_on_this_line = match &ast.value {
            NodeValue::Document => true,
            NodeValue::CodeBlock(cb) => cb.fenced,
            NodeValue::Heading(h) => h.setext,
            _ => false,
        };
        ast.sourcepos.end = match line_len {
            None => LineColumn::new(line_number, last_line_length),
            Some(len) if ends_on_this_line => LineColumn::new(line_number, len),
            Some(_) => LineColumn::new(line_number.saturating_sub(1), last_line_length),
        };
        trace!(kind = ?ast.value.kind(), line = line_number, "close block");

        match ast.value.clone() {
            NodeValue::Paragraph => {
                if !self.resolve_reference_definitions(node) {
                    // Only reference definitions were in it
                    node.remove(&mut self.arena);
                }
            }
            NodeValue::CodeBlock(mut cb) => {
                let content = std::mem::take(&mut ast.content);
                if cb.fenced {
                    // First line is the info string
                    let (info, literal) = content.split_once('\n').unwrap_or((&content, ""));
                    cb.info = references::unescape(info.trim_matches([' ', '\t', '\n', '\r']));
                    cb.literal = literal.to_string();
                } else {
                    cb.literal = remove_trailing_blank_lines(&content);
                    cb.literal.push('\n');
                }
                ast.value = NodeValue::CodeBlock(cb);
            }
            NodeValue::HtmlBlock(mut hb) => {
                hb.literal = std::mem::take(&mut ast.content);
                ast.value = NodeValue::HtmlBlock(hb);
            }
            NodeValue::List(mut list) => {
                list.tight = self.list_is_tight(node);
                self.arena[node].get_mut().value = NodeValue::List(list);
            }
            NodeValue::FootnoteDefinition(def) => {
                self.footnote_defs.entry(normalize_label(&def.label)).or_insert(node);
            }
            _ => {}
        }
        parent
    }

    /// Pull reference definitions off the front of a paragraph. Returns
    /// whether any content remains.
    pub(crate) fn resolve_reference_definitions(&mut self, node: NodeId) -> bool {
        let ast = self.arena[node].get_mut();
        let content = std::mem::take(&mut ast.content);

        let mut pos = 0;
        while content[pos..].starts_with('[') {
            let Some((len, label, reference)) = references::parse_reference_definition(&content[pos..]) else {
                break;
            };
            self.refmap.insert(&label, reference);
            pos += len;
        }

        let ast = self.arena[node].get_mut();
        if pos == 0 {
            ast.content = content;
        } else {
            ast.content = content[pos..].to_string();
            ast.line_offsets.retain(|offset| offset.pos >= pos);
            for offset in &mut ast.line_offsets {
                offset.pos -= pos;
            }
            if let Some(first) = ast.line_offsets.first() {
                ast.sourcepos.start = LineColumn::new(first.line, first.column);
            }
        }
        !is_blank(&ast.content)
    }

    fn list_is_tight(&self, list: NodeId) -> bool {
        for item in list.children(&self.arena) {
            // A blank line between items makes the list loose
            if self.arena[item].get().last_line_blank && self.arena[item].next_sibling().is_some() {
                return false;
            }
            // So does one between blocks inside an item
            let item_has_next = self.arena[item].next_sibling().is_some();
            for sub in item.children(&self.arena) {
                let sub_has_next = self.arena[sub].next_sibling().is_some();
                if (item_has_next || sub_has_next) && self.ends_with_blank_line(sub) {
                    return false;
                }
            }
        }
        true
    }

    fn ends_with_blank_line(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            let ast = self.arena[id].get();
            if ast.last_line_blank {
                return true;
            }
            cur = match ast.value {
                NodeValue::List(_) | NodeValue::Item(_) | NodeValue::TaskItem(_) => self.arena[id].last_child(),
                _ => None,
            };
        }
        false
    }
}

/// Bullet `-+*` or ordered `1.`/`1)` marker at `pos`. Returns the marker
/// length and list data without padding or offset.
fn parse_list_marker(line: &[u8], pos: usize, interrupts_paragraph: bool) -> Option<(usize, NodeList)> {
    let c = peek(line, pos);
    let mut i = pos;

    let mut data = if matches!(c, b'*' | b'-' | b'+') {
        i += 1;
        NodeList {
            list_type: ListType::Bullet,
            bullet_char: c,
            ..NodeList::default()
        }
    } else if c.is_ascii_digit() {
        let mut start = 0usize;
        let mut digits = 0;
        // At most 9 digits
        while digits < 9 && peek(line, i).is_ascii_digit() {
            start = start * 10 + usize::from(peek(line, i) - b'0');
            i += 1;
            digits += 1;
        }
        if interrupts_paragraph && start != 1 {
            return None;
        }
        let delimiter = match peek(line, i) {
            b'.' => ListDelimType::Period,
            b')' => ListDelimType::Paren,
            _ => return None,
        };
        i += 1;
        NodeList {
            list_type: ListType::Ordered,
            start,
            delimiter,
            ..NodeList::default()
        }
    } else {
        return None;
    };

    if !scanners::is_space(peek(line, i)) {
        return None;
    }
    if interrupts_paragraph {
        // An empty item cannot interrupt a paragraph
        let mut j = i;
        while is_space_or_tab(peek(line, j)) {
            j += 1;
        }
        if is_line_end(peek(line, j)) {
            return None;
        }
    }
    data.tight = false;
    Some((i - pos, data))
}

/// Drop an ATX closing sequence: trailing `#`s preceded by a space, or a
/// line made only of `#`s.
fn chop_trailing_hashes(text: &str) -> &str {
    let text = text.trim_end_matches(['\n', '\r', ' ', '\t']);
    let without = text.trim_end_matches('#');
    if without.len() == text.len() {
        return text;
    }
    if without.is_empty() {
        return "";
    }
    if without.ends_with([' ', '\t']) {
        return without.trim_end_matches([' ', '\t']);
    }
    text
}

/// Cut trailing blank lines, keeping everything up to the last non-blank.
fn remove_trailing_blank_lines(content: &str) -> String {
    let Some(last) = content.rfind(|c: char| !matches!(c, ' ' | '\t' | '\n' | '\r')) else {
        return String::new();
    };
    match content[last..].find(['\n', '\r']) {
        Some(eol) => content[..last + eol].to_string(),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown_to_html_with_options;
    use pretty_assertions::assert_eq;

    fn html(md: &str) -> String {
        markdown_to_html_with_options(md, Options::UNSAFE)
    }

    #[test]
    fn test_chop_trailing_hashes() {
        assert_eq!(chop_trailing_hashes("foo ##\n"), "foo");
        assert_eq!(chop_trailing_hashes("foo#\n"), "foo#");
        assert_eq!(chop_trailing_hashes("###\n"), "");
        assert_eq!(chop_trailing_hashes("foo \\#\n"), "foo \\#");
    }

    #[test]
    fn test_remove_trailing_blank_lines() {
        assert_eq!(remove_trailing_blank_lines("a\n  b\n\n   \n"), "a\n  b");
        assert_eq!(remove_trailing_blank_lines("\n\n"), "");
    }

    #[test]
    fn test_setext_after_lazy_line_is_paragraph_text() {
        // The underline sits under a lazy continuation, so it is not a heading
        assert_eq!(
            html("> foo\nbar\n===\n"),
            "<blockquote>\n<p>foo\nbar\n===</p>\n</blockquote>\n"
        );
    }

    #[test]
    fn test_setext_heading() {
        assert_eq!(html("Foo *bar*\n=========\n"), "<h1>Foo <em>bar</em></h1>\n");
        assert_eq!(html("[foo]: /url\n===\n"), "<p>===</p>\n");
    }

    #[test]
    fn test_list_tightness() {
        assert_eq!(html("- a\n- b\n"), "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n");
        assert_eq!(
            html("- a\n\n- b\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_ordered_list_cannot_interrupt_unless_one() {
        assert_eq!(html("a\n2. b\n"), "<p>a\n2. b</p>\n");
        assert_eq!(html("a\n1. b\n"), "<p>a</p>\n<ol>\n<li>b</li>\n</ol>\n");
    }

    #[test]
    fn test_tabs_in_list_item_code() {
        assert_eq!(
            html("-\t\tfoo\n"),
            "<ul>\n<li>\n<pre><code>  foo\n</code></pre>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_html_block_kind_7_cannot_interrupt_paragraph() {
        assert_eq!(html("Foo\n<a href=\"bar\">\nbaz\n"), "<p>Foo\n<a href=\"bar\">\nbaz</p>\n");
        assert_eq!(html("<div>\n*foo*\n\n*bar*\n"), "<div>\n*foo*\n<p><em>bar</em></p>\n");
    }

    #[test]
    fn test_fenced_code_info_and_indent() {
        assert_eq!(
            html("  ```rust &amp; x\n  a\n b\n   ```\n"),
            "<pre><code class=\"language-rust\">a\nb\n</code></pre>\n"
        );
    }

    #[test]
    fn test_info_string_keeps_unicode_spaces() {
        assert_eq!(
            html("```\u{a0}rust\u{a0}\nx\n```\n"),
            "<pre><code class=\"language-\u{a0}rust\u{a0}\">x\n</code></pre>\n"
        );
    }

    #[test]
    fn test_indented_code_cannot_interrupt_paragraph() {
        assert_eq!(html("Foo\n    bar\n"), "<p>Foo\nbar</p>\n");
    }

    #[test]
    fn test_block_sourcepos() {
        let mut parser = Parser::new(Options::empty());
        parser.feed("# Hi\n\n> a\n> b\n");
        let doc = parser.finish();
        let spans: Vec<String> = doc
            .root()
            .descendants(doc.arena())
            .filter(|&id| doc.get(id).value.is_block())
            .map(|id| doc.get(id).sourcepos.to_string())
            .collect();
        assert_eq!(spans, ["1:1-4:3", "1:1-1:4", "3:1-4:3", "3:3-4:3"]);
    }
}
