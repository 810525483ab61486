//! Inline parsing
//!
//! Runs once per leaf block after the block structure is complete, so every
//! link reference definition in the document is already known.
use crate::ast::{
    Ast, LineColumn, LineOffset, NodeFootnoteReference, NodeLink, NodeValue, Sourcepos,
};
use crate::entity;
use crate::extensions::{DelimiterRule, Registry};
use crate::options::Options;
use crate::parser::Parser;
use crate::references::{self, MAX_LINK_LABEL_LENGTH, RefMap, normalize_label};
use crate::scanners::{self, is_line_end, is_space_or_tab};
use indextree::{Arena, NodeId};
use std::collections::HashMap;
use std::sync::Arc;
use unicode_categories::UnicodeCategories;

/// Longest backtick run tracked by the closer cache.
const MAX_BACKTICKS: usize = 1000;

const LEFT_SINGLE_QUOTE: &str = "\u{2018}";
const RIGHT_SINGLE_QUOTE: &str = "\u{2019}";
const LEFT_DOUBLE_QUOTE: &str = "\u{201c}";
const RIGHT_DOUBLE_QUOTE: &str = "\u{201d}";
const EM_DASH: &str = "\u{2014}";
const EN_DASH: &str = "\u{2013}";
const ELLIPSIS: &str = "\u{2026}";

fn is_unicode_space(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\x0c' | '\r' | ' ') || c.is_separator_space()
}

fn is_unicode_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || c.is_punctuation() || c.is_symbol()
}

/// An entry on the emphasis delimiter stack. Entries are never moved;
/// removal only unlinks them.
#[derive(Debug, Clone, Copy)]
struct Delimiter {
    inl: NodeId,
    /// Subject offset just past the run; orders delimiters against brackets.
    position: usize,
    /// Subject offset of the first unused character of the run.
    start: usize,
    /// Run length when scanned.
    length: usize,
    delim_char: u8,
    can_open: bool,
    can_close: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Bracket {
    inl_text: NodeId,
    /// Subject offset just past `[`.
    position: usize,
    image: bool,
    active: bool,
    /// Another bracket was opened after this one.
    bracket_after: bool,
}

/// Cursor over one leaf's content, plus the delimiter and bracket stacks.
///
/// Extension inline matchers receive it with the cursor on their trigger
/// byte.
pub struct Subject<'a> {
    arena: &'a mut Arena<Ast>,
    registry: &'a Registry,
    options: Options,
    refmap: &'a mut RefMap,
    footnote_defs: &'a HashMap<String, NodeId>,
    input: &'a str,
    line_offsets: &'a [LineOffset],
    origin: LineColumn,
    parent: NodeId,
    pos: usize,
    delimiters: Vec<Delimiter>,
    last_delimiter: Option<usize>,
    brackets: Vec<Bracket>,
    /// Extension links with their start offsets, in subject order.
    dissolvable: Vec<(usize, NodeId)>,
    backticks: Vec<usize>,
    scanned_for_backticks: bool,
    special: [bool; 256],
}

impl Parser {
    /// Replace a leaf's raw content with inline children.
    pub(crate) fn parse_inlines(&mut self, leaf: NodeId) {
        let ast = self.arena[leaf].get_mut();
        let mut content = std::mem::take(&mut ast.content);
        let offsets = std::mem::take(&mut ast.line_offsets);
        let origin = ast.sourcepos.start;
        let trimmed = content
            .trim_end_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c'])
            .len();
        content.truncate(trimmed);

        let registry = Arc::clone(&self.registry);
        let mut subject = Subject::new(
            &mut self.arena,
            &registry,
            self.options,
            &mut self.refmap,
            &self.footnote_defs,
            &content,
            &offsets,
            origin,
            leaf,
        );
        subject.parse();
    }
}

impl<'a> Subject<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        arena: &'a mut Arena<Ast>,
        registry: &'a Registry,
        options: Options,
        refmap: &'a mut RefMap,
        footnote_defs: &'a HashMap<String, NodeId>,
        input: &'a str,
        line_offsets: &'a [LineOffset],
        origin: LineColumn,
        parent: NodeId,
    ) -> Self {
        let mut special = [false; 256];
        for &c in b"\n\r!&*<[\\]_`" {
            special[usize::from(c)] = true;
        }
        if options.contains(Options::SMART) {
            for &c in b"\"'-." {
                special[usize::from(c)] = true;
            }
        }
        for ext in registry.enabled(options) {
            for &c in ext.inline_chars {
                special[usize::from(c)] = true;
            }
            for rule in &ext.delimiters {
                special[usize::from(rule.ch)] = true;
            }
        }

        Subject {
            arena,
            registry,
            options,
            refmap,
            footnote_defs,
            input,
            line_offsets,
            origin,
            parent,
            pos: 0,
            delimiters: Vec::new(),
            last_delimiter: None,
            brackets: Vec::new(),
            dissolvable: Vec::new(),
            backticks: vec![0; MAX_BACKTICKS + 1],
            scanned_for_backticks: false,
            special,
        }
    }

    fn parse(&mut self) {
        while self.parse_inline() {}
        self.process_emphasis(0);
        self.brackets.clear();
        merge_adjacent_text(self.arena, self.parent);
    }

    /// The leaf's content, trailing whitespace removed.
    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// The leaf block receiving inlines.
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn arena_mut(&mut self) -> &mut Arena<Ast> {
        &mut *self.arena
    }

    pub fn peek(&self) -> Option<u8> {
        self.peek_at(self.pos)
    }

    fn peek_at(&self, pos: usize) -> Option<u8> {
        self.input.as_bytes().get(pos).copied()
    }

    /// Some `[` or `![` is still waiting for its `]`.
    pub fn in_bracket(&self) -> bool {
        !self.brackets.is_empty()
    }

    /// Turn `link`, which starts at subject offset `start`, back into its
    /// children if an enclosing bracket later becomes a link.
    pub fn dissolve_if_nested(&mut self, link: NodeId, start: usize) {
        self.dissolvable.push((start, link));
    }

    /// Source position of subject offset `pos`.
    fn source_at(&self, pos: usize) -> LineColumn {
        let idx = self.line_offsets.partition_point(|o| o.pos <= pos);
        match idx.checked_sub(1).and_then(|i| self.line_offsets.get(i)) {
            Some(o) => LineColumn::new(o.line, o.column + (pos - o.pos)),
            None => LineColumn::new(self.origin.line, self.origin.column + pos),
        }
    }

    /// Sourcepos for the subject range `start..end`.
    fn span(&self, start: usize, end: usize) -> Sourcepos {
        let last = if end > start { end - 1 } else { start };
        Sourcepos::new(self.source_at(start), self.source_at(last))
    }

    /// A detached inline covering `start..end` of the subject.
    pub fn make_node(&mut self, value: NodeValue, start: usize, end: usize) -> NodeId {
        let sourcepos = self.span(start, end);
        self.arena.new_node(Ast::with_sourcepos(value, sourcepos))
    }

    pub fn make_text(&mut self, text: impl Into<String>, start: usize, end: usize) -> NodeId {
        self.make_node(NodeValue::Text(text.into()), start, end)
    }

    /// Take back the last `n` bytes of text already emitted into the leaf,
    /// for matchers that only recognize their start after the fact.
    pub fn unput(&mut self, mut n: usize) {
        let mut cur = self.arena[self.parent].last_child();
        while n > 0
            && let Some(id) = cur
        {
            let len = match &self.arena[id].get().value {
                NodeValue::Text(text) => text.len(),
                _ => break,
            };
            cur = self.arena[id].previous_sibling();
            if len <= n {
                n -= len;
                self.forget_delimiter_for(id);
                id.remove(self.arena);
                continue;
            }
            let keep = len - n;
            if let NodeValue::Text(text) = &mut self.arena[id].get_mut().value
                && text.is_char_boundary(keep)
            {
                text.truncate(keep);
            }
            n = 0;
        }
    }

    fn forget_delimiter_for(&mut self, inl: NodeId) {
        let mut cur = self.last_delimiter;
        while let Some(d) = cur {
            if self.delimiters[d].inl == inl {
                self.remove_delimiter(d);
                return;
            }
            cur = self.delimiters[d].prev;
        }
    }

    /// Parse one inline at the cursor. Returns false at end of input.
    fn parse_inline(&mut self) -> bool {
        let Some(c) = self.peek() else {
            return false;
        };
        let smart = self.options.contains(Options::SMART);

        let node = match c {
            b'\n' | b'\r' => Some(self.handle_newline()),
            b'`' => Some(self.handle_backticks()),
            b'\\' => Some(self.handle_backslash()),
            b'&' => Some(self.handle_entity()),
            b'<' => Some(self.handle_pointy_brace()),
            b'*' | b'_' => Some(self.handle_delim(c)),
            b'\'' | b'"' if smart => Some(self.handle_delim(c)),
            b'-' if smart => Some(self.handle_hyphen()),
            b'.' if smart => Some(self.handle_period()),
            b'[' => {
                self.pos += 1;
                let inl = self.make_text("[", self.pos - 1, self.pos);
                self.push_bracket(false, inl);
                Some(inl)
            }
            b']' => self.handle_close_bracket(),
            b'!' => {
                self.pos += 1;
                // `![^` starts a footnote reference, not an image
                let footnote = self.options.contains(Options::FOOTNOTES) && self.peek_at(self.pos + 1) == Some(b'^');
                if self.peek() == Some(b'[') && !footnote {
                    self.pos += 1;
                    let inl = self.make_text("![", self.pos - 2, self.pos);
                    self.push_bracket(true, inl);
                    Some(inl)
                } else {
                    Some(self.make_text("!", self.pos - 1, self.pos))
                }
            }
            _ => Some(self.handle_extension_or_text(c)),
        };

        if let Some(node) = node {
            self.parent.append(node, self.arena);
        }
        true
    }

    fn handle_extension_or_text(&mut self, c: u8) -> NodeId {
        let registry = self.registry;
        if let Some(rule) = self.delimiter_rule(c) {
            return self.handle_extension_delim(rule);
        }
        for ext in registry.enabled(self.options) {
            if let Some(matcher) = ext.inline_match
                && ext.inline_chars.contains(&c)
            {
                let saved = self.pos;
                if let Some(node) = matcher(self, c) {
                    return node;
                }
                self.pos = saved;
            }
        }
        self.handle_text()
    }

    fn delimiter_rule(&self, c: u8) -> Option<&'a DelimiterRule> {
        let registry = self.registry;
        registry
            .enabled(self.options)
            .flat_map(|ext| ext.delimiters.iter())
            .find(|rule| rule.ch == c)
    }

    /// Plain text up to the next byte some handler cares about.
    fn handle_text(&mut self) -> NodeId {
        let start = self.pos;
        let input = self.input;
        let bytes = input.as_bytes();
        let end = (start + 1..bytes.len())
            .find(|&i| self.special[usize::from(bytes[i])])
            .unwrap_or(bytes.len());
        self.pos = end;

        let mut text = &input[start..end];
        if self.peek().is_some_and(is_line_end) {
            // Trailing spaces before a line break belong to the break
            text = text.trim_end_matches([' ', '\t', '\x0b', '\x0c']);
        }
        self.make_text(text, start, start + text.len())
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(is_space_or_tab) {
            self.pos += 1;
        }
    }

    fn skip_line_end(&mut self) -> bool {
        let start = self.pos;
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        self.pos > start
    }

    fn handle_newline(&mut self) -> NodeId {
        let nlpos = self.pos;
        self.skip_line_end();
        let end = self.pos;
        // Leading spaces of the next line are not content
        self.skip_spaces();

        let bytes = self.input.as_bytes();
        let hard = nlpos > 1 && bytes[nlpos - 1] == b' ' && bytes[nlpos - 2] == b' ';
        let value = if hard { NodeValue::LineBreak } else { NodeValue::SoftBreak };
        self.make_node(value, nlpos, end)
    }

    fn handle_backslash(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        match self.peek() {
            Some(c) if c.is_ascii_punctuation() => {
                self.pos += 1;
                self.make_text(char::from(c), start, self.pos)
            }
            Some(b'\r' | b'\n') => {
                self.skip_line_end();
                let end = self.pos;
                self.skip_spaces();
                self.make_node(NodeValue::LineBreak, start, end)
            }
            _ => self.make_text("\\", start, self.pos),
        }
    }

    fn handle_entity(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        match entity::unescape_entity(&self.input.as_bytes()[self.pos..]) {
            Some((text, len)) => {
                self.pos += len;
                self.make_text(text, start, self.pos)
            }
            None => self.make_text("&", start, self.pos),
        }
    }

    fn take_while(&mut self, c: u8) -> usize {
        let start = self.pos;
        while self.peek() == Some(c) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Find a closing run of exactly `open` backticks, leaving the cursor
    /// after it. Positions of every run seen are cached so a failed search
    /// is never repeated.
    fn scan_to_closing_backticks(&mut self, open: usize) -> Option<usize> {
        if open > MAX_BACKTICKS {
            return None;
        }
        if self.scanned_for_backticks && self.backticks[open] <= self.pos {
            return None;
        }
        let len = self.input.len();
        loop {
            while self.pos < len && self.peek() != Some(b'`') {
                self.pos += 1;
            }
            if self.pos >= len {
                break;
            }
            let run = self.take_while(b'`');
            if run <= MAX_BACKTICKS {
                self.backticks[run] = self.pos - run;
            }
            if run == open {
                return Some(self.pos);
            }
        }
        self.scanned_for_backticks = true;
        None
    }

    fn handle_backticks(&mut self) -> NodeId {
        let start = self.pos;
        let open = self.take_while(b'`');
        let after_open = self.pos;
        match self.scan_to_closing_backticks(open) {
            Some(end) => {
                let code = normalize_code(&self.input[after_open..end - open]);
                self.make_node(NodeValue::Code(code), start, end)
            }
            None => {
                self.pos = after_open;
                let input = self.input;
                self.make_text(&input[start..after_open], start, after_open)
            }
        }
    }

    /// Autolink, raw HTML, or a literal `<`.
    fn handle_pointy_brace(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        let input = self.input;
        let bytes = input.as_bytes();

        if let Some(len) = scanners::autolink_uri(bytes, self.pos) {
            let contents = &input[self.pos..self.pos + len - 1];
            self.pos += len;
            return self.make_autolink(contents, false, start);
        }
        if let Some(len) = scanners::autolink_email(bytes, self.pos) {
            let contents = &input[self.pos..self.pos + len - 1];
            self.pos += len;
            return self.make_autolink(contents, true, start);
        }
        if let Some(len) = scanners::html_tag(bytes, self.pos) {
            self.pos += len;
            return self.make_node(NodeValue::HtmlInline(input[start..self.pos].to_string()), start, self.pos);
        }
        self.make_text("<", start, self.pos)
    }

    fn make_autolink(&mut self, contents: &str, email: bool, start: usize) -> NodeId {
        let text = entity::unescape_html(contents.trim());
        let url = if email { format!("mailto:{text}") } else { text.clone() };
        let link = self.make_node(
            NodeValue::Link(NodeLink {
                url,
                title: String::new(),
            }),
            start,
            self.pos,
        );
        let child = self.make_text(text, start + 1, self.pos - 1);
        link.append(child, self.arena);
        link
    }

    /// Measure the delimiter run at the cursor and classify it by the
    /// characters on either side.
    fn scan_delims(&mut self, c: u8) -> (usize, bool, bool) {
        let input = self.input;
        let before = input[..self.pos].chars().next_back().unwrap_or('\n');
        let start = self.pos;
        if c == b'\'' || c == b'"' {
            self.pos += 1;
        } else {
            self.take_while(c);
        }
        let count = self.pos - start;
        let after = input[self.pos..].chars().next().unwrap_or('\n');

        let left_flanking = count > 0
            && !is_unicode_space(after)
            && (!is_unicode_punctuation(after) || is_unicode_space(before) || is_unicode_punctuation(before));
        let right_flanking = count > 0
            && !is_unicode_space(before)
            && (!is_unicode_punctuation(before) || is_unicode_space(after) || is_unicode_punctuation(after));

        let (can_open, can_close) = match c {
            b'_' => (
                left_flanking && (!right_flanking || is_unicode_punctuation(before)),
                right_flanking && (!left_flanking || is_unicode_punctuation(after)),
            ),
            b'\'' | b'"' => (
                left_flanking && !right_flanking && before != ']' && before != ')',
                right_flanking,
            ),
            _ => (left_flanking, right_flanking),
        };
        (count, can_open, can_close)
    }

    fn handle_delim(&mut self, c: u8) -> NodeId {
        let start = self.pos;
        let input = self.input;
        let (count, can_open, can_close) = self.scan_delims(c);
        let text = match c {
            b'\'' => RIGHT_SINGLE_QUOTE,
            b'"' if can_close => RIGHT_DOUBLE_QUOTE,
            b'"' => LEFT_DOUBLE_QUOTE,
            _ => &input[start..self.pos],
        };
        let inl = self.make_text(text, start, self.pos);
        if can_open || can_close {
            self.push_delimiter(c, can_open, can_close, inl, start, count);
        }
        inl
    }

    fn handle_extension_delim(&mut self, rule: &DelimiterRule) -> NodeId {
        let start = self.pos;
        let input = self.input;
        let (count, can_open, can_close) = self.scan_delims(rule.ch);
        let inl = self.make_text(&input[start..self.pos], start, self.pos);
        if (rule.min..=rule.max).contains(&count) && (can_open || can_close) {
            self.push_delimiter(rule.ch, can_open, can_close, inl, start, count);
        }
        inl
    }

    /// `--` and `---` runs become en and em dashes, longer runs a mix of
    /// both with em dashes first.
    fn handle_hyphen(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        if self.peek() != Some(b'-') {
            return self.make_text("-", start, self.pos);
        }
        let hyphens = 1 + self.take_while(b'-');

        let (em, en) = if hyphens % 3 == 0 {
            (hyphens / 3, 0)
        } else if hyphens % 2 == 0 {
            (0, hyphens / 2)
        } else if hyphens % 3 == 2 {
            ((hyphens - 2) / 3, 1)
        } else {
            ((hyphens - 4) / 3, 2)
        };
        let text = EM_DASH.repeat(em) + &EN_DASH.repeat(en);
        self.make_text(text, start, self.pos)
    }

    fn handle_period(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        if self.peek() != Some(b'.') {
            return self.make_text(".", start, self.pos);
        }
        self.pos += 1;
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.make_text(ELLIPSIS, start, self.pos)
        } else {
            self.make_text("..", start, self.pos)
        }
    }

    fn push_delimiter(&mut self, c: u8, can_open: bool, can_close: bool, inl: NodeId, start: usize, length: usize) {
        let idx = self.delimiters.len();
        self.delimiters.push(Delimiter {
            inl,
            position: self.pos,
            start,
            length,
            delim_char: c,
            can_open,
            can_close,
            prev: self.last_delimiter,
            next: None,
        });
        if let Some(last) = self.last_delimiter {
            self.delimiters[last].next = Some(idx);
        }
        self.last_delimiter = Some(idx);
    }

    fn remove_delimiter(&mut self, d: usize) {
        let Delimiter { prev, next, .. } = self.delimiters[d];
        match next {
            Some(n) => self.delimiters[n].prev = prev,
            None => self.last_delimiter = prev,
        }
        if let Some(p) = prev {
            self.delimiters[p].next = next;
        }
    }

    fn text_len(&self, node: NodeId) -> usize {
        match &self.arena[node].get().value {
            NodeValue::Text(text) => text.len(),
            _ => 0,
        }
    }

    fn set_text(&mut self, node: NodeId, value: &str) {
        self.arena[node].get_mut().value = NodeValue::Text(value.to_string());
    }

    /// Match closers to openers above `stack_bottom`, innermost first, then
    /// drop every delimiter above it.
    fn process_emphasis(&mut self, stack_bottom: usize) {
        // Lowest position worth searching for an opener, per closer class
        let mut openers_bottom: HashMap<(u8, bool, usize), usize> = HashMap::new();

        let mut closer = None;
        let mut candidate = self.last_delimiter;
        while let Some(c) = candidate
            && self.delimiters[c].position >= stack_bottom
        {
            closer = Some(c);
            candidate = self.delimiters[c].prev;
        }

        while let Some(c) = closer {
            let cd = self.delimiters[c];
            if !cd.can_close {
                closer = cd.next;
                continue;
            }
            let ch = cd.delim_char;
            let emphasis = matches!(ch, b'*' | b'_');
            let key = if emphasis { (ch, cd.can_open, cd.length % 3) } else { (ch, false, 0) };
            let bottom = openers_bottom.get(&key).copied().unwrap_or(stack_bottom);
            let rule = self.delimiter_rule(ch);

            // Nearest compatible opener below the closer
            let mut found = None;
            let mut opener = cd.prev;
            while let Some(o) = opener
                && self.delimiters[o].position >= bottom
            {
                let od = self.delimiters[o];
                if od.can_open && od.delim_char == ch {
                    let compatible = if rule.is_some() {
                        self.text_len(od.inl) == self.text_len(cd.inl)
                    } else if emphasis {
                        // Rule of three for runs that can both open and close
                        !(cd.can_open || od.can_close) || cd.length % 3 == 0 || (od.length + cd.length) % 3 != 0
                    } else {
                        true
                    };
                    if compatible {
                        found = Some(o);
                        break;
                    }
                }
                opener = od.prev;
            }

            if let Some(rule) = rule {
                closer = match found {
                    Some(o) => self.insert_wrapped(o, c, rule.value.clone()),
                    None => cd.next,
                };
            } else if emphasis {
                closer = match found {
                    Some(o) => self.insert_emph(o, c),
                    None => cd.next,
                };
            } else {
                // Smart quotes
                let (left, right) = if ch == b'\'' {
                    (LEFT_SINGLE_QUOTE, RIGHT_SINGLE_QUOTE)
                } else {
                    (LEFT_DOUBLE_QUOTE, RIGHT_DOUBLE_QUOTE)
                };
                self.set_text(cd.inl, right);
                closer = cd.next;
                if let Some(o) = found {
                    self.set_text(self.delimiters[o].inl, left);
                    self.remove_delimiter(o);
                    self.remove_delimiter(c);
                }
            }

            if found.is_none() {
                openers_bottom.insert(key, cd.position);
                if !cd.can_open {
                    // A closer with no opener is plain text from now on
                    self.remove_delimiter(c);
                }
            }
        }

        while let Some(d) = self.last_delimiter
            && self.delimiters[d].position >= stack_bottom
        {
            self.remove_delimiter(d);
        }
    }

    /// Drop delimiters strictly between `opener` and `closer`.
    fn remove_delimiters_between(&mut self, opener: usize, closer: usize) {
        let mut cur = self.delimiters[closer].prev;
        while let Some(d) = cur
            && d != opener
        {
            cur = self.delimiters[d].prev;
            self.remove_delimiter(d);
        }
    }

    /// Move the siblings strictly between `from` and `to` under `into`.
    fn adopt_between(&mut self, from: NodeId, to: NodeId, into: NodeId) {
        let mut cur = self.arena[from].next_sibling();
        while let Some(id) = cur
            && id != to
        {
            cur = self.arena[id].next_sibling();
            id.detach(self.arena);
            into.append(id, self.arena);
        }
    }

    /// Wrap the inlines between a matched `*`/`_` pair in emphasis or strong
    /// emphasis, consuming one or two characters from each run. Returns the
    /// next closer to consider.
    fn insert_emph(&mut self, opener: usize, closer: usize) -> Option<usize> {
        let opener_inl = self.delimiters[opener].inl;
        let closer_inl = self.delimiters[closer].inl;
        let opener_chars = self.text_len(opener_inl);
        let closer_chars = self.text_len(closer_inl);
        let used = if opener_chars >= 2 && closer_chars >= 2 { 2 } else { 1 };

        let ch = char::from(self.delimiters[opener].delim_char);
        let opener_left = opener_chars - used;
        let closer_left = closer_chars - used;
        self.set_text(opener_inl, &ch.to_string().repeat(opener_left));
        self.set_text(closer_inl, &ch.to_string().repeat(closer_left));

        // Opener characters are used from the end of its run, closer
        // characters from the start
        let emph_start = self.delimiters[opener].start + opener_left;
        let closer_start = self.delimiters[closer].start;
        self.delimiters[closer].start += used;
        let emph_end = closer_start + used;

        self.remove_delimiters_between(opener, closer);

        let value = if used == 1 { NodeValue::Emph } else { NodeValue::Strong };
        let emph = self.make_node(value, emph_start, emph_end);
        self.adopt_between(opener_inl, closer_inl, emph);
        opener_inl.insert_after(emph, self.arena);

        if opener_left == 0 {
            opener_inl.remove(self.arena);
            self.remove_delimiter(opener);
        } else {
            let end = self.source_at(emph_start - 1);
            self.arena[opener_inl].get_mut().sourcepos.end = end;
        }

        if closer_left == 0 {
            let next = self.delimiters[closer].next;
            closer_inl.remove(self.arena);
            self.remove_delimiter(closer);
            next
        } else {
            let start = self.source_at(emph_end);
            self.arena[closer_inl].get_mut().sourcepos.start = start;
            Some(closer)
        }
    }

    /// Wrap the inlines between a matched extension delimiter pair in a
    /// node of the given kind, consuming both runs whole.
    fn insert_wrapped(&mut self, opener: usize, closer: usize, value: NodeValue) -> Option<usize> {
        let opener_inl = self.delimiters[opener].inl;
        let closer_inl = self.delimiters[closer].inl;
        self.remove_delimiters_between(opener, closer);

        let start = self.arena[opener_inl].get().sourcepos.start;
        let end = self.arena[closer_inl].get().sourcepos.end;
        let node = self.arena.new_node(Ast::with_sourcepos(value, Sourcepos::new(start, end)));
        self.adopt_between(opener_inl, closer_inl, node);
        opener_inl.insert_after(node, self.arena);

        let next = self.delimiters[closer].next;
        opener_inl.remove(self.arena);
        closer_inl.remove(self.arena);
        self.remove_delimiter(opener);
        self.remove_delimiter(closer);
        next
    }

    fn push_bracket(&mut self, image: bool, inl_text: NodeId) {
        if let Some(last) = self.brackets.last_mut() {
            last.bracket_after = true;
        }
        self.brackets.push(Bracket {
            inl_text,
            position: self.pos,
            image,
            active: true,
            bracket_after: false,
        });
    }

    /// Resolve `]` against the innermost open bracket: inline link, then
    /// full, collapsed or shortcut reference, then footnote reference.
    /// Returns a node only when nothing matched.
    fn handle_close_bracket(&mut self) -> Option<NodeId> {
        self.pos += 1;
        let initial_pos = self.pos;
        let input = self.input;
        let bytes = input.as_bytes();

        let Some(opener) = self.brackets.last().copied() else {
            return Some(self.make_text("]", initial_pos - 1, initial_pos));
        };
        if !opener.active {
            // A link inside a link; this bracket is just text
            self.brackets.pop();
            return Some(self.make_text("]", initial_pos - 1, initial_pos));
        }

        // Inline link: `(destination "title")`
        if self.peek() == Some(b'(') {
            let dest_start = self.pos + 1 + scanners::spacechars(bytes, self.pos + 1);
            if let Some((dest_len, dest)) = references::scan_link_destination(input, dest_start) {
                let end_url = dest_start + dest_len;
                let start_title = end_url + scanners::spacechars(bytes, end_url);
                // The title must be separated from the destination
                let end_title = if start_title == end_url {
                    start_title
                } else {
                    start_title + scanners::link_title(bytes, start_title).unwrap_or(0)
                };
                let end_all = end_title + scanners::spacechars(bytes, end_title);
                if bytes.get(end_all) == Some(&b')') {
                    self.pos = end_all + 1;
                    let url = references::clean_url(dest);
                    let title = references::clean_title(&input[start_title..end_title]);
                    self.close_bracket_match(opener, url, title);
                    return None;
                }
            }
            self.pos = initial_pos;
        }

        // Reference link: `[label]`, `[]` or nothing
        let explicit = references::scan_link_label(input, self.pos);
        if let Some((len, _)) = explicit {
            self.pos += len;
        }
        let label = match explicit {
            Some((_, label)) if !label.is_empty() => Some(label),
            _ if !opener.bracket_after => Some(&input[opener.position..initial_pos - 1]),
            _ => None,
        };
        if let Some(label) = label
            && label.len() <= MAX_LINK_LABEL_LENGTH
            && let Some(reference) = self.refmap.lookup(label)
        {
            self.close_bracket_match(opener, reference.url, reference.title);
            return None;
        }
        self.pos = initial_pos;

        // Footnote reference: `[^label]` naming a known definition
        if !opener.image
            && self.options.contains(Options::FOOTNOTES)
            && let Some(label) = input[opener.position..initial_pos - 1].strip_prefix('^')
            && !label.is_empty()
            && self.footnote_defs.contains_key(&normalize_label(label))
        {
            let reference = self.make_node(
                NodeValue::FootnoteReference(NodeFootnoteReference {
                    label: label.to_string(),
                    ix: 0,
                    ref_ix: 0,
                }),
                opener.position - 1,
                initial_pos,
            );
            opener.inl_text.insert_before(reference, self.arena);
            self.process_emphasis(opener.position);
            // The label text is carried by the reference itself
            let mut cur = Some(opener.inl_text);
            while let Some(id) = cur {
                cur = self.arena[id].next_sibling();
                id.remove_subtree(self.arena);
            }
            self.brackets.pop();
            return None;
        }

        self.brackets.pop();
        Some(self.make_text("]", initial_pos - 1, initial_pos))
    }

    fn close_bracket_match(&mut self, opener: Bracket, url: String, title: String) {
        let link = NodeLink { url, title };
        let (value, start) = if opener.image {
            (NodeValue::Image(link), opener.position - 2)
        } else {
            (NodeValue::Link(link), opener.position - 1)
        };
        let node = self.make_node(value, start, self.pos);
        opener.inl_text.insert_before(node, self.arena);

        let mut cur = self.arena[opener.inl_text].next_sibling();
        while let Some(id) = cur {
            cur = self.arena[id].next_sibling();
            id.detach(self.arena);
            node.append(id, self.arena);
        }
        opener.inl_text.remove(self.arena);

        self.process_emphasis(opener.position);
        self.brackets.pop();

        // No links inside links: earlier `[` openers become plain text
        if !opener.image {
            let inside = self.dissolvable.partition_point(|&(start, _)| start < opener.position);
            for (_, inner) in self.dissolvable.split_off(inside) {
                if !inner.is_removed(self.arena) {
                    // Children take the removed node's place
                    inner.remove(self.arena);
                }
            }
            for bracket in self.brackets.iter_mut().rev() {
                if !bracket.image {
                    if !bracket.active {
                        break;
                    }
                    bracket.active = false;
                }
            }
        }
    }
}

/// Line endings become spaces; one space is stripped from each end when
/// both ends have one and the span is not all spaces.
fn normalize_code(raw: &str) -> String {
    let mut code = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => code.push(' '),
            c => code.push(c),
        }
    }
    if code.len() >= 2 && code.starts_with(' ') && code.ends_with(' ') && code.bytes().any(|b| b != b' ') {
        code = code[1..code.len() - 1].to_string();
    }
    code
}

/// Join runs of adjacent text nodes and drop empty ones.
fn merge_adjacent_text(arena: &mut Arena<Ast>, root: NodeId) {
    let nodes: Vec<NodeId> = root.descendants(arena).collect();
    for id in nodes {
        if id.is_removed(arena) || !matches!(arena[id].get().value, NodeValue::Text(_)) {
            continue;
        }
        while let Some(next) = arena[id].next_sibling() {
            let tail = match &mut arena[next].get_mut().value {
                NodeValue::Text(tail) => std::mem::take(tail),
                _ => break,
            };
            let end = arena[next].get().sourcepos.end;
            if let NodeValue::Text(text) = &mut arena[id].get_mut().value {
                text.push_str(&tail);
            }
            arena[id].get_mut().sourcepos.end = end;
            next.remove(arena);
        }
        if matches!(&arena[id].get().value, NodeValue::Text(text) if text.is_empty()) {
            id.remove(arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown_to_html_with_options;
    use pretty_assertions::assert_eq;

    fn html(md: &str) -> String {
        markdown_to_html_with_options(md, Options::empty())
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" a "), "a");
        assert_eq!(normalize_code("  "), "  ");
        assert_eq!(normalize_code("foo\r\nbar"), "foo bar");
        assert_eq!(normalize_code(" `` "), "``");
    }

    #[test]
    fn test_code_span_backtick_runs() {
        assert_eq!(html("`` foo ` bar ``\n"), "<p><code>foo ` bar</code></p>\n");
        assert_eq!(html("```foo``\n"), "<p>```foo``</p>\n");
        assert_eq!(html("`foo``bar``\n"), "<p>`foo<code>bar</code></p>\n");
    }

    #[test]
    fn test_rule_of_three() {
        assert_eq!(html("*foo**bar**baz*\n"), "<p><em>foo<strong>bar</strong>baz</em></p>\n");
        assert_eq!(html("*foo**bar*\n"), "<p><em>foo**bar</em></p>\n");
        assert_eq!(html("***foo** bar*\n"), "<p><em><strong>foo</strong> bar</em></p>\n");
    }

    #[test]
    fn test_intraword_underscore() {
        assert_eq!(html("foo_bar_\n"), "<p>foo_bar_</p>\n");
        assert_eq!(html("*foo*bar\n"), "<p><em>foo</em>bar</p>\n");
    }

    #[test]
    fn test_links_do_not_nest() {
        assert_eq!(
            html("[foo [bar](/uri)](/uri)\n"),
            "<p>[foo <a href=\"/uri\">bar</a>](/uri)</p>\n"
        );
        assert_eq!(
            html("![foo [bar](/uri)](/img)\n"),
            "<p><img src=\"/img\" alt=\"foo bar\" /></p>\n"
        );
    }

    #[test]
    fn test_reference_forms() {
        let md = "[Foo][bar] [bar][] [bar]\n\n[BAR]: /url \"t\"\n";
        assert_eq!(
            html(md),
            "<p><a href=\"/url\" title=\"t\">Foo</a> <a href=\"/url\" title=\"t\">bar</a> <a href=\"/url\" title=\"t\">bar</a></p>\n"
        );
    }

    #[test]
    fn test_hard_and_soft_breaks() {
        assert_eq!(html("foo  \nbar\n"), "<p>foo<br />\nbar</p>\n");
        assert_eq!(html("foo\\\nbar\n"), "<p>foo<br />\nbar</p>\n");
        assert_eq!(html("foo \n   bar\n"), "<p>foo\nbar</p>\n");
    }

    #[test]
    fn test_autolinks_and_raw_html() {
        assert_eq!(
            html("<https://a.b/c?d&amp;e> <me@x.org>\n"),
            "<p><a href=\"https://a.b/c?d&amp;e\">https://a.b/c?d&amp;e</a> <a href=\"mailto:me@x.org\">me@x.org</a></p>\n"
        );
        assert_eq!(html("a <b>c</b>\n"), "<p>a <!-- raw HTML omitted -->c<!-- raw HTML omitted --></p>\n");
    }

    #[test]
    fn test_smart_punctuation() {
        let out = markdown_to_html_with_options("\"Hi\" -- it's... ---\n", Options::SMART);
        assert_eq!(out, "<p>\u{201c}Hi\u{201d} \u{2013} it\u{2019}s\u{2026} \u{2014}</p>\n");
    }

    #[test]
    fn test_inline_sourcepos() {
        let mut parser = Parser::new(Options::empty());
        parser.feed("a *b*\n  c\n");
        let doc = parser.finish();
        let emph = doc
            .root()
            .descendants(doc.arena())
            .find(|&id| doc.get(id).value == NodeValue::Emph)
            .unwrap();
        assert_eq!(doc.get(emph).sourcepos.to_string(), "1:3-1:5");
        let last = doc.arena()[doc.arena()[doc.root()].first_child().unwrap()]
            .last_child()
            .unwrap();
        assert_eq!(doc.get(last).sourcepos.to_string(), "2:3-2:3");
    }
}
