//! GFM pipe tables
//!
//! A table opens when the line after a paragraph is a delimiter row with as
//! many cells as the paragraph's last line. The paragraph node becomes the
//! table in place and any lines before the header split off into a new
//! paragraph. Later non-blank lines are body rows, padded or cut to the
//! header's width.
use super::Extension;
use crate::ast::{Alignment, Ast, LineColumn, NodeKind, NodeValue, Sourcepos};
use crate::options::{Format, Options};
use crate::parser::Parser;
use crate::render::html::write_sourcepos;
use crate::render::Renderer;
use indextree::{Arena, NodeId};

pub fn extension() -> Extension {
    let mut ext = Extension::new("table", Options::TABLES)
        .with_block_start(try_open)
        .with_block_continue(table_continues);
    for kind in [NodeKind::Table, NodeKind::TableRow, NodeKind::TableCell] {
        ext = ext
            .with_renderer(kind, Format::Html, render_html)
            .with_renderer(kind, Format::CommonMark, render_commonmark)
            .with_renderer(kind, Format::Latex, render_latex)
            .with_renderer(kind, Format::Man, render_man)
            .with_renderer(kind, Format::PlainText, render_plaintext);
    }
    ext
}

/// One cell of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    /// Byte offset of the first non-blank character.
    offset: usize,
    /// Trimmed length in the source.
    width: usize,
    /// Trimmed text with `\|` unescaped.
    text: String,
}

fn make_cell(line: &str, start: usize, end: usize) -> Cell {
    let raw = &line[start..end];
    let trimmed = raw.trim_matches([' ', '\t']);
    let lead = raw.len() - raw.trim_start_matches([' ', '\t']).len();
    Cell {
        offset: start + lead,
        width: trimmed.len(),
        text: trimmed.replace("\\|", "|"),
    }
}

/// Split a row at unescaped pipes. A leading and a trailing pipe are
/// optional and do not make empty cells; a lone pipe has no cells at all.
fn split_row(line: &str, start: usize) -> Vec<Cell> {
    let bytes = line.as_bytes();
    let end = line.trim_end_matches([' ', '\t', '\n', '\r']).len();
    let mut i = start;
    if bytes.get(i) == Some(&b'|') {
        i += 1;
        if i >= end {
            return Vec::new();
        }
    }

    let mut cells = Vec::new();
    let mut cell_start = i;
    let mut trailing_pipe = false;
    while i < end {
        trailing_pipe = false;
        match bytes[i] {
            b'\\' => i += 2,
            b'|' => {
                cells.push(make_cell(line, cell_start, i));
                i += 1;
                cell_start = i;
                trailing_pipe = true;
            }
            _ => i += 1,
        }
    }
    if !trailing_pipe || cells.is_empty() {
        cells.push(make_cell(line, cell_start.min(end), end));
    }
    cells
}

/// Column alignments when the line is a delimiter row: cells made of `-`
/// with an optional `:` on either side.
fn parse_delimiter_row(line: &str, start: usize) -> Option<Vec<Alignment>> {
    let cells = split_row(line, start);
    if cells.is_empty() {
        return None;
    }
    cells
        .iter()
        .map(|cell| {
            let text = cell.text.as_bytes();
            let left = text.first() == Some(&b':');
            let right = text.len() > 1 && text.last() == Some(&b':');
            let dashes = &text[usize::from(left)..text.len() - usize::from(right)];
            if dashes.is_empty() || dashes.iter().any(|&c| c != b'-') {
                return None;
            }
            Some(match (left, right) {
                (true, true) => Alignment::Center,
                (true, false) => Alignment::Left,
                (false, true) => Alignment::Right,
                (false, false) => Alignment::None,
            })
        })
        .collect()
}

fn try_open(parser: &mut Parser, container: NodeId, line: &str, indented: bool) -> Option<NodeId> {
    if indented {
        return None;
    }
    match parser.arena[container].get().value.kind() {
        NodeKind::Paragraph => open_table(parser, container, line),
        NodeKind::Table if !parser.blank => {
            let columns = match &parser.arena[container].get().value {
                NodeValue::Table(aligns) => aligns.len(),
                _ => return None,
            };
            // Container prefixes such as `>` are not part of the row
            let start = parser.first_nonspace;
            let line_number = parser.line_number;
            append_row(parser, container, false, &line[start..], line_number, start + 1, columns);
            parser.advance_offset(line, line.len().saturating_sub(1 + parser.offset), false);
            Some(container)
        }
        _ => None,
    }
}

fn table_continues(parser: &mut Parser, container: NodeId, _line: &str) -> Option<bool> {
    matches!(parser.arena[container].get().value, NodeValue::Table(_)).then_some(!parser.blank)
}

/// Turn `paragraph` into a table whose header is the paragraph's last line.
fn open_table(parser: &mut Parser, paragraph: NodeId, line: &str) -> Option<NodeId> {
    let aligns = parse_delimiter_row(line, parser.first_nonspace)?;
    if !parser.resolve_reference_definitions(paragraph) {
        return None;
    }

    let ast = parser.arena[paragraph].get();
    let header = *ast.line_offsets.last()?;
    let header_text = &ast.content[header.pos..];
    let lead = header_text.len() - header_text.trim_start_matches([' ', '\t']).len();
    if split_row(header_text, lead).len() != aligns.len() {
        return None;
    }

    let ast = parser.arena[paragraph].get_mut();
    let content = std::mem::take(&mut ast.content);
    let offsets = std::mem::take(&mut ast.line_offsets);
    let start = ast.sourcepos.start;
    let columns = aligns.len();
    ast.value = NodeValue::Table(aligns);
    ast.sourcepos.start = LineColumn::new(header.line, header.column);

    // Lines above the header stay a paragraph of their own
    let earlier = &offsets[..offsets.len() - 1];
    if let Some(prev) = earlier.last() {
        let prev_text = content[prev.pos..header.pos].trim_end_matches(['\n', '\r']);
        let end = LineColumn::new(prev.line, prev.column + prev_text.len().saturating_sub(1));
        let mut above = Ast::with_sourcepos(NodeValue::Paragraph, Sourcepos::new(start, end));
        above.content = content[..header.pos].to_string();
        above.line_offsets = earlier.to_vec();
        let node = parser.arena.new_node(above);
        paragraph.insert_before(node, &mut parser.arena);
    }

    append_row(
        parser,
        paragraph,
        true,
        &content[header.pos..],
        header.line,
        header.column,
        columns,
    );
    parser.advance_offset(line, line.len().saturating_sub(1 + parser.offset), false);
    Some(paragraph)
}

/// Append a closed row built from `text`, whose byte 0 sits at source
/// column `base`.
fn append_row(parser: &mut Parser, table: NodeId, header: bool, text: &str, line: usize, base: usize, columns: usize) {
    let start = text.len() - text.trim_start_matches([' ', '\t']).len();
    let end = text.trim_end_matches([' ', '\t', '\n', '\r']).len();
    let cells = split_row(text, start);

    let row_pos = Sourcepos::new(
        LineColumn::new(line, base + start),
        LineColumn::new(line, (base + end).saturating_sub(1)),
    );
    let row = parser.arena.new_node(Ast::with_sourcepos(NodeValue::TableRow(header), row_pos));
    table.append(row, &mut parser.arena);

    for i in 0..columns {
        let (column, width, content) = match cells.get(i) {
            Some(cell) => (base + cell.offset, cell.width, cell.text.as_str()),
            None => (base + end, 0, ""),
        };
        let pos = Sourcepos::new(
            LineColumn::new(line, column),
            LineColumn::new(line, column + width.saturating_sub(1)),
        );
        let mut ast = Ast::with_sourcepos(NodeValue::TableCell, pos);
        ast.push_line(content, line, column);
        let cell = parser.arena.new_node(ast);
        row.append(cell, &mut parser.arena);
    }
}

fn is_header_row(arena: &Arena<Ast>, row: NodeId) -> bool {
    matches!(arena[row].get().value, NodeValue::TableRow(true))
}

/// Alignment of the column `cell`, the node being rendered, sits in.
pub(crate) fn cell_alignment(r: &Renderer<'_>, cell: NodeId) -> Alignment {
    let arena = r.arena();
    let column = r.sibling_index();
    arena[cell]
        .parent()
        .and_then(|row| arena[row].parent())
        .and_then(|table| match &arena[table].get().value {
            NodeValue::Table(aligns) => aligns.get(column).copied(),
            _ => None,
        })
        .unwrap_or_default()
}

fn render_html(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let arena = r.arena();
    match r.value(node) {
        NodeValue::Table(_) => {
            if entering {
                r.html_cr();
                r.write_raw("<table");
                write_sourcepos(r, node);
                r.write_raw(">");
            } else {
                let header_only = arena[node].last_child().is_some_and(|row| is_header_row(arena, row));
                if !header_only {
                    r.html_cr();
                    r.write_raw("</tbody>");
                }
                r.html_cr();
                r.write_raw("</table>\n");
            }
        }
        NodeValue::TableRow(header) => {
            if entering {
                r.html_cr();
                if *header {
                    r.write_raw("<thead>");
                    r.html_cr();
                } else if arena[node].previous_sibling().is_some_and(|prev| is_header_row(arena, prev)) {
                    r.write_raw("<tbody>");
                    r.html_cr();
                }
                r.write_raw("<tr");
                write_sourcepos(r, node);
                r.write_raw(">");
            } else {
                r.html_cr();
                r.write_raw("</tr>");
                if *header {
                    r.html_cr();
                    r.write_raw("</thead>");
                }
            }
        }
        NodeValue::TableCell => {
            let header = arena[node].parent().is_some_and(|row| is_header_row(arena, row));
            if entering {
                r.html_cr();
                r.write_raw(if header { "<th" } else { "<td" });
                match cell_alignment(r, node) {
                    Alignment::Left => r.write_raw(" align=\"left\""),
                    Alignment::Center => r.write_raw(" align=\"center\""),
                    Alignment::Right => r.write_raw(" align=\"right\""),
                    Alignment::None => {}
                }
                write_sourcepos(r, node);
                r.write_raw(">");
            } else {
                r.write_raw(if header { "</th>" } else { "</td>" });
            }
        }
        _ => {}
    }
    true
}

fn render_commonmark(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let arena = r.arena();
    match r.value(node) {
        NodeValue::Table(_) => r.blankline(),
        NodeValue::TableRow(_) => {
            if entering {
                r.cr();
                r.lit("|", false);
            }
        }
        NodeValue::TableCell => {
            if entering {
                r.lit(" ", false);
                return true;
            }
            r.lit(" |", false);
            let last_header_cell = arena[node].next_sibling().is_none()
                && arena[node].parent().is_some_and(|row| is_header_row(arena, row));
            let table = arena[node].parent().and_then(|row| arena[row].parent());
            if let Some(table) = table.filter(|_| last_header_cell)
                && let NodeValue::Table(aligns) = r.value(table)
            {
                r.cr();
                r.lit("|", false);
                for align in aligns {
                    r.lit(
                        match align {
                            Alignment::None => " --- |",
                            Alignment::Left => " :-- |",
                            Alignment::Center => " :-: |",
                            Alignment::Right => " --: |",
                        },
                        false,
                    );
                }
                r.cr();
            }
        }
        _ => {}
    }
    true
}

fn render_latex(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let arena = r.arena();
    match r.value(node) {
        NodeValue::Table(aligns) => {
            if entering {
                let colspec: String = aligns
                    .iter()
                    .map(|align| match align {
                        Alignment::None | Alignment::Left => 'l',
                        Alignment::Center => 'c',
                        Alignment::Right => 'r',
                    })
                    .collect();
                r.cr();
                r.lit("\\begin{table}", false);
                r.cr();
                r.lit(&format!("\\begin{{tabular}}{{{colspec}}}"), false);
                r.cr();
            } else {
                r.lit("\\end{tabular}", false);
                r.cr();
                r.lit("\\end{table}", false);
                r.cr();
            }
        }
        NodeValue::TableRow(_) => {
            if !entering {
                r.cr();
            }
        }
        NodeValue::TableCell => {
            if !entering {
                r.lit(if arena[node].next_sibling().is_some() { " & " } else { " \\\\" }, false);
            }
        }
        _ => {}
    }
    true
}

fn render_man(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let arena = r.arena();
    match r.value(node) {
        NodeValue::Table(aligns) => {
            if entering {
                r.cr();
                r.lit(".TS", false);
                r.cr();
                r.lit("tab(@);", false);
                r.cr();
                let colspec: String = aligns
                    .iter()
                    .map(|align| match align {
                        Alignment::Left => 'l',
                        Alignment::None | Alignment::Center => 'c',
                        Alignment::Right => 'r',
                    })
                    .collect();
                if !colspec.is_empty() {
                    r.lit(&colspec, false);
                    r.lit(".", false);
                    r.cr();
                }
            } else {
                r.lit(".TE", false);
                r.cr();
            }
        }
        NodeValue::TableRow(_) => {
            if !entering {
                r.cr();
            }
        }
        NodeValue::TableCell => {
            if !entering && arena[node].next_sibling().is_some() {
                r.lit("@", false);
            }
        }
        _ => {}
    }
    true
}

fn render_plaintext(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let arena = r.arena();
    match r.value(node) {
        NodeValue::Table(_) => r.blankline(),
        NodeValue::TableRow(_) => {
            if entering {
                r.cr();
            }
        }
        NodeValue::TableCell => {
            if !entering && arena[node].next_sibling().is_some() {
                r.lit("\t", false);
            }
        }
        _ => {}
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderOptions;
    use pretty_assertions::assert_eq;

    fn parse(md: &str) -> crate::Document {
        let mut parser = Parser::new(Options::TABLES);
        parser.feed(md);
        parser.finish()
    }

    fn render(md: &str, format: Format) -> String {
        parse(md).render(format, &RenderOptions::default())
    }

    #[test]
    fn test_split_row() {
        let texts = |line: &str| split_row(line, 0).into_iter().map(|c| c.text).collect::<Vec<_>>();
        assert_eq!(texts("| a | b |"), ["a", "b"]);
        assert_eq!(texts("a | b"), ["a", "b"]);
        assert_eq!(texts("| a |  |"), ["a", ""]);
        assert_eq!(texts("| `a\\|b` | c |\n"), ["`a|b`", "c"]);
        assert_eq!(split_row("|  x |", 0)[0].offset, 3);
        assert!(split_row("|\n", 0).is_empty());
        assert_eq!(texts("| |"), [""]);
    }

    #[test]
    fn test_delimiter_row_alignments() {
        assert_eq!(
            parse_delimiter_row("|---|:-:|:--|--:|\n", 0),
            Some(vec![Alignment::None, Alignment::Center, Alignment::Left, Alignment::Right])
        );
        assert_eq!(parse_delimiter_row("| -- | x |\n", 0), None);
        assert_eq!(parse_delimiter_row("| : |\n", 0), None);
        assert_eq!(parse_delimiter_row("|\n", 0), None);
    }

    #[test]
    fn test_lone_pipe_header_is_paragraph() {
        assert_eq!(render("|\n|-|\n", Format::Html), "<p>|\n|-|</p>\n");
    }

    #[test]
    fn test_table_in_block_quote() {
        let md = "> | a | b |\n> |---|---|\n> | c | d |\n";
        assert_eq!(
            render(md, Format::Html),
            "<blockquote>\n<table>\n<thead>\n<tr>\n<th>a</th>\n<th>b</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n<td>c</td>\n<td>d</td>\n</tr>\n</tbody>\n</table>\n</blockquote>\n"
        );
        let doc = parse(md);
        let quote = doc.arena()[doc.root()].first_child().unwrap();
        let table = doc.arena()[quote].first_child().unwrap();
        let row = doc.arena()[table].last_child().unwrap();
        let last = doc.arena()[row].last_child().unwrap();
        assert_eq!(doc.get(last).sourcepos.to_string(), "3:9-3:9");
    }

    #[test]
    fn test_table_in_list_item() {
        assert_eq!(
            render("- | a |\n  | - |\n  | b |\n", Format::Html),
            "<ul>\n<li>\n<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n<td>b</td>\n</tr>\n</tbody>\n</table>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_alignment_sequence() {
        let doc = parse("| a | b |\n|---|:-:|\n");
        let table = doc.arena()[doc.root()].first_child().unwrap();
        assert_eq!(doc.get(table).value, NodeValue::Table(vec![Alignment::None, Alignment::Center]));
    }

    #[test]
    fn test_html_table() {
        assert_eq!(
            render("| foo | bar |\n| --- | :-: |\n| baz | bim |\n", Format::Html),
            "<table>\n<thead>\n<tr>\n<th>foo</th>\n<th align=\"center\">bar</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n<td>baz</td>\n<td align=\"center\">bim</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn test_header_only_table() {
        assert_eq!(
            render("| a |\n| - |\n", Format::Html),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n</table>\n"
        );
    }

    #[test]
    fn test_rows_padded_and_cut() {
        assert_eq!(
            render("| a | b |\n|---|---|\n| c |\n| d | e | f |\n", Format::Html),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n<th>b</th>\n</tr>\n</thead>\n<tbody>\n\
             <tr>\n<td>c</td>\n<td></td>\n</tr>\n<tr>\n<td>d</td>\n<td>e</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn test_column_count_mismatch_is_paragraph() {
        assert_eq!(
            render("| a | b |\n| --- |\n", Format::Html),
            "<p>| a | b |\n| --- |</p>\n"
        );
    }

    #[test]
    fn test_paragraph_lines_before_header() {
        assert_eq!(
            render("intro\n| a |\n| - |\n| b |\n\nafter\n", Format::Html),
            "<p>intro</p>\n<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n<tbody>\n\
             <tr>\n<td>b</td>\n</tr>\n</tbody>\n</table>\n<p>after</p>\n"
        );
    }

    #[test]
    fn test_block_start_ends_table() {
        assert_eq!(
            render("| a |\n| - |\n> q\n", Format::Html),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n</table>\n<blockquote>\n<p>q</p>\n</blockquote>\n"
        );
    }

    #[test]
    fn test_escaped_pipe_in_cell() {
        assert_eq!(
            render("| x |\n| - |\n| `a\\|b` |\n", Format::Html),
            "<table>\n<thead>\n<tr>\n<th>x</th>\n</tr>\n</thead>\n<tbody>\n\
             <tr>\n<td><code>a|b</code></td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn test_sourcepos() {
        let doc = parse("| a | b |\n|---|---|\n| c | d |\n");
        let table = doc.arena()[doc.root()].first_child().unwrap();
        assert_eq!(doc.get(table).sourcepos.to_string(), "1:1-3:9");
        let body = doc.arena()[table].last_child().unwrap();
        let second = doc.arena()[body].last_child().unwrap();
        assert_eq!(doc.get(second).sourcepos.to_string(), "3:7-3:7");
    }

    #[test]
    fn test_text_formats() {
        let md = "| a | b |\n|---|:-:|\n| c | d |\n";
        assert_eq!(render(md, Format::CommonMark), "| a | b |\n| --- | :-: |\n| c | d |\n");
        assert_eq!(
            render(md, Format::Latex),
            "\\begin{table}\n\\begin{tabular}{lc}\na & b \\\\\nc & d \\\\\n\\end{tabular}\n\\end{table}\n"
        );
        assert_eq!(render(md, Format::Man), ".TS\ntab(@);\ncc.\na@b\nc@d\n.TE\n");
        assert_eq!(render(md, Format::PlainText), "a\tb\nc\td\n");
    }
}
