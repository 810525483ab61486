use indextree::{Arena, NodeId};
use marktree::ast::NodeLink;
use marktree::inlines::Subject;
use marktree::{
    Ast, Error, Extension, Format, NodeEvent, NodeKind, NodeValue, Options, Parser, Registry, RenderOptions, Renderer,
};
use pretty_assertions::assert_eq;

const DOC: &str = "# Costs\n\nSome *emph* and `code`.\n\n- one\n- two\n";

fn parse(md: &str, options: Options) -> marktree::Document {
    let mut parser = Parser::new(options);
    parser.feed(md);
    parser.finish()
}

#[test]
fn every_format_renders_one_document() {
    let doc = parse(DOC, Options::empty());
    let render = |format| doc.render(format, &RenderOptions::default());

    assert_eq!(
        render(Format::Html),
        "<h1>Costs</h1>\n<p>Some <em>emph</em> and <code>code</code>.</p>\n<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n"
    );
    assert_eq!(render(Format::CommonMark), "# Costs\n\nSome *emph* and `code`.\n\n  - one\n  - two\n");
    assert_eq!(render(Format::PlainText), "Costs\n\nSome emph and code.\n\n  - one\n  - two\n");
    assert!(render(Format::Man).starts_with(".SH\nCosts\n.PP\nSome \\f[I]emph\\f[] and \\f[C]code\\f[]."));
    assert!(render(Format::Latex).starts_with("\\section{Costs}\n\nSome \\emph{emph} and \\texttt{code}."));
    assert!(render(Format::Xml).contains("<heading level=\"1\">"));
}

#[test]
fn render_by_name_and_into_writer() {
    let doc = parse("hi\n", Options::empty());
    let options = RenderOptions::default();
    assert_eq!(doc.render_named("TeX", &options).unwrap(), "hi\n");
    assert!(matches!(
        doc.render_named("pdf", &options),
        Err(Error::UnknownFormat(name)) if name == "pdf"
    ));

    let mut out = Vec::new();
    doc.render_to(&mut out, Format::Html, &options).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "<p>hi</p>\n");
}

#[test]
fn trailing_newline_is_optional() {
    let doc = parse("# Hi\n", Options::empty());
    let options = RenderOptions::default().with_trailing_newline(false);
    assert_eq!(doc.render(Format::PlainText, &options), "Hi");
    assert_eq!(doc.render(Format::PlainText, &RenderOptions::default()), "Hi\n");
}

#[test]
fn parse_options_seed_render_options() {
    let doc = parse("# Hi\n", Options::SOURCEPOS);
    assert_eq!(doc.to_html(), "<h1 data-sourcepos=\"1:1-1:4\">Hi</h1>\n");
}

#[test]
fn node_iter_pairs_enter_and_exit() {
    let doc = parse(DOC, Options::gfm());
    let mut depth = 0usize;
    for event in doc.iter() {
        match event {
            NodeEvent::Enter(node) if !doc.get(node).value.is_leaf() => depth += 1,
            NodeEvent::Exit(_) => depth -= 1,
            NodeEvent::Enter(_) => {}
        }
    }
    assert_eq!(depth, 0);
}

fn mention(subject: &mut Subject<'_>, _c: u8) -> Option<NodeId> {
    let input = subject.input();
    let start = subject.pos();
    let len = input[start + 1..].bytes().take_while(u8::is_ascii_alphanumeric).count();
    if len == 0 {
        return None;
    }
    let end = start + 1 + len;
    subject.set_pos(end);
    let link = subject.make_node(
        NodeValue::Link(NodeLink {
            url: format!("/users/{}", &input[start + 1..end]),
            title: String::new(),
        }),
        start,
        end,
    );
    let text = subject.make_text(&input[start..end], start, end);
    link.append(text, subject.arena_mut());
    Some(link)
}

fn shout(arena: &mut Arena<Ast>, root: NodeId, _options: Options) {
    let nodes: Vec<NodeId> = root.descendants(arena).collect();
    for node in nodes {
        if let NodeValue::Text(text) = &mut arena[node].get_mut().value {
            *text = text.to_uppercase();
        }
    }
}

fn heading_with_class(r: &mut Renderer<'_>, node: NodeId, entering: bool) -> bool {
    let NodeValue::Heading(heading) = r.value(node) else {
        return true;
    };
    if entering {
        r.html_cr();
        r.write_raw(&format!("<h{} class=\"title\">", heading.level));
    } else {
        r.write_raw(&format!("</h{}>\n", heading.level));
    }
    true
}

#[test]
fn custom_inline_extension() {
    let registry = Registry::builder()
        .register(Extension::new("mention", Options::empty()).with_inline(b"@", mention))
        .build();
    let mut parser = Parser::with_registry(Options::empty(), registry);
    parser.feed("hi @bob! and @ alone\n");
    assert_eq!(
        parser.finish().to_html(),
        "<p>hi <a href=\"/users/bob\">@bob</a>! and @ alone</p>\n"
    );
}

#[test]
fn custom_postprocess_and_render_override() {
    let registry = Registry::builder()
        .with_builtins()
        .register(Extension::new("shout", Options::empty()).with_postprocess(shout))
        .render_override(NodeKind::Heading, Format::Html, heading_with_class)
        .build();
    let mut parser = Parser::with_registry(Options::STRIKETHROUGH, registry);
    parser.feed("# hi\n\na ~~b~~\n");
    assert_eq!(
        parser.finish().to_html(),
        "<h1 class=\"title\">HI</h1>\n<p>A <del>B</del></p>\n"
    );
}

#[test]
fn documents_render_from_other_threads() {
    let doc = parse("| a |\n| - |\n| b |\n", Options::TABLES);
    let expected = doc.to_html();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let mut parser = Parser::new(Options::TABLES);
                parser.feed("| a |\n| - |\n| b |\n");
                parser.finish().to_html()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
