use marktree::{Format, NodeKind, Options, Parser, RenderOptions};
use pretty_assertions::assert_eq;

/// Small deterministic generator so failures reproduce from the seed.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next() as usize) % items.len()]
    }
}

const FRAGMENTS: &[&str] = &[
    "# ", "## ", "> ", "- ", "1. ", "2) ", "* ", "    ", "\t", "```", "~~~", "---", "***", "===",
    "| a | b |", "|---|:-:|", "[x] ", "[ ] ", "[", "]", "(", ")", "![", "<", ">", "<div>", "</div>",
    "<!--", "-->", "`", "``", "*", "**", "_", "__", "~", "~~", "==", "\\", "&amp;", "&#", ";",
    "www.", "http://", "@", ".com", "[^1]", "[^1]: ", "[foo]: /url", "\"", "'", "é", "\u{0}",
    "\r\n", "\n", "\n\n", " ", "text", "word", "é中",
];

fn random_markdown(rng: &mut Lcg) -> String {
    let len = 1 + rng.next() % 40;
    (0..len).map(|_| rng.pick(FRAGMENTS)).collect()
}

#[test]
fn random_input_always_yields_one_document() {
    let mut rng = Lcg(0x5eed);
    let all = Options::all() - Options::SOURCEPOS;
    for _ in 0..500 {
        let md = random_markdown(&mut rng);
        let mut parser = Parser::new(all);
        parser.feed(&md);
        let doc = parser.finish();

        assert_eq!(doc.get(doc.root()).value.kind(), NodeKind::Document, "input {md:?}");
        assert!(doc.arena()[doc.root()].parent().is_none());
        for format in Format::ALL {
            let _ = doc.render(format, &RenderOptions::default().with_width(20));
        }
    }
}

#[test]
fn random_bytes_parse_and_render() {
    let mut rng = Lcg(42);
    for _ in 0..200 {
        let len = rng.next() % 200;
        let bytes: Vec<u8> = (0..len).map(|_| (rng.next() & 0xff) as u8).collect();
        let mut parser = Parser::new(Options::gfm() | Options::SMART);
        for chunk in bytes.chunks(7) {
            parser.feed(chunk);
        }
        let doc = parser.finish();
        assert_eq!(doc.get(doc.root()).value.kind(), NodeKind::Document);
        let _ = doc.render(Format::CommonMark, &RenderOptions::default());
        let _ = doc.to_html();
    }
}

#[test]
fn invalid_utf8_is_replaced() {
    let mut parser = Parser::new(Options::VALIDATE_UTF8);
    parser.feed(b"a\xffb\n");
    assert_eq!(parser.finish().to_html(), "<p>a\u{fffd}b</p>\n");
}

#[test]
fn unterminated_fence_holds_remaining_lines() {
    let mut parser = Parser::new(Options::empty());
    parser.feed("```\nfoo\n\nbar");
    assert_eq!(parser.finish().to_html(), "<pre><code>foo\n\nbar\n</code></pre>\n");
}

#[test]
fn deep_nesting_does_not_overflow() {
    let md = format!("{}a\n", "> ".repeat(10_000));
    let mut parser = Parser::new(Options::empty());
    parser.feed(&md);
    let html = parser.finish().to_html();
    assert!(html.starts_with("<blockquote>"));

    let md = format!("{}a{}\n", "*".repeat(5_000), "*".repeat(5_000));
    let mut parser = Parser::new(Options::empty());
    parser.feed(&md);
    assert!(parser.finish().to_html().starts_with("<p>"));
}

#[test]
fn commonmark_output_is_stable() {
    let docs = [
        "# Title\n\nSome *emph* and **strong** text with `code`.\n",
        "> quote\n> more\n\n- one\n- two\n  - nested\n",
        "1. first\n2. second\n\n```rust\nfn main() {}\n```\n",
        "[link](http://example.com \"title\") and ![img](/a.png)\n",
        "a\\*b and 1\\. not a list\n\n***\n",
        "| a | b |\n|---|:-:|\n| c | d |\n",
        "- [x] done\n- [ ] todo\n",
        "~~gone~~ and <https://example.com>\n",
        "` ` and `  `\n",
        "* \\- x\n* \\> y\n",
        "```a\\&b\\\\c\nx\n```\n",
        "- a\n\n```rust\ncode\n```\n",
        "> | a | b |\n> |---|---|\n> | c | d |\n",
        "- [x] \\> not a quote\n",
    ];
    let options = Options::gfm();
    for md in docs {
        let mut parser = Parser::new(options);
        parser.feed(md);
        let first = parser.finish();
        let once = first.render(Format::CommonMark, &RenderOptions::default());

        let mut parser = Parser::new(options);
        parser.feed(&once);
        let second = parser.finish();
        assert_eq!(second.to_html(), first.to_html(), "html changed for {md:?}");
        assert_eq!(
            second.render(Format::CommonMark, &RenderOptions::default()),
            once,
            "not stable for {md:?}"
        );
    }
}

#[test]
fn long_documents_render_in_linear_time() {
    use std::time::{Duration, Instant};

    let cases = [
        "1. a\n".repeat(20_000),
        "- x\n  - y\n".repeat(10_000),
        format!("{}a{}\n", "*".repeat(2_000), "*".repeat(2_000)),
    ];
    for md in &cases {
        let mut parser = Parser::new(Options::empty());
        parser.feed(md);
        let doc = parser.finish();
        let start = Instant::now();
        for format in Format::ALL {
            let _ = doc.render(format, &RenderOptions::default());
        }
        assert!(start.elapsed() < Duration::from_secs(5), "slow render for {} bytes", md.len());
    }
}

#[test]
fn sourcepos_of_children_within_parents() {
    let md = "# H\n\n> a *b*\n> c\n\n- x\n- y\n\n| a |\n| - |\n| b |\n";
    let mut parser = Parser::new(Options::TABLES);
    parser.feed(md);
    let doc = parser.finish();
    for node in doc.root().descendants(doc.arena()).skip(1) {
        let Some(parent) = doc.arena()[node].parent() else {
            continue;
        };
        if parent == doc.root() {
            continue;
        }
        let (inner, outer) = (doc.get(node).sourcepos, doc.get(parent).sourcepos);
        assert!(outer.contains(&inner), "{:?} {inner} outside {outer}", doc.get(node).value.kind());
    }
}
