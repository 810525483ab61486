/// A CommonMark and GitHub-flavored Markdown parser that builds an arena
/// tree and renders it as HTML, XML, man, CommonMark, LaTeX or plain text
pub mod ast;
mod blocks;
pub mod document;
mod entity;
pub mod error;
pub mod extensions;
pub mod inlines;
mod input;
pub mod options;
pub mod parser;
pub mod references;
pub mod render;
mod scanners;

pub use ast::{Alignment, Ast, LineColumn, NodeEvent, NodeIter, NodeKind, NodeValue, Sourcepos};
pub use document::Document;
pub use error::{Error, Result};
pub use extensions::{DelimiterRule, Extension, Registry, RegistryBuilder};
pub use options::{Format, Options, RenderOptions};
pub use parser::Parser;
pub use render::{Escaping, RenderFn, Renderer};

/// Parse markdown text with the GitHub-flavored extensions and render to HTML
#[cfg_attr(test, test_fuzz::test_fuzz)]
pub fn markdown_to_html(markdown: &str) -> String {
    markdown_to_html_with_options(markdown, Options::gfm())
}

/// Parse and render to HTML, taking render settings from the same bits.
pub fn markdown_to_html_with_options(markdown: &str, options: Options) -> String {
    let mut parser = Parser::new(options);
    parser.feed(markdown);
    parser.finish().to_html()
}

/// Parse and render to any format.
pub fn markdown_to(markdown: &str, options: Options, format: Format) -> String {
    let mut parser = Parser::new(options);
    parser.feed(markdown);
    let doc = parser.finish();
    doc.render(format, &doc.default_render_options())
}
