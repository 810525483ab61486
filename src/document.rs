//! A finished document tree
use crate::ast::{Ast, NodeIter};
use crate::error::Result;
use crate::extensions::Registry;
use crate::options::{Format, Options, RenderOptions};
use crate::render;
use indextree::{Arena, NodeId};
use std::io;
use std::sync::Arc;

/// The tree produced by [`Parser::finish`](crate::Parser::finish).
///
/// Dropping it releases every node at once. Rendering borrows it, so the
/// same document can be rendered to any number of formats.
pub struct Document {
    arena: Arena<Ast>,
    root: NodeId,
    options: Options,
    registry: Arc<Registry>,
}

impl Document {
    pub(crate) fn new(arena: Arena<Ast>, root: NodeId, options: Options, registry: Arc<Registry>) -> Self {
        Document {
            arena,
            root,
            options,
            registry,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn arena(&self) -> &Arena<Ast> {
        &self.arena
    }

    /// Give the node storage back, e.g. to seed [`Parser::with_arena`](crate::Parser::with_arena).
    pub fn into_arena(self) -> Arena<Ast> {
        self.arena
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn get(&self, node: NodeId) -> &Ast {
        self.arena[node].get()
    }

    /// Enter/exit walk over the whole tree.
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter::new(&self.arena, self.root)
    }

    /// Render settings matching the parse options.
    pub fn default_render_options(&self) -> RenderOptions {
        RenderOptions::from_options(self.options)
    }

    pub fn render(&self, format: Format, options: &RenderOptions) -> String {
        render::render(self, format, options)
    }

    /// Render by format name, e.g. `"latex"`.
    pub fn render_named(&self, format: &str, options: &RenderOptions) -> Result<String> {
        Ok(self.render(format.parse()?, options))
    }

    /// Render into an output sink.
    pub fn render_to<W: io::Write>(&self, mut writer: W, format: Format, options: &RenderOptions) -> Result<()> {
        let output = self.render(format, options);
        writer.write_all(output.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// HTML with the default render settings.
    pub fn to_html(&self) -> String {
        self.render(Format::Html, &self.default_render_options())
    }
}
