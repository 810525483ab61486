//! Syntax extensions and the registry that binds them to option bits
//!
//! An [`Extension`] is a bundle of plain function pointers: block start and
//! continuation matchers, an inline matcher with its trigger bytes,
//! delimiter rules for the emphasis pass, a tree post-processor, a raw HTML
//! filter and render callbacks. The [`Registry`] is immutable once built and
//! shared through an `Arc`, so any number of parsers may use it at once.
use crate::ast::{Ast, NodeKind, NodeValue};
use crate::error::{Error, Result};
use crate::inlines::Subject;
use crate::options::{Format, Options};
use crate::parser::Parser;
use crate::render::RenderFn;
use indextree::{Arena, NodeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::trace;

pub mod autolink;
pub mod mark;
pub mod strikethrough;
pub mod table;
pub mod tagfilter;
pub mod tasklist;
pub mod whitelist;

/// Try to open a block at the cursor. Gets the current container, the
/// whole line and whether the cursor sits at code indentation. Returns the
/// new container on success.
pub type BlockStartFn = fn(&mut Parser, NodeId, &str, bool) -> Option<NodeId>;

/// Continuation for blocks the extension owns: `Some(matched)` to decide,
/// `None` to leave the node to core rules.
pub type BlockContinueFn = fn(&mut Parser, NodeId, &str) -> Option<bool>;

/// Called with the cursor on one of the extension's trigger bytes. On
/// success the cursor must sit after the match and the detached node is
/// returned; on failure the cursor is restored by the caller.
pub type InlineFn = fn(&mut Subject<'_>, u8) -> Option<NodeId>;

/// Runs over the finished tree after inline parsing.
pub type PostprocessFn = fn(&mut Arena<Ast>, NodeId, Options);

/// Rewrites raw HTML before the HTML renderer writes it.
pub type HtmlFilterFn = fn(&str) -> String;

/// A delimiter run resolved by the emphasis pass into `value`.
///
/// Runs shorter than `min` or longer than `max` stay literal; an opener and
/// closer only pair when their lengths are equal.
#[derive(Debug, Clone)]
pub struct DelimiterRule {
    pub ch: u8,
    pub min: usize,
    pub max: usize,
    pub value: NodeValue,
}

/// One named syntax extension.
#[derive(Clone)]
pub struct Extension {
    pub name: &'static str,
    /// The bit that switches it on; empty means always on.
    pub option: Options,
    pub block_start: Option<BlockStartFn>,
    pub block_continue: Option<BlockContinueFn>,
    pub inline_chars: &'static [u8],
    pub inline_match: Option<InlineFn>,
    pub delimiters: Vec<DelimiterRule>,
    pub postprocess: Option<PostprocessFn>,
    pub html_filter: Option<HtmlFilterFn>,
    pub renderers: Vec<(NodeKind, Format, RenderFn)>,
}

impl Extension {
    pub fn new(name: &'static str, option: Options) -> Self {
        Extension {
            name,
            option,
            block_start: None,
            block_continue: None,
            inline_chars: &[],
            inline_match: None,
            delimiters: Vec::new(),
            postprocess: None,
            html_filter: None,
            renderers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_block_start(mut self, f: BlockStartFn) -> Self {
        self.block_start = Some(f);
        self
    }

    #[must_use]
    pub fn with_block_continue(mut self, f: BlockContinueFn) -> Self {
        self.block_continue = Some(f);
        self
    }

    #[must_use]
    pub fn with_inline(mut self, chars: &'static [u8], f: InlineFn) -> Self {
        self.inline_chars = chars;
        self.inline_match = Some(f);
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, rule: DelimiterRule) -> Self {
        self.delimiters.push(rule);
        self
    }

    #[must_use]
    pub fn with_postprocess(mut self, f: PostprocessFn) -> Self {
        self.postprocess = Some(f);
        self
    }

    #[must_use]
    pub fn with_html_filter(mut self, f: HtmlFilterFn) -> Self {
        self.html_filter = Some(f);
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, kind: NodeKind, format: Format, f: RenderFn) -> Self {
        self.renderers.push((kind, format, f));
        self
    }

    pub fn is_enabled(&self, options: Options) -> bool {
        self.option.is_empty() || options.intersects(self.option)
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("option", &self.option)
            .field("inline_chars", &self.inline_chars)
            .field("delimiters", &self.delimiters)
            .field("renderers", &self.renderers.len())
            .finish_non_exhaustive()
    }
}

/// Immutable extension table plus the `(kind, format)` render lookup.
#[derive(Debug, Default)]
pub struct Registry {
    extensions: Vec<Extension>,
    renderers: HashMap<(NodeKind, Format), RenderFn>,
}

impl Registry {
    /// The built-in set, built on first use and shared afterwards.
    pub fn builtin() -> Arc<Registry> {
        static BUILTIN: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| RegistryBuilder::new().with_builtins().build()))
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Extensions switched on by `options`, in registration order.
    pub fn enabled(&self, options: Options) -> impl Iterator<Item = &Extension> {
        self.extensions.iter().filter(move |ext| ext.is_enabled(options))
    }

    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.extensions.iter().map(|ext| ext.name)
    }

    /// The option bit behind an extension name, e.g. `"table"`.
    pub fn extension_option(&self, name: &str) -> Result<Options> {
        self.get(name)
            .map(|ext| ext.option)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))
    }

    pub fn renderer(&self, kind: NodeKind, format: Format) -> Option<RenderFn> {
        self.renderers.get(&(kind, format)).copied()
    }

    /// Apply every enabled raw HTML filter in order.
    pub fn filter_html(&self, options: Options, html: &str) -> Option<String> {
        let mut filtered: Option<String> = None;
        for filter in self.enabled(options).filter_map(|ext| ext.html_filter) {
            let input = filtered.as_deref().unwrap_or(html);
            filtered = Some(filter(input));
        }
        filtered
    }
}

/// Collects extensions and render overrides into a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    extensions: Vec<Extension>,
    overrides: Vec<(NodeKind, Format, RenderFn)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Add `table`, `strikethrough`, `autolink`, `tagfilter`, `tasklist`,
    /// `mark` and `whitelist`.
    #[must_use]
    pub fn with_builtins(self) -> Self {
        self.register(table::extension())
            .register(strikethrough::extension())
            .register(autolink::extension())
            .register(tagfilter::extension())
            .register(tasklist::extension())
            .register(mark::extension())
            .register(whitelist::extension())
    }

    /// Add an extension, replacing any earlier one with the same name.
    #[must_use]
    pub fn register(mut self, extension: Extension) -> Self {
        match self.extensions.iter_mut().find(|ext| ext.name == extension.name) {
            Some(slot) => *slot = extension,
            None => self.extensions.push(extension),
        }
        self
    }

    /// Render `kind` in `format` with `f`, ahead of any extension or
    /// built-in renderer.
    #[must_use]
    pub fn render_override(mut self, kind: NodeKind, format: Format, f: RenderFn) -> Self {
        self.overrides.push((kind, format, f));
        self
    }

    pub fn build(self) -> Arc<Registry> {
        let mut renderers = HashMap::new();
        for ext in &self.extensions {
            for &(kind, format, f) in &ext.renderers {
                renderers.insert((kind, format), f);
            }
        }
        for (kind, format, f) in self.overrides {
            renderers.insert((kind, format), f);
        }
        trace!(
            extensions = ?self.extensions.iter().map(|ext| ext.name).collect::<Vec<_>>(),
            renderers = renderers.len(),
            "registry built"
        );
        Arc::new(Registry {
            extensions: self.extensions,
            renderers,
        })
    }
}
