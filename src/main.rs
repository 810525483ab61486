use anyhow::{Context, Result};
use clap::Parser as _;
use marktree::{Format, Options, Parser, Registry, RenderOptions};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Convert Markdown to HTML, XML, man, CommonMark, LaTeX or plain text.
#[derive(Debug, clap::Parser)]
#[command(name = "marktree", version, about, long_about = None)]
struct Cli {
    /// Input files, concatenated; standard input when none are given
    files: Vec<PathBuf>,

    /// Output format: html, xml, man, commonmark, latex or plaintext
    #[arg(short, long, default_value = "html")]
    to: Format,

    /// Wrap column for the text formats, 0 for no wrapping
    #[arg(long, default_value_t = 0)]
    width: usize,

    /// Add source position attributes
    #[arg(long)]
    sourcepos: bool,

    /// Render soft breaks as hard breaks
    #[arg(long)]
    hardbreaks: bool,

    /// Render soft breaks as spaces
    #[arg(long)]
    nobreaks: bool,

    /// Keep raw HTML and dangerous URLs
    #[arg(long = "unsafe")]
    unsafe_: bool,

    /// Curly quotes, dashes and ellipses
    #[arg(long)]
    smart: bool,

    /// Replace invalid UTF-8 with U+FFFD
    #[arg(long)]
    validate_utf8: bool,

    /// Enable a syntax extension by name; may be repeated
    #[arg(short, long = "extension", value_name = "NAME")]
    extensions: Vec<String>,

    /// Enable footnotes
    #[arg(long)]
    footnotes: bool,

    /// Enable every GitHub-flavored extension
    #[arg(long)]
    gfm: bool,
}

impl Cli {
    fn options(&self) -> Result<Options> {
        let mut options = if self.gfm { Options::gfm() } else { Options::empty() };
        options.set(Options::SOURCEPOS, self.sourcepos);
        options.set(Options::HARDBREAKS, self.hardbreaks);
        options.set(Options::NOBREAKS, self.nobreaks);
        options.set(Options::UNSAFE, self.unsafe_);
        options.set(Options::SMART, self.smart);
        options.set(Options::VALIDATE_UTF8, self.validate_utf8);
        options.set(Options::FOOTNOTES, self.footnotes || self.gfm);

        let registry = Registry::builtin();
        for name in &self.extensions {
            options |= registry.extension_option(name)?;
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let options = cli.options()?;
    debug!(?options, format = %cli.to, "converting");

    let mut parser = Parser::new(options);
    if cli.files.is_empty() {
        let mut input = Vec::new();
        io::stdin()
            .read_to_end(&mut input)
            .context("failed to read standard input")?;
        parser.feed(&input);
    } else {
        for path in &cli.files {
            let input = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            parser.feed(&input);
        }
    }

    let doc = parser.finish();
    let render_options = RenderOptions::from_options(options).with_width(cli.width);
    doc.render_to(io::stdout().lock(), cli.to, &render_options)
        .context("failed to write output")?;
    Ok(())
}
