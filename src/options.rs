//! Parse options, render options and output formats
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags::bitflags! {
    /// Independent option bits accepted by [`Parser::new`](crate::Parser::new).
    ///
    /// Extension bits only take effect when the registry the parser uses
    /// contains an extension bound to that bit.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Options: u32 {
        /// Record source positions as `data-sourcepos` / `sourcepos` attributes.
        const SOURCEPOS = 1 << 1;
        /// Render soft breaks as hard line breaks.
        const HARDBREAKS = 1 << 2;
        /// Render soft breaks as spaces.
        const NOBREAKS = 1 << 4;
        /// Replace invalid UTF-8 with U+FFFD while reading lines.
        const VALIDATE_UTF8 = 1 << 9;
        /// Convert straight quotes, `--`, `---` and `...` to typographic punctuation.
        const SMART = 1 << 10;
        /// Parse `[^label]` footnote references and definitions.
        const FOOTNOTES = 1 << 13;
        /// Pass raw HTML and dangerous URLs through the HTML renderer.
        const UNSAFE = 1 << 17;
        /// GFM pipe tables.
        const TABLES = 1 << 20;
        /// `~strike~` and `~~strike~~`.
        const STRIKETHROUGH = 1 << 21;
        /// Bare `www.`, `http(s)://`, `ftp://` and email autolinks.
        const AUTOLINK = 1 << 22;
        /// `- [ ]` and `- [x]` list items.
        const TASKLIST = 1 << 23;
        /// Neutralize `<script>` and friends in raw HTML output.
        const TAGFILTER = 1 << 24;
        /// `==highlight==` marks.
        const MARK = 1 << 25;
        /// Escape every raw HTML tag outside a fixed list of harmless ones.
        const TAGWHITELIST = 1 << 26;
    }
}

impl Options {
    /// The GitHub-flavored set: tables, strikethrough, autolinks, task
    /// lists, tag filtering and footnotes.
    pub fn gfm() -> Self {
        Options::TABLES
            | Options::STRIKETHROUGH
            | Options::AUTOLINK
            | Options::TASKLIST
            | Options::TAGFILTER
            | Options::FOOTNOTES
    }
}

/// Output format selector for [`Document::render`](crate::Document::render).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Html,
    Xml,
    Man,
    CommonMark,
    Latex,
    PlainText,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Html,
        Format::Xml,
        Format::Man,
        Format::CommonMark,
        Format::Latex,
        Format::PlainText,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Xml => "xml",
            Format::Man => "man",
            Format::CommonMark => "commonmark",
            Format::Latex => "latex",
            Format::PlainText => "plaintext",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Format::Html),
            "xml" => Ok(Format::Xml),
            "man" => Ok(Format::Man),
            "commonmark" | "markdown" | "md" => Ok(Format::CommonMark),
            "latex" | "tex" => Ok(Format::Latex),
            "plaintext" | "text" | "txt" => Ok(Format::PlainText),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Settings that only influence serialization.
///
/// Deserializes from JSON with every field optional, e.g.
/// `{"width": 72, "unsafe": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Wrap column for the text formats; 0 disables wrapping.
    pub width: usize,
    pub hardbreaks: bool,
    pub nobreaks: bool,
    pub sourcepos: bool,
    #[serde(rename = "unsafe")]
    pub unsafe_: bool,
    /// Guarantee that non-empty output ends with a newline.
    pub trailing_newline: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: 0,
            hardbreaks: false,
            nobreaks: false,
            sourcepos: false,
            unsafe_: false,
            trailing_newline: true,
        }
    }
}

impl RenderOptions {
    /// Seed render settings from the parse-time option bits.
    pub fn from_options(options: Options) -> Self {
        RenderOptions {
            hardbreaks: options.contains(Options::HARDBREAKS),
            nobreaks: options.contains(Options::NOBREAKS),
            sourcepos: options.contains(Options::SOURCEPOS),
            unsafe_: options.contains(Options::UNSAFE),
            ..RenderOptions::default()
        }
    }

    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    #[must_use]
    pub fn with_hardbreaks(mut self, hardbreaks: bool) -> Self {
        self.hardbreaks = hardbreaks;
        self
    }

    #[must_use]
    pub fn with_nobreaks(mut self, nobreaks: bool) -> Self {
        self.nobreaks = nobreaks;
        self
    }

    #[must_use]
    pub fn with_sourcepos(mut self, sourcepos: bool) -> Self {
        self.sourcepos = sourcepos;
        self
    }

    #[must_use]
    pub fn with_unsafe(mut self, unsafe_: bool) -> Self {
        self.unsafe_ = unsafe_;
        self
    }

    #[must_use]
    pub fn with_trailing_newline(mut self, trailing_newline: bool) -> Self {
        self.trailing_newline = trailing_newline;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        for format in Format::ALL {
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
        }
        assert!(matches!(
            "docx".parse::<Format>(),
            Err(Error::UnknownFormat(name)) if name == "docx"
        ));
    }

    #[test]
    fn test_render_options_from_json() {
        let opts: RenderOptions =
            serde_json::from_str(r#"{"width": 72, "unsafe": true}"#).unwrap();
        assert_eq!(opts.width, 72);
        assert!(opts.unsafe_);
        assert!(opts.trailing_newline);
        assert!(!opts.sourcepos);
    }

    #[test]
    fn test_render_options_seeded_from_parse_options() {
        let opts = RenderOptions::from_options(Options::UNSAFE | Options::SOURCEPOS);
        assert!(opts.unsafe_);
        assert!(opts.sourcepos);
        assert!(!opts.hardbreaks);
    }
}
