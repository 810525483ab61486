//! Error type for the render phase
use thiserror::Error;

/// Errors reported by rendering and format selection.
///
/// Parsing never fails; these only arise once a finished `Document` is
/// written out, and a failed render leaves the document untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown output format `{0}`")]
    UnknownFormat(String),

    #[error("unknown extension `{0}`")]
    UnknownExtension(String),

    #[error("failed to format output: {0}")]
    Write(#[from] std::fmt::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
