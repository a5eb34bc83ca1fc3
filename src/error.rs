//! Error types shared by the registry, runner and rewriter.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for harness operations
#[derive(Debug, Error)]
pub enum Error {
    /// File system errors, always tagged with the path involved
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The indentation of an expected-text block could not be derived
    #[error(
        "cannot determine block indentation for expectation declared at {}:{line}",
        .artifact.display()
    )]
    IndentationUnknown { artifact: PathBuf, line: usize },

    /// A declared line is never followed by a function definition
    #[error(
        "no function definition follows the expectation declared at {}:{line}",
        .artifact.display()
    )]
    DefinitionNotFound { artifact: PathBuf, line: usize },

    /// The block being replaced could not be delimited in the artifact
    #[error(
        "malformed expected-text block for expectation declared at {}:{line}: {reason}",
        .artifact.display()
    )]
    MalformedBlock {
        artifact: PathBuf,
        line: usize,
        reason: &'static str,
    },

    /// Two expectations were registered on the same artifact line
    #[error(
        "expectation `{name}` is declared at {}:{line}, which already holds `{existing}`",
        .artifact.display()
    )]
    DuplicateLocation {
        artifact: PathBuf,
        line: usize,
        name: String,
        existing: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an I/O error with the path and the action that failed
    pub fn io(action: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the error came from the file system rather than from the source text
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
