//! Crate-wide error type.
//!
//! Low-level file primitives (hashing, walking) keep returning `io::Result`;
//! everything that crosses a command boundary converts into [`Error`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by housekeeper commands.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure tied to a specific path.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O failure without a useful path (stdin, stdout).
    #[error(transparent)]
    Stdio(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the hosted database.
    #[error("remote returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// Input that cannot be processed (bad header, missing source, ...).
    #[error("{0}")]
    Invalid(String),

    /// Missing or malformed configuration.
    #[error("configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
