use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Couldn't compile pattern: {0}")]
    Regex(#[from] regex::Error),

    /// The output file could not be written. Everything counted in `persisted` is on disk.
    #[error("Sink Error on {}: {source} ({persisted} records were saved before the fault)", .path.display())]
    Sink {
        path: PathBuf,
        persisted: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("TSV is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("TSV line {line} has {found} fields, expected at least {expected}")]
    MalformedRow {
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("TSV line {line} has an invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    /// Records safely on disk when the error was raised, if the error came from the sink.
    pub fn persisted(&self) -> Option<usize> {
        match self {
            Error::Sink { persisted, .. } => Some(*persisted),
            _ => None,
        }
    }
}
