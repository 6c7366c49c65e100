//! Record-level error types
//!
//! Every variant here describes why a single record was skipped. None of them
//! abort a batch; the harvest driver logs them and moves on.

use std::fmt;
use thiserror::Error;

/// The document source could not produce bytes for a record key
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("status code {status} for {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("no document at {path}")]
    NotFound { path: String },

    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// The document bytes could not be walked into a flat mapping
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("<{tag}> carries none of the attributes {candidates:?}")]
    MissingAttribute {
        tag: &'static str,
        candidates: &'static [&'static str],
    },
}

/// Any reason a record was left out of the table
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("owner sub-tree could not be flattened: {0}")]
    Flatten(String),
}

/// Coarse failure category, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Fetch,
    Parse,
    Flatten,
}

impl RecordError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RecordError::Fetch(_) => FailureKind::Fetch,
            RecordError::Parse(_) => FailureKind::Parse,
            RecordError::Flatten(_) => FailureKind::Flatten,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Fetch => "FetchError",
            FailureKind::Parse => "ParseError",
            FailureKind::Flatten => "FlattenError",
        };
        f.write_str(name)
    }
}
