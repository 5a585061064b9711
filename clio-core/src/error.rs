//! Error types for clio

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed index data: {0}")]
    Malformed(String),

    #[error("Out of range: {what} {index} (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: u64,
        limit: u64,
    },

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    pub(crate) fn out_of_range(what: &'static str, index: u64, limit: u64) -> Self {
        Error::OutOfRange { what, index, limit }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
