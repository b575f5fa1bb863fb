//! Error taxonomy shared by every stage of the partition/compress/store pipeline.
//!
//! Validation errors (`InputNotFound`, `ColumnNotFound`, `MalformedIdentifier`,
//! `MalformedQueryField`, `InvalidNamespace`, `ConnectionTimeout`,
//! `EmptyQueryResult`) are raised before any worker starts. Errors raised by a
//! worker (`CodecError`, `Store`) abort the run; groups already written stay
//! written.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("attribute '{0}' not found in header row")]
    ColumnNotFound(String),

    #[error("column '{0}' appears more than once in header row")]
    DuplicateColumn(String),

    #[error("malformed identifier '{value}': {reason}")]
    MalformedIdentifier { value: String, reason: String },

    #[error("malformed query field '{0}': expected NAME=VALUE")]
    MalformedQueryField(String),

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("{algorithm} codec error: {message}")]
    CodecError { algorithm: String, message: String },

    #[error("could not reach store at '{endpoint}' within {timeout:?}")]
    ConnectionTimeout { endpoint: String, timeout: Duration },

    #[error("query {0} matched no stored groups")]
    EmptyQueryResult(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("worker failure: {0}")]
    Worker(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn malformed(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedIdentifier {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn codec(algorithm: impl ToString, message: impl ToString) -> Self {
        Error::CodecError {
            algorithm: algorithm.to_string(),
            message: message.to_string(),
        }
    }

    /// True for errors detected before any parallel work starts.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InputNotFound(_)
                | Error::ColumnNotFound(_)
                | Error::DuplicateColumn(_)
                | Error::MalformedIdentifier { .. }
                | Error::MalformedQueryField(_)
                | Error::InvalidNamespace(_)
                | Error::ConnectionTimeout { .. }
                | Error::EmptyQueryResult(_)
                | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
