use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::persist::PersistError;
use crate::FetchError;

/// Error type returned by caller-supplied compute functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("resource has both a compute function and a url")]
    BothSources,
    #[error("resource has neither a compute function nor a url")]
    NoSource,
    #[error("invalid max age {input:?}: {message}")]
    InvalidDuration { input: String, message: String },
    #[error("invalid line filter pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("invalid query {query:?}: {message}")]
    InvalidQuery { query: String, message: String },
    #[error("invalid header {name:?}: {message}")]
    InvalidHeader { name: String, message: String },
    #[error("invalid encoding {label:?}: {message}")]
    InvalidEncoding { label: String, message: String },
    #[error("max pages must be at least 1")]
    ZeroPageLimit,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("query {query:?} matched nothing")]
pub struct NotFoundError {
    pub query: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("cannot append a {page} page to a {artifact} artifact")]
    Incompatible {
        artifact: &'static str,
        page: &'static str,
    },
    #[error("{artifact} artifacts cannot be paginated")]
    Unsupported { artifact: &'static str },
    #[error("line filtering needs a text artifact, got {artifact}")]
    NotText { artifact: &'static str },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{format} encode failed: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
    #[error("{format} decode failed: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },
}

impl CodecError {
    pub(crate) fn encode(format: &'static str, err: impl ToString) -> Self {
        Self::Encode {
            format,
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(format: &'static str, err: impl ToString) -> Self {
        Self::Decode {
            format,
            message: err.to_string(),
        }
    }
}

/// Terminal failure of a single acquisition.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("compute function failed: {0}")]
    Production(#[source] BoxError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("cannot persist cache entry: {0}")]
    Persist(#[from] PersistError),
    #[error("cannot merge pages: {0}")]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("cannot read cache entry {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
