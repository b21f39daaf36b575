use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Request headers, sent verbatim with every page request.
pub type Headers = BTreeMap<String, String>;

/// Why a cache entry is being (re)generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Missing,
    Expired { age: Duration },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Missing => write!(f, "missing"),
            StaleReason::Expired { age } => write!(f, "expired (age {}s)", age.as_secs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireEvent {
    CacheHit {
        path: PathBuf,
    },
    Regenerating {
        path: PathBuf,
        reason: StaleReason,
    },
    PageFetched {
        index: usize,
        url: String,
        bytes: u64,
    },
    Persisted {
        path: PathBuf,
        bytes: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch of {url} failed: {kind}: {message}")]
pub struct FetchError {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidHeader,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    PageLimitExceeded { limit: usize },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidHeader => write!(f, "invalid header"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::PageLimitExceeded { limit } => {
                write!(f, "page limit of {limit} exceeded")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
