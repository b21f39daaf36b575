//! Sourced: fetch an external resource once, cache it on disk, reuse it thereafter.
mod artifact;
pub mod codec;
mod engine;
mod error;
mod extract;
mod fetch;
mod filter;
mod freshness;
mod paginate;
mod persist;
mod resource;
mod types;

pub use artifact::PageArtifact;
pub use codec::{BinaryCodec, Codec, CsvCodec, IniCodec, JsonCodec, TextCodec, TextEncoding};
pub use engine::ResourceEngine;
pub use error::{AcquireError, BoxError, CodecError, ConfigError, MergeError, NotFoundError};
pub use extract::{Extraction, Extractor, JsonQuery, QueryCursor};
pub use fetch::{FetchSettings, Fetcher, NullSink, ProgressSink, ReqwestFetcher};
pub use filter::{FlipFlop, LineFilter};
pub use freshness::{freshness, is_stale, parse_max_age, Freshness};
pub use paginate::{
    expand_placeholders, has_placeholder, FetchDescription, Fetched, NextPage, PageTransform,
    PaginatedFetcher,
};
pub use persist::{ensure_parent_dir, lock_path, write_atomic, CacheLock, PersistError};
pub use resource::{ComputeFn, Resource, ResourceBuilder, Source};
pub use types::{
    AcquireEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, Headers, StaleReason,
};
