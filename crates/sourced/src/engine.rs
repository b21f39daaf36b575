use std::fs::{self, File};
use std::path::Path;

use sourced_logging::{sourced_debug, sourced_info};

use crate::artifact::PageArtifact;
use crate::codec::Codec;
use crate::fetch::{FetchSettings, Fetcher, NullSink, ProgressSink, ReqwestFetcher};
use crate::freshness::{freshness, Freshness};
use crate::paginate::{Fetched, PaginatedFetcher};
use crate::persist::{write_atomic, CacheLock};
use crate::resource::{Resource, Source};
use crate::{AcquireError, AcquireEvent, StaleReason};

/// Fetch once, cache locally, reuse thereafter.
///
/// Every acquisition checks the cache file, regenerates it if it is missing or
/// too old, then reads the artifact back from disk.
pub struct ResourceEngine {
    fetcher: Box<dyn Fetcher>,
    sink: Box<dyn ProgressSink>,
    max_pages: usize,
    lock_files: bool,
}

impl Default for ResourceEngine {
    fn default() -> Self {
        Self::new(FetchSettings::default())
    }
}

impl ResourceEngine {
    pub fn new(settings: FetchSettings) -> Self {
        let max_pages = settings.max_pages;
        Self::with_fetcher(ReqwestFetcher::new(settings)).max_pages(max_pages)
    }

    pub fn with_fetcher(fetcher: impl Fetcher + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            sink: Box::new(NullSink),
            max_pages: FetchSettings::default().max_pages,
            lock_files: true,
        }
    }

    pub fn sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Default page bound for paginated fetches.
    pub fn max_pages(mut self, limit: usize) -> Self {
        self.max_pages = limit;
        self
    }

    /// Hold `<cache path>.lock` while checking and regenerating an entry.
    pub fn lock_files(mut self, enabled: bool) -> Self {
        self.lock_files = enabled;
        self
    }

    /// Return the artifact, regenerating the cache file first if needed.
    pub fn acquire<C>(
        &self,
        resource: &Resource<C::Artifact>,
        codec: &C,
    ) -> Result<C::Artifact, AcquireError>
    where
        C: Codec,
        C::Artifact: PageArtifact,
    {
        self.refresh(resource, codec)?;
        let path = resource.path();
        let bytes = fs::read(path).map_err(|source| AcquireError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(codec.deserialize(&bytes)?)
    }

    /// Like [`ResourceEngine::acquire`], but hands the open cache file to
    /// `action` instead of decoding it. The file is closed when `action`
    /// returns, whether it succeeds or not.
    pub fn acquire_with<C, F, R, E>(
        &self,
        resource: &Resource<C::Artifact>,
        codec: &C,
        action: F,
    ) -> Result<R, AcquireError>
    where
        C: Codec,
        C::Artifact: PageArtifact,
        F: FnOnce(&mut File) -> Result<R, E>,
        E: Into<AcquireError>,
    {
        self.refresh(resource, codec)?;
        let path = resource.path();
        let mut file = File::open(path).map_err(|source| AcquireError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        action(&mut file).map_err(Into::into)
    }

    /// Regenerate the cache file if it is stale. Leaves a fresh file alone.
    pub fn refresh<C>(&self, resource: &Resource<C::Artifact>, codec: &C) -> Result<(), AcquireError>
    where
        C: Codec,
        C::Artifact: PageArtifact,
    {
        let path = resource.path();
        let max_age = resource.max_age_limit();
        if freshness(path, max_age) == Freshness::Fresh {
            self.hit(path);
            return Ok(());
        }

        let _lock = if self.lock_files {
            Some(CacheLock::acquire(path)?)
        } else {
            None
        };
        // Re-check under the lock: another writer may have finished meanwhile.
        let reason = match freshness(path, max_age) {
            Freshness::Fresh => {
                self.hit(path);
                return Ok(());
            }
            Freshness::Stale(reason) => reason,
        };
        self.regenerate(resource, codec, reason)
    }

    fn hit(&self, path: &Path) {
        sourced_debug!("cache hit {:?}", path);
        self.sink.emit(AcquireEvent::CacheHit {
            path: path.to_path_buf(),
        });
    }

    fn regenerate<C>(
        &self,
        resource: &Resource<C::Artifact>,
        codec: &C,
        reason: StaleReason,
    ) -> Result<(), AcquireError>
    where
        C: Codec,
        C::Artifact: PageArtifact,
    {
        let path = resource.path();
        sourced_info!("regenerating {:?}: {}", path, reason);
        self.sink.emit(AcquireEvent::Regenerating {
            path: path.to_path_buf(),
            reason,
        });

        let bytes = match resource.source() {
            Source::Compute(compute) => {
                let artifact = compute().map_err(AcquireError::Production)?;
                codec.serialize(&artifact)?
            }
            Source::Fetch(description) => {
                let pages = PaginatedFetcher::new(self.fetcher.as_ref(), self.sink.as_ref(), self.max_pages);
                match pages.run(description, codec)? {
                    Fetched::Raw(bytes) => bytes,
                    Fetched::Assembled(artifact) => codec.serialize(&artifact)?,
                }
            }
        };

        write_atomic(path, &bytes)?;
        sourced_info!("persisted {:?} ({} bytes)", path, bytes.len());
        self.sink.emit(AcquireEvent::Persisted {
            path: path.to_path_buf(),
            bytes: bytes.len() as u64,
        });
        Ok(())
    }
}
