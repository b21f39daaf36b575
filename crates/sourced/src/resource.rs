use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;
use sourced_logging::sourced_warn;

use crate::extract::{Extraction, JsonQuery, QueryCursor};
use crate::filter::LineFilter;
use crate::freshness::parse_max_age;
use crate::paginate::{FetchDescription, NextPage, PageTransform};
use crate::{BoxError, ConfigError, Headers};

/// Produces an artifact locally instead of fetching it.
pub type ComputeFn<A> = Box<dyn Fn() -> Result<A, BoxError> + Send + Sync>;

/// Where an artifact comes from when the cache entry must be regenerated.
pub enum Source<A> {
    Compute(ComputeFn<A>),
    Fetch(FetchDescription<A>),
}

impl<A> fmt::Debug for Source<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Compute(_) => f.write_str("Compute(..)"),
            Source::Fetch(description) => f.debug_tuple("Fetch").field(description).finish(),
        }
    }
}

/// A cache path together with the way to (re)produce its contents.
#[derive(Debug)]
pub struct Resource<A> {
    path: PathBuf,
    source: Source<A>,
    max_age: Option<Duration>,
}

impl<A> Resource<A> {
    pub fn new(path: impl Into<PathBuf>, source: Source<A>) -> Self {
        Self {
            path: path.into(),
            source,
            max_age: None,
        }
    }

    pub fn computed<F, E>(path: impl Into<PathBuf>, compute: F) -> Self
    where
        F: Fn() -> Result<A, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::new(path, Source::Compute(box_compute(compute)))
    }

    pub fn fetched(path: impl Into<PathBuf>, description: FetchDescription<A>) -> Self {
        Self::new(path, Source::Fetch(description))
    }

    /// Regenerate once the cache file is older than `max_age`.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &Source<A> {
        &self.source
    }

    pub fn max_age_limit(&self) -> Option<Duration> {
        self.max_age
    }
}

fn box_compute<A, F, E>(compute: F) -> ComputeFn<A>
where
    F: Fn() -> Result<A, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    Box::new(move || compute().map_err(Into::into))
}

/// Keyword-style construction of a [`Resource`], validated in one place.
///
/// Exactly one of `compute` and `url`/`urls` must be given. Durations, filter
/// patterns, queries and headers are checked by [`ResourceBuilder::build`].
pub struct ResourceBuilder<A> {
    path: PathBuf,
    compute: Option<ComputeFn<A>>,
    urls: Vec<String>,
    headers: Headers,
    max_age: Option<String>,
    next_page: Option<Box<dyn NextPage<A>>>,
    transform: Option<Box<dyn PageTransform<A>>>,
    grep: Option<String>,
    max_pages: Option<usize>,
    error: Option<ConfigError>,
}

impl<A: 'static> ResourceBuilder<A> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compute: None,
            urls: Vec::new(),
            headers: Headers::new(),
            max_age: None,
            next_page: None,
            transform: None,
            grep: None,
            max_pages: None,
            error: None,
        }
    }

    pub fn compute<F, E>(mut self, compute: F) -> Self
    where
        F: Fn() -> Result<A, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.compute = Some(box_compute(compute));
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Free-form duration text, e.g. `"5 seconds"` or `"1 day"`.
    pub fn max_age(mut self, max_age: impl Into<String>) -> Self {
        self.max_age = Some(max_age.into());
        self
    }

    pub fn next_page(mut self, resolver: impl NextPage<A> + 'static) -> Self {
        self.next_page = Some(Box::new(resolver));
        self
    }

    pub fn transform(mut self, transform: impl PageTransform<A> + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Line filter expression; see [`LineFilter::parse`].
    pub fn grep(mut self, expr: impl Into<String>) -> Self {
        self.grep = Some(expr.into());
        self
    }

    pub fn max_pages(mut self, limit: usize) -> Self {
        self.max_pages = Some(limit);
        self
    }

    fn record(&mut self, err: ConfigError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn build(self) -> Result<Resource<A>, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let max_age = self.max_age.as_deref().map(parse_max_age).transpose()?;

        let source = match (self.compute, self.urls.is_empty()) {
            (Some(_), false) => return Err(ConfigError::BothSources),
            (None, true) => return Err(ConfigError::NoSource),
            (Some(compute), true) => {
                if self.next_page.is_some() || self.transform.is_some() || self.grep.is_some() {
                    sourced_warn!(
                        "fetch options on computed resource {:?} are ignored",
                        self.path
                    );
                }
                Source::Compute(compute)
            }
            (None, false) => {
                validate_headers(&self.headers)?;
                let mut description = FetchDescription::urls(self.urls).headers(self.headers);
                if let Some(resolver) = self.next_page {
                    description.set_next_page(resolver);
                }
                if let Some(transform) = self.transform {
                    description.set_transform(transform);
                }
                if let Some(expr) = self.grep.as_deref() {
                    description = description.line_filter(LineFilter::parse(expr)?);
                }
                if let Some(limit) = self.max_pages {
                    if limit == 0 {
                        return Err(ConfigError::ZeroPageLimit);
                    }
                    description = description.max_pages(limit);
                }
                Source::Fetch(description)
            }
        };

        Ok(Resource {
            path: self.path,
            source,
            max_age,
        })
    }
}

impl ResourceBuilder<Value> {
    /// Replace every fetched page with all matches of `query`.
    pub fn find(mut self, query: &str) -> Self {
        match JsonQuery::parse(query) {
            Ok(query) => self.transform = Some(Box::new(Extraction::FindAll(query))),
            Err(err) => self.record(err),
        }
        self
    }

    /// Replace every fetched page with the first match of `query`.
    pub fn pick(mut self, query: &str) -> Self {
        match JsonQuery::parse(query) {
            Ok(query) => self.transform = Some(Box::new(Extraction::FindOne(query))),
            Err(err) => self.record(err),
        }
        self
    }

    /// Follow the URL found at `query` in each page.
    pub fn next_page_query(mut self, query: &str) -> Self {
        match JsonQuery::parse(query) {
            Ok(query) => self.next_page = Some(Box::new(QueryCursor::new(query))),
            Err(err) => self.record(err),
        }
        self
    }
}

fn validate_headers(headers: &Headers) -> Result<(), ConfigError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|err| ConfigError::InvalidHeader {
            name: name.clone(),
            message: err.to_string(),
        })?;
        HeaderValue::from_str(value).map_err(|err| ConfigError::InvalidHeader {
            name: name.clone(),
            message: err.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use serde_json::json;

    use super::*;

    fn compute_value() -> Result<Value, io::Error> {
        Ok(json!([1, 2, 3]))
    }

    #[test]
    fn compute_and_url_together_is_config_error() {
        let err = ResourceBuilder::new("x.json")
            .compute(compute_value)
            .url("https://example.com/x.json")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::BothSources);
    }

    #[test]
    fn neither_compute_nor_url_is_config_error() {
        let err = ResourceBuilder::<Value>::new("x.json").build().unwrap_err();
        assert_eq!(err, ConfigError::NoSource);
    }

    #[test]
    fn bad_duration_is_config_error() {
        let err = ResourceBuilder::new("x.json")
            .compute(compute_value)
            .max_age("eventually")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn bad_query_is_reported_at_build() {
        let err = ResourceBuilder::<Value>::new("x.json")
            .url("https://example.com")
            .find("[*.")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuery { .. }));
    }

    #[test]
    fn bad_header_is_config_error() {
        let err = ResourceBuilder::<Value>::new("x.json")
            .url("https://example.com")
            .header("Bad Header", "v")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeader { .. }));
    }

    #[test]
    fn zero_page_limit_is_config_error() {
        let err = ResourceBuilder::<Value>::new("x.json")
            .url("https://example.com/%p0")
            .max_pages(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroPageLimit);
    }

    #[test]
    fn valid_fetch_builds_description() {
        let resource = ResourceBuilder::<Value>::new("kanji.json")
            .url("https://api.example.com/v2/subjects?types=kanji")
            .header("Authorization", "Bearer token")
            .find("data[*].data.characters")
            .next_page_query("pages.next_url")
            .max_age("1 day")
            .build()
            .unwrap();
        assert_eq!(resource.path(), Path::new("kanji.json"));
        assert_eq!(resource.max_age_limit(), Some(Duration::from_secs(86_400)));
        match resource.source() {
            Source::Fetch(description) => {
                assert_eq!(description.configured_urls().len(), 1);
                assert_eq!(
                    description.configured_headers().get("Authorization"),
                    Some(&"Bearer token".to_string())
                );
            }
            Source::Compute(_) => panic!("expected fetch source"),
        }
    }
}
