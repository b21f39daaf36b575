use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use sourced_logging::{sourced_debug, sourced_info};

use crate::artifact::PageArtifact;
use crate::codec::Codec;
use crate::fetch::{Fetcher, ProgressSink};
use crate::filter::LineFilter;
use crate::{AcquireError, AcquireEvent, ConfigError, FailureKind, FetchError, Headers};

/// Picks the URL of the page after `page`, if there is one.
pub trait NextPage<A>: Send + Sync {
    fn next_url(&self, page: &A) -> Option<String>;
}

impl<A, F> NextPage<A> for F
where
    F: Fn(&A) -> Option<String> + Send + Sync,
{
    fn next_url(&self, page: &A) -> Option<String> {
        self(page)
    }
}

/// Rewrites each decoded page before it is merged.
pub trait PageTransform<A>: Send + Sync {
    fn apply(&self, page: A) -> Result<A, AcquireError>;
}

impl<A, F> PageTransform<A> for F
where
    F: Fn(A) -> Result<A, AcquireError> + Send + Sync,
{
    fn apply(&self, page: A) -> Result<A, AcquireError> {
        self(page)
    }
}

/// How to fetch a remote artifact.
pub struct FetchDescription<A> {
    urls: Vec<String>,
    headers: Headers,
    next_page: Option<Box<dyn NextPage<A>>>,
    transform: Option<Box<dyn PageTransform<A>>>,
    line_filter: Option<LineFilter>,
    max_pages: Option<usize>,
}

impl<A> fmt::Debug for FetchDescription<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchDescription")
            .field("urls", &self.urls)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("next_page", &self.next_page.is_some())
            .field("transform", &self.transform.is_some())
            .field("line_filter", &self.line_filter)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

impl<A> FetchDescription<A> {
    pub fn url(url: impl Into<String>) -> Self {
        Self::urls([url.into()])
    }

    /// Fetch a fixed sequence of URL templates, in order. Pages are merged in
    /// the order they are fetched.
    pub fn urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            headers: Headers::new(),
            next_page: None,
            transform: None,
            line_filter: None,
            max_pages: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
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

    pub(crate) fn set_next_page(&mut self, resolver: Box<dyn NextPage<A>>) {
        self.next_page = Some(resolver);
    }

    pub(crate) fn set_transform(&mut self, transform: Box<dyn PageTransform<A>>) {
        self.transform = Some(transform);
    }

    pub fn line_filter(mut self, filter: LineFilter) -> Self {
        self.line_filter = Some(filter);
        self
    }

    /// Upper bound on pages for this fetch; overrides the fetcher default.
    pub fn max_pages(mut self, limit: usize) -> Self {
        self.max_pages = Some(limit);
        self
    }

    pub fn configured_urls(&self) -> &[String] {
        &self.urls
    }

    pub fn configured_headers(&self) -> &Headers {
        &self.headers
    }

    /// A lone URL with nothing to decode, follow or rewrite is stored verbatim.
    fn is_single_shot(&self) -> bool {
        self.urls.len() == 1
            && self.next_page.is_none()
            && self.transform.is_none()
            && self.line_filter.is_none()
            && !has_placeholder(&self.urls[0])
    }
}

/// Result of a fetch: either the untouched payload of a single request, or an
/// artifact assembled from decoded pages.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<A> {
    Raw(Vec<u8>),
    Assembled(A),
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"%p(\d+)").expect("static regex"))
}

pub fn has_placeholder(template: &str) -> bool {
    placeholder().is_match(template)
}

/// Replace every `%pN` with `N + counter`.
pub fn expand_placeholders(template: &str, counter: u64) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            // Digits that overflow u64 are left as they were.
            match caps[1].parse::<u64>() {
                Ok(base) => base.saturating_add(counter).to_string(),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Runs a [`FetchDescription`] against a [`Fetcher`], one page at a time.
pub struct PaginatedFetcher<'a> {
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn ProgressSink,
    max_pages: usize,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, sink: &'a dyn ProgressSink, max_pages: usize) -> Self {
        Self {
            fetcher,
            sink,
            max_pages,
        }
    }

    pub fn run<C>(
        &self,
        description: &FetchDescription<C::Artifact>,
        codec: &C,
    ) -> Result<Fetched<C::Artifact>, AcquireError>
    where
        C: Codec,
        C::Artifact: PageArtifact,
    {
        if description.is_single_shot() {
            let url = &description.urls[0];
            let output = self.fetcher.fetch(url, &description.headers)?;
            self.sink.emit(AcquireEvent::PageFetched {
                index: 0,
                url: url.clone(),
                bytes: output.metadata.byte_len,
            });
            return Ok(Fetched::Raw(output.bytes));
        }

        let limit = description.max_pages.unwrap_or(self.max_pages);
        let mut queue: VecDeque<String> = description.urls.iter().cloned().collect();
        let mut counters: HashMap<String, u64> = HashMap::new();
        let mut artifact: Option<C::Artifact> = None;
        let mut fetched = 0usize;

        while let Some(template) = queue.pop_front() {
            if fetched == limit {
                return Err(FetchError::new(
                    template,
                    FailureKind::PageLimitExceeded { limit },
                    "pagination did not terminate",
                )
                .into());
            }

            let paginated = has_placeholder(&template);
            let counter = counters.get(&template).copied().unwrap_or(0);
            let url = if paginated {
                expand_placeholders(&template, counter)
            } else {
                template.clone()
            };

            let output = self.fetcher.fetch(&url, &description.headers)?;
            sourced_debug!("fetched page {} from {} ({} bytes)", fetched, url, output.bytes.len());
            self.sink.emit(AcquireEvent::PageFetched {
                index: fetched,
                url: url.clone(),
                bytes: output.metadata.byte_len,
            });
            fetched += 1;

            let page = codec.deserialize(&output.bytes)?;

            if paginated && !page.is_empty_page() {
                counters.insert(template.clone(), counter + 1);
                queue.push_back(template);
            }
            if let Some(resolver) = &description.next_page {
                if let Some(next) = resolver.next_url(&page) {
                    queue.push_back(next);
                }
            }

            let page = match &description.transform {
                Some(transform) => transform.apply(page)?,
                None => page,
            };
            match artifact.as_mut() {
                None => artifact = Some(page),
                Some(merged) => merged.append(page)?,
            }
        }

        let Some(mut merged) = artifact else {
            return Err(ConfigError::NoSource.into());
        };
        if let Some(filter) = &description.line_filter {
            merged = merged.map_text(|text| filter.apply(text))?;
        }
        sourced_info!("assembled artifact from {} page(s)", fetched);
        Ok(Fetched::Assembled(merged))
    }
}
