use std::io::Read;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};

use crate::{AcquireEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, Headers};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Default bound on pages per paginated fetch.
    pub max_pages: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 64 * 1024 * 1024,
            max_pages: 1000,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: AcquireEvent);
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn emit(&self, event: AcquireEvent) {
        (**self).emit(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: AcquireEvent) {}
}

/// One blocking GET per call. Implementations do not retry.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, headers: &Headers) -> Result<FetchOutput, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self, url: &str, headers: &Headers) -> Result<FetchOutput, FetchError> {
        (**self).fetch(url, headers)
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn build_client(
        &self,
        url: &str,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(url, FailureKind::Network, err.to_string()))
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch(&self, url: &str, headers: &Headers) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(url, FailureKind::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(url, redirect_counter.clone())?;

        let mut request = client.get(parsed);
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| FetchError::new(url, FailureKind::InvalidHeader, err.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| FetchError::new(url, FailureKind::InvalidHeader, err.to_string()))?;
            request = request.header(name, value);
        }

        let response = request.send().map_err(|err| map_reqwest_error(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                url,
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    url,
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        // Read one byte past the limit to tell "exactly max" from "too large".
        let mut bytes = Vec::new();
        response
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|err| map_read_error(url, err))?;
        if bytes.len() as u64 > max_bytes {
            return Err(FetchError::new(
                url,
                FailureKind::TooLarge {
                    max_bytes,
                    actual: None,
                },
                "response too large",
            ));
        }

        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput { bytes, metadata })
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(url, FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(url, FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(url, FailureKind::Network, err.to_string())
}

fn map_read_error(url: &str, err: std::io::Error) -> FetchError {
    let timed_out = err.kind() == std::io::ErrorKind::TimedOut
        || err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);
    let kind = if timed_out {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    FetchError::new(url, kind, err.to_string())
}
