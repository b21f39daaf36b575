#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use sourced::{
    AcquireEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher, Headers,
    ProgressSink,
};

/// In-memory fetcher serving canned pages and recording every request.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, Result<Vec<u8>, FailureKind>>,
    fallback: Option<Vec<u8>>,
    calls: Mutex<Vec<(String, Headers)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.pages.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn failing(mut self, url: &str, kind: FailureKind) -> Self {
        self.pages.insert(url.to_string(), Err(kind));
        self
    }

    /// Served for any URL without its own page.
    pub fn fallback(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.fallback = Some(body.into());
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn headers_of(&self, index: usize) -> Headers {
        self.calls.lock().unwrap()[index].1.clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &str, headers: &Headers) -> Result<FetchOutput, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));
        let body = match self.pages.get(url) {
            Some(Ok(body)) => body.clone(),
            Some(Err(kind)) => return Err(FetchError::new(url, kind.clone(), "scripted failure")),
            None => match &self.fallback {
                Some(body) => body.clone(),
                None => return Err(FetchError::new(url, FailureKind::HttpStatus(404), "not scripted")),
            },
        };
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                redirect_count: 0,
                content_type: None,
                byte_len: body.len() as u64,
            },
            bytes: body,
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AcquireEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<AcquireEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }

    pub fn regenerations(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| matches!(event, AcquireEvent::Regenerating { .. }))
            .count()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: AcquireEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Push the file's modification time `age` into the past.
pub fn age_file(path: &Path, age: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}
