use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use futures::future::BoxFuture;
use serde_json::Value;
use fetchdag::errors::FetchError;
use fetchdag::source::{FetchResult, Provider, SourceAdapter};
use fetchdag::types::{Options, Records};

/// Shared, ordered log of `start:<name>` / `end:<name>` events.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the first occurrence of `event`; panics if absent.
    pub fn position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event {event:?} not logged; log = {:?}", self.events()))
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }
}

/// A fake [`SourceAdapter`] that:
/// - counts `fetch_raw` invocations
/// - optionally sleeps to keep a request in flight
/// - fails its first `n` requests when asked to
/// - returns a fixed set of records otherwise.
///
/// Clones share counters, so a test can keep a handle after moving the
/// adapter into a `MemoizedSource`.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    name: String,
    records: Records,
    delay: Option<Duration>,
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Options>>>,
    log: EventLog,
    uncached: bool,
}

impl FakeSource {
    pub fn new(name: &str, records: Records) -> Self {
        Self {
            name: name.to_string(),
            records,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` requests.
    pub fn failing(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Make every request bypass the cache.
    pub fn uncached(mut self) -> Self {
        self.uncached = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_options(&self) -> Vec<Options> {
        self.seen.lock().unwrap().clone()
    }
}

impl SourceAdapter for FakeSource {
    fn cache_key(&self, options: &Options) -> Option<String> {
        if self.uncached {
            None
        } else {
            Some(fetchdag::source::key::options_key(options))
        }
    }

    fn fetch_raw<'a>(
        &'a self,
        options: &'a Options,
    ) -> BoxFuture<'a, std::result::Result<Value, FetchError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(options.clone());
            self.log.push(format!("start:{}", self.name));

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            self.log.push(format!("end:{}", self.name));

            if fail {
                return Err(anyhow!("{} unavailable", self.name).into());
            }
            Ok(Value::Array(
                self.records.iter().cloned().map(Value::Object).collect(),
            ))
        })
    }
}

/// A bare [`Provider`] (no cache) that records what the scheduler hands it.
#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    name: String,
    records: Records,
    delay: Option<Duration>,
    fail: bool,
    log: EventLog,
    calls: Arc<AtomicUsize>,
    seen_options: Arc<Mutex<Vec<Options>>>,
    seen_prior: Arc<Mutex<Vec<Vec<Records>>>>,
}

impl RecordingProvider {
    pub fn new(name: &str, records: Records, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            records,
            log,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_options(&self) -> Vec<Options> {
        self.seen_options.lock().unwrap().clone()
    }

    pub fn seen_prior(&self) -> Vec<Vec<Records>> {
        self.seen_prior.lock().unwrap().clone()
    }
}

impl Provider for RecordingProvider {
    fn fetch(&self, mut options: Options, prior: Vec<Records>) -> BoxFuture<'_, FetchResult> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_options.lock().unwrap().push(options.clone());
            self.seen_prior.lock().unwrap().push(prior);
            self.log.push(format!("start:{}", self.name));

            // Scribble on our copy; siblings must never see this.
            options.insert("scribbled_by".to_string(), Value::String(self.name.clone()));

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.log.push(format!("end:{}", self.name));

            if self.fail {
                return Err(anyhow!("{} exploded", self.name).into());
            }
            Ok(self.records.clone())
        })
    }
}
