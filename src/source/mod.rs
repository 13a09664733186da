// src/source/mod.rs

//! Data sources.
//!
//! The scheduler only ever talks to a [`Provider`]. Concrete sources are
//! written as a [`SourceAdapter`], one method per customization hook, and
//! wrapped in a [`MemoizedSource`] which turns them into a provider that
//! deduplicates in-flight requests through its own recency cache.
//!
//! - [`key`] derives cache keys from request options.
//! - [`memo`] implements the memoizing fetch protocol.
//! - [`file`] is a JSON-file backed adapter used by the CLI.

pub mod file;
pub mod key;
pub mod memo;

use anyhow::anyhow;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::errors::{FetchError, FetchdagError};
use crate::types::{Options, Records};

pub use file::FileSource;
pub use memo::MemoizedSource;

/// Result of one source fetch.
pub type FetchResult = std::result::Result<Records, FetchError>;

/// What the scheduler needs from a source.
///
/// `options` is the node's private copy of the shared options and always
/// carries [`crate::types::SOURCE_OPTION_KEY`]. `prior` holds the settled
/// results of the node's prerequisites, in declared order.
pub trait Provider: Send + Sync {
    fn fetch(&self, options: Options, prior: Vec<Records>) -> BoxFuture<'_, FetchResult>;
}

/// Customization hooks of a memoized source.
///
/// Only [`SourceAdapter::fetch_raw`] is mandatory. The memoized part of a
/// request is `fetch_raw` followed by `normalize`; `annotate` and
/// `post_process` run afterwards on every caller's private copy.
pub trait SourceAdapter: Send + Sync + 'static {
    /// Derive the options actually used for the request.
    fn request_options(&self, options: &Options, _prior: &[Records]) -> Options {
        options.clone()
    }

    /// Cache key for a request; `None` bypasses the cache.
    fn cache_key(&self, options: &Options) -> Option<String> {
        Some(key::options_key(options))
    }

    /// Opaque metadata stored next to the cached request.
    fn cache_metadata(&self, _options: &Options) -> Option<Value> {
        None
    }

    /// Whether a cached request described by `metadata` can also answer
    /// `options` (approximate match, e.g. a covering range).
    fn covers(&self, _metadata: &Value, _options: &Options) -> bool {
        false
    }

    /// Perform the actual request.
    fn fetch_raw<'a>(
        &'a self,
        options: &'a Options,
    ) -> BoxFuture<'a, std::result::Result<Value, FetchError>>;

    /// Turn a raw response into records.
    fn normalize(&self, raw: Value, _options: &Options) -> FetchResult {
        records_from_value(raw).map_err(FetchError::from)
    }

    /// In-place annotation of the caller's copy.
    fn annotate(&self, _records: &mut Records, _options: &Options) {}

    /// Final step, free to combine with prerequisite results.
    fn post_process(&self, records: Records, _options: &Options, _prior: &[Records]) -> FetchResult {
        Ok(records)
    }
}

/// Accept either an array of objects or a single object.
pub fn records_from_value(raw: Value) -> crate::errors::Result<Records> {
    match raw {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(FetchdagError::Other(anyhow!(
                    "expected record #{i} to be a JSON object, got {}",
                    json_kind(&other)
                ))),
            })
            .collect(),
        Value::Object(record) => Ok(vec![record]),
        Value::Null => Ok(Vec::new()),
        other => Err(FetchdagError::Other(anyhow!(
            "expected an array of records, got {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
