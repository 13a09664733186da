// src/errors.rs

//! Crate-wide error types.
//!
//! [`FetchdagError`] covers everything detected before or around a run
//! (declarations, graph shape, configuration). [`FetchError`] is the opaque
//! failure of a single fetch; it is cheap to clone so that one failure can be
//! observed by every dependent task and every caller sharing a memoized
//! in-flight request.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed declaration: {0:?}")]
    ParseError(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("No provider registered for source '{0}'")]
    MissingProvider(String),

    #[error("Invalid cache capacity: {0}")]
    CacheConfig(String),

    #[error("Source '{source_name}' is missing required fields: {missing:?}")]
    ContractViolation {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("Join error: {0}")]
    JoinError(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single fetch, shared between every observer of that fetch.
#[derive(Clone)]
pub struct FetchError(Arc<anyhow::Error>);

impl FetchError {
    /// Build a fetch error from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// The underlying error, including its context chain.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Whether two handles refer to the very same failure.
    pub fn same_failure(&self, other: &FetchError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl fmt::Debug for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl std::error::Error for FetchError {}

impl From<anyhow::Error> for FetchError {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl From<FetchdagError> for FetchError {
    fn from(err: FetchdagError) -> Self {
        match err {
            FetchdagError::Fetch(inner) => inner,
            other => Self(Arc::new(anyhow::Error::new(other))),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FetchdagError>;
