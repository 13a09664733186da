// src/cache/mod.rs

//! Bounded, recency-ordered cache.
//!
//! [`RecencyCache`] keeps entries in a slot arena and threads a doubly
//! linked recency chain through them by index, so promotion, insertion and
//! eviction never need to walk the chain.

pub mod recency;

pub use recency::{CacheEntry, Iter, RecencyCache};
