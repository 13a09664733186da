// src/types.rs

use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Canonical source (node) name type used throughout the crate.
pub type SourceName = String;

/// A single record: a flat-ish JSON object.
pub type Record = Map<String, Value>;

/// The value produced by every source fetch.
pub type Records = Vec<Record>;

/// Request options handed to a source. Always a JSON object.
pub type Options = Map<String, Value>;

/// Field the scheduler inserts into every node's private copy of the shared
/// options, naming the node that is making the request.
pub const SOURCE_OPTION_KEY: &str = "source";

/// Client-side join flavour applied when combining a source with one of its
/// prerequisites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Left,
    Inner,
    FullOuter,
}

impl FromStr for JoinKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "left" => Ok(JoinKind::Left),
            "inner" => Ok(JoinKind::Inner),
            "full_outer" | "outer" => Ok(JoinKind::FullOuter),
            other => Err(format!(
                "invalid join kind: {other} (expected \"left\", \"inner\" or \"full_outer\")"
            )),
        }
    }
}
