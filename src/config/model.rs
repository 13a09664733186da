// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{JoinKind, Options, SourceName};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// declarations = ["users", "orders(users)"]
/// consolidate = true
///
/// [cache]
/// capacity = 32
///
/// [options]
/// region = "eu"
///
/// [source.users]
/// path = "data/users.json"
/// fields = ["id", "name"]
///
/// [source.orders]
/// path = "data/orders.json"
/// join = { kind = "left", with = "users", left_key = "user_id", right_key = "id" }
/// ```
///
/// Use [`ConfigFile`] (via `TryFrom`) for a validated view.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Source declarations, e.g. `"orders(users)"`.
    #[serde(default)]
    pub declarations: Vec<String>,

    /// Return only the last source's records (`true`) or every source's.
    #[serde(default = "default_consolidate")]
    pub consolidate: bool,

    #[serde(default)]
    pub cache: CacheSection,

    /// Options shared by every source request.
    #[serde(default)]
    pub options: Options,

    /// All sources from `[source.<name>]`.
    #[serde(default)]
    pub source: BTreeMap<SourceName, SourceConfig>,
}

fn default_consolidate() -> bool {
    true
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Per-source request cache capacity. Signed so that a negative value can
    /// be reported instead of failing deserialization.
    #[serde(default = "default_capacity")]
    pub capacity: i64,
}

fn default_capacity() -> i64 {
    32
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// `[source.<name>]` section: a JSON file of records.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// JSON file, relative to the config file's directory.
    pub path: PathBuf,

    /// Fields every record must carry.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Annotate each returned record with `"_source": <name>`.
    #[serde(default)]
    pub tag: bool,

    /// Join these records with one of the source's prerequisites.
    #[serde(default)]
    pub join: Option<JoinConfig>,

    /// Overrides `[cache].capacity` for this source.
    #[serde(default)]
    pub cache_capacity: Option<i64>,
}

/// Inline `join = { ... }` table.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinConfig {
    #[serde(default)]
    pub kind: JoinKind,

    /// Prerequisite to join with; defaults to the first prerequisite.
    #[serde(default)]
    pub with: Option<SourceName>,

    /// Key field in this source's records.
    pub left_key: String,

    /// Key field in the prerequisite's records.
    pub right_key: String,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub declarations: Vec<String>,
    pub consolidate: bool,
    pub cache: CacheSection,
    pub options: Options,
    pub source: BTreeMap<SourceName, SourceConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            declarations: raw.declarations,
            consolidate: raw.consolidate,
            cache: raw.cache,
            options: raw.options,
            source: raw.source,
        }
    }
}

impl SourceConfig {
    /// Effective cache capacity given the `[cache]` default.
    pub fn effective_capacity(&self, default_capacity: i64) -> i64 {
        self.cache_capacity.unwrap_or(default_capacity)
    }
}
