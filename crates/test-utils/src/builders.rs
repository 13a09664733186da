use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use fetchdag::config::{CacheSection, ConfigFile, JoinConfig, RawConfigFile, SourceConfig};
use fetchdag::source::records_from_value;
use fetchdag::types::{JoinKind, Options, Records};

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                declarations: Vec::new(),
                consolidate: true,
                cache: CacheSection::default(),
                options: Options::new(),
                source: BTreeMap::new(),
            },
        }
    }

    pub fn declare(mut self, declaration: &str) -> Self {
        self.config.declarations.push(declaration.to_string());
        self
    }

    pub fn with_source(mut self, name: &str, source: SourceConfig) -> Self {
        self.config.source.insert(name.to_string(), source);
        self
    }

    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.config.options.insert(key.to_string(), value);
        self
    }

    pub fn cache_capacity(mut self, capacity: i64) -> Self {
        self.config.cache.capacity = capacity;
        self
    }

    pub fn consolidate(mut self, val: bool) -> Self {
        self.config.consolidate = val;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SourceConfig`.
pub struct SourceConfigBuilder {
    source: SourceConfig,
}

impl SourceConfigBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            source: SourceConfig {
                path: PathBuf::from(path),
                fields: vec![],
                tag: false,
                join: None,
                cache_capacity: None,
            },
        }
    }

    pub fn field(mut self, field: &str) -> Self {
        self.source.fields.push(field.to_string());
        self
    }

    pub fn tag(mut self, val: bool) -> Self {
        self.source.tag = val;
        self
    }

    pub fn join(mut self, kind: JoinKind, with: Option<&str>, left_key: &str, right_key: &str) -> Self {
        self.source.join = Some(JoinConfig {
            kind,
            with: with.map(str::to_string),
            left_key: left_key.to_string(),
            right_key: right_key.to_string(),
        });
        self
    }

    pub fn cache_capacity(mut self, capacity: i64) -> Self {
        self.source.cache_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> SourceConfig {
        self.source
    }
}

/// Records from a JSON literal (array of objects).
pub fn records(value: Value) -> Records {
    records_from_value(value).expect("test records must be an array of objects")
}

/// Options from a JSON object literal.
pub fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("test options must be a JSON object, got {other}"),
    }
}
