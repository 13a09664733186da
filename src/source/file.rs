// src/source/file.rs

//! JSON-file backed source.

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::config::model::SourceConfig;
use crate::contract::check_contract;
use crate::errors::FetchError;
use crate::join::join;
use crate::source::{FetchResult, SourceAdapter, records_from_value};
use crate::types::{JoinKind, Options, Records, SourceName};

/// Name of the field added to records when tagging is enabled.
pub const SOURCE_TAG_FIELD: &str = "_source";

/// Join resolved against the source's prerequisite list.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub kind: JoinKind,
    /// Position of the joined prerequisite in the source's prior results.
    pub prerequisite: usize,
    pub left_key: String,
    pub right_key: String,
}

/// Reads an array of JSON records from a file.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: SourceName,
    path: PathBuf,
    fields: Vec<String>,
    tag: bool,
    join: Option<JoinPlan>,
}

impl FileSource {
    pub fn new(name: impl Into<SourceName>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            fields: Vec::new(),
            tag: false,
            join: None,
        }
    }

    /// Build from a `[source.<name>]` section. Relative paths are resolved
    /// against `root`; `prerequisites` is the source's declared prerequisite
    /// list, used to locate the join target.
    pub fn from_config(
        name: &str,
        cfg: &SourceConfig,
        root: &Path,
        prerequisites: &[SourceName],
    ) -> crate::errors::Result<Self> {
        let path = if cfg.path.is_absolute() {
            cfg.path.clone()
        } else {
            root.join(&cfg.path)
        };

        let source = Self::new(name, path)
            .with_fields(cfg.fields.clone())
            .with_tag(cfg.tag);

        let Some(j) = &cfg.join else {
            return Ok(source);
        };

        let prerequisite = match &j.with {
            Some(target) => prerequisites.iter().position(|p| p == target),
            None if !prerequisites.is_empty() => Some(0),
            None => None,
        }
        .ok_or_else(|| anyhow!("source '{name}' has no prerequisite to join with"))?;

        Ok(source.with_join(JoinPlan {
            kind: j.kind,
            prerequisite,
            left_key: j.left_key.clone(),
            right_key: j.right_key.clone(),
        }))
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_tag(mut self, tag: bool) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_join(mut self, join: JoinPlan) -> Self {
        self.join = Some(join);
        self
    }
}

impl SourceAdapter for FileSource {
    fn fetch_raw<'a>(
        &'a self,
        _options: &'a Options,
    ) -> BoxFuture<'a, std::result::Result<Value, FetchError>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&self.path)
                .await
                .with_context(|| format!("reading records for '{}' from {:?}", self.name, self.path))?;
            let raw: Value = serde_json::from_str(&text)
                .with_context(|| format!("parsing records for '{}' from {:?}", self.name, self.path))?;
            Ok(raw)
        })
    }

    fn normalize(&self, raw: Value, _options: &Options) -> FetchResult {
        let records = records_from_value(raw)?;
        check_contract(&self.name, &records, &self.fields)?;
        Ok(records)
    }

    fn annotate(&self, records: &mut Records, _options: &Options) {
        if !self.tag {
            return;
        }
        for record in records.iter_mut() {
            record.insert(SOURCE_TAG_FIELD.to_string(), Value::String(self.name.clone()));
        }
    }

    fn post_process(&self, records: Records, _options: &Options, prior: &[Records]) -> FetchResult {
        let Some(plan) = &self.join else {
            return Ok(records);
        };

        let right = prior.get(plan.prerequisite).ok_or_else(|| {
            FetchError::msg(format!(
                "source '{}' expected prerequisite #{} to join with",
                self.name, plan.prerequisite
            ))
        })?;

        Ok(join(plan.kind, &records, right, &plan.left_key, &plan.right_key)?)
    }
}
