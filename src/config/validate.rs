// src/config/validate.rs

use crate::cache::RecencyCache;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::{DagGraph, Scheduler};
use crate::errors::{FetchdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FetchdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_cache(cfg)?;
    let graph = DagGraph::from_strs(&cfg.declarations)?;
    validate_sources(cfg, &graph)?;
    // Fails on cycles.
    Scheduler::from_graph(graph)?;
    Ok(())
}

fn validate_cache(cfg: &RawConfigFile) -> Result<()> {
    RecencyCache::<String, ()>::try_new(cfg.cache.capacity)?;

    for (name, source) in cfg.source.iter() {
        if let Some(capacity) = source.cache_capacity {
            RecencyCache::<String, ()>::try_new(capacity).map_err(|_| {
                FetchdagError::CacheConfig(format!(
                    "source '{name}' has a negative cache_capacity ({capacity})"
                ))
            })?;
        }
    }
    Ok(())
}

fn validate_sources(cfg: &RawConfigFile, graph: &DagGraph) -> Result<()> {
    for (name, source) in cfg.source.iter() {
        if source.path.as_os_str().is_empty() {
            return Err(FetchdagError::ConfigError(format!(
                "source '{name}' has an empty `path`"
            )));
        }

        let Some(join) = &source.join else {
            continue;
        };

        let prerequisites = graph.dependencies_of(name);
        match &join.with {
            Some(target) if !prerequisites.contains(target) => {
                return Err(FetchdagError::ConfigError(format!(
                    "source '{name}' joins with '{target}', which is not one of its prerequisites"
                )));
            }
            None if prerequisites.is_empty() => {
                return Err(FetchdagError::ConfigError(format!(
                    "source '{name}' has a `join` but no prerequisites to join with"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
