// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod contract;
pub mod dag;
pub mod errors;
pub mod join;
pub mod logging;
pub mod source;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{DagGraph, ProviderMap, Resolved, Scheduler};
use crate::source::{FileSource, MemoizedSource};
use crate::types::Options;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - one memoized file source per `[source.<name>]`
/// - the scheduler
/// - JSON output on stdout
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let cfg = load_and_validate(&config_path)?;
    let scheduler = Scheduler::from_declarations(&cfg.declarations)?;

    if args.dry_run {
        print_dry_run(&cfg, &scheduler);
        return Ok(());
    }

    let options = apply_overrides(cfg.options.clone(), &args.set)?;
    let providers = build_providers(&cfg, scheduler.graph(), &config_root_dir(&config_path))?;
    let consolidate = cfg.consolidate && !args.all;

    info!(sources = providers.len(), consolidate, "starting fetch");
    let resolved = scheduler.run(&options, &providers, consolidate).await?;

    let output = match resolved {
        Resolved::Consolidated(records) => serde_json::to_value(records)?,
        Resolved::All(all) => Value::Array(
            scheduler
                .order()
                .iter()
                .zip(all)
                .map(|(name, records)| json!({ "source": name, "records": records }))
                .collect(),
        ),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// One memoized [`FileSource`] per configured source.
///
/// Sources that are declared but not configured are left out; resolving
/// then fails with a missing-provider error naming them.
pub fn build_providers(cfg: &ConfigFile, graph: &DagGraph, root: &Path) -> Result<ProviderMap> {
    let mut providers = ProviderMap::new();

    for (name, source_cfg) in cfg.source.iter() {
        let adapter = FileSource::from_config(name, source_cfg, root, graph.dependencies_of(name))?;
        let capacity = source_cfg.effective_capacity(cfg.cache.capacity);
        let source = MemoizedSource::try_new(name.clone(), adapter, capacity)?;
        providers.insert(name.clone(), Arc::new(source));
    }

    Ok(providers)
}

/// Apply `KEY=VALUE` overrides to the shared options.
pub fn apply_overrides(mut options: Options, overrides: &[String]) -> Result<Options> {
    for item in overrides {
        let Some((key, raw)) = item.split_once('=') else {
            bail!("invalid --set value {item:?} (expected KEY=VALUE)");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --set value {item:?} (empty key)");
        }
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        options.insert(key.to_string(), value);
    }
    Ok(options)
}

/// Directory that relative source paths are resolved against.
///
/// - A config path with a non-empty parent resolves against that parent.
/// - A bare filename falls back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print the order, prerequisites and files.
fn print_dry_run(cfg: &ConfigFile, scheduler: &Scheduler) {
    println!("fetchdag dry-run");
    println!("  consolidate = {}", cfg.consolidate);
    println!("  cache.capacity = {}", cfg.cache.capacity);
    println!();

    println!("order ({}):", scheduler.order().len());
    for name in scheduler.order() {
        println!("  - {name}");
        let deps = scheduler.graph().dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {:?}", deps);
        }
        match cfg.source.get(name) {
            Some(source) => {
                println!("      path: {}", source.path.display());
                if !source.fields.is_empty() {
                    println!("      fields: {:?}", source.fields);
                }
                if let Some(ref join) = source.join {
                    println!(
                        "      join: {:?} {} = {}",
                        join.kind, join.left_key, join.right_key
                    );
                }
            }
            None => println!("      (no [source.{name}] section)"),
        }
    }

    debug!("dry-run complete (no fetches)");
}
