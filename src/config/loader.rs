// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// File name looked up in the working directory when `--config` is omitted.
pub const DEFAULT_CONFIG_FILE: &str = "Fetchdag.toml";

/// Read and deserialize a config file. No semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let raw: RawConfigFile = toml::from_str(&fs::read_to_string(path)?)?;

    debug!(
        path = %path.display(),
        declarations = raw.declarations.len(),
        sources = raw.source.len(),
        "config file read"
    );
    Ok(raw)
}

/// [`load_from_path`] followed by validation: capacities, declaration
/// grammar, acyclicity and join targets.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
