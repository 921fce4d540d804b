// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{EngineError, Result};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "Radargen.toml";

/// Read and deserialize a configuration file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        EngineError::Config(format!("reading config file at {}: {}", path.display(), e))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), rules = config.rule.len(), "config parsed");
    Ok(config)
}

/// Load, validate and compile a configuration file.
///
/// Every problem (bad interval or term, unknown route member, malformed
/// duration, invalid filter) is reported here, before any rule runs.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    ConfigFile::try_from(raw)
}
