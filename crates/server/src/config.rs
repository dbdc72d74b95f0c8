use anyhow::Result;
use gatekeeper_common::AppConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default location of the configuration file when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/gatekeeper.yaml";

/// Resolved configuration together with the file it came from.
pub struct LoadedConfig {
    pub config: AppConfig,
    pub config_path: PathBuf,
}

impl LoadedConfig {
    pub fn load(path: &str) -> Result<Self> {
        info!(path = path, "loading configuration");
        let config = AppConfig::load(path)?;
        Ok(Self {
            config,
            config_path: PathBuf::from(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Pick the configuration path from the process arguments.
pub fn config_path_from_args<I>(mut args: I) -> String
where
    I: Iterator<Item = String>,
{
    // first item is the program name
    args.nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}
