pub mod chat;
pub mod config_cmd;
pub mod onboard;
pub mod serve;

use anyhow::Context;
use fbot_config::AppConfig;
use std::path::{Path, PathBuf};

/// `--config` if given, else `~/.fbot/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config file with environment overrides applied.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}
