pub mod ask;
pub mod config_cmd;
pub mod serve;

use std::path::{Path, PathBuf};

use sourcewell_config::AppConfig;

/// The config file in use: `--config` if given, else the default location.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config file with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let file = config_file(path);
    AppConfig::load_with_env(&file)
        .map_err(|e| format!("Failed to load config: {e}").into())
}
