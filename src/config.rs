//! Optional config file loading. Search order: ./fqmerge.toml, then
//! $XDG_CONFIG_HOME/fqmerge/config.toml (or ~/.config/fqmerge/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; CLI flags override them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// API server base URL.
    pub base_url: Option<String>,
    /// Chapter ids per batch request (clamped to 1..=50).
    pub batch_size: Option<usize>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Directory for the merged TXT when --output is not set.
    pub output_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub token: Option<String>,
    pub device_id: Option<String>,
    pub iid: Option<String>,
    /// Omit chapter title lines.
    pub no_titles: Option<bool>,
}

/// Search order: (1) ./fqmerge.toml, (2) $XDG_CONFIG_HOME/fqmerge/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("fqmerge.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("fqmerge").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            log::debug!("Loaded config from {}", path.display());
            return Ok(Some(config));
        }
    }
    Ok(None)
}
