use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::scheduler::SlotRelease;

/// XDG prefix for config and state directories.
pub const APP_PREFIX: &str = "packsync";

/// Global configuration loaded from `~/.config/packsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacksyncConfig {
    /// Number of downloads in flight at once.
    pub concurrency: usize,
    /// Site the catalogue paths are relative to (e.g. "https://www.example.com").
    #[serde(default)]
    pub base_url: Option<String>,
    /// Root of the local library; defaults to `<state dir>/downloads`.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// For `run --direct`: whether a slot frees after initiation ("primary")
    /// or only after the body transfer ("secondary").
    #[serde(default)]
    pub slot_release: SlotRelease,
    /// Extra request headers (e.g. a session cookie obtained by a separate login step).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for PacksyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            base_url: None,
            download_dir: None,
            slot_release: SlotRelease::Primary,
            headers: BTreeMap::new(),
        }
    }
}

impl PacksyncConfig {
    /// Library root: configured `download_dir` or `<state dir>/downloads`.
    pub fn resolved_download_dir(&self) -> Result<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(state_dir()?.join("downloads")),
        }
    }
}

/// `~/.local/state/packsync`.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_PREFIX)?;
    Ok(xdg_dirs.get_state_home().join(APP_PREFIX))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_PREFIX)?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PacksyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PacksyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PacksyncConfig = toml::from_str(&data)?;
    Ok(cfg)
}
