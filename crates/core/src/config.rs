use crate::inventory::default_extensions;
use crate::sidecar::{IdentitySource, SidecarMode};
use crate::tool::ToolKind;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Empty drops the category segment from generated names.
    pub category: String,
    pub recursive_default: bool,
    pub backup_default: bool,
    pub sidecars_default: bool,
    pub sidecar_mode_default: SidecarMode,
    pub identity_default: IdentitySource,
    pub extensions: Vec<String>,
    pub tool: ToolKind,
    pub exiftool_path: String,
}

impl AppConfig {
    pub fn category(&self) -> Option<&str> {
        Some(self.category.trim()).filter(|v| !v.is_empty())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            category: "photo".to_string(),
            recursive_default: false,
            backup_default: true,
            sidecars_default: true,
            sidecar_mode_default: SidecarMode::Backup,
            identity_default: IdentitySource::Journal,
            extensions: default_extensions(),
            tool: ToolKind::Auto,
            exiftool_path: "exiftool".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub journal_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "capture-renamer", "capture-renamer")
        .context("could not determine the OS config directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        journal_path: config_dir.join("last-run.json"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

/// Missing file means defaults; missing keys fall back individually.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config_to(config, &paths.config_path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config folder: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;
    Ok(())
}
