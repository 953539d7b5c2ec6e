use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Store location relative to the project root
pub const DEFAULT_STORAGE_SUBDIR: &str = ".idea/frameworkLessonHistory/storage_v3";

/// Expand tilde (~) in path to user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for the framework storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Store directory; defaults to a directory inside the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    /// How far back the history list walks
    #[serde(default = "defaults::history_depth")]
    pub history_depth: usize,
    /// zlib level for stored objects (0-9)
    #[serde(default = "defaults::compression_level")]
    pub compression_level: u32,
    #[serde(default = "defaults::show_conflict_dialog")]
    pub show_conflict_dialog: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            storage_dir: None,
            history_depth: defaults::history_depth(),
            compression_level: defaults::compression_level(),
            show_conflict_dialog: defaults::show_conflict_dialog(),
        }
    }
}

impl StorageConfig {
    /// Load the config file if there is one, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        tracing::debug!("loading framework storage config from {:?}", config_path);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `FRAMEWORK_*` variables looked up via `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("FRAMEWORK_STORAGE_DIR") {
            self.storage_dir = Some(expand_tilde(&PathBuf::from(path)));
        }

        if let Some(depth) = var("FRAMEWORK_HISTORY_DEPTH") {
            self.history_depth = depth
                .parse()
                .context("Failed to parse FRAMEWORK_HISTORY_DEPTH as usize")?;
        }

        if let Some(level) = var("FRAMEWORK_STORAGE_COMPRESSION") {
            self.compression_level = level
                .parse()
                .context("Failed to parse FRAMEWORK_STORAGE_COMPRESSION as u32")?;
        }

        self.validate()
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: StorageConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        if let Some(ref dir) = config.storage_dir {
            config.storage_dir = Some(expand_tilde(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/framework-storage/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    /// Where the store for `project_root` lives
    pub fn storage_path(&self, project_root: &Path) -> PathBuf {
        match &self.storage_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_root.join(dir),
            None => project_root.join(DEFAULT_STORAGE_SUBDIR),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            anyhow::bail!(
                "compression_level must be between 0 and 9, got {}",
                self.compression_level
            );
        }
        Ok(())
    }
}

mod defaults {
    pub(crate) fn history_depth() -> usize {
        crate::storage::DEFAULT_HISTORY_DEPTH
    }

    pub(crate) fn compression_level() -> u32 {
        6
    }

    pub(crate) fn show_conflict_dialog() -> bool {
        true
    }
}
