//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::blueprint::MAX_INHERITANCE_DEPTH;

/// Upper bound accepted for `compiler.max_inheritance_depth`
const DEPTH_LIMIT: usize = 64;

/// Blueprint configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub compiler: CompilerConfig,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Maximum number of ancestors an entity type inherits from
    pub max_inheritance_depth: usize,
    /// Per-call store timeout; 0 disables it
    pub store_timeout_secs: u64,
    /// Cache compiled artifacts of published versions
    pub cache_published: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file; defaults to `<config_dir>/blueprint.db`
    pub path: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_inheritance_depth: MAX_INHERITANCE_DEPTH,
            store_timeout_secs: 30,
            cache_published: true,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("BLUEPRINT_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("blueprint")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Database file to open: the configured path or the default location
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("blueprint.db")),
        }
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let depth = self.compiler.max_inheritance_depth;
        if !(1..=DEPTH_LIMIT).contains(&depth) {
            return Err(anyhow!(
                "compiler.max_inheritance_depth must be between 1 and {}, got {}",
                DEPTH_LIMIT,
                depth
            ));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "compiler.max_inheritance_depth" => Ok(self.compiler.max_inheritance_depth.to_string()),
            "compiler.store_timeout_secs" => Ok(self.compiler.store_timeout_secs.to_string()),
            "compiler.cache_published" => Ok(self.compiler.cache_published.to_string()),
            "database.path" => Ok(self.database_path()?.display().to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `blueprint config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "compiler.max_inheritance_depth" => {
                let depth: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_inheritance_depth value: {}", value))?;
                if !(1..=DEPTH_LIMIT).contains(&depth) {
                    return Err(anyhow!(
                        "Inheritance depth must be between 1 and {}",
                        DEPTH_LIMIT
                    ));
                }
                self.compiler.max_inheritance_depth = depth;
            }
            "compiler.store_timeout_secs" => {
                self.compiler.store_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid store_timeout_secs value: {}", value))?;
            }
            "compiler.cache_published" => {
                self.compiler.cache_published = value
                    .parse()
                    .with_context(|| format!("Invalid cache_published value: {}", value))?;
            }
            "database.path" => {
                let trimmed = value.trim();
                self.database.path = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `blueprint config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "compiler.max_inheritance_depth",
            "compiler.store_timeout_secs",
            "compiler.cache_published",
            "database.path",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        Self::reset_at(&Self::config_path()?)
    }

    /// Remove a specific config file
    pub fn reset_at(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
