use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub database: DatabaseConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub query: QueryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
  /// Path to the SQLite database (defaults to the XDG data directory).
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How often the background sweep evicts expired entries.
  #[serde(default = "default_sweep_secs")]
  pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
  /// Trailing window, in months, applied to the unfiltered grouped delivery
  /// view. Hand-tuned performance guard, not business logic.
  #[serde(default = "default_fallback_months")]
  pub fallback_months: u32,
  /// Rows per page across the datasets.
  #[serde(default = "default_page_size")]
  pub page_size: u32,
}

fn default_sweep_secs() -> u64 {
  600
}

fn default_fallback_months() -> u32 {
  3
}

fn default_page_size() -> u32 {
  50
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      sweep_interval_secs: default_sweep_secs(),
    }
  }
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      fallback_months: default_fallback_months(),
      page_size: default_page_size(),
    }
  }
}

impl CacheConfig {
  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./traspo.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/traspo/config.yaml
  ///
  /// A missing file is not an error; every setting has a default.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("traspo.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("traspo").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_apply_to_empty_config() {
    let config: Config = serde_yaml::from_str("{}").unwrap();
    assert_eq!(config.query.fallback_months, 3);
    assert_eq!(config.query.page_size, 50);
    assert_eq!(config.cache.sweep_interval_secs, 600);
    assert!(config.database.path.is_none());
  }

  #[test]
  fn partial_config_keeps_other_defaults() {
    let config: Config = serde_yaml::from_str("query:\n  fallback_months: 6\n").unwrap();
    assert_eq!(config.query.fallback_months, 6);
    assert_eq!(config.query.page_size, 50);
  }
}
