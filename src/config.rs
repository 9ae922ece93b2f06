use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::access::LoadPolicy;
use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::sync::SyncOptions;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub database: DatabaseConfig,
  pub logging: LoggingConfig,
  pub cache: CacheConfig,
  pub sync: SyncOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  /// SQLite file (defaults to <data_dir>/winkel/winkel.db)
  pub path: Option<PathBuf>,
  /// Milliseconds a statement waits on a locked database
  pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Filter directive used when RUST_LOG is not set
  pub level: String,
  /// Write a daily rolling log file here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".into(),
      directory: None,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// discard or fail
  pub on_load_with_pending: LoadPolicy,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./winkel.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/winkel/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
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
    let local = PathBuf::from("winkel.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("winkel").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn busy_timeout(&self) -> Duration {
    self
      .database
      .busy_timeout_ms
      .map(Duration::from_millis)
      .unwrap_or(DEFAULT_BUSY_TIMEOUT)
  }

  pub fn load_policy(&self) -> LoadPolicy {
    self.cache.on_load_with_pending
  }

  pub fn sync_options(&self) -> SyncOptions {
    self.sync
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_when_sections_missing() {
    let config = Config::from_yaml("database:\n  path: shop.db\n").unwrap();

    assert_eq!(config.database.path, Some(PathBuf::from("shop.db")));
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.load_policy(), LoadPolicy::Discard);
    assert_eq!(config.sync_options(), SyncOptions::default());
    assert_eq!(config.busy_timeout(), DEFAULT_BUSY_TIMEOUT);
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
database:
  path: /tmp/winkel.db
  busy_timeout_ms: 250
logging:
  level: debug
  directory: /tmp/winkel-logs
cache:
  on_load_with_pending: fail
sync:
  check_versions: false
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.busy_timeout(), Duration::from_millis(250));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
      config.logging.directory,
      Some(PathBuf::from("/tmp/winkel-logs"))
    );
    assert_eq!(config.load_policy(), LoadPolicy::FailIfPending);
    assert!(!config.sync_options().check_versions);
    assert!(config.sync_options().stop_on_unavailable);
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::from_yaml("").unwrap();
    assert!(config.database.path.is_none());
  }

  #[test]
  fn test_unknown_policy_is_rejected() {
    assert!(Config::from_yaml("cache:\n  on_load_with_pending: keep\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/winkel.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
