use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Listing shown at startup
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
  #[default]
  People,
  Planets,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub default_resource: Resource,
  /// Custom title for the header
  pub title: Option<String>,
  /// Keep table preferences in the on-disk store
  pub persist: bool,
  pub tick_rate_ms: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      default_resource: Resource::default(),
      title: None,
      persist: true,
      tick_rate_ms: 250,
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub user_agent: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://swapi.info/api/".to_string(),
      user_agent: concat!("holocron/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./holocron.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/holocron/config.yaml
  /// 4. Built-in defaults
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
    let local = PathBuf::from("holocron.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("holocron").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not to an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn tick_rate(&self) -> Duration {
    Duration::from_millis(self.tick_rate_ms.max(16))
  }

  pub fn title(&self) -> &str {
    self.title.as_deref().unwrap_or("holocron")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "https://swapi.info/api/");
    assert!(config.api.user_agent.starts_with("holocron/"));
    assert_eq!(config.default_resource, Resource::People);
    assert!(config.persist);
    assert_eq!(config.tick_rate(), Duration::from_millis(250));
    assert_eq!(config.title(), "holocron");
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      "default_resource: planets\ntitle: Archives\napi:\n  base_url: http://localhost:8080/api\n",
    )
    .unwrap();
    assert_eq!(config.default_resource, Resource::Planets);
    assert_eq!(config.title(), "Archives");
    assert_eq!(config.api.base_url, "http://localhost:8080/api");
    assert!(config.api.user_agent.starts_with("holocron/"));
    assert!(config.persist);
  }

  #[test]
  fn test_empty_file_is_default() {
    assert_eq!(Config::parse("").unwrap(), Config::default());
    assert_eq!(Config::parse("  \n").unwrap(), Config::default());
  }

  #[test]
  fn test_unknown_resource_rejected() {
    assert!(Config::parse("default_resource: starships\n").is_err());
  }

  #[test]
  fn test_tick_rate_floor() {
    let config = Config::parse("tick_rate_ms: 0\n").unwrap();
    assert_eq!(config.tick_rate(), Duration::from_millis(16));
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "persist: false").unwrap();
    let config = Config::load(Some(file.path())).unwrap();
    assert!(!config.persist);

    let missing = file.path().with_extension("missing");
    let err = Config::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().starts_with("Config file not found"));
  }
}
