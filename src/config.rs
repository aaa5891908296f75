use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Cache bucket version tag used when the config does not name one
pub const DEFAULT_CACHE_VERSION: &str = "grocer-v1";

/// Static assets pre-cached when the offline cache installs
pub const DEFAULT_MANIFEST: &[&str] = &[
  "/",
  "/index.html",
  "/manifest.json",
  "/favicon.ico",
  "/logo192.png",
  "/logo512.png",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub offline: OfflineConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Service root, e.g. "https://grocer.example.com". "/api" is appended.
  pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
  pub enabled: bool,
  /// Name of the cache bucket; bump it to invalidate every cached asset
  pub version: String,
  /// Requests whose path contains this go network-first
  pub api_prefix: String,
  #[serde(deserialize_with = "deserialize_manifest")]
  pub manifest: Vec<String>,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      version: DEFAULT_CACHE_VERSION.to_string(),
      api_prefix: "/api/".to_string(),
      manifest: DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect(),
    }
  }
}

/// Manifest entries are origin-relative; a missing leading slash is added
fn deserialize_manifest<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(
    v.into_iter()
      .map(|p| {
        let p = p.trim();
        if p.starts_with('/') {
          p.to_string()
        } else {
          format!("/{}", p)
        }
      })
      .collect(),
  )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// tracing EnvFilter directive; RUST_LOG takes precedence
  pub level: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./grocer.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/grocer/config.yaml
  ///
  /// Without any file the defaults apply.
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
    let local = PathBuf::from("grocer.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("grocer").join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }
}

/// Directory holding the local databases and logs
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("grocer"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert!(config.api.url.is_none());
    assert!(config.offline.enabled);
    assert_eq!(config.offline.version, DEFAULT_CACHE_VERSION);
    assert_eq!(config.offline.api_prefix, "/api/");
    assert_eq!(config.offline.manifest.len(), DEFAULT_MANIFEST.len());
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_partial_config_keeps_other_defaults() {
    let config = Config::parse(
      r#"
api:
  url: https://grocer.example.com
offline:
  version: grocer-v2
"#,
    )
    .unwrap();

    assert_eq!(config.api.url.as_deref(), Some("https://grocer.example.com"));
    assert_eq!(config.offline.version, "grocer-v2");
    assert!(config.offline.enabled);
    assert_eq!(config.offline.manifest[0], "/");
  }

  #[test]
  fn test_manifest_paths_get_leading_slash() {
    let config = Config::parse(
      r#"
offline:
  manifest:
    - index.html
    - /logo192.png
"#,
    )
    .unwrap();

    assert_eq!(config.offline.manifest, vec!["/index.html", "/logo192.png"]);
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_invalid_yaml_is_an_error() {
    assert!(Config::parse("offline: [not, a, map]").is_err());
  }
}
