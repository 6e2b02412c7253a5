//! Runtime configuration, read from a TOML file layered with `SOLAR_`
//! environment variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `SOLAR_FETCH__ATTEMPTS=5`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use solar_ingest::{
  redata::{CAPACITY_URL, GENERATION_URL, RedataConfig},
  retry::RetryPolicy,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  #[serde(default = "default_csv_dir")]
  pub csv_dir:            PathBuf,
  #[serde(default)]
  pub auth_username:      String,
  /// argon2 PHC string; generate with `solar-index hash-password`.
  #[serde(default)]
  pub auth_password_hash: String,
  #[serde(default)]
  pub fetch:              FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  pub attempts:       u32,
  pub backoff_secs:   u64,
  pub timeout_secs:   u64,
  pub generation_url: String,
  pub capacity_url:   String,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      attempts:       3,
      backoff_secs:   5,
      timeout_secs:   30,
      generation_url: GENERATION_URL.to_owned(),
      capacity_url:   CAPACITY_URL.to_owned(),
    }
  }
}

impl FetchConfig {
  pub fn redata(&self) -> RedataConfig {
    RedataConfig {
      generation_url: self.generation_url.clone(),
      capacity_url:   self.capacity_url.clone(),
      timeout:        Duration::from_secs(self.timeout_secs),
      retry:          RetryPolicy {
        attempts:   self.attempts,
        base_delay: Duration::from_secs(self.backoff_secs),
      },
    }
  }
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/solar-index/solar.db") }

fn default_csv_dir() -> PathBuf { PathBuf::from("csv") }

impl ServerConfig {
  /// Read `path` (optional) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("SOLAR")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.csv_dir = expand_tilde(&cfg.csv_dir);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("solar.toml");
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/solar.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.fetch.attempts, 3);
    assert_eq!(cfg.fetch.redata().retry.base_delay, Duration::from_secs(5));
    assert_eq!(cfg.fetch.redata().timeout, Duration::from_secs(30));
    assert_eq!(cfg.fetch.generation_url, GENERATION_URL);
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
      &dir,
      "port = 9000\ncsv_dir = \"/srv/csv\"\nauth_username = \"admin\"\n\n[fetch]\nattempts = 5\n",
    );
    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.csv_dir, PathBuf::from("/srv/csv"));
    assert_eq!(cfg.auth_username, "admin");
    assert_eq!(cfg.fetch.attempts, 5);
    assert_eq!(cfg.fetch.backoff_secs, 5);
  }

  #[test]
  fn tilde_expansion() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
