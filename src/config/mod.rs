//! Service configuration: JSON file plus environment overrides.

use crate::storage::StorageType;
use serde::{Deserialize, Serialize};
use std::{io::Read, path::Path, time::Duration};
use thiserror::Error;

pub const CONFIG_ENV: &str = "SLURPER_CONFIG";
pub const SMTP_ADDR_ENV: &str = "SLURPER_SMTP_ADDR";
pub const SERVICE_ADDR_ENV: &str = "SLURPER_SERVICE_ADDR";
pub const DATABASE_ENV: &str = "SLURPER_DATABASE";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unable to read configuration: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid configuration: {0}")]
  Json(#[from] serde_json::Error),

  #[error("storage engine {0} is not supported by this build")]
  UnsupportedEngine(StorageType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
  pub smtp_address: String,
  pub smtp_port: u16,
  pub service_address: String,
  pub service_port: u16,
  pub db_engine: String,
  pub db_host: String,
  pub db_port: u16,
  pub db_database: String,
  pub db_user_name: String,
  pub db_password: String,
  pub max_workers: usize,
  pub receiver_timeout_secs: u64,
  /// Full database URL; wins over the `db*` fields when set.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub database_url: Option<String>,
  #[serde(skip)]
  smtp_override: Option<String>,
  #[serde(skip)]
  service_override: Option<String>,
}

impl Default for Configuration {
  fn default() -> Self {
    Self {
      smtp_address: "127.0.0.1".into(),
      smtp_port: 2500,
      service_address: "127.0.0.1".into(),
      service_port: 8085,
      db_engine: "sqlite".into(),
      db_host: String::new(),
      db_port: 0,
      db_database: "slurper.db".into(),
      db_user_name: String::new(),
      db_password: String::new(),
      max_workers: 100,
      receiver_timeout_secs: 30,
      database_url: None,
      smtp_override: None,
      service_override: None,
    }
  }
}

impl Configuration {
  pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
    Ok(serde_json::from_reader(reader)?)
  }

  pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let file = std::fs::File::open(path)?;
    Self::from_reader(std::io::BufReader::new(file))
  }

  /// Read `path`, or `SLURPER_CONFIG` when no path is given, or fall back
  /// to defaults; then apply environment overrides.
  pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
    let path = path
      .map(str::to_string)
      .or_else(|| std::env::var(CONFIG_ENV).ok());
    let mut config = match path {
      Some(p) => Self::load_from_file(p)?,
      None => Self::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
  }

  pub fn apply_overrides<F>(&mut self, lookup: F)
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(addr) = lookup(SMTP_ADDR_ENV) {
      self.smtp_override = Some(addr);
    }
    if let Some(addr) = lookup(SERVICE_ADDR_ENV) {
      self.service_override = Some(addr);
    }
    if let Some(url) = lookup(DATABASE_ENV) {
      self.database_url = Some(url);
    }
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let json = serde_json::to_vec_pretty(self)?;
    std::fs::write(path, json)?;
    Ok(())
  }

  pub fn storage_type(&self) -> StorageType {
    StorageType::from_name(&self.db_engine)
  }

  pub fn smtp_binding_address(&self) -> String {
    self
      .smtp_override
      .clone()
      .unwrap_or_else(|| format!("{}:{}", self.smtp_address, self.smtp_port))
  }

  pub fn service_binding_address(&self) -> String {
    self
      .service_override
      .clone()
      .unwrap_or_else(|| format!("{}:{}", self.service_address, self.service_port))
  }

  pub fn receiver_timeout(&self) -> Duration {
    Duration::from_secs(self.receiver_timeout_secs.max(1))
  }

  pub fn database_url(&self) -> Result<String, ConfigError> {
    if let Some(url) = &self.database_url {
      return Ok(url.clone());
    }
    match self.storage_type() {
      StorageType::Sqlite => Ok(format!("sqlite://{}?mode=rwc", self.db_database)),
      StorageType::Mysql => {
        let port = if self.db_port == 0 { 3306 } else { self.db_port };
        let host = if self.db_host.is_empty() {
          "localhost"
        } else {
          self.db_host.as_str()
        };
        let user = urlencoding::encode(&self.db_user_name);
        let password = urlencoding::encode(&self.db_password);
        let credentials = match (user.is_empty(), password.is_empty()) {
          (true, _) => String::new(),
          (false, true) => format!("{user}@"),
          (false, false) => format!("{user}:{password}@"),
        };
        Ok(format!(
          "mysql://{credentials}{host}:{port}/{}",
          self.db_database
        ))
      }
      engine @ StorageType::Mssql => Err(ConfigError::UnsupportedEngine(engine)),
    }
  }
}
