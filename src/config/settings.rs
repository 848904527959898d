//! Process settings from environment (after `.env`, if present).

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where model tables live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::InvalidSetting {
                key: "STORAGE_BACKEND",
                message: format!("{} (expected postgres or memory)", s),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub backend: StorageBackend,
    /// PostgreSQL schema holding model tables. Must be a valid identifier.
    pub schema: String,
    pub models_dir: PathBuf,
    /// Upper bound on every Table Store and File Store call.
    pub storage_timeout: Duration,
    pub bind_addr: String,
    pub max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/blueprint".into(),
            backend: StorageBackend::Postgres,
            schema: "public".into(),
            models_dir: PathBuf::from("models"),
            storage_timeout: Duration::from_millis(5000),
            bind_addr: "127.0.0.1:3000".into(),
            max_connections: 5,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Settings::default();
        if let Some(v) = lookup("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = lookup("STORAGE_BACKEND") {
            s.backend = v.parse()?;
        }
        if let Some(v) = lookup("BLUEPRINT_SCHEMA") {
            s.schema = v;
        }
        if let Some(v) = lookup("MODELS_DIR") {
            s.models_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("STORAGE_TIMEOUT_MS") {
            let ms: u64 = parse_number("STORAGE_TIMEOUT_MS", &v)?;
            if ms == 0 {
                return Err(ConfigError::InvalidSetting {
                    key: "STORAGE_TIMEOUT_MS",
                    message: "must be greater than zero".into(),
                });
            }
            s.storage_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("BIND_ADDR") {
            s.bind_addr = v;
        }
        if let Some(v) = lookup("MAX_CONNECTIONS") {
            s.max_connections = parse_number("MAX_CONNECTIONS", &v)?;
        }
        Ok(s)
    }
}

fn parse_number<T: FromStr>(key: &'static str, v: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    v.trim().parse().map_err(|e: T::Err| ConfigError::InvalidSetting {
        key,
        message: format!("{}: {}", v, e),
    })
}
