//! Process configuration, read once at startup.
//!
//! Values come from an injectable lookup (the process environment in
//! production) and are validated before any component is built.

pub mod service;
pub mod storage;

use std::{fmt::Display, str::FromStr};

use thiserror::Error;

pub use service::{FileLimits, ServerConfig};
pub use storage::{Driver, LocalStoreConfig, RemoteStoreConfig, StorageConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limits: FileLimits,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };

        Ok(Self {
            server: ServerConfig::load(&env)?,
            limits: FileLimits::load(&env)?,
            storage: StorageConfig::load(&env)?,
        })
    }
}

pub(crate) struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvReader<'_> {
    /// Blank values count as unset.
    pub(crate) fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    pub(crate) fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("'{}': {}", raw, e),
            }),
            None => Ok(default),
        }
    }
}
