use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use super::{ConfigError, EnvReader};

pub const DEFAULT_BUCKET: &str = "photos";
/// 255 KiB, the GridFS default.
pub const DEFAULT_CHUNK_SIZE: u32 = 255 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Local,
    Remote,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Local => "local",
            Driver::Remote => "remote",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Driver::Local),
            "remote" | "mongodb" => Ok(Driver::Remote),
            other => Err(format!("unknown driver {}", other)),
        }
    }
}

/// Backend selection, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local(LocalStoreConfig),
    Remote(RemoteStoreConfig),
}

impl StorageConfig {
    pub(crate) fn load(env: &EnvReader<'_>) -> Result<Self, ConfigError> {
        let driver = env.parse_or("FILE_STORE_DRIVER", Driver::Local)?;

        match driver {
            Driver::Local => Ok(StorageConfig::Local(LocalStoreConfig {
                root_path: env
                    .optional("LOCAL_ROOT_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data/files")),
            })),
            Driver::Remote => {
                let mut config = RemoteStoreConfig::new(
                    env.required("MONGODB_URI")?,
                    env.required("MONGODB_DATABASE")?,
                );
                if let Some(bucket) = env.optional("MONGODB_BUCKET") {
                    config.bucket = bucket;
                }
                config.chunk_size = env.parse_or("MONGODB_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
                config.attempt_timeout =
                    Duration::from_secs(env.parse_or("MONGODB_ATTEMPT_TIMEOUT_SECS", 3u64)?);
                config.connect_deadline =
                    Duration::from_secs(env.parse_or("MONGODB_CONNECT_DEADLINE_SECS", 30u64)?);
                config.validate()?;
                Ok(StorageConfig::Remote(config))
            }
        }
    }

    pub fn driver(&self) -> Driver {
        match self {
            StorageConfig::Local(_) => Driver::Local,
            StorageConfig::Remote(_) => Driver::Remote,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub root_path: PathBuf,
}

#[derive(Clone)]
pub struct RemoteStoreConfig {
    pub uri: String,
    pub database: String,
    pub bucket: String,
    pub chunk_size: u32,
    pub attempt_timeout: Duration,
    pub connect_deadline: Duration,
}

impl RemoteStoreConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            attempt_timeout: Duration::from_secs(3),
            connect_deadline: Duration::from_secs(30),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rest = self
            .uri
            .strip_prefix("mongodb://")
            .or_else(|| self.uri.strip_prefix("mongodb+srv://"))
            .ok_or_else(|| ConfigError::Invalid {
                key: "MONGODB_URI",
                reason: "scheme must be mongodb:// or mongodb+srv://".to_string(),
            })?;

        if host_part(rest).is_empty() {
            return Err(ConfigError::Invalid {
                key: "MONGODB_URI",
                reason: "missing host".to_string(),
            });
        }

        if self.database.is_empty() {
            return Err(ConfigError::Missing("MONGODB_DATABASE"));
        }
        if let Some(c) = self
            .database
            .chars()
            .find(|c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$' | '\0'))
        {
            return Err(ConfigError::Invalid {
                key: "MONGODB_DATABASE",
                reason: format!("character {:?} is not allowed", c),
            });
        }

        if self.bucket.is_empty() {
            return Err(ConfigError::Invalid {
                key: "MONGODB_BUCKET",
                reason: "must not be empty".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "MONGODB_CHUNK_SIZE",
                reason: "must be positive".to_string(),
            });
        }
        if self.attempt_timeout.is_zero() || self.connect_deadline.is_zero() {
            return Err(ConfigError::Invalid {
                key: "MONGODB_CONNECT_DEADLINE_SECS",
                reason: "connect timeouts must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Host list of the URI without credentials, for logs.
    pub fn host(&self) -> &str {
        let rest = self
            .uri
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.uri);
        host_part(rest)
    }
}

impl fmt::Debug for RemoteStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStoreConfig")
            .field("host", &self.host())
            .field("database", &self.database)
            .field("bucket", &self.bucket)
            .field("chunk_size", &self.chunk_size)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("connect_deadline", &self.connect_deadline)
            .finish()
    }
}

fn host_part(rest: &str) -> &str {
    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    authority
        .rsplit_once('@')
        .map(|(_, hosts)| hosts)
        .unwrap_or(authority)
}
