use std::time::Duration;

use super::{ConfigError, EnvReader};

const DEFAULT_BATCH_SIZE: u32 = 100_000;
const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// `None` means permissive CORS.
    pub cors_allowed_origins: Option<Vec<String>>,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub(crate) fn load(env: &EnvReader<'_>) -> Result<Self, ConfigError> {
        let cors_allowed_origins = env.optional("CORS_ALLOWED_ORIGINS").map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });

        let request_timeout = env.parse_or("REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout = env.parse_or("SHUTDOWN_TIMEOUT_SECS", 5u64)?;
        if request_timeout == 0 {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                reason: "must be positive".to_string(),
            });
        }
        if shutdown_timeout == 0 {
            return Err(ConfigError::Invalid {
                key: "SHUTDOWN_TIMEOUT_SECS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            port: env.parse_or("PORT", 8080u16)?,
            cors_allowed_origins,
            request_timeout: Duration::from_secs(request_timeout),
            shutdown_timeout: Duration::from_secs(shutdown_timeout),
        })
    }
}

/// Upload shape bounds enforced by the file service, never by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLimits {
    pub batch_size: u32,
    pub max_file_size: u64,
}

impl Default for FileLimits {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl FileLimits {
    pub(crate) fn load(env: &EnvReader<'_>) -> Result<Self, ConfigError> {
        let limits = Self {
            batch_size: env.parse_or("FILE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            max_file_size: env.parse_or("FILE_MAX_SIZE", DEFAULT_MAX_FILE_SIZE)?,
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "FILE_BATCH_SIZE",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid {
                key: "FILE_MAX_SIZE",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn allows(&self, size: u64) -> bool {
        size <= self.max_file_size
    }
}
