use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::retry::{Backoff, RetryPolicy, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_DELAY};

/// Environment variable holding the database host address (required)
pub const HOST_ENV: &str = "POSTGRES_LOCATION";
pub const PORT_ENV: &str = "POSTGRES_PORT";
pub const USER_ENV: &str = "POSTGRES_USER";
pub const PASSWORD_ENV: &str = "POSTGRES_PASSWORD";
pub const DATABASE_ENV: &str = "POSTGRES_DB";

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_USER: &str = "postgresuser";
pub const DEFAULT_PASSWORD: &str = "postgrespassword";
pub const DEFAULT_DATABASE: &str = "postgresdb";

/// Default pause between polling passes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where and as whom to connect.
///
/// Built once at startup and handed to whatever needs it; nothing below
/// `main` reads the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionConfig {
    /// Config for `host` with the default port and credentials.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Read the config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// `POSTGRES_LOCATION` is required; port, user, password and database
    /// fall back to the defaults when unset or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = present(HOST_ENV).ok_or_else(|| ConfigError::missing_env(HOST_ENV))?;
        let mut config = Self::new(host.trim());

        if let Some(port) = present(PORT_ENV) {
            config.port = port
                .trim()
                .parse()
                .map_err(|err| ConfigError::invalid_value(PORT_ENV, format!("{}: {}", port, err)))?;
        }
        if let Some(user) = present(USER_ENV) {
            config.user = user;
        }
        if let Some(password) = lookup(PASSWORD_ENV).filter(|value| !value.is_empty()) {
            config.password = password;
        }
        if let Some(database) = present(DATABASE_ENV) {
            config.database = database;
        }

        Ok(config)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Optional tuning loaded from a TOML settings file
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSettings {
    pub retry: RetrySettings,
    pub poll: PollSettings,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    #[default]
    Constant,
    Exponential,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub strategy: RetryStrategy,
    pub delay_secs: u64,
    /// Upper bound for exponential backoff
    pub max_delay_secs: u64,
    /// Omit for unlimited attempts
    pub max_attempts: Option<u32>,
    /// Give up on a single attempt that has not completed by then
    pub connect_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Constant,
            delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            max_delay_secs: 60,
            max_attempts: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

impl WatchSettings {
    /// Load settings from `path`, or defaults when no path is given.
    ///
    /// An explicitly given path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would spin without pausing.
    pub fn validate(&self) -> Result<()> {
        if self.retry.delay_secs == 0 {
            return Err(ConfigError::invalid_value("retry.delay_secs", "must be at least 1"));
        }
        if self.retry.strategy == RetryStrategy::Exponential
            && self.retry.max_delay_secs < self.retry.delay_secs
        {
            return Err(ConfigError::invalid_value(
                "retry.max_delay_secs",
                "must not be smaller than retry.delay_secs",
            ));
        }
        if self.retry.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "retry.connect_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigError::invalid_value("retry.max_attempts", "must be at least 1"));
        }
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::invalid_value("poll.interval_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_secs(self.retry.delay_secs);
        let backoff = match self.retry.strategy {
            RetryStrategy::Constant => Backoff::Constant(delay),
            RetryStrategy::Exponential => Backoff::Exponential {
                initial: delay,
                max: Duration::from_secs(self.retry.max_delay_secs),
            },
        };
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.retry.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }
}
