//! Connection establishment with retry.
//!
//! A single `PgConnection` per process, no pool. The supervisor keeps
//! retrying under its `RetryPolicy`; with the default policy it only
//! returns once the database accepts the connection. Each attempt is capped
//! at the attempt timeout, so an address that never answers still fails on
//! the retry cadence.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use seedpoll_core::{ConnectionConfig, RetryPolicy, DEFAULT_CONNECT_TIMEOUT};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::ConnectOptions;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::store::BookStore;

/// Opens one session per call.
#[async_trait]
pub trait Connector: Send + Sync {
    type Store: BookStore;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Store, sqlx::Error>;
}

/// Connects over the PostgreSQL wire protocol via sqlx.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl PgConnector {
    pub fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Store = PgConnection;

    async fn connect(&self, config: &ConnectionConfig) -> Result<PgConnection, sqlx::Error> {
        Self::connect_options(config).connect().await
    }
}

/// Retries `Connector::connect` until it succeeds or the policy gives up.
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ConnectionSupervisor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    async fn attempt<C: Connector>(
        &self,
        connector: &C,
        config: &ConnectionConfig,
    ) -> Result<C::Store, sqlx::Error> {
        match tokio::time::timeout(self.attempt_timeout, connector.connect(config)).await {
            Ok(connected) => connected,
            Err(_) => Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "no answer from {}:{} within {:?}",
                    config.host, config.port, self.attempt_timeout
                ),
            ))),
        }
    }

    /// Connect, sleeping the policy's backoff after each failure.
    ///
    /// Every connection error is treated as retryable. Only a bounded
    /// policy can make this return an error.
    pub async fn connect<C: Connector>(
        &self,
        connector: &C,
        config: &ConnectionConfig,
    ) -> DbResult<C::Store> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.attempt(connector, config).await {
                Ok(store) => {
                    info!(
                        host = %config.host,
                        port = config.port,
                        user = %config.user,
                        database = %config.database,
                        attempt,
                        "Connected to PostgreSQL"
                    );
                    return Ok(store);
                }
                Err(err) if self.policy.allows_retry(attempt) => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        error = %err,
                        attempt,
                        retry_in_secs = delay.as_secs_f64(),
                        "Error while connecting to PostgreSQL, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(DbError::RetriesExhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_follow_config() {
        let mut config = ConnectionConfig::new("db.internal");
        config.port = 6543;
        config.database = "library".to_string();

        let options = PgConnector::connect_options(&config);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "postgresuser");
        assert_eq!(options.get_database(), Some("library"));
    }

    #[test]
    fn default_supervisor_never_gives_up() {
        let supervisor = ConnectionSupervisor::default();
        assert_eq!(supervisor.policy().max_attempts, None);
        assert_eq!(supervisor.attempt_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn connects_to_live_database() {
        let host = std::env::var("POSTGRES_LOCATION").expect("POSTGRES_LOCATION required");
        let supervisor = ConnectionSupervisor::default();
        let mut conn = supervisor
            .connect(&PgConnector, &ConnectionConfig::new(host))
            .await
            .expect("connection failed");

        let version = conn.server_version().await.expect("version query failed");
        assert!(version.starts_with("PostgreSQL"));
        conn.close().await.expect("close failed");
    }
}
