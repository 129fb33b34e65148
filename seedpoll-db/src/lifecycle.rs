//! Lifecycle controller
//!
//! Drives `Start -> Connecting -> Bootstrapping -> Polling`, ending in
//! `Error` or `Cancelled` and then `Closed`. The shutdown future is raced
//! against every phase, so cancellation can arrive in any state. Whatever
//! the exit path, the connection (if one was opened) is released exactly
//! once on the way into `Closed`.

use std::fmt;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::time::Duration;

use seedpoll_core::{ConnectionConfig, RetryPolicy};
use tracing::{debug, error, info, warn};

use crate::bootstrap::SchemaBootstrapper;
use crate::connect::{ConnectionSupervisor, Connector};
use crate::error::DbError;
use crate::poller::PollingReporter;
use crate::store::BookStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Start,
    Connecting,
    Bootstrapping,
    Polling,
    Error,
    Cancelled,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Start => "start",
            LifecycleState::Connecting => "connecting",
            LifecycleState::Bootstrapping => "bootstrapping",
            LifecycleState::Polling => "polling",
            LifecycleState::Error => "error",
            LifecycleState::Cancelled => "cancelled",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Owns the connection for the lifetime of a session.
///
/// Empty until a connection is opened. `release` closes it at most once;
/// if the guard is dropped while still holding one (the session future was
/// dropped mid-flight) the connection is dropped without a graceful close.
pub struct ConnectionGuard<S: BookStore> {
    store: Option<S>,
}

impl<S: BookStore> ConnectionGuard<S> {
    pub fn empty() -> Self {
        Self { store: None }
    }

    /// Take ownership of a freshly opened connection.
    pub fn open(&mut self, store: S) -> &mut S {
        self.store.insert(store)
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    /// Close the held connection. Returns whether anything was released.
    pub async fn release(&mut self) -> bool {
        let Some(store) = self.store.take() else {
            debug!("No connection to release");
            return false;
        };

        match store.close().await {
            Ok(()) => info!("PostgreSQL connection is closed"),
            Err(err) => warn!(error = %err, "PostgreSQL connection closed with error"),
        }
        true
    }
}

impl<S: BookStore> Default for ConnectionGuard<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: BookStore> Drop for ConnectionGuard<S> {
    fn drop(&mut self) {
        if self.store.is_some() {
            warn!("PostgreSQL connection dropped without a graceful close");
        }
    }
}

/// How a session ended
#[derive(Debug)]
pub enum SessionExit {
    Cancelled,
    Failed(DbError),
}

/// What happened during `Lifecycle::run`
#[derive(Debug)]
pub struct SessionReport {
    /// Every state entered, in order, starting with `Start`
    pub history: Vec<LifecycleState>,
    pub exit: SessionExit,
    /// Whether a connection was open and got released
    pub released: bool,
}

impl SessionReport {
    pub fn final_state(&self) -> LifecycleState {
        self.history
            .last()
            .copied()
            .unwrap_or(LifecycleState::Start)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.exit, SessionExit::Cancelled)
    }

    /// Cancellation is a clean exit; a failure is returned as the error.
    pub fn into_result(self) -> Result<(), DbError> {
        match self.exit {
            SessionExit::Cancelled => Ok(()),
            SessionExit::Failed(err) => Err(err),
        }
    }
}

/// Wires supervisor, bootstrapper and reporter into one session.
pub struct Lifecycle<C: Connector> {
    connector: C,
    config: ConnectionConfig,
    supervisor: ConnectionSupervisor,
    bootstrapper: SchemaBootstrapper,
    reporter: PollingReporter,
    history: Vec<LifecycleState>,
}

impl<C: Connector> Lifecycle<C> {
    pub fn new(connector: C, config: ConnectionConfig) -> Self {
        Self {
            connector,
            config,
            supervisor: ConnectionSupervisor::default(),
            bootstrapper: SchemaBootstrapper::new(),
            reporter: PollingReporter::default(),
            history: vec![LifecycleState::Start],
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        let timeout = self.supervisor.attempt_timeout();
        self.supervisor = ConnectionSupervisor::new(policy).with_attempt_timeout(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.supervisor = self.supervisor.with_attempt_timeout(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.reporter = PollingReporter::new(interval);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.history
            .last()
            .copied()
            .unwrap_or(LifecycleState::Start)
    }

    /// Run the session until it fails or `shutdown` resolves.
    pub async fn run<W, F>(mut self, mut out: W, shutdown: F) -> SessionReport
    where
        W: Write,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut guard = ConnectionGuard::empty();

        let exit = self.drive(&mut guard, &mut out, shutdown.as_mut()).await;

        match &exit {
            SessionExit::Cancelled => {
                info!(state = %self.state(), "Shutdown requested");
                self.transition(LifecycleState::Cancelled);
            }
            SessionExit::Failed(err) => {
                error!(error = %err, state = %self.state(), "Error while talking to PostgreSQL");
                self.transition(LifecycleState::Error);
            }
        }

        let released = guard.release().await;
        self.transition(LifecycleState::Closed);

        SessionReport {
            history: self.history,
            exit,
            released,
        }
    }

    async fn drive<W, F>(
        &mut self,
        guard: &mut ConnectionGuard<C::Store>,
        out: &mut W,
        mut shutdown: Pin<&mut F>,
    ) -> SessionExit
    where
        W: Write,
        F: Future<Output = ()>,
    {
        self.transition(LifecycleState::Connecting);
        info!(host = %self.config.host, port = self.config.port, "Connecting to PostgreSQL");

        let connected = tokio::select! {
            connected = self.supervisor.connect(&self.connector, &self.config) => connected,
            () = &mut shutdown => return SessionExit::Cancelled,
        };
        let store = match connected {
            Ok(store) => guard.open(store),
            Err(err) => return SessionExit::Failed(err),
        };

        self.transition(LifecycleState::Bootstrapping);
        let bootstrapped = tokio::select! {
            bootstrapped = bootstrap(&self.bootstrapper, store) => bootstrapped,
            () = &mut shutdown => return SessionExit::Cancelled,
        };
        if let Err(err) = bootstrapped {
            return SessionExit::Failed(err);
        }

        self.transition(LifecycleState::Polling);
        tokio::select! {
            polled = self.reporter.poll_forever(store, out) => match polled {
                Err(err) => SessionExit::Failed(err),
                Ok(never) => match never {},
            },
            () = &mut shutdown => SessionExit::Cancelled,
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!(from = %self.state(), to = %next, "Lifecycle transition");
        self.history.push(next);
    }
}

async fn bootstrap<S: BookStore>(
    bootstrapper: &SchemaBootstrapper,
    store: &mut S,
) -> Result<(), DbError> {
    let version = store.server_version().await.map_err(DbError::Schema)?;
    info!(version = %version, "You are connected to PostgreSQL");

    bootstrapper.ensure_schema(store).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(LifecycleState::Bootstrapping.to_string(), "bootstrapping");
        assert_eq!(LifecycleState::Closed.to_string(), "closed");
    }

    #[test]
    fn report_final_state_and_result() {
        let report = SessionReport {
            history: vec![
                LifecycleState::Start,
                LifecycleState::Connecting,
                LifecycleState::Cancelled,
                LifecycleState::Closed,
            ],
            exit: SessionExit::Cancelled,
            released: false,
        };
        assert_eq!(report.final_state(), LifecycleState::Closed);
        assert!(report.is_cancelled());
        assert!(report.into_result().is_ok());
    }
}
