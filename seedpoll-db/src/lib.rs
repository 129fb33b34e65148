//! seedpoll-db: connect, bootstrap and poll a PostgreSQL table
//!
//! One connection per process, no pool. The [`Lifecycle`] controller runs
//! the [`ConnectionSupervisor`], [`SchemaBootstrapper`] and
//! [`PollingReporter`] in sequence and releases the connection on exit.

pub mod bootstrap;
pub mod connect;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod poller;
pub mod store;

pub use bootstrap::{BootstrapOutcome, SchemaBootstrapper};
pub use connect::{ConnectionSupervisor, Connector, PgConnector};
pub use error::{DbError, DbResult};
pub use lifecycle::{ConnectionGuard, Lifecycle, LifecycleState, SessionExit, SessionReport};
pub use models::{Book, NewBook, BOOKS_TABLE, SEED_BOOK};
pub use poller::{PollSnapshot, PollingReporter};
pub use store::BookStore;
