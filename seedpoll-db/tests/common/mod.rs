//! In-memory stand-ins for a PostgreSQL server
//!
//! `SharedDb` plays the server: it survives across connections, so tests can
//! reconnect, insert rows "from another process", or inspect what was
//! committed and how many times a connection was closed.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use seedpoll_core::ConnectionConfig;
use seedpoll_db::{Book, BookStore, Connector, NewBook};
use tokio::time::Instant;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Paused-clock timings land on millisecond ticks; allow that much slack.
pub fn assert_elapsed(started: Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected ~{:?}, got {:?}",
        expected,
        elapsed
    );
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig::new("db.test")
}

#[derive(Debug, Default)]
pub struct FakeDb {
    pub tables: Vec<String>,
    pub books: Vec<Book>,
    next_id: i32,
    /// Successful fetches allowed before every further fetch fails
    pub fail_fetch_after: Option<usize>,
    pub fetches: usize,
    pub fail_create: bool,
    pub connections_opened: u32,
    pub closes: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SharedDb(Arc<Mutex<FakeDb>>);

impl SharedDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, FakeDb> {
        self.0.lock().unwrap()
    }

    /// Insert a row as if another client committed it.
    pub fn insert(&self, title: &str, author: Option<&str>) -> i32 {
        let mut db = self.lock();
        db.next_id += 1;
        let id = db.next_id;
        db.books.push(Book {
            id,
            title: title.to_string(),
            primary_author: author.map(str::to_string),
        });
        id
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.lock().tables.iter().any(|t| t == name)
    }

    pub fn store(&self) -> FakeStore {
        self.lock().connections_opened += 1;
        FakeStore { db: self.clone() }
    }
}

pub struct FakeStore {
    db: SharedDb,
}

#[async_trait]
impl BookStore for FakeStore {
    async fn server_version(&mut self) -> Result<String, sqlx::Error> {
        Ok("PostgreSQL 16.4 (fake)".to_string())
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error> {
        Ok(self.db.has_table(table))
    }

    async fn create_books_table(&mut self, seed: NewBook<'_>) -> Result<(), sqlx::Error> {
        {
            let db = self.db.lock();
            if db.fail_create {
                return Err(sqlx::Error::Protocol("permission denied for schema public".into()));
            }
            if db.tables.iter().any(|t| t == "books") {
                return Err(sqlx::Error::Protocol(
                    "relation \"books\" already exists".into(),
                ));
            }
        }

        self.db.lock().tables.push("books".to_string());
        self.db.insert(seed.title, seed.primary_author);
        Ok(())
    }

    async fn fetch_books(&mut self) -> Result<Vec<Book>, sqlx::Error> {
        let mut db = self.db.lock();
        if !db.tables.iter().any(|t| t == "books") {
            return Err(sqlx::Error::Protocol(
                "relation \"books\" does not exist".into(),
            ));
        }
        if db.fail_fetch_after.is_some_and(|limit| db.fetches >= limit) {
            return Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        db.fetches += 1;
        Ok(db.books.clone())
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.db.lock().closes += 1;
        Ok(())
    }
}

/// When the fake server starts accepting connections
#[derive(Debug, Clone, Copy)]
pub enum ConnectPlan {
    /// Refuse the first `n` attempts
    FailTimes(u32),
    /// Refuse until this much (tokio) time has passed since creation
    UnreachableFor(Duration),
    /// Leave the first `n` attempts unanswered, like a dropped SYN
    HangTimes(u32),
    Never,
}

pub struct FakeConnector {
    db: SharedDb,
    plan: ConnectPlan,
    attempts: AtomicU32,
    created: Instant,
}

impl FakeConnector {
    pub fn new(db: SharedDb, plan: ConnectPlan) -> Self {
        Self {
            db,
            plan,
            attempts: AtomicU32::new(0),
            created: Instant::now(),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Store = FakeStore;

    async fn connect(&self, _config: &ConnectionConfig) -> Result<FakeStore, sqlx::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let refused = match self.plan {
            ConnectPlan::FailTimes(n) => attempt <= n,
            ConnectPlan::UnreachableFor(window) => self.created.elapsed() < window,
            ConnectPlan::HangTimes(n) => {
                if attempt <= n {
                    std::future::pending::<()>().await;
                }
                false
            }
            ConnectPlan::Never => true,
        };

        if refused {
            return Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(self.db.store())
    }
}
