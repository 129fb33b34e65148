//! Polling reporter
//!
//! Reads the whole books table every pass and writes it out. There is no
//! pagination, so memory per pass grows with the table. A NULL author is
//! written as `None`.

use std::convert::Infallible;
use std::io::Write;
use std::time::Duration;

use seedpoll_core::config::DEFAULT_POLL_INTERVAL;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::models::Book;
use crate::store::BookStore;

/// Result of one polling pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSnapshot {
    pub iteration: u64,
    pub books: Vec<Book>,
}

#[derive(Debug)]
pub struct PollingReporter {
    interval: Duration,
    iteration: u64,
}

impl Default for PollingReporter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollingReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            iteration: 0,
        }
    }

    /// Counter value the next pass will report.
    pub fn next_iteration(&self) -> u64 {
        self.iteration
    }

    /// Fetch every row, write the dump, advance the counter.
    pub async fn poll_once<S, W>(&mut self, store: &mut S, out: &mut W) -> DbResult<PollSnapshot>
    where
        S: BookStore,
        W: Write,
    {
        let books = store.fetch_books().await.map_err(DbError::Poll)?;
        let iteration = self.iteration;
        self.iteration += 1;

        write_report(out, iteration, &books)?;
        debug!(iteration, rows = books.len(), "Records fetched");

        Ok(PollSnapshot { iteration, books })
    }

    /// Poll until a query fails. Cancellation is the caller's job.
    pub async fn poll_forever<S, W>(&mut self, store: &mut S, out: &mut W) -> DbResult<Infallible>
    where
        S: BookStore,
        W: Write,
    {
        loop {
            self.poll_once(store, out).await?;
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn write_report<W: Write>(out: &mut W, iteration: u64, books: &[Book]) -> std::io::Result<()> {
    writeln!(out, "Records fetched. Iteration: {}", iteration)?;
    for book in books {
        writeln!(
            out,
            "id = {} title = {} author = {}",
            book.id,
            book.title,
            book.primary_author.as_deref().unwrap_or("None")
        )?;
    }
    writeln!(out)?;
    out.flush()
}
