//! Schema bootstrap for the books table
//!
//! The existence check is the only guard around creation and seeding. Two
//! processes bootstrapping the same empty database at once can both see the
//! table as missing; the loser fails on CREATE TABLE and its transaction is
//! rolled back.

use tracing::info;

use crate::error::{DbError, DbResult};
use crate::models::{NewBook, BOOKS_TABLE, SEED_BOOK};
use crate::store::BookStore;

/// Which branch `ensure_schema` took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    AlreadyExists,
    Created,
}

#[derive(Debug, Clone)]
pub struct SchemaBootstrapper {
    seed: NewBook<'static>,
}

impl Default for SchemaBootstrapper {
    fn default() -> Self {
        Self { seed: SEED_BOOK }
    }
}

impl SchemaBootstrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and seed the books table unless it already exists.
    pub async fn ensure_schema<S: BookStore>(&self, store: &mut S) -> DbResult<BootstrapOutcome> {
        let exists = store
            .table_exists(BOOKS_TABLE)
            .await
            .map_err(DbError::Schema)?;

        if exists {
            info!(table = BOOKS_TABLE, "Table already exists");
            return Ok(BootstrapOutcome::AlreadyExists);
        }

        info!(table = BOOKS_TABLE, "Table didn't exist. Creating table");
        store
            .create_books_table(self.seed)
            .await
            .map_err(DbError::Schema)?;

        info!(
            table = BOOKS_TABLE,
            title = self.seed.title,
            author = self.seed.primary_author.unwrap_or("None"),
            "Inserted seed row"
        );
        Ok(BootstrapOutcome::Created)
    }
}
