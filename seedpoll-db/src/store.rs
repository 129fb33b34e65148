//! Statement surface the bootstrapper and reporter run against.
//!
//! `PgConnection` is the production implementation. Every statement goes
//! straight to the server; nothing is cached client-side.

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::Connection as _;

use crate::models::{Book, NewBook, CREATE_BOOKS_TABLE};

/// A live database session.
///
/// Borrowing `&mut self` for a statement plays the role of a cursor: it is
/// scoped to the call and always ends before `close` can consume the session.
#[async_trait]
pub trait BookStore: Send {
    /// Server version banner (`SELECT version()`).
    async fn server_version(&mut self) -> Result<String, sqlx::Error>;

    /// Whether `table` is listed in the information schema.
    async fn table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error>;

    /// Create the books table and insert `seed` as one committed unit.
    async fn create_books_table(&mut self, seed: NewBook<'_>) -> Result<(), sqlx::Error>;

    /// Every row of the books table, ordered by id.
    async fn fetch_books(&mut self) -> Result<Vec<Book>, sqlx::Error>;

    /// Gracefully end the session.
    async fn close(self) -> Result<(), sqlx::Error>
    where
        Self: Sized;
}

#[async_trait]
impl BookStore for PgConnection {
    async fn server_version(&mut self) -> Result<String, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&mut *self)
            .await
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_name = $1
              AND table_schema = current_schema()
            "#,
        )
        .bind(table)
        .fetch_all(&mut *self)
        .await?;

        Ok(!rows.is_empty())
    }

    async fn create_books_table(&mut self, seed: NewBook<'_>) -> Result<(), sqlx::Error> {
        // Dropping the transaction on an early return rolls both statements back
        let mut tx = self.begin().await?;

        sqlx::query(CREATE_BOOKS_TABLE).execute(&mut *tx).await?;

        sqlx::query("INSERT INTO books (title, primary_author) VALUES ($1, $2)")
            .bind(seed.title)
            .bind(seed.primary_author)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    async fn fetch_books(&mut self) -> Result<Vec<Book>, sqlx::Error> {
        sqlx::query_as::<_, Book>("SELECT id, title, primary_author FROM books ORDER BY id")
            .fetch_all(&mut *self)
            .await
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        sqlx::Connection::close(self).await
    }
}
