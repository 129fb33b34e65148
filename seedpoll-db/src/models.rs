//! Table descriptor and row types for the `books` table

use sqlx::FromRow;

/// Name of the bootstrapped table
pub const BOOKS_TABLE: &str = "books";

/// DDL for the bootstrapped table. Never dropped or altered afterwards.
pub(crate) const CREATE_BOOKS_TABLE: &str = r#"
    CREATE TABLE books (
        id              SERIAL PRIMARY KEY,
        title           VARCHAR(100) NOT NULL,
        primary_author  VARCHAR(100) NULL
    )
"#;

/// Row inserted once, in the same transaction that creates the table
pub const SEED_BOOK: NewBook<'static> = NewBook {
    title: "Robinson Crusoe",
    primary_author: Some("Daniel Defoe"),
};

/// Book record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub primary_author: Option<String>,
}

/// Insert payload; the id is assigned by the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBook<'a> {
    pub title: &'a str,
    pub primary_author: Option<&'a str>,
}
