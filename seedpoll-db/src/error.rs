//! Error types for seedpoll-db

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    /// Only reachable with a bounded retry policy
    #[error("Gave up connecting to PostgreSQL after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema bootstrap failed: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("Polling failed: {0}")]
    Poll(#[source] sqlx::Error),

    #[error("Failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_detail() {
        let err = DbError::Schema(sqlx::Error::Protocol("relation exists".into()));
        assert!(err.to_string().starts_with("Schema bootstrap failed"));
        assert!(err.to_string().contains("relation exists"));

        let err = DbError::RetriesExhausted {
            attempts: 3,
            source: sqlx::Error::PoolTimedOut,
        };
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn report_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err: DbError = io.into();
        assert!(matches!(err, DbError::Report(_)));
        assert!(err.to_string().contains("stdout closed"));
    }
}
