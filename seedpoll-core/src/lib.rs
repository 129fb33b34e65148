pub mod config;
pub mod error;
pub mod retry;

pub use config::{ConnectionConfig, PollSettings, RetrySettings, RetryStrategy, WatchSettings};
pub use error::{ConfigError, Result};
pub use retry::{Backoff, RetryPolicy, DEFAULT_CONNECT_TIMEOUT};
