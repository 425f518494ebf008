use std::result;

use thiserror::Error;


/// Errors raised by reporters, queues and relay sinks.
///
/// Delivery errors are logged and swallowed by the component that owns
/// the delivery attempt; they never reach instrumented application code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("collector returned status {0}")]
    CollectorStatus(u16),

    #[error("index returned status {0}")]
    IndexStatus(u16),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}


/// Type alias for `Result`s based on the crate's `Error`.
pub type Result<T> = result::Result<T, Error>;
