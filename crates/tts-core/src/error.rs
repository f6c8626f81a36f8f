//! Backend-facing error type

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors a `TtsBackend` implementation may return.
///
/// This is deliberately coarse: the fallback adapter only distinguishes
/// "connection-shaped" failures (retry/fail over) from generic API errors,
/// it doesn't branch on backend-specific detail.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("backend timed out")]
    Timeout,
}
