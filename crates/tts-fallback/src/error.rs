//! Adapter-facing error type (§6 Failure surface, §7 Error taxonomy)

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FallbackError>;

#[derive(Error, Debug, Clone)]
pub enum FallbackError {
    /// Every configured backend was tried and none produced a committed
    /// frame. Raised before any output reached the caller.
    #[error("all backends failed: {0}")]
    Connection(String),

    /// A backend failed after it had already committed output downstream.
    /// Already-emitted audio cannot be revoked, so this always terminates
    /// the call/segment rather than triggering failover.
    #[error("backend error after commit: {0}")]
    Api(String),
}

/// Internal classification of why a single attempt failed. Never exposed
/// to callers directly; the orchestrators use it to decide whether to
/// retry, fail over, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptFailure {
    Connection,
    Timeout,
    Empty,
}

impl From<tts_core::Error> for AttemptFailure {
    fn from(err: tts_core::Error) -> Self {
        match err {
            tts_core::Error::Timeout => AttemptFailure::Timeout,
            tts_core::Error::Connection(_) | tts_core::Error::Api(_) => {
                AttemptFailure::Connection
            }
        }
    }
}
