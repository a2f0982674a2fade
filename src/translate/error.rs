//! Provider and router error types.

use std::time::Duration;

use thiserror::Error;

use super::MAX_PROVIDER_RATE;

/// Failures of a single provider attempt.
///
/// The router absorbs every variant by moving on to the next provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The attempt did not finish within its budget.
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP exchange failed or returned an error status.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be interpreted.
    #[error("unexpected response: {0}")]
    Response(String),

    /// The provider answered without any text.
    #[error("provider returned no text")]
    Empty,

    /// The shared provider-call pool has been closed.
    #[error("provider pool closed")]
    PoolClosed,
}

impl ProviderError {
    /// Short label used for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(err) if err.is_timeout() => "timeout",
            Self::Transport(_) => "transport",
            Self::Response(_) => "response",
            Self::Empty => "empty",
            Self::PoolClosed => "closed",
        }
    }
}

/// Errors returned when building a [`TranslationRouter`](super::TranslationRouter).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterConfigError {
    /// A provider rate was zero or exceeded [`MAX_PROVIDER_RATE`].
    #[error("invalid rate {0}; must be between 1 and {MAX_PROVIDER_RATE}")]
    InvalidRate(usize),

    /// The provider-call pool must admit at least one call.
    #[error("provider worker count must be non-zero")]
    NoWorkers,
}
