//! Fatal error type for the crate.
//!
//! Per-frame and per-provider failures are absorbed where they occur; only
//! conditions that prevent the monitor from starting or running reach
//! [`Error`].

use thiserror::Error;

use crate::{
    capture::CaptureError,
    config::ConfigError,
    protocol::RegistryError,
    translate::RouterConfigError,
};

/// Top-level error type exposed by `chatlens`.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid message id table: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("invalid translation settings: {0}")]
    Router(#[from] RouterConfigError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[cfg(feature = "metrics")]
    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] crate::metrics::ExporterError),
}

/// Result type alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
