//! Best-effort translation across an ordered list of providers.
//!
//! A provider is anything implementing [`Translator`]. The
//! [`TranslationRouter`] tries providers in priority order, bounding each
//! attempt by the provider's timeout plus a one second grace, and falls back to
//! returning the input unchanged when every provider fails.

pub mod error;
pub mod external;
pub mod google;
pub mod openai;
mod router;

use std::time::Duration;

use async_trait::async_trait;
pub use error::{ProviderError, RouterConfigError};
pub use external::ExternalTranslator;
pub use google::GoogleTranslator;
pub use openai::OpenAiTranslator;
pub use router::{
    DEFAULT_PROVIDER_WORKERS,
    TIMEOUT_GRACE,
    TranslationRouter,
    TranslationRouterBuilder,
};

/// Highest supported per-provider request rate, in requests per second.
pub const MAX_PROVIDER_RATE: usize = 1_000;

/// Capability of turning text into translated text.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on timeout, transport failure or an
    /// unusable response.
    async fn translate(&self, text: &str, timeout: Duration) -> Result<String, ProviderError>;
}

/// Position of a provider in the fallback order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Tried first unless disabled.
    Primary,
    /// Tried when credentials and an endpoint are configured.
    Secondary,
    /// User-supplied endpoints, in configured order.
    Custom,
}

/// Immutable description of one configured provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    /// Name used in logs.
    pub name: String,
    pub endpoint: Option<String>,
    /// Per-request timeout handed to the provider.
    pub timeout: Duration,
    /// Optional request ceiling, in requests per second.
    pub rate_limit: Option<usize>,
}

impl ProviderSpec {
    /// Describe a provider with no endpoint or rate limit.
    #[must_use]
    pub fn new(kind: ProviderKind, name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kind,
            name: name.into(),
            endpoint: None,
            timeout,
            rate_limit: None,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate: Option<usize>) -> Self {
        self.rate_limit = rate;
        self
    }
}

/// Build the HTTP client shared by the network-backed providers.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] if the TLS backend cannot be
/// initialised.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("chatlens/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Trim a provider response, treating blank text as no answer.
fn non_empty(text: &str) -> Result<String, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ProviderError::Empty)
    } else {
        Ok(trimmed.to_owned())
    }
}
