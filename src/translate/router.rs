//! Ordered provider fallback.

use std::{sync::Arc, time::Duration};

use leaky_bucket::RateLimiter;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{
    ExternalTranslator,
    GoogleTranslator,
    MAX_PROVIDER_RATE,
    OpenAiTranslator,
    ProviderError,
    ProviderKind,
    ProviderSpec,
    RouterConfigError,
    Translator,
};
use crate::{config::TranslationConfig, metrics};

/// Extra time allowed on top of a provider's own timeout.
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// Default number of provider calls allowed in flight at once.
pub const DEFAULT_PROVIDER_WORKERS: usize = 4;

struct Provider {
    spec: ProviderSpec,
    backend: Arc<dyn Translator>,
    limiter: Option<RateLimiter>,
}

/// Tries providers in priority order and passes text through when all fail.
pub struct TranslationRouter {
    providers: Vec<Provider>,
    calls: Semaphore,
    grace: Duration,
}

impl std::fmt::Debug for TranslationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationRouter")
            .field("providers", &self.specs().collect::<Vec<_>>())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl TranslationRouter {
    /// Start configuring a router.
    #[must_use]
    pub fn builder() -> TranslationRouterBuilder { TranslationRouterBuilder::default() }

    /// Build the provider list from configuration.
    ///
    /// The primary provider comes first unless disabled, the secondary only
    /// when both endpoint and key are set, then each custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RouterConfigError`] if a configured rate or the worker count
    /// is invalid.
    pub fn from_config(
        config: &TranslationConfig,
        client: &reqwest::Client,
    ) -> Result<Self, RouterConfigError> {
        let mut builder = Self::builder().provider_workers(config.provider_workers);
        for spec in config.provider_specs() {
            let backend: Arc<dyn Translator> = match spec.kind {
                ProviderKind::Primary => Arc::new(GoogleTranslator::new(
                    client.clone(),
                    config.target_lang.clone(),
                )),
                ProviderKind::Secondary => {
                    let (Some(endpoint), Some(api_key)) = (&spec.endpoint, &config.api_key) else {
                        continue;
                    };
                    Arc::new(OpenAiTranslator::new(
                        client.clone(),
                        endpoint.clone(),
                        api_key.clone(),
                        config.model.clone(),
                        config.target_lang.clone(),
                    ))
                }
                ProviderKind::Custom => {
                    let Some(endpoint) = &spec.endpoint else {
                        continue;
                    };
                    Arc::new(ExternalTranslator::new(
                        client.clone(),
                        endpoint.clone(),
                        config.target_lang.clone(),
                    ))
                }
            };
            builder = builder.provider(spec, backend);
        }
        builder.build()
    }

    /// Configured providers in fallback order.
    pub fn specs(&self) -> impl Iterator<Item = &ProviderSpec> {
        self.providers.iter().map(|provider| &provider.spec)
    }

    /// Translate `text`, returning it unchanged if no provider succeeds.
    pub async fn translate(&self, text: &str) -> String {
        for provider in &self.providers {
            match self.attempt(provider, text).await {
                Ok(translated) => {
                    debug!(provider = %provider.spec.name, "translation succeeded");
                    metrics::inc_translations("translated");
                    return translated;
                }
                Err(err) => {
                    debug!(
                        provider = %provider.spec.name,
                        kind = err.kind(),
                        error = %err,
                        "provider attempt failed"
                    );
                }
            }
        }
        if !self.providers.is_empty() {
            debug!(providers = self.providers.len(), "all providers failed; passing text through");
        }
        metrics::inc_translations("passthrough");
        text.to_owned()
    }

    async fn attempt(&self, provider: &Provider, text: &str) -> Result<String, ProviderError> {
        let budget = provider.spec.timeout.saturating_add(self.grace);
        let call = async {
            let _permit = self
                .calls
                .acquire()
                .await
                .map_err(|_| ProviderError::PoolClosed)?;
            if let Some(limiter) = &provider.limiter {
                limiter.acquire(1).await;
            }
            provider.backend.translate(text, provider.spec.timeout).await
        };
        match tokio::time::timeout(budget, call).await {
            Ok(Ok(translated)) if !translated.is_empty() => Ok(translated),
            Ok(Ok(_)) => Err(ProviderError::Empty),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ProviderError::Timeout(budget)),
        }
    }
}

/// Builder for [`TranslationRouter`].
///
/// Providers are tried in the order they are added.
///
/// # Examples
///
/// ```
/// use chatlens::translate::TranslationRouter;
///
/// let router = TranslationRouter::builder()
///     .provider_workers(2)
///     .build()
///     .expect("valid router");
/// assert_eq!(router.specs().count(), 0);
/// ```
pub struct TranslationRouterBuilder {
    providers: Vec<(ProviderSpec, Arc<dyn Translator>)>,
    provider_workers: usize,
    grace: Duration,
}

impl Default for TranslationRouterBuilder {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            provider_workers: DEFAULT_PROVIDER_WORKERS,
            grace: TIMEOUT_GRACE,
        }
    }
}

impl TranslationRouterBuilder {
    /// Append a provider to the fallback order.
    #[must_use]
    pub fn provider(mut self, spec: ProviderSpec, backend: Arc<dyn Translator>) -> Self {
        self.providers.push((spec, backend));
        self
    }

    /// Set how many provider calls may run concurrently.
    #[must_use]
    pub fn provider_workers(mut self, workers: usize) -> Self {
        self.provider_workers = workers;
        self
    }

    /// Override the grace added to each provider timeout.
    #[must_use]
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Build the router.
    ///
    /// # Errors
    ///
    /// Returns [`RouterConfigError::InvalidRate`] if a provider rate is zero or
    /// above [`MAX_PROVIDER_RATE`], and [`RouterConfigError::NoWorkers`] if
    /// the provider worker count is zero.
    pub fn build(self) -> Result<TranslationRouter, RouterConfigError> {
        if self.provider_workers == 0 {
            return Err(RouterConfigError::NoWorkers);
        }
        let providers = self
            .providers
            .into_iter()
            .map(|(spec, backend)| {
                let limiter = spec.rate_limit.map(rate_limiter).transpose()?;
                Ok(Provider {
                    spec,
                    backend,
                    limiter,
                })
            })
            .collect::<Result<Vec<_>, RouterConfigError>>()?;
        if providers.is_empty() {
            warn!("no translation providers configured; text will pass through");
        }
        Ok(TranslationRouter {
            providers,
            calls: Semaphore::new(self.provider_workers),
            grace: self.grace,
        })
    }
}

fn rate_limiter(rate: usize) -> Result<RateLimiter, RouterConfigError> {
    if rate == 0 || rate > MAX_PROVIDER_RATE {
        return Err(RouterConfigError::InvalidRate(rate));
    }
    Ok(RateLimiter::builder()
        .initial(rate)
        .refill(rate)
        .interval(Duration::from_secs(1))
        .max(rate)
        .build())
}
