//! Google web translate backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{ProviderError, Translator, non_empty};

/// Public web endpoint used when no other is configured.
pub const GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Translates through Google's keyless web endpoint with source detection.
#[derive(Clone, Debug)]
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
    target_lang: String,
}

impl GoogleTranslator {
    #[must_use]
    pub fn new(client: reqwest::Client, target_lang: String) -> Self {
        Self {
            client,
            endpoint: GOOGLE_ENDPOINT.to_owned(),
            target_lang,
        }
    }

    /// Point the backend at a different endpoint speaking the same format.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, timeout: Duration) -> Result<String, ProviderError> {
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", self.target_lang.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_response(&body)
    }
}

/// Join the translated sentence segments of a `translate_a/single` response.
///
/// The response is a nested array whose first element lists sentences as
/// `[translated, original, ...]`.
pub(crate) fn parse_response(body: &Value) -> Result<String, ProviderError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Response("missing sentence array".to_owned()))?;
    let joined: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();
    non_empty(&joined)
}
