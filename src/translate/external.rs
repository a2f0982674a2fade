//! Generic JSON translation endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{ProviderError, Translator, non_empty};

/// Response keys checked, in order, for the translated text.
const RESULT_KEYS: &[&str] = &["translated", "translatedText", "translation", "result"];

#[derive(Debug, Serialize)]
struct ExternalRequest<'a> {
    text: &'a str,
    target: &'a str,
}

/// Posts `{text, target}` to a user-configured URL.
#[derive(Clone, Debug)]
pub struct ExternalTranslator {
    client: reqwest::Client,
    url: String,
    target_lang: String,
}

impl ExternalTranslator {
    #[must_use]
    pub fn new(client: reqwest::Client, url: String, target_lang: String) -> Self {
        Self {
            client,
            url,
            target_lang,
        }
    }
}

#[async_trait]
impl Translator for ExternalTranslator {
    async fn translate(&self, text: &str, timeout: Duration) -> Result<String, ProviderError> {
        let raw = self
            .client
            .post(&self.url)
            .json(&ExternalRequest {
                text,
                target: &self.target_lang,
            })
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        extract_text(&raw)
    }
}

/// Pull the translation out of an endpoint response, falling back to the raw
/// body.
pub(crate) fn extract_text(raw: &str) -> Result<String, ProviderError> {
    let Ok(Value::Object(body)) = serde_json::from_str::<Value>(raw) else {
        return non_empty(raw);
    };
    if let Some(key) = RESULT_KEYS.iter().find(|key| body.contains_key(**key)) {
        return match body.get(*key).and_then(Value::as_str) {
            Some(text) => non_empty(text),
            None => Err(ProviderError::Response(format!("`{key}` is not a string"))),
        };
    }
    if let Some(first) = body
        .get("choices")
        .and_then(|c| c.get(0))
        .filter(|first| first.is_object())
    {
        let text = first.get("text").and_then(Value::as_str).unwrap_or_default();
        if !text.trim().is_empty() {
            return non_empty(text);
        }
        let content = first
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        return non_empty(content);
    }
    non_empty(raw)
}
