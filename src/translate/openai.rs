//! OpenAI-compatible chat completion backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{ProviderError, Translator, non_empty};

const SYSTEM_PROMPT: &str = "You are a professional translator. Detect the input language \
                             automatically and translate the text accurately.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

/// Translates by prompting a chat completion endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    target_lang: String,
}

impl OpenAiTranslator {
    /// `endpoint` is the full completion URL; it is posted to as given.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        model: String,
        target_lang: String,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            model,
            target_lang,
        }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, timeout: Duration) -> Result<String, ProviderError> {
        let user = format!(
            "Please translate the following text to {}. Only return the translated text (do not \
             add explanations):\n\n{text}",
            self.target_lang
        );
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.0,
            max_tokens: 2000,
        };
        let raw = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        extract_text(&raw)
    }
}

/// Pull the completion out of a response body.
///
/// Accepts the chat shape (`choices[0].message.content`), the legacy
/// completion shape (`choices[0].text`) and a bare `translatedText`;
/// anything else is returned as raw text.
pub(crate) fn extract_text(raw: &str) -> Result<String, ProviderError> {
    let Ok(Value::Object(body)) = serde_json::from_str::<Value>(raw) else {
        return non_empty(raw);
    };
    let found = match body.get("choices").and_then(|c| c.get(0)) {
        Some(first) => {
            let message = first
                .get("message")
                .filter(|m| !is_falsy(m))
                .or_else(|| first.get("text"));
            match message {
                Some(Value::Object(message)) => message.get("content").and_then(Value::as_str),
                Some(Value::String(text)) => Some(text.as_str()),
                _ => None,
            }
        }
        None => body.get("translatedText").and_then(Value::as_str),
    };
    non_empty(found.unwrap_or(raw))
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
