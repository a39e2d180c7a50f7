//! Adapter for OpenAI-shaped chat completion APIs.
//!
//! Endpoint: `/v1/chat/completions`. The message list is sent verbatim,
//! system messages included, and auth is `Authorization: Bearer {key}`
//! with the key read from [`OPENAI_API_KEY_VAR`].

use super::{ensure_non_empty, merge_params, ChatCompletion, ChatProvider, ChatUsage};
use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::types::{ChatMessage, ContentPart, MessageContent};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Default public endpoint base.
pub const OPENAI_API_URL: &str = "https://api.openai.com";
/// Environment key holding the API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Adapter for the OpenAI chat completions API and compatible servers.
///
/// # Example
///
/// ```
/// use pipeline_engine::backend::OpenAiProvider;
///
/// let provider = OpenAiProvider::new();
/// let proxied = OpenAiProvider::new().with_base_url("http://localhost:8080");
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<ResponseChoice>,
    usage: ResponseUsage,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ResponseUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self {
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Point the adapter at another server (proxy, compatible vendor, test mock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn content_json(content: &MessageContent) -> Value {
        match content {
            MessageContent::Text(text) => Value::String(text.clone()),
            MessageContent::Parts(parts) => Value::Array(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => json!({"type": "text", "text": text}),
                        ContentPart::ImageUrl { url } => {
                            json!({"type": "image_url", "image_url": {"url": url}})
                        }
                    })
                    .collect(),
            ),
        }
    }

    /// Build the messages array: every message, in order, with its role.
    fn build_messages(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": Self::content_json(&m.content)}))
            .collect()
    }

    /// Build the request body: `{model, messages}` overlaid with `params`.
    fn build_body(messages: &[ChatMessage], model: &str, params: &Map<String, Value>) -> Value {
        let mut body = Map::new();
        body.insert("model".into(), Value::String(model.to_string()));
        body.insert("messages".into(), Value::Array(Self::build_messages(messages)));
        merge_params(&mut body, params);
        Value::Object(body)
    }

    /// Prefer `error.message` from a JSON error body, falling back to the raw text.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string())
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat_completion(
        &self,
        ctx: &ExecCtx,
        messages: &mut [ChatMessage],
        model: &str,
        prompt: &str,
        params: &Map<String, Value>,
    ) -> Result<ChatCompletion> {
        ensure_non_empty(self.name(), messages)?;
        let api_key = ctx.env.require(OPENAI_API_KEY_VAR)?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::build_body(messages, model, params);

        debug!(
            provider = self.name(),
            model,
            messages = messages.len(),
            prompt_chars = prompt.len(),
            "sending chat completion request"
        );

        let resp = ctx
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            warn!(provider = self.name(), status = status.as_u16(), "completion request failed");
            return Err(NodeRunError::Provider {
                provider: self.name(),
                status: status.as_u16(),
                message: Self::error_message(&text),
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NodeRunError::Other("OpenAI response contained no message content".into()))?;

        Ok(ChatCompletion::single(
            content,
            ChatUsage::new(parsed.usage.prompt_tokens, parsed.usage.completion_tokens),
            model,
        ))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
