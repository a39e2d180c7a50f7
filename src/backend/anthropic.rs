//! Adapter for the Anthropic messages API.
//!
//! Endpoint: `/v1/messages`. System content travels in the top-level
//! `system` field rather than in `messages`, every request carries a
//! `max_tokens` ceiling, and auth is the `x-api-key` header plus a fixed
//! `anthropic-version`.

use super::{ensure_non_empty, merge_params, ChatCompletion, ChatProvider, ChatUsage};
use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::types::{ChatMessage, ContentPart, MessageContent, Role};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Default public endpoint base.
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
/// Environment key holding the API key.
pub const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
/// Protocol version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// `max_tokens` sent unless `params` overrides it.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter for the Anthropic messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    base_url: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    usage: ResponseUsage,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponseUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self {
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

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
                            json!({"type": "image", "source": {"type": "url", "url": url}})
                        }
                    })
                    .collect(),
            ),
        }
    }

    /// Split the conversation into the `system` field and the `messages` list.
    ///
    /// A conversation consisting of a single system message is sent as one
    /// user turn instead: the message's role is rewritten to `user` in place,
    /// so callers that keep the list (e.g. for retries) see the new role.
    fn frame_messages(messages: &mut [ChatMessage]) -> (Option<String>, Vec<Value>) {
        if let [only] = messages {
            if only.role == Role::System {
                only.role = Role::User;
            }
        }

        let system_parts: Vec<String> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.to_text())
            .collect();
        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        let turns = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({"role": m.role.as_str(), "content": Self::content_json(&m.content)}))
            .collect();

        (system, turns)
    }

    /// Build the request body: `{model, max_tokens, system?, messages}`
    /// overlaid with `params`.
    fn build_body(messages: &mut [ChatMessage], model: &str, params: &Map<String, Value>) -> Value {
        let (system, turns) = Self::frame_messages(messages);

        let mut body = Map::new();
        body.insert("model".into(), Value::String(model.to_string()));
        body.insert("max_tokens".into(), json!(DEFAULT_MAX_TOKENS));
        if let Some(system) = system {
            body.insert("system".into(), Value::String(system));
        }
        body.insert("messages".into(), Value::Array(turns));
        merge_params(&mut body, params);
        Value::Object(body)
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn chat_completion(
        &self,
        ctx: &ExecCtx,
        messages: &mut [ChatMessage],
        model: &str,
        prompt: &str,
        params: &Map<String, Value>,
    ) -> Result<ChatCompletion> {
        ensure_non_empty(self.name(), messages)?;
        let api_key = ctx.env.require(ANTHROPIC_API_KEY_VAR)?;
        let url = format!("{}/v1/messages", self.base_url);
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
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            warn!(provider = self.name(), status = status.as_u16(), "message request failed");
            return Err(NodeRunError::Provider {
                provider: self.name(),
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)?;
        let content = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| NodeRunError::Other("Anthropic response contained no text block".into()))?;

        Ok(ChatCompletion::single(
            content,
            ChatUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
            model,
        ))
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
