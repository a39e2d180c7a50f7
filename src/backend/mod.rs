//! Provider-agnostic chat completion contract.
//!
//! The [`ChatProvider`] trait abstracts over LLM vendors, translating a
//! shared [`ChatMessage`] list into the vendor's HTTP request and the
//! vendor's response back into a [`ChatCompletion`].
//!
//! ```text
//! LlmNode ──► &mut [ChatMessage] ──► ChatProvider::chat_completion() ──► ChatCompletion
//!                                               │
//!                                 ┌─────────────┴─────────────┐
//!                           OpenAiProvider             AnthropicProvider
//!                        /v1/chat/completions            /v1/messages
//! ```
//!
//! Providers are looked up by name in a [`ProviderRegistry`] when a
//! pipeline is loaded; adding a vendor means registering one more adapter.

pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;

use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::types::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Token accounting for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub completion_tokens: u64,
    pub prompt_tokens: u64,
    /// `completion_tokens + prompt_tokens`, saturating at `u64::MAX`.
    pub total_tokens: u64,
    /// No pricing table is maintained, so this is always `None` for the
    /// built-in providers.
    pub approximate_cost: Option<f64>,
}

impl ChatUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            completion_tokens,
            prompt_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            approximate_cost: None,
        }
    }
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// A normalized chat completion.
///
/// Built-in providers only ever ask for, and return, a single choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<ChatChoice>,
    pub usage: ChatUsage,
    pub model: String,
}

impl ChatCompletion {
    /// Build a single-choice completion with an assistant message.
    pub fn single(text: impl Into<String>, usage: ChatUsage, model: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatChoice {
                message: ChatMessage::assistant(text.into()),
            }],
            usage,
            model: model.into(),
        }
    }

    /// Text of the first choice, the only one this crate consumes.
    pub fn first_text(&self) -> Result<String> {
        self.choices
            .first()
            .map(|c| c.message.content.to_text())
            .ok_or_else(|| NodeRunError::Other("completion returned no choices".into()))
    }
}

/// Abstraction over chat completion providers.
///
/// `messages` is mutable because some vendors require the conversation to
/// be reframed before sending; see [`AnthropicProvider`] for the one such
/// rewrite. Implementations fail with [`NodeRunError::Provider`] when the
/// vendor answers with a non-success status.
///
/// This trait is object-safe and designed to be used as `Arc<dyn ChatProvider>`.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Execute one chat completion.
    ///
    /// `params` is merged over the provider's default request body, so it
    /// can both add options and override defaults. `prompt` is the rendered
    /// node prompt and is used for diagnostics only.
    async fn chat_completion(
        &self,
        ctx: &ExecCtx,
        messages: &mut [ChatMessage],
        model: &str,
        prompt: &str,
        params: &Map<String, Value>,
    ) -> Result<ChatCompletion>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Overlay request `params` on a default body.
pub(crate) fn merge_params(body: &mut Map<String, Value>, params: &Map<String, Value>) {
    for (k, v) in params {
        body.insert(k.clone(), v.clone());
    }
}

pub(crate) fn ensure_non_empty(provider: &str, messages: &[ChatMessage]) -> Result<()> {
    if messages.is_empty() {
        return Err(NodeRunError::InvalidConfig(format!(
            "{} chat completion requires at least one message",
            provider
        )));
    }
    Ok(())
}

/// Named provider adapters.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `"openai"` and `"anthropic"` pointing at the public
    /// vendor endpoints.
    pub fn with_defaults() -> Self {
        Self::new()
            .register("openai", Arc::new(OpenAiProvider::new()))
            .register("anthropic", Arc::new(AnthropicProvider::new()))
    }

    /// Add or replace a provider under `name`.
    pub fn register(mut self, name: impl Into<String>, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ChatProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| NodeRunError::UnknownProvider(name.to_string()))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}
