//! Mock provider for testing without a live LLM.
//!
//! [`MockProvider`] returns pre-configured completions in order and records
//! every conversation it was sent, so pipelines can be tested
//! deterministically.
//!
//! # Example
//!
//! ```
//! use pipeline_engine::backend::MockProvider;
//!
//! let mock = MockProvider::new(vec!["first".to_string(), "second".to_string()]);
//! assert_eq!(mock.call_count(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{ensure_non_empty, ChatCompletion, ChatProvider, ChatUsage};
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::types::ChatMessage;

/// A test provider that returns canned completions in order.
///
/// Cycles back to the beginning when all responses have been consumed.
/// Usage counts whitespace-separated words.
#[derive(Debug)]
pub struct MockProvider {
    responses: Vec<String>,
    index: AtomicUsize,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockProvider {
    /// Create a mock provider with the given canned responses.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockProvider requires at least one response");
        Self {
            responses,
            index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Every conversation sent so far, oldest call first.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn next_response(&self) -> String {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        self.responses[idx].clone()
    }
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn chat_completion(
        &self,
        _ctx: &ExecCtx,
        messages: &mut [ChatMessage],
        model: &str,
        _prompt: &str,
        _params: &Map<String, Value>,
    ) -> Result<ChatCompletion> {
        ensure_non_empty(self.name(), messages)?;
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());

        let text = self.next_response();
        let prompt_tokens = messages
            .iter()
            .map(|m| word_count(&m.content.to_text()))
            .sum();
        let usage = ChatUsage::new(prompt_tokens, word_count(&text));
        Ok(ChatCompletion::single(text, usage, model))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
