//! Structured output: validate a completion and repair it conversationally.
//!
//! When an LLM node is configured with an [`OutputValidator`], every
//! candidate completion is validated. A rejected candidate is appended to
//! the conversation as an assistant turn, followed by a user turn quoting
//! the validation error, and the model is asked again. After
//! `max_retries` rejected retries the node fails with
//! [`NodeRunError::ValidationExhausted`], so at most `max_retries + 1`
//! completions are requested.

use crate::backend::ChatProvider;
use crate::error::{NodeRunError, Result};
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::types::ChatMessage;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Validates (and possibly normalizes) a model's raw output.
pub trait OutputValidator: Send + Sync {
    /// Instructions appended to the prompt describing the expected output.
    fn render_prompt(&self) -> Result<String>;

    /// Return the accepted (possibly transformed) output, or the error text
    /// that will be shown to the model.
    fn validate(&self, candidate: &str) -> std::result::Result<String, String>;
}

/// Structured-output settings for an LLM node.
#[derive(Clone)]
pub struct StructuredOutput {
    pub validator: Arc<dyn OutputValidator>,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl std::fmt::Debug for StructuredOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredOutput")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// One chat completion call made on behalf of a node.
pub(crate) struct CompletionCall<'a> {
    pub node: &'a str,
    pub provider: &'a dyn ChatProvider,
    pub model: &'a str,
    pub prompt: &'a str,
    pub params: &'a Map<String, Value>,
}

impl CompletionCall<'_> {
    /// Request a completion for `messages` and return the first choice's text.
    pub(crate) async fn complete(&self, ctx: &ExecCtx, messages: &mut [ChatMessage]) -> Result<String> {
        let completion = self
            .provider
            .chat_completion(ctx, messages, self.model, self.prompt, self.params)
            .await?;
        emit(
            &ctx.event_handler,
            Event::ProviderResponse {
                name: self.node.to_string(),
                provider: self.provider.name(),
                model: completion.model.clone(),
                usage: completion.usage,
            },
        );
        completion.first_text()
    }

    /// Run the attempt/validate loop until a candidate is accepted or the
    /// retry budget is spent. `messages` grows by two turns per retry and is
    /// never pruned.
    pub(crate) async fn complete_structured(
        &self,
        ctx: &ExecCtx,
        messages: &mut Vec<ChatMessage>,
        structured: &StructuredOutput,
    ) -> Result<String> {
        let mut candidate = self.complete(ctx, messages).await?;
        let mut retry_count: u32 = 0;

        loop {
            let error = match structured.validator.validate(&candidate) {
                Ok(accepted) => {
                    emit(
                        &ctx.event_handler,
                        Event::ValidationEnd {
                            name: self.node.to_string(),
                            attempts: retry_count + 1,
                            success: true,
                        },
                    );
                    return Ok(accepted);
                }
                Err(error) => error,
            };

            retry_count += 1;
            if retry_count > structured.max_retries {
                warn!(node = self.node, attempts = retry_count, "structured output retries exhausted");
                emit(
                    &ctx.event_handler,
                    Event::ValidationEnd {
                        name: self.node.to_string(),
                        attempts: retry_count,
                        success: false,
                    },
                );
                return Err(NodeRunError::ValidationExhausted {
                    max_retries: structured.max_retries,
                    last_output: candidate,
                    error,
                });
            }

            warn!(node = self.node, attempt = retry_count, %error, "structured output rejected");
            emit(
                &ctx.event_handler,
                Event::ValidationRetry {
                    name: self.node.to_string(),
                    attempt: retry_count,
                    reason: error.clone(),
                },
            );

            messages.push(ChatMessage::assistant(candidate));
            messages.push(ChatMessage::user(format!(
                "Json schema validation failed with error: {}\n\nPlease retry",
                error
            )));
            candidate = self.complete(ctx, messages).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockProvider;
    use crate::events::FnEventHandler;
    use crate::types::Role;
    use std::sync::Mutex;

    /// Accepts only the literal text "ok", uppercasing it.
    struct OkOnly;

    impl OutputValidator for OkOnly {
        fn render_prompt(&self) -> Result<String> {
            Ok("Reply with ok.".into())
        }

        fn validate(&self, candidate: &str) -> std::result::Result<String, String> {
            if candidate == "ok" {
                Ok("OK".into())
            } else {
                Err(format!("expected ok, got {}", candidate))
            }
        }
    }

    fn structured(max_retries: u32) -> StructuredOutput {
        StructuredOutput {
            validator: Arc::new(OkOnly),
            max_retries,
        }
    }

    async fn run(
        mock: &MockProvider,
        ctx: &ExecCtx,
        max_retries: u32,
    ) -> (Result<String>, Vec<ChatMessage>) {
        let params = Map::new();
        let call = CompletionCall {
            node: "llm",
            provider: mock,
            model: "m",
            prompt: "p",
            params: &params,
        };
        let mut messages = vec![ChatMessage::system("p")];
        let result = call
            .complete_structured(ctx, &mut messages, &structured(max_retries))
            .await;
        (result, messages)
    }

    #[tokio::test]
    async fn test_accepts_first_valid_candidate() {
        let mock = MockProvider::fixed("ok");
        let ctx = ExecCtx::builder().build().unwrap();
        let (result, messages) = run(&mock, &ctx, 2).await;
        assert_eq!(result.unwrap(), "OK");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_retries_plus_one_attempts() {
        let mock = MockProvider::new(vec!["a".into(), "b".into(), "c".into(), "ok".into()]);
        let ctx = ExecCtx::builder().build().unwrap();
        let (result, messages) = run(&mock, &ctx, 2).await;

        assert_eq!(mock.call_count(), 3);
        match result.unwrap_err() {
            NodeRunError::ValidationExhausted {
                max_retries,
                last_output,
                error,
            } => {
                assert_eq!(max_retries, 2);
                assert_eq!(last_output, "c");
                assert_eq!(error, "expected ok, got c");
            }
            other => panic!("unexpected error: {other}"),
        }
        // initial + two repair pairs sent before the final attempt
        assert_eq!(messages.len(), 5);
    }

    #[tokio::test]
    async fn test_repair_pair_appended_before_retry() {
        let mock = MockProvider::new(vec!["bad".into(), "ok".into()]);
        let ctx = ExecCtx::builder().build().unwrap();
        let (result, messages) = run(&mock, &ctx, 2).await;

        assert_eq!(result.unwrap(), "OK");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ChatMessage::assistant("bad"));
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(
            messages[2].content.to_text(),
            "Json schema validation failed with error: expected ok, got bad\n\nPlease retry"
        );
        // the second call saw the grown conversation
        assert_eq!(mock.calls()[1].len(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_after_single_attempt() {
        let mock = MockProvider::fixed("nope");
        let ctx = ExecCtx::builder().build().unwrap();
        let (result, _) = run(&mock, &ctx, 0).await;
        assert!(matches!(result, Err(NodeRunError::ValidationExhausted { .. })));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_emits_retry_and_end_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ctx = ExecCtx::builder()
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                let tag = match e {
                    Event::ValidationRetry { attempt, .. } => format!("retry{}", attempt),
                    Event::ValidationEnd { attempts, success, .. } => {
                        format!("end{}:{}", attempts, success)
                    }
                    Event::ProviderResponse { .. } => "response".to_string(),
                    _ => return,
                };
                sink.lock().unwrap().push(tag);
            })))
            .build()
            .unwrap();
        let mock = MockProvider::new(vec!["bad".into(), "ok".into()]);
        let (result, _) = run(&mock, &ctx, 1).await;
        assert!(result.is_ok());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["response", "retry1", "response", "end2:true"]
        );
    }
}
