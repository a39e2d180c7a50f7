//! Chat-completion nodes.
//!
//! The node's prompt is rendered from its declared text inputs and sent as
//! the system message, followed by any `chat_messages` input. With
//! structured output configured, the validator's instructions are appended
//! to the prompt and the completion goes through the repair loop in
//! [`structured`](crate::structured).

use crate::backend::ChatProvider;
use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, Node, NodeInputs};
use crate::structured::{CompletionCall, StructuredOutput};
use crate::template;
use crate::types::{ChatMessage, NodeInput, RunOutput};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Input name carrying the conversation that follows the system prompt.
pub const CHAT_MESSAGES_INPUT: &str = "chat_messages";

pub struct LlmNode {
    name: String,
    prompt: String,
    model: String,
    provider: Arc<dyn ChatProvider>,
    params: Map<String, Value>,
    input_names: Vec<String>,
    structured: Option<StructuredOutput>,
}

impl std::fmt::Debug for LlmNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmNode")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("input_names", &self.input_names)
            .field("structured", &self.structured)
            .finish()
    }
}

impl LlmNode {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn ChatProvider>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            model: model.into(),
            provider,
            params: Map::new(),
            input_names: Vec::new(),
            structured: None,
        }
    }

    /// Declared inputs. Every name except `chat_messages` is a prompt variable.
    pub fn with_inputs(mut self, names: Vec<String>) -> Self {
        self.input_names = names;
        self
    }

    /// Extra request options merged into the provider body.
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_structured_output(mut self, structured: StructuredOutput) -> Self {
        self.structured = Some(structured);
        self
    }

    /// Render the system prompt from the prompt variables.
    fn render_prompt(&self, inputs: &mut NodeInputs) -> Result<String> {
        let mut vars = HashMap::new();
        for input in self.input_names.iter().filter(|n| *n != CHAT_MESSAGES_INPUT) {
            vars.insert(input.clone(), inputs.take_text(&self.name, input)?);
        }
        let rendered = template::render(&self.prompt, &vars);

        match self.structured {
            Some(ref structured) => {
                let schema = structured.validator.render_prompt()?;
                Ok(format!("{}\n\n{}", rendered, schema))
            }
            None => Ok(rendered),
        }
    }

    fn chat_messages(&self, inputs: &mut NodeInputs) -> Result<Vec<ChatMessage>> {
        if !self.input_names.iter().any(|n| n == CHAT_MESSAGES_INPUT) {
            return Ok(Vec::new());
        }
        match inputs.take(&self.name, CHAT_MESSAGES_INPUT)? {
            NodeInput::Messages(messages) => Ok(messages),
            other => Err(NodeRunError::UnsupportedInput {
                node: self.name.clone(),
                found: other.type_name().to_string(),
            }),
        }
    }

    async fn complete(&self, ctx: &ExecCtx, mut inputs: NodeInputs) -> Result<RunOutput> {
        let prompt = self.render_prompt(&mut inputs)?;
        let mut messages = vec![ChatMessage::system(prompt.clone())];
        messages.extend(self.chat_messages(&mut inputs)?);

        let call = CompletionCall {
            node: &self.name,
            provider: self.provider.as_ref(),
            model: &self.model,
            prompt: &prompt,
            params: &self.params,
        };
        let text = match self.structured {
            Some(ref structured) => call.complete_structured(ctx, &mut messages, structured).await?,
            None => call.complete(ctx, &mut messages).await?,
        };
        Ok(RunOutput::success(text))
    }
}

impl Node for LlmNode {
    fn kind(&self) -> &'static str {
        "LLM"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, ctx: &'a ExecCtx, inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>> {
        Box::pin(self.complete(ctx, inputs))
    }
}
