//! Values that cross node boundaries.
//!
//! [`NodeInput`] is the closed set of shapes any node may consume or
//! produce, and [`RunOutput`] is the envelope every node executor returns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
}

impl Role {
    /// Wire name shared by every supported provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One piece of structured message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

/// Message content: plain text, or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten to plain text. Text parts are joined with newlines and
    /// non-text parts are skipped.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A value tagged with the branch label a router chose for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionedValue {
    pub condition: String,
    pub value: Box<NodeInput>,
}

impl ConditionedValue {
    pub fn new(condition: impl Into<String>, value: NodeInput) -> Self {
        Self {
            condition: condition.into(),
            value: Box::new(value),
        }
    }
}

/// Every shape that may cross a node boundary.
///
/// Deserializes untagged: a JSON string is `Text`, an array of strings (or
/// an empty array) is `TextList`, an array of `{role, content}` objects is
/// `Messages`, and a `{condition, value}` object is `Conditioned`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeInput {
    Text(String),
    TextList(Vec<String>),
    Messages(Vec<ChatMessage>),
    Conditioned(ConditionedValue),
}

impl NodeInput {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeInput::Text(_) => "text",
            NodeInput::TextList(_) => "list of text",
            NodeInput::Messages(_) => "list of chat messages",
            NodeInput::Conditioned(_) => "conditioned value",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeInput::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for NodeInput {
    fn from(text: String) -> Self {
        NodeInput::Text(text)
    }
}

impl From<&str> for NodeInput {
    fn from(text: &str) -> Self {
        NodeInput::Text(text.to_string())
    }
}

impl From<Vec<String>> for NodeInput {
    fn from(items: Vec<String>) -> Self {
        NodeInput::TextList(items)
    }
}

impl From<Vec<ChatMessage>> for NodeInput {
    fn from(messages: Vec<ChatMessage>) -> Self {
        NodeInput::Messages(messages)
    }
}

impl From<ConditionedValue> for NodeInput {
    fn from(value: ConditionedValue) -> Self {
        NodeInput::Conditioned(value)
    }
}

/// Outcome of a node run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The node produced a value for downstream nodes.
    Success,
    /// The branch stops here. Not an error.
    Termination,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("Success"),
            RunStatus::Termination => f.write_str("Termination"),
        }
    }
}

/// The envelope every node executor returns.
///
/// Only constructible through [`RunOutput::success`] and
/// [`RunOutput::termination`], so a `Success` always carries a value and a
/// `Termination` never does. Deserialization enforces the same rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRunOutput")]
pub struct RunOutput {
    status: RunStatus,
    output: Option<NodeInput>,
}

#[derive(Deserialize)]
struct RawRunOutput {
    status: RunStatus,
    #[serde(default)]
    output: Option<NodeInput>,
}

impl TryFrom<RawRunOutput> for RunOutput {
    type Error = String;

    fn try_from(raw: RawRunOutput) -> Result<Self, Self::Error> {
        match (raw.status, raw.output) {
            (RunStatus::Success, Some(output)) => Ok(RunOutput::success(output)),
            (RunStatus::Success, None) => Err("Success output must carry a value".to_string()),
            (RunStatus::Termination, None) => Ok(RunOutput::termination()),
            (RunStatus::Termination, Some(_)) => {
                Err("Termination output must not carry a value".to_string())
            }
        }
    }
}

impl RunOutput {
    pub fn success(output: impl Into<NodeInput>) -> Self {
        Self {
            status: RunStatus::Success,
            output: Some(output.into()),
        }
    }

    pub fn termination() -> Self {
        Self {
            status: RunStatus::Termination,
            output: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn output(&self) -> Option<&NodeInput> {
        self.output.as_ref()
    }

    pub fn into_output(self) -> Option<NodeInput> {
        self.output
    }
}
