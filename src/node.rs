//! The node execution contract.
//!
//! Every node kind implements [`Node`]: it receives its declared inputs,
//! already resolved by the orchestrator, and returns a
//! [`RunOutput`](crate::types::RunOutput) or a
//! [`NodeRunError`](crate::error::NodeRunError). The orchestrator never needs
//! to know which kind of node it is calling.

use crate::error::{NodeRunError, Result};
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::types::{NodeInput, RunOutput};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// A boxed, pinned, Send future -- the return type of [`Node::run`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for executable nodes.
///
/// Stored as `Box<dyn Node>` in a [`Pipeline`](crate::pipeline::Pipeline).
pub trait Node: Send + Sync {
    /// Node kind tag (e.g. `"LLM"`, `"Router"`).
    fn kind(&self) -> &'static str;

    /// Instance name.
    fn name(&self) -> &str;

    /// Execute the node.
    fn run<'a>(&'a self, ctx: &'a ExecCtx, inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>>;
}

/// Named input values for one node invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInputs {
    values: HashMap<String, NodeInput>,
}

impl NodeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an input (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<NodeInput>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<NodeInput>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&NodeInput> {
        self.values.get(name)
    }

    /// Remove and return an input the node declared.
    pub fn take(&mut self, node: &str, name: &str) -> Result<NodeInput> {
        self.values
            .remove(name)
            .ok_or_else(|| NodeRunError::MissingInput {
                node: node.to_string(),
                input: name.to_string(),
            })
    }

    /// Remove and return an input that must be text.
    pub fn take_text(&mut self, node: &str, name: &str) -> Result<String> {
        match self.take(node, name)? {
            NodeInput::Text(text) => Ok(text),
            other => Err(NodeRunError::UnsupportedInput {
                node: node.to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, NodeInput)> for NodeInputs {
    fn from_iter<I: IntoIterator<Item = (K, NodeInput)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Run a node with lifecycle events and a tracing record around it.
pub async fn run_node(node: &dyn Node, ctx: &ExecCtx, inputs: NodeInputs) -> Result<RunOutput> {
    debug!(node = node.name(), kind = node.kind(), inputs = inputs.len(), "running node");
    emit(
        &ctx.event_handler,
        Event::NodeStart {
            name: node.name().to_string(),
            kind: node.kind(),
        },
    );

    let result = node.run(ctx, inputs).await;

    emit(
        &ctx.event_handler,
        Event::NodeEnd {
            name: node.name().to_string(),
            status: result.as_ref().ok().map(|out| out.status()),
        },
    );
    if let Err(ref e) = result {
        debug!(node = node.name(), error = %e, "node failed");
    }
    result
}
