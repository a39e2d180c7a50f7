//! Branch gate: forward a conditioned value or terminate the branch.

use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, Node, NodeInputs};
use crate::types::{NodeInput, RunOutput};

/// Passes `value` through when the incoming label matches, otherwise
/// returns `Termination`.
#[derive(Debug, Clone)]
pub struct ConditionNode {
    name: String,
    condition: String,
}

impl ConditionNode {
    pub fn new(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
        }
    }

    fn evaluate(&self, input: NodeInput) -> Result<RunOutput> {
        match input {
            NodeInput::Conditioned(cv) if cv.condition == self.condition => {
                Ok(RunOutput::success(*cv.value))
            }
            NodeInput::Conditioned(_) => Ok(RunOutput::termination()),
            other => Err(NodeRunError::UnsupportedInput {
                node: self.name.clone(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

impl Node for ConditionNode {
    fn kind(&self) -> &'static str {
        "Condition"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, _ctx: &'a ExecCtx, mut inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>> {
        Box::pin(async move {
            let input = inputs.take(&self.name, "input")?;
            self.evaluate(input)
        })
    }
}
