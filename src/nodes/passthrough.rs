//! Graph-boundary nodes that forward their value unchanged.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, Node, NodeInputs};
use crate::types::RunOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Input,
    Output,
}

impl Boundary {
    fn kind(self) -> &'static str {
        match self {
            Boundary::Input => "Input",
            Boundary::Output => "Output",
        }
    }

    /// Name of the single value the node reads.
    fn input_name(self) -> &'static str {
        match self {
            Boundary::Input => "input",
            Boundary::Output => "output",
        }
    }
}

/// Input and Output nodes.
///
/// The orchestrator normally feeds graph inputs straight to downstream nodes,
/// so an Input node does no work of its own; invoking either kind returns
/// its single value as `Success`.
#[derive(Debug, Clone)]
pub struct PassthroughNode {
    name: String,
    boundary: Boundary,
}

impl PassthroughNode {
    /// An Input node reading the value named `input`.
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boundary: Boundary::Input,
        }
    }

    /// An Output node reading the value named `output`.
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boundary: Boundary::Output,
        }
    }
}

impl Node for PassthroughNode {
    fn kind(&self) -> &'static str {
        self.boundary.kind()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, _ctx: &'a ExecCtx, mut inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>> {
        Box::pin(async move {
            let value = inputs.take(&self.name, self.boundary.input_name())?;
            Ok(RunOutput::success(value))
        })
    }
}
