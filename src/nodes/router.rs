//! Route a value by label.

use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, Node, NodeInputs};
use crate::types::{ConditionedValue, NodeInput, RunOutput};

/// Tags `input` with the first route equal to `condition`.
///
/// A condition that is not text matches no route. When nothing matches and `has_default_route` is set, the value is tagged
/// with the last configured route; pipelines built with a default route list
/// it last and downstream Condition nodes match on that label.
#[derive(Debug, Clone)]
pub struct RouterNode {
    name: String,
    routes: Vec<String>,
    has_default_route: bool,
}

impl RouterNode {
    pub fn new(name: impl Into<String>, routes: Vec<String>, has_default_route: bool) -> Self {
        Self {
            name: name.into(),
            routes,
            has_default_route,
        }
    }

    fn route(&self, condition: &NodeInput, input: NodeInput) -> Result<RunOutput> {
        let label = condition.as_text();
        let chosen = self
            .routes
            .iter()
            .find(|r| Some(r.as_str()) == label)
            .or_else(|| {
                if self.has_default_route {
                    self.routes.last()
                } else {
                    None
                }
            })
            .ok_or_else(|| NodeRunError::NoRoute {
                condition: label.map_or_else(|| condition.type_name().to_string(), str::to_string),
            })?;
        Ok(RunOutput::success(ConditionedValue::new(chosen.clone(), input)))
    }
}

impl Node for RouterNode {
    fn kind(&self) -> &'static str {
        "Router"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, _ctx: &'a ExecCtx, mut inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>> {
        Box::pin(async move {
            let condition = inputs.take(&self.name, "condition")?;
            let input = inputs.take(&self.name, "input")?;
            self.route(&condition, input)
        })
    }
}
