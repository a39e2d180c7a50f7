//! Loading pipeline definitions into executable nodes.
//!
//! A [`PipelineSpec`] is the serialized node list (JSON, or YAML with the
//! `yaml` feature). [`Pipeline::from_spec`] builds every node up front, so a
//! reference to an unregistered provider or code function fails at load
//! time rather than mid-run. Scheduling is left to the caller: it runs
//! nodes by name with [`Pipeline::run`], feeding each node the outputs it
//! has collected.

use crate::backend::{ChatProvider, ProviderRegistry};
use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::node::{run_node, Node, NodeInputs};
use crate::nodes::{CodeFn, NodeDefinition};
use crate::types::RunOutput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Named providers and code functions available to node definitions.
#[derive(Clone, Default)]
pub struct Toolbox {
    providers: ProviderRegistry,
    functions: HashMap<String, CodeFn>,
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("providers", &self.providers)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Toolbox {
    /// An empty toolbox: no providers, no functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// A toolbox with the `openai` and `anthropic` providers registered.
    pub fn with_default_providers() -> Self {
        Self {
            providers: ProviderRegistry::with_defaults(),
            functions: HashMap::new(),
        }
    }

    /// Register (or replace) a provider under `name`.
    pub fn provider_named(mut self, name: impl Into<String>, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers = self.providers.register(name, provider);
        self
    }

    /// Register (or replace) a code function under `name`.
    pub fn function_named<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(func));
        self
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn ChatProvider>> {
        self.providers.get(name)
    }

    pub fn function(&self, name: &str) -> Result<CodeFn> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| NodeRunError::UnknownFunction(name.to_string()))
    }
}

/// Serialized pipeline: an ordered list of node definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub nodes: Vec<NodeDefinition>,
}

impl PipelineSpec {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| NodeRunError::InvalidConfig(e.to_string()))
    }
}

/// A set of built nodes addressable by name.
pub struct Pipeline {
    nodes: Vec<Box<dyn Node>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "nodes",
                &self
                    .nodes
                    .iter()
                    .map(|n| format!("{} ({})", n.name(), n.kind()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Pipeline {
    /// Build every node in `spec`. Node names must be unique.
    pub fn from_spec(spec: &PipelineSpec, toolbox: &Toolbox) -> Result<Self> {
        let mut nodes = Vec::with_capacity(spec.nodes.len());
        let mut index = HashMap::new();
        for def in &spec.nodes {
            if index.insert(def.name.clone(), nodes.len()).is_some() {
                return Err(NodeRunError::InvalidConfig(format!(
                    "duplicate node name '{}'",
                    def.name
                )));
            }
            nodes.push(def.build(toolbox)?);
        }
        Ok(Self { nodes, index })
    }

    pub fn node(&self, name: &str) -> Option<&dyn Node> {
        self.index.get(name).map(|&i| self.nodes[i].as_ref())
    }

    /// Node names in definition order.
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    /// Run the node called `name`.
    pub async fn run(&self, name: &str, inputs: NodeInputs, ctx: &ExecCtx) -> Result<RunOutput> {
        let node = self
            .node(name)
            .ok_or_else(|| NodeRunError::InvalidConfig(format!("no node named '{}'", name)))?;
        run_node(node, ctx, inputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockProvider;
    use crate::types::{ConditionedValue, NodeInput};
    use serde_json::json;

    const SPEC: &str = r#"{
        "nodes": [
            {"name": "ask", "node_type": "LLM", "provider": "mock", "model": "m",
             "prompt": "Classify: {{text}}", "inputs": ["text"]},
            {"name": "route", "node_type": "Router", "routes": ["spam", "ham"],
             "has_default_route": true},
            {"name": "keep", "node_type": "Condition", "condition": "ham"},
            {"name": "shout", "node_type": "Code", "fn_name": "upper", "fn_inputs": ["value"]}
        ]
    }"#;

    fn toolbox() -> Toolbox {
        Toolbox::new()
            .provider_named("mock", Arc::new(MockProvider::fixed("ham")))
            .function_named("upper", |args| {
                let text = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(json!(text.to_uppercase()))
            })
    }

    #[tokio::test]
    async fn test_nodes_run_by_name() {
        let spec = PipelineSpec::from_json_str(SPEC).unwrap();
        let pipeline = Pipeline::from_spec(&spec, &toolbox()).unwrap();
        let ctx = ExecCtx::builder().build().unwrap();
        assert_eq!(pipeline.node_names(), vec!["ask", "route", "keep", "shout"]);

        let label = pipeline
            .run("ask", NodeInputs::new().with("text", "hello"), &ctx)
            .await
            .unwrap()
            .into_output()
            .unwrap();
        let routed = pipeline
            .run(
                "route",
                NodeInputs::new().with("condition", label).with("input", "hello"),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            routed,
            RunOutput::success(ConditionedValue::new("ham", "hello".into()))
        );

        let kept = pipeline
            .run(
                "keep",
                NodeInputs::new().with("input", routed.into_output().unwrap()),
                &ctx,
            )
            .await
            .unwrap();
        let shouted = pipeline
            .run(
                "shout",
                NodeInputs::new().with("value", kept.into_output().unwrap()),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(shouted.into_output(), Some(NodeInput::Text("HELLO".into())));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let spec = PipelineSpec::from_json_str(
            r#"{"nodes": [{"name": "a", "node_type": "Input"}, {"name": "a", "node_type": "Output"}]}"#,
        )
        .unwrap();
        let err = Pipeline::from_spec(&spec, &Toolbox::new()).unwrap_err();
        assert!(matches!(err, NodeRunError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_provider_fails_at_load() {
        let spec = PipelineSpec::from_json_str(SPEC).unwrap();
        let err = Pipeline::from_spec(&spec, &Toolbox::with_default_providers()).unwrap_err();
        assert!(matches!(err, NodeRunError::UnknownProvider(ref p) if p == "mock"));
    }

    #[tokio::test]
    async fn test_run_unknown_node() {
        let pipeline = Pipeline::from_spec(&PipelineSpec { nodes: vec![] }, &Toolbox::new()).unwrap();
        let ctx = ExecCtx::builder().build().unwrap();
        assert!(pipeline.run("nope", NodeInputs::new(), &ctx).await.is_err());
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_yaml_spec() {
        let yaml = r#"
nodes:
  - name: gate
    node_type: Condition
    condition: "yes"
  - name: r
    node_type: Router
    routes: [a, b]
"#;
        let spec = PipelineSpec::from_yaml_str(yaml).unwrap();
        assert_eq!(spec.nodes.len(), 2);
    }
}
