//! Node kinds and their configuration records.
//!
//! A [`NodeDefinition`] is the serialized form of one node: its name plus a
//! [`NodeConfig`] tagged by `node_type`. [`NodeDefinition::build`] resolves
//! named providers and code functions through a [`Toolbox`] and returns the
//! executable node.
//!
//! ```
//! use pipeline_engine::nodes::{NodeConfig, NodeDefinition};
//!
//! let def: NodeDefinition = serde_json::from_str(
//!     r#"{"name": "gate", "node_type": "Condition", "condition": "yes"}"#,
//! ).unwrap();
//! assert!(matches!(def.config, NodeConfig::Condition { .. }));
//! ```

pub mod code;
pub mod condition;
pub mod json_extractor;
pub mod llm;
pub mod passthrough;
pub mod router;
pub mod semantic_search;

pub use code::{CodeFn, CodeNode};
pub use condition::ConditionNode;
pub use json_extractor::JsonExtractorNode;
pub use llm::LlmNode;
pub use passthrough::PassthroughNode;
pub use router::RouterNode;
pub use semantic_search::SemanticSearchNode;

use crate::error::Result;
use crate::node::Node;
use crate::pipeline::Toolbox;
use crate::schema::{JsonSchemaValidator, StructuredSchema};
use crate::structured::StructuredOutput;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

fn default_max_retries() -> u32 {
    3
}

/// Structured-output settings as written in a pipeline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutputConfig {
    pub schema: StructuredSchema,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Per-kind configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type")]
pub enum NodeConfig {
    Input,
    Output,
    Condition {
        condition: String,
    },
    Router {
        routes: Vec<String>,
        #[serde(default)]
        has_default_route: bool,
    },
    Code {
        fn_name: String,
        #[serde(default)]
        fn_inputs: Vec<String>,
    },
    JsonExtractor {
        template: String,
    },
    SemanticSearch {
        limit: u32,
        threshold: f64,
        #[serde(default)]
        datasource_ids: Vec<String>,
        template: String,
    },
    #[serde(rename = "LLM")]
    Llm {
        prompt: String,
        model: String,
        provider: String,
        /// Declared inputs; all but `chat_messages` are prompt variables.
        #[serde(default)]
        inputs: Vec<String>,
        #[serde(default)]
        model_params: Option<Map<String, Value>>,
        #[serde(default)]
        structured_output: Option<StructuredOutputConfig>,
    },
}

/// One node as it appears in a pipeline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    #[serde(flatten)]
    pub config: NodeConfig,
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Build the executable node.
    ///
    /// Fails with `UnknownProvider` / `UnknownFunction` when the toolbox has
    /// no entry for a name the configuration refers to.
    pub fn build(&self, toolbox: &Toolbox) -> Result<Box<dyn Node>> {
        let name = self.name.clone();
        let node: Box<dyn Node> = match self.config {
            NodeConfig::Input => Box::new(PassthroughNode::input(name)),
            NodeConfig::Output => Box::new(PassthroughNode::output(name)),
            NodeConfig::Condition { ref condition } => {
                Box::new(ConditionNode::new(name, condition.clone()))
            }
            NodeConfig::Router {
                ref routes,
                has_default_route,
            } => Box::new(RouterNode::new(name, routes.clone(), has_default_route)),
            NodeConfig::Code {
                ref fn_name,
                ref fn_inputs,
            } => Box::new(CodeNode::new(
                name,
                fn_name.clone(),
                fn_inputs.clone(),
                toolbox.function(fn_name)?,
            )),
            NodeConfig::JsonExtractor { ref template } => {
                Box::new(JsonExtractorNode::new(name, template)?)
            }
            NodeConfig::SemanticSearch {
                limit,
                threshold,
                ref datasource_ids,
                ref template,
            } => Box::new(SemanticSearchNode::new(
                name,
                limit,
                threshold,
                datasource_ids.clone(),
                template.clone(),
            )),
            NodeConfig::Llm {
                ref prompt,
                ref model,
                ref provider,
                ref inputs,
                ref model_params,
                ref structured_output,
            } => {
                let provider = toolbox.provider(provider)?;
                let mut node = LlmNode::new(name, provider, model.clone(), prompt.clone())
                    .with_inputs(inputs.clone())
                    .with_params(model_params.clone().unwrap_or_default());
                if let Some(ref so) = structured_output {
                    node = node.with_structured_output(StructuredOutput {
                        validator: Arc::new(JsonSchemaValidator::new(so.schema.clone())),
                        max_retries: so.max_retries,
                    });
                }
                Box::new(node)
            }
        };
        Ok(node)
    }
}
