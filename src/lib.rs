//! # Pipeline Engine
//!
//! Node executors for LLM data-flow pipelines.
//!
//! A pipeline is a graph of typed nodes: inputs, LLM calls, routers,
//! condition gates, code transforms, JSON extractors and semantic search.
//! This crate implements what runs *inside* each node. Scheduling the graph
//! (deciding which node runs next and wiring outputs to inputs) belongs to
//! the caller.
//!
//! ## Core Concepts
//!
//! - **[`Node`]**: object-safe trait every node kind implements. Takes
//!   named [`NodeInputs`], returns a [`RunOutput`] (`Success` with a value,
//!   or `Termination` for a closed branch) or a [`NodeRunError`].
//! - **[`ExecCtx`]**: per-run context (HTTP client with timeout,
//!   credential [`Environment`], search endpoint, optional event handler).
//! - **[`ChatProvider`]**: one chat-completion contract over the OpenAI and
//!   Anthropic wire formats.
//! - **[`StructuredOutput`]**: validate a completion and repair it by
//!   replaying the validation error to the model.
//! - **[`Pipeline`]**: builds nodes from a serialized [`PipelineSpec`] and
//!   runs them by name.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pipeline_engine::{ExecCtx, NodeInputs, Pipeline, PipelineSpec, Toolbox};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = PipelineSpec::from_json_str(r#"{"nodes": [
//!         {"name": "summarize", "node_type": "LLM", "provider": "openai",
//!          "model": "gpt-4o-mini", "prompt": "Summarize: {{text}}", "inputs": ["text"]}
//!     ]}"#)?;
//!     let pipeline = Pipeline::from_spec(&spec, &Toolbox::with_default_providers())?;
//!
//!     let ctx = ExecCtx::builder()
//!         .credential("OPENAI_API_KEY", std::env::var("OPENAI_API_KEY")?)
//!         .build()?;
//!     let out = pipeline
//!         .run("summarize", NodeInputs::new().with("text", "..."), &ctx)
//!         .await?;
//!     println!("{:?}", out.output());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod node;
pub mod nodes;
pub mod pipeline;
pub mod schema;
pub mod structured;
pub mod template;
pub mod types;

pub use backend::{
    AnthropicProvider, ChatChoice, ChatCompletion, ChatProvider, ChatUsage, MockProvider,
    OpenAiProvider, ProviderRegistry,
};
pub use error::{NodeRunError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use exec_ctx::{Environment, ExecCtx, ExecCtxBuilder};
pub use node::{run_node, BoxFut, Node, NodeInputs};
pub use nodes::{NodeConfig, NodeDefinition};
pub use pipeline::{Pipeline, PipelineSpec, Toolbox};
pub use schema::{JsonSchemaValidator, StructuredSchema};
pub use structured::{OutputValidator, StructuredOutput};
pub use types::{
    ChatMessage, ConditionedValue, ContentPart, MessageContent, NodeInput, Role, RunOutput,
    RunStatus,
};
