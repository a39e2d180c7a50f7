//! Example: loading a pipeline and running its nodes against MockProvider.
//!
//! Run with: `RUST_LOG=pipeline_engine=debug cargo run --example mock_pipeline`

use pipeline_engine::{
    Event, ExecCtx, FnEventHandler, MockProvider, NodeInputs, Pipeline, PipelineSpec, Toolbox,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const PIPELINE: &str = r#"{
  "nodes": [
    {"name": "profile", "node_type": "LLM", "provider": "mock", "model": "demo",
     "prompt": "Describe {{person}} as JSON.", "inputs": ["person"],
     "structured_output": {
       "schema": {"target": "Profile", "fields": [
         {"name": "name", "type": "string"},
         {"name": "languages", "type": "string[]"}
       ]},
       "max_retries": 2
     }},
    {"name": "languages", "node_type": "Code", "fn_name": "count_languages", "fn_inputs": ["profile"]},
    {"name": "card", "node_type": "JsonExtractor", "template": "{{name}} speaks {{languages.0}}"}
  ]
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pipeline_engine=debug,warn")),
        )
        .with_target(false)
        .init();

    // First reply fails validation, the second is accepted
    let mock = MockProvider::new(vec![
        "Ada Lovelace, who wrote in English and French.".to_string(),
        r#"{"name": "Ada Lovelace", "languages": ["English", "French"]}"#.to_string(),
    ]);

    let toolbox = Toolbox::new()
        .provider_named("mock", Arc::new(mock))
        .function_named("count_languages", |args| {
            let profile: Value = match args.first().and_then(Value::as_str) {
                Some(text) => serde_json::from_str(text)?,
                None => anyhow::bail!("expected profile text"),
            };
            let count = profile["languages"].as_array().map_or(0, Vec::len);
            Ok(json!(format!("{} languages", count)))
        });

    let spec = PipelineSpec::from_json_str(PIPELINE)?;
    let pipeline = Pipeline::from_spec(&spec, &toolbox)?;

    let ctx = ExecCtx::builder()
        .event_handler(Arc::new(FnEventHandler(|e: Event| {
            if let Event::ValidationRetry { name, attempt, reason } = e {
                println!("[{}] retry {}: {}", name, attempt, reason);
            }
        })))
        .build()?;

    let profile = pipeline
        .run("profile", NodeInputs::new().with("person", "Ada Lovelace"), &ctx)
        .await?
        .into_output()
        .ok_or("profile produced no output")?;
    println!("Profile: {:?}", profile);

    let count = pipeline
        .run("languages", NodeInputs::new().with("profile", profile.clone()), &ctx)
        .await?;
    println!("Count: {:?}", count.output());

    let card = pipeline
        .run("card", NodeInputs::new().with("input", profile), &ctx)
        .await?;
    println!("Card: {:?}", card.output());

    Ok(())
}
