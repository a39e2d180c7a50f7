use httpmock::prelude::*;
use pipeline_engine::backend::anthropic::ANTHROPIC_API_KEY_VAR;
use pipeline_engine::{
    AnthropicProvider, ChatMessage, Event, ExecCtx, FnEventHandler, MockProvider, NodeInput,
    NodeInputs, NodeRunError, Pipeline, PipelineSpec, RunStatus, Toolbox,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

const SUPPORT_PIPELINE: &str = r#"{
  "nodes": [
    {"name": "ticket", "node_type": "Input"},
    {"name": "triage", "node_type": "LLM", "provider": "anthropic", "model": "claude-3-haiku",
     "prompt": "Label this ticket as billing or other: {{ticket}}", "inputs": ["ticket"]},
    {"name": "route", "node_type": "Router", "routes": ["billing", "other"], "has_default_route": true},
    {"name": "billing_only", "node_type": "Condition", "condition": "billing"},
    {"name": "extract", "node_type": "LLM", "provider": "scripted", "model": "m",
     "prompt": "Extract the invoice from: {{ticket}}", "inputs": ["ticket"],
     "structured_output": {
       "schema": {"target": "Invoice", "fields": [
         {"name": "invoice_id", "type": "string"},
         {"name": "amount", "type": "float"}
       ]},
       "max_retries": 1
     }},
    {"name": "summary", "node_type": "JsonExtractor", "template": "Invoice {{json invoice_id}}: {{amount}}"},
    {"name": "answer", "node_type": "Output"}
  ]
}"#;

#[tokio::test]
async fn support_pipeline_runs_node_by_node() {
    let server = MockServer::start();
    let triage = server.mock(|when, then| {
        when.method(POST).path("/v1/messages").json_body(json!({
            "model": "claude-3-haiku",
            "max_tokens": 4096,
            "messages": [{
                "role": "user",
                "content": "Label this ticket as billing or other: I was charged twice"
            }]
        }));
        then.status(200).json_body(json!({
            "content": [{"type": "text", "text": "billing"}],
            "usage": {"input_tokens": 14, "output_tokens": 1}
        }));
    });

    let scripted = Arc::new(MockProvider::new(vec![
        "The invoice is INV-7".to_string(),
        "{\"invoice_id\": \"INV-7\", \"amount\": 19.5}".to_string(),
    ]));
    let toolbox = Toolbox::new()
        .provider_named(
            "anthropic",
            Arc::new(AnthropicProvider::new().with_base_url(server.url(""))),
        )
        .provider_named("scripted", scripted.clone());
    let spec = PipelineSpec::from_json_str(SUPPORT_PIPELINE).expect("spec");
    let pipeline = Pipeline::from_spec(&spec, &toolbox).expect("pipeline");

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let ctx = ExecCtx::builder()
        .credential(ANTHROPIC_API_KEY_VAR, "ak-test")
        .event_handler(Arc::new(FnEventHandler(move |e: Event| {
            if let Event::ValidationRetry { name, attempt, .. } = e {
                sink.lock().unwrap().push(format!("{name}:{attempt}"));
            }
        })))
        .build()
        .expect("ctx");

    let ticket = "I was charged twice";
    let input = pipeline
        .run("ticket", NodeInputs::new().with("input", ticket), &ctx)
        .await
        .expect("input");
    assert_eq!(input.output().and_then(NodeInput::as_text), Some(ticket));

    let label = pipeline
        .run("triage", NodeInputs::new().with("ticket", ticket), &ctx)
        .await
        .expect("triage")
        .into_output()
        .expect("label");
    triage.assert();

    let routed = pipeline
        .run(
            "route",
            NodeInputs::new().with("condition", label).with("input", ticket),
            &ctx,
        )
        .await
        .expect("route");
    let gated = pipeline
        .run(
            "billing_only",
            NodeInputs::new().with("input", routed.into_output().expect("routed")),
            &ctx,
        )
        .await
        .expect("gate");
    assert_eq!(gated.status(), RunStatus::Success);

    let invoice = pipeline
        .run("extract", NodeInputs::new().with("ticket", ticket), &ctx)
        .await
        .expect("extract")
        .into_output()
        .expect("invoice");
    assert_eq!(scripted.call_count(), 2);
    assert_eq!(*events.lock().unwrap(), vec!["extract:1".to_string()]);

    let summary = pipeline
        .run("summary", NodeInputs::new().with("input", invoice), &ctx)
        .await
        .expect("summary");
    let answer = pipeline
        .run(
            "answer",
            NodeInputs::new().with("output", summary.into_output().expect("summary")),
            &ctx,
        )
        .await
        .expect("answer");
    assert_eq!(
        answer.output().and_then(NodeInput::as_text),
        Some("Invoice INV-7: 19.5")
    );
}

#[tokio::test]
async fn other_branch_terminates_at_gate() {
    let toolbox = Toolbox::new()
        .provider_named("anthropic", Arc::new(MockProvider::fixed("other")))
        .provider_named("scripted", Arc::new(MockProvider::fixed("{}")));
    let pipeline = Pipeline::from_spec(
        &PipelineSpec::from_json_str(SUPPORT_PIPELINE).expect("spec"),
        &toolbox,
    )
    .expect("pipeline");
    let ctx = ExecCtx::builder().build().expect("ctx");

    let routed = pipeline
        .run(
            "route",
            NodeInputs::new().with("condition", "shipping").with("input", "where is it"),
            &ctx,
        )
        .await
        .expect("route");
    let gated = pipeline
        .run(
            "billing_only",
            NodeInputs::new().with("input", routed.into_output().expect("routed")),
            &ctx,
        )
        .await
        .expect("gate");
    assert_eq!(gated.status(), RunStatus::Termination);
    assert!(gated.output().is_none());
}

#[tokio::test]
async fn exhausted_validation_reports_last_output() {
    let scripted = Arc::new(MockProvider::fixed("no invoice here"));
    let toolbox = Toolbox::new()
        .provider_named("anthropic", Arc::new(MockProvider::fixed("billing")))
        .provider_named("scripted", scripted.clone());
    let pipeline = Pipeline::from_spec(
        &PipelineSpec::from_json_str(SUPPORT_PIPELINE).expect("spec"),
        &toolbox,
    )
    .expect("pipeline");
    let ctx = ExecCtx::builder().build().expect("ctx");

    let err = pipeline
        .run("extract", NodeInputs::new().with("ticket", "hi"), &ctx)
        .await
        .unwrap_err();

    assert_eq!(scripted.call_count(), 2);
    let message = err.to_string();
    assert!(matches!(err, NodeRunError::ValidationExhausted { max_retries: 1, .. }));
    assert!(message.starts_with("Json schema validation failed after 1 retries."));
    assert!(message.contains("Last attempt's output:\nno invoice here."));

    let last_call = scripted.calls().pop().expect("calls");
    assert_eq!(last_call.len(), 3);
    assert_eq!(last_call[1], ChatMessage::assistant("no invoice here"));
}
