//! Sandboxed transform nodes.
//!
//! Inputs cross into the transform as plain JSON data and the result
//! crosses back the same way:
//!
//! | `NodeInput`             | plain data                          |
//! |-------------------------|-------------------------------------|
//! | text                    | string                              |
//! | list of text            | array of strings                    |
//! | list of chat messages   | array of `{"role", "content"}`      |
//! | conditioned value       | `{"condition", "value"}`, value coerced |

use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, Node, NodeInputs};
use crate::types::{ChatMessage, NodeInput, RunOutput};
use serde_json::{json, Value};
use std::sync::Arc;

/// A registered transform: positional plain-data arguments in, plain data out.
pub type CodeFn = Arc<dyn Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync>;

/// Runs a [`CodeFn`] over the node's declared inputs, in declaration order.
#[derive(Clone)]
pub struct CodeNode {
    name: String,
    fn_name: String,
    fn_inputs: Vec<String>,
    func: CodeFn,
}

impl std::fmt::Debug for CodeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeNode")
            .field("name", &self.name)
            .field("fn_name", &self.fn_name)
            .field("fn_inputs", &self.fn_inputs)
            .finish()
    }
}

impl CodeNode {
    pub fn new(
        name: impl Into<String>,
        fn_name: impl Into<String>,
        fn_inputs: Vec<String>,
        func: CodeFn,
    ) -> Self {
        Self {
            name: name.into(),
            fn_name: fn_name.into(),
            fn_inputs,
            func,
        }
    }

    fn execute(&self, mut inputs: NodeInputs) -> Result<RunOutput> {
        let args = self
            .fn_inputs
            .iter()
            .map(|input| inputs.take(&self.name, input).and_then(|v| to_plain(&v)))
            .collect::<Result<Vec<_>>>()?;

        let result = (self.func)(args).map_err(|e| NodeRunError::Code {
            node: self.name.clone(),
            message: format!("{:#}", e),
        })?;

        match from_plain(result) {
            Ok(output) => Ok(RunOutput::success(output)),
            Err(rejected) => Err(NodeRunError::UnsupportedOutput {
                node: self.name.clone(),
                found: plain_type_name(&rejected).to_string(),
            }),
        }
    }
}

impl Node for CodeNode {
    fn kind(&self) -> &'static str {
        "Code"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, _ctx: &'a ExecCtx, inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>> {
        Box::pin(async move { self.execute(inputs) })
    }
}

/// Coerce a node input into the plain data a transform receives.
pub fn to_plain(input: &NodeInput) -> Result<Value> {
    match input {
        NodeInput::Text(text) => Ok(Value::String(text.clone())),
        NodeInput::TextList(items) => Ok(Value::Array(
            items.iter().cloned().map(Value::String).collect(),
        )),
        NodeInput::Messages(messages) => Ok(serde_json::to_value(messages)?),
        NodeInput::Conditioned(cv) => Ok(json!({
            "condition": cv.condition,
            "value": to_plain(&cv.value)?,
        })),
    }
}

/// Coerce a transform's result back into a node value, handing the value
/// back unchanged when it has no node representation.
pub fn from_plain(value: Value) -> std::result::Result<NodeInput, Value> {
    match value {
        Value::String(text) => Ok(NodeInput::Text(text)),
        Value::Array(items) => {
            if items.iter().all(Value::is_string) {
                return Ok(NodeInput::TextList(
                    items
                        .into_iter()
                        .filter_map(|v| match v {
                            Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                ));
            }
            let items = Value::Array(items);
            match serde_json::from_value::<Vec<ChatMessage>>(items.clone()) {
                Ok(messages) => Ok(NodeInput::Messages(messages)),
                Err(_) => Err(items),
            }
        }
        other => Err(other),
    }
}

fn plain_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConditionedValue, Role};

    fn node<F>(fn_inputs: &[&str], func: F) -> CodeNode
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        CodeNode::new(
            "transform",
            "f",
            fn_inputs.iter().map(|s| s.to_string()).collect(),
            Arc::new(func),
        )
    }

    #[test]
    fn test_to_plain_shapes() {
        assert_eq!(to_plain(&"a".into()).unwrap(), json!("a"));
        assert_eq!(
            to_plain(&vec!["a".to_string(), "b".to_string()].into()).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            to_plain(&vec![ChatMessage::user("hi")].into()).unwrap(),
            json!([{"role": "user", "content": "hi"}])
        );
        let cv = ConditionedValue::new("X", vec!["a".to_string()].into());
        assert_eq!(
            to_plain(&cv.into()).unwrap(),
            json!({"condition": "X", "value": ["a"]})
        );
    }

    #[test]
    fn test_from_plain_shapes() {
        assert_eq!(from_plain(json!("a")).unwrap(), NodeInput::Text("a".into()));
        assert_eq!(
            from_plain(json!(["a", "b"])).unwrap(),
            NodeInput::TextList(vec!["a".into(), "b".into()])
        );
        let NodeInput::Messages(messages) =
            from_plain(json!([{"role": "assistant", "content": "done"}])).unwrap()
        else {
            panic!("expected messages");
        };
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(from_plain(json!(42)).unwrap_err(), json!(42));
        assert!(from_plain(json!([1, 2])).is_err());
    }

    #[test]
    fn test_execute_passes_args_in_declared_order() {
        let n = node(
            &["b", "a"],
            |args| {
                let joined: String = args.iter().filter_map(Value::as_str).collect();
                Ok(json!(joined))
            },
        );
        let inputs = NodeInputs::new().with("a", "1").with("b", "2");
        assert_eq!(n.execute(inputs).unwrap(), RunOutput::success("21"));
    }

    #[test]
    fn test_message_list_round_trips_through_transform() {
        let n = node(&["messages"], |mut args| Ok(args.remove(0)));
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let out = n
            .execute(NodeInputs::new().with("messages", messages.clone()))
            .unwrap();
        assert_eq!(out.into_output(), Some(NodeInput::Messages(messages)));
    }

    #[test]
    fn test_unsupported_result_shape() {
        let n = node(&[], |_| Ok(json!({"k": 1})));
        let err = n.execute(NodeInputs::new()).unwrap_err();
        assert!(matches!(err, NodeRunError::UnsupportedOutput { ref found, .. } if found == "object"));
    }

    #[test]
    fn test_transform_failure_is_code_error() {
        let n = node(&[], |_| Err(anyhow::anyhow!("division by zero")));
        let err = n.execute(NodeInputs::new()).unwrap_err();
        assert!(matches!(err, NodeRunError::Code { ref message, .. } if message == "division by zero"));
    }

    #[test]
    fn test_missing_declared_input() {
        let n = node(&["x"], |_| Ok(json!("")));
        assert!(matches!(
            n.execute(NodeInputs::new()),
            Err(NodeRunError::MissingInput { .. })
        ));
    }
}
