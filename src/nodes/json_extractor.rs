//! Render a template against a JSON document.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, Node, NodeInputs};
use crate::template::{self, JsonTemplate};
use crate::types::RunOutput;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct JsonExtractorNode {
    name: String,
    template: JsonTemplate,
}

impl JsonExtractorNode {
    /// The builder's `{{json key}}` placeholder dialect is normalized to
    /// `{{key}}` here, once. Fails with `InvalidConfig` on unbalanced
    /// sections.
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            template: JsonTemplate::parse(&template::strip_json_keyword(template))?,
        })
    }

    fn extract(&self, input: &str) -> Result<RunOutput> {
        let data: Value = serde_json::from_str(input)?;
        Ok(RunOutput::success(self.template.render(&data)))
    }
}

impl Node for JsonExtractorNode {
    fn kind(&self) -> &'static str {
        "JsonExtractor"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, _ctx: &'a ExecCtx, mut inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>> {
        Box::pin(async move {
            let input = inputs.take_text(&self.name, "input")?;
            self.extract(&input)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeRunError;

    #[test]
    fn test_renders_named_field() {
        let node = JsonExtractorNode::new("ex", "Name: {{name}}").unwrap();
        let out = node.extract(r#"{"name":"Ann"}"#).unwrap();
        assert_eq!(out, RunOutput::success("Name: Ann"));
    }

    #[test]
    fn test_json_keyword_is_stripped() {
        let node = JsonExtractorNode::new("ex", "{{ json name}} is {{json  age}}").unwrap();
        let out = node.extract(r#"{"name":"Ann","age":31}"#).unwrap();
        assert_eq!(out, RunOutput::success("Ann is 31"));
    }

    #[test]
    fn test_nested_and_missing_keys() {
        let node = JsonExtractorNode::new("ex", "{{user.city}}|{{user.zip}}|{{tags}}").unwrap();
        let out = node
            .extract(r#"{"user":{"city":"Oslo"},"tags":["a","b"]}"#)
            .unwrap();
        assert_eq!(out, RunOutput::success(r#"Oslo||["a","b"]"#));
    }

    #[test]
    fn test_invalid_json_fails() {
        let node = JsonExtractorNode::new("ex", "{{name}}").unwrap();
        assert!(matches!(node.extract("not json"), Err(NodeRunError::Json(_))));
    }

    #[test]
    fn test_sections_and_triple_mustache() {
        let node = JsonExtractorNode::new(
            "ex",
            "{{{json title}}}\n{{#items}}- {{name}}: {{qty}}\n{{/items}}{{^notes}}no notes{{/notes}}",
        )
        .unwrap();
        let out = node
            .extract(r#"{"title":"Order <7>","items":[{"name":"pen","qty":2},{"name":"ink","qty":1}],"notes":[]}"#)
            .unwrap();
        assert_eq!(
            out,
            RunOutput::success("Order <7>\n- pen: 2\n- ink: 1\nno notes")
        );
    }

    #[test]
    fn test_unbalanced_template_is_rejected() {
        let result = JsonExtractorNode::new("ex", "{{#items}}{{name}}");
        assert!(matches!(result, Err(NodeRunError::InvalidConfig(_))));
    }
}
