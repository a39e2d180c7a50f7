//! Built-in structured-output validator.
//!
//! [`JsonSchemaValidator`] describes a target object as a list of typed
//! fields. It renders that description into prompt instructions, pulls a
//! JSON object out of the model's reply (raw, fenced, or embedded in prose)
//! and checks it field by field. Accepted output is re-serialized with only
//! the declared fields.

use crate::error::Result;
use crate::structured::OutputValidator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The type of one schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// Any JSON object.
    Object,
    List(Box<FieldType>),
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        let raw = raw.trim();
        if let Some(inner) = raw.strip_suffix("[]") {
            return FieldType::try_from(inner.to_string()).map(|t| FieldType::List(Box::new(t)));
        }
        match raw {
            "string" => Ok(FieldType::String),
            "int" => Ok(FieldType::Int),
            "float" => Ok(FieldType::Float),
            "bool" => Ok(FieldType::Bool),
            "object" => Ok(FieldType::Object),
            other => Err(format!("unknown field type '{}'", other)),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Int => f.write_str("int"),
            FieldType::Float => f.write_str("float"),
            FieldType::Bool => f.write_str("bool"),
            FieldType::Object => f.write_str("object"),
            FieldType::List(inner) => write!(f, "{}[]", inner),
        }
    }
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::Object, Value::Object(_)) => true,
            (FieldType::List(inner), Value::Array(items)) => items.iter().all(|v| inner.accepts(v)),
            _ => false,
        }
    }
}

/// One field of the target object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// Optional fields may be absent or `null`.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// A named target object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSchema {
    pub target: String,
    pub fields: Vec<SchemaField>,
}

/// Validator for a [`StructuredSchema`].
#[derive(Debug, Clone)]
pub struct JsonSchemaValidator {
    schema: StructuredSchema,
}

impl JsonSchemaValidator {
    pub fn new(schema: StructuredSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &StructuredSchema {
        &self.schema
    }

    fn check(&self, object: &Map<String, Value>) -> std::result::Result<Map<String, Value>, String> {
        let mut accepted = Map::new();
        for field in &self.schema.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.optional => {
                    accepted.insert(field.name.clone(), Value::Null);
                }
                None => return Err(format!("missing required field '{}'", field.name)),
                Some(value) if field.kind.accepts(value) => {
                    accepted.insert(field.name.clone(), value.clone());
                }
                Some(value) => {
                    return Err(format!(
                        "field '{}' should be {} but was {}",
                        field.name, field.kind, value
                    ))
                }
            }
        }
        Ok(accepted)
    }
}

impl OutputValidator for JsonSchemaValidator {
    fn render_prompt(&self) -> Result<String> {
        let mut out = String::from("Answer in JSON using this schema:\n{\n");
        for field in &self.schema.fields {
            if let Some(ref desc) = field.description {
                out.push_str(&format!("  // {}\n", desc));
            }
            let suffix = if field.optional { " or null" } else { "" };
            out.push_str(&format!("  \"{}\": {}{},\n", field.name, field.kind, suffix));
        }
        out.push('}');
        Ok(out)
    }

    fn validate(&self, candidate: &str) -> std::result::Result<String, String> {
        let text = extract_json_object(candidate)
            .ok_or_else(|| format!("no JSON object found for {}", self.schema.target))?;
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let Value::Object(object) = value else {
            return Err(format!("expected a JSON object for {}", self.schema.target));
        };
        let accepted = self.check(&object)?;
        serde_json::to_string(&Value::Object(accepted)).map_err(|e| e.to_string())
    }
}

/// Locate the JSON object in a model reply: the whole reply, a fenced
/// ```` ```json ```` block, or the first balanced `{...}` span.
fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && serde_json::from_str::<Value>(trimmed).is_ok() {
        return Some(trimmed);
    }
    if let Some(block) = fenced_block(trimmed) {
        return Some(block);
    }
    balanced_object(trimmed)
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}
