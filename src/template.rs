//! Template rendering.
//!
//! [`render`] substitutes literal `{{key}}` placeholders and is used for
//! prompts and search results. [`JsonTemplate`] is the mustache dialect
//! used by JSON extraction.
//!
//! Placeholder rendering is a single left-to-right pass over the template: each
//! placeholder is resolved against the original template text, and
//! substituted values are never rescanned. The result therefore does not
//! depend on the iteration order of the variables, even when one key is a
//! prefix of another or a value itself contains `{{...}}`.

use crate::error::{NodeRunError, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"))
}

fn json_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*json\s+").expect("json keyword pattern is valid"))
}

/// Replace every literal `{{key}}` with its value from `vars`.
///
/// Keys match exactly (no whitespace trimming). Placeholders whose key is
/// not in `vars` are left untouched.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use pipeline_engine::template::render;
///
/// let vars = HashMap::from([("name".to_string(), "Ann".to_string())]);
/// assert_eq!(render("Hi {{name}}, {{other}}", &vars), "Hi Ann, {{other}}");
/// ```
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Remove the builder's `json` keyword from placeholders: `{{ json name}}`
/// becomes `{{name}}`.
pub fn strip_json_keyword(template: &str) -> String {
    json_keyword_re().replace_all(template, "{{").into_owned()
}

/// A logic-less template rendered against a JSON document.
///
/// Tags follow mustache: `{{name}}`, `{{{name}}}` and `{{&name}}` insert a
/// value, `{{#name}}...{{/name}}` opens a section, `{{^name}}...{{/name}}`
/// an inverted section and `{{! ...}}` is a comment. Nothing is HTML
/// escaped.
///
/// Names are dotted paths (`{{a.b}}`, `{{items.0}}`) resolved against the
/// context stack, innermost first; `{{.}}` is the current context. A section
/// over a list renders once per item, over any other truthy value once with
/// that value pushed as the context. `null`, `false`, `0`, `""`, `[]`, `{}`
/// and missing names are falsy.
///
/// ```
/// use pipeline_engine::template::JsonTemplate;
/// use serde_json::json;
///
/// let t = JsonTemplate::parse("{{#items}}- {{title}}\n{{/items}}{{^more}}end{{/more}}").unwrap();
/// let data = json!({"items": [{"title": "a"}, {"title": "b"}]});
/// assert_eq!(t.render(&data), "- a\n- b\nend");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsonTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Value(String),
    Section {
        name: String,
        inverted: bool,
        body: Vec<Segment>,
    },
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\{\s*([^{}]*?)\s*\}\}\}|\{\{\s*([#^/&!]?)\s*([^{}]*?)\s*\}\}")
            .expect("tag pattern is valid")
    })
}

impl JsonTemplate {
    /// Parse a template. Fails on a closing tag that does not match the
    /// innermost open section, or on a section left open.
    pub fn parse(template: &str) -> Result<Self> {
        let mut open: Vec<(String, bool, Vec<Segment>)> = Vec::new();
        let mut current = Vec::new();
        let mut last = 0;

        for caps in tag_re().captures_iter(template) {
            let Some(tag) = caps.get(0) else { continue };
            if tag.start() > last {
                current.push(Segment::Text(template[last..tag.start()].to_string()));
            }
            last = tag.end();

            if let Some(name) = caps.get(1) {
                current.push(Segment::Value(name.as_str().to_string()));
                continue;
            }
            let sigil = caps.get(2).map_or("", |m| m.as_str());
            let name = caps.get(3).map_or("", |m| m.as_str()).to_string();
            match sigil {
                "!" => {}
                "#" | "^" => open.push((name, sigil == "^", std::mem::take(&mut current))),
                "/" => {
                    let (opened, inverted, parent) = open.pop().ok_or_else(|| {
                        NodeRunError::InvalidConfig(format!("unexpected closing tag '{name}'"))
                    })?;
                    if opened != name {
                        return Err(NodeRunError::InvalidConfig(format!(
                            "section '{opened}' closed by '{name}'"
                        )));
                    }
                    let body = std::mem::replace(&mut current, parent);
                    current.push(Segment::Section {
                        name,
                        inverted,
                        body,
                    });
                }
                _ => current.push(Segment::Value(name)),
            }
        }
        if last < template.len() {
            current.push(Segment::Text(template[last..].to_string()));
        }
        if let Some((name, _, _)) = open.pop() {
            return Err(NodeRunError::InvalidConfig(format!("unclosed section '{name}'")));
        }
        Ok(Self { segments: current })
    }

    pub fn render(&self, data: &Value) -> String {
        let mut out = String::new();
        let mut stack = vec![data];
        render_segments(&self.segments, &mut stack, &mut out);
        out
    }
}

fn render_segments<'a>(segments: &[Segment], stack: &mut Vec<&'a Value>, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Value(name) => {
                if let Some(value) = resolve(stack, name) {
                    out.push_str(&value_to_text(value));
                }
            }
            Segment::Section {
                name,
                inverted: true,
                body,
            } => {
                if !resolve(stack, name).is_some_and(is_truthy) {
                    render_segments(body, stack, out);
                }
            }
            Segment::Section { name, body, .. } => match resolve(stack, name) {
                Some(Value::Array(items)) => {
                    for item in items {
                        stack.push(item);
                        render_segments(body, stack, out);
                        stack.pop();
                    }
                }
                Some(value) if is_truthy(value) => {
                    stack.push(value);
                    render_segments(body, stack, out);
                    stack.pop();
                }
                _ => {}
            },
        }
    }
}

fn resolve<'a>(stack: &[&'a Value], name: &str) -> Option<&'a Value> {
    let top = *stack.last()?;
    if name == "." {
        return Some(top);
    }
    let mut path = name.split('.');
    let head = path.next()?;
    let start = stack.iter().rev().find_map(|ctx| child(*ctx, head))?;
    path.try_fold(start, child)
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text form of a JSON value for substitution into a template.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
