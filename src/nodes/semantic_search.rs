//! Vector search over project datasources.
//!
//! One POST per invocation to the search endpoint configured on
//! [`ExecCtx`]; every returned point is rendered through the node's
//! template and the rendered points are joined with newlines.

use crate::error::{NodeRunError, Result};
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, Node, NodeInputs};
use crate::template;
use crate::types::RunOutput;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Environment key holding the project API key sent as bearer auth.
pub const SEARCH_API_KEY_VAR: &str = "LMNR_PROJECT_API_KEY";

/// Wire body of a search request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    limit: u32,
    threshold: f64,
    datasource_ids: &'a [String],
}

/// One result point; only its `data` payload is rendered.
#[derive(Debug, Deserialize)]
struct SearchPoint {
    #[serde(default)]
    data: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct SemanticSearchNode {
    name: String,
    limit: u32,
    threshold: f64,
    datasource_ids: Vec<String>,
    template: String,
}

impl SemanticSearchNode {
    pub fn new(
        name: impl Into<String>,
        limit: u32,
        threshold: f64,
        datasource_ids: Vec<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            limit,
            threshold,
            datasource_ids,
            template: template.into(),
        }
    }

    async fn search(&self, ctx: &ExecCtx, query: &str) -> Result<RunOutput> {
        if self.datasource_ids.is_empty() {
            return Err(NodeRunError::NoDatasources);
        }
        let api_key = ctx.env.require(SEARCH_API_KEY_VAR)?;

        let body = SearchRequest {
            query,
            limit: self.limit,
            threshold: self.threshold,
            datasource_ids: &self.datasource_ids,
        };
        debug!(
            node = %self.name,
            limit = self.limit,
            datasources = self.datasource_ids.len(),
            "sending search request"
        );

        let resp = ctx
            .client
            .post(&ctx.search_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            warn!(node = %self.name, status = status.as_u16(), "search request failed");
            return Err(NodeRunError::SearchFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        let points: Vec<SearchPoint> = serde_json::from_str(&text)?;
        Ok(RunOutput::success(self.render_points(points)))
    }

    fn render_points(&self, points: Vec<SearchPoint>) -> String {
        points
            .into_iter()
            .enumerate()
            .map(|(i, point)| {
                let mut vars: HashMap<String, String> = point
                    .data
                    .iter()
                    .map(|(k, v)| (k.clone(), template::value_to_text(v)))
                    .collect();
                vars.insert("relevance_index".into(), (i + 1).to_string());
                template::render(&self.template, &vars)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Node for SemanticSearchNode {
    fn kind(&self) -> &'static str {
        "SemanticSearch"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, ctx: &'a ExecCtx, mut inputs: NodeInputs) -> BoxFut<'a, Result<RunOutput>> {
        Box::pin(async move {
            let query = inputs.take_text(&self.name, "query")?;
            self.search(ctx, &query).await
        })
    }
}
