//! Execution context shared across node invocations.
//!
//! [`ExecCtx`] carries the HTTP client, the credential [`Environment`], the
//! semantic-search endpoint and an optional event handler. It is built once
//! per pipeline run and shared read-only by every node invocation.

use crate::error::{NodeRunError, Result};
use crate::events::EventHandler;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default semantic search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.lmnr.ai/v2/semantic-search";

/// Flat mapping of credential names to secret values.
///
/// Read-only from the executors' point of view. A key that a node needs but
/// that is absent surfaces as [`NodeRunError::MissingCredential`] before any
/// request is sent.
#[derive(Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a credential (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Look up a credential the caller expects to exist.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.vars
            .get(key)
            .map(|v| v.as_str())
            .ok_or_else(|| NodeRunError::MissingCredential(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl From<HashMap<String, String>> for Environment {
    fn from(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.vars.keys().collect();
        keys.sort();
        f.debug_struct("Environment").field("keys", &keys).finish()
    }
}

/// Shared execution context for node invocations.
///
/// # Example
///
/// ```
/// use pipeline_engine::ExecCtx;
///
/// let ctx = ExecCtx::builder()
///     .credential("OPENAI_API_KEY", "sk-...")
///     .build()
///     .unwrap();
/// assert!(ctx.env.get("OPENAI_API_KEY").is_some());
/// ```
pub struct ExecCtx {
    /// HTTP client (cheap to clone, uses `Arc` internally).
    pub client: Client,
    /// Credentials.
    pub env: Environment,
    /// Semantic search endpoint.
    pub search_url: String,
    /// Optional event handler for lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    pub fn builder() -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            env: Environment::new(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            event_handler: None,
            timeout: None,
        }
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("env", &self.env)
            .field("search_url", &self.search_url)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    env: Environment,
    search_url: String,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the whole credential environment.
    pub fn env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Insert a single credential.
    pub fn credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env = self.env.with(key, value);
        self
    }

    /// Override the semantic search endpoint.
    pub fn search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the request timeout. Default: 60 seconds.
    ///
    /// Ignored when a custom `Client` is provided via `.client()`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ExecCtx> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
                .build()?,
        };
        Ok(ExecCtx {
            client,
            env: self.env,
            search_url: self.search_url,
            event_handler: self.event_handler,
        })
    }
}
