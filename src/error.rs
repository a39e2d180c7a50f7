use thiserror::Error;

/// The single error kind returned by every node executor.
///
/// Orchestrators only need to distinguish "the node produced a
/// [`RunOutput`](crate::types::RunOutput)" from "the node failed"; the
/// variants exist so callers and tests can tell failures apart, and every
/// variant renders a human-readable message.
#[derive(Error, Debug)]
pub enum NodeRunError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// An LLM provider answered with a non-success status.
    #[error("{provider} completion request failed ({status}): {message}")]
    Provider {
        /// Provider name (e.g. `"openai"`).
        provider: &'static str,
        /// HTTP status code.
        status: u16,
        /// The provider's own error text.
        message: String,
    },

    /// A credential the node needs is absent from the environment.
    #[error("Missing environment key '{0}'")]
    MissingCredential(String),

    /// The orchestrator did not supply a declared input.
    #[error("Node '{node}' is missing input '{input}'")]
    MissingInput { node: String, input: String },

    /// An input value had a shape the node cannot consume.
    #[error("Node '{node}' received unsupported input type: {found}")]
    UnsupportedInput { node: String, found: String },

    /// A code transform returned a shape that cannot cross a node boundary.
    #[error("Node '{node}' produced unsupported output type: {found}")]
    UnsupportedOutput { node: String, found: String },

    /// No router route matched and no default route is configured.
    #[error("No route found for condition {condition}")]
    NoRoute { condition: String },

    /// A semantic search node was configured without datasources.
    #[error("No datasources provided")]
    NoDatasources,

    /// The semantic search service answered with a non-success status.
    #[error("Vector search request failed: {status}\n{body}")]
    SearchFailed { status: u16, body: String },

    /// Structured output never validated within the retry budget.
    #[error(
        "Json schema validation failed after {max_retries} retries.\n\nLast attempt's output:\n{last_output}.\n\nError:\n{error}"
    )]
    ValidationExhausted {
        max_retries: u32,
        last_output: String,
        error: String,
    },

    /// A structured-output schema could not be rendered.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A code transform reported a failure.
    #[error("Code node '{node}' failed: {message}")]
    Code { node: String, message: String },

    /// An LLM node names a provider that is not registered.
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// A code node names a function that is not registered.
    #[error("Unknown code function '{0}'")]
    UnknownFunction(String),

    /// Invalid configuration detected at load time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for NodeRunError {
    fn from(err: anyhow::Error) -> Self {
        NodeRunError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NodeRunError>;
