//! Event hooks for node lifecycle observation.
//!
//! Nodes emit events when they start, when a provider answers, when
//! structured output is retried, and when they finish. Implement
//! [`EventHandler`] to collect them for progress reporting or run logs.
//! Diagnostics for operators go through `tracing` independently of this.

use crate::backend::ChatUsage;
use crate::types::RunStatus;
use std::sync::Arc;

/// Events emitted during node execution.
#[derive(Debug, Clone)]
pub enum Event {
    /// A node has started executing.
    NodeStart {
        /// Node name.
        name: String,
        /// Node kind tag (e.g. `"LLM"`, `"Router"`).
        kind: &'static str,
    },
    /// A provider answered a chat completion request.
    ProviderResponse {
        name: String,
        provider: &'static str,
        model: String,
        usage: ChatUsage,
    },
    /// A structured-output candidate failed validation and will be retried.
    ValidationRetry {
        name: String,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Validator error text.
        reason: String,
    },
    /// The structured-output loop reached a terminal state.
    ValidationEnd {
        name: String,
        /// Total completion attempts made, including the first.
        attempts: u32,
        success: bool,
    },
    /// A node has finished. `status` is `None` when the node failed.
    NodeEnd {
        name: String,
        status: Option<RunStatus>,
    },
}

/// Handler for node lifecycle events.
///
/// # Example
///
/// ```
/// use pipeline_engine::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         if let Event::NodeEnd { name, status } = event {
///             println!("[end] {} {:?}", name, status);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_without_handler_is_noop() {
        emit(
            &None,
            Event::NodeEnd {
                name: "n".into(),
                status: None,
            },
        );
    }

    #[test]
    fn test_fn_handler_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |e: Event| {
            if let Event::NodeStart { name, .. } = e {
                sink.lock().unwrap().push(name);
            }
        }));
        emit(
            &Some(handler),
            Event::NodeStart {
                name: "router".into(),
                kind: "Router",
            },
        );
        assert_eq!(*seen.lock().unwrap(), vec!["router".to_string()]);
    }
}
