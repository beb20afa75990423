//! Callable tool registry.
//!
//! Tool schemas travel on the wire as [`Tool`]; the handlers that actually
//! run live here, keyed by name. The dispatcher renders the schemas into the
//! request and feeds the model's tool calls back through [`ToolSet::dispatch`].

use compact_str::CompactString;
use futures_util::future::BoxFuture;
use llm::{Message, Tool, ToolCall};
use std::collections::BTreeMap;

/// A callable tool: a wire schema plus an async handler.
pub trait ToolHandler: Send + Sync {
    /// The wire schema for this tool (name, description, parameters).
    fn spec(&self) -> Tool;

    /// Run the tool with the model-supplied arguments.
    fn call(&self, args: serde_json::Value) -> BoxFuture<'_, anyhow::Result<serde_json::Value>>;
}

/// A set of named callable tools.
#[derive(Default)]
pub struct ToolSet {
    handlers: BTreeMap<CompactString, Box<dyn ToolHandler>>,
}

impl ToolSet {
    /// Create an empty tool set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its spec name. Replaces any existing handler
    /// with the same name.
    pub fn register(mut self, handler: impl ToolHandler + 'static) -> Self {
        let name = handler.spec().name;
        self.handlers.insert(name, Box::new(handler));
        self
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Render the wire schemas for the request.
    pub fn specs(&self) -> Vec<Tool> {
        self.handlers.values().map(|h| h.spec()).collect()
    }

    /// Run one tool call, producing the tool-role reply message.
    ///
    /// Unknown tool names and handler failures become error text sent back
    /// to the model rather than aborting the step loop.
    pub async fn run(&self, call: &ToolCall) -> Message {
        let name = call.function.name.as_str();
        let Some(handler) = self.handlers.get(name) else {
            tracing::warn!(tool = name, "model called an unregistered tool");
            return Message::tool(format!("error: unknown tool '{name}'"), call.id.clone());
        };

        let args = match serde_json::from_str(&call.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                return Message::tool(
                    format!("error: invalid tool arguments: {e}"),
                    call.id.clone(),
                );
            }
        };

        match handler.call(args).await {
            Ok(output) => Message::tool(output.to_string(), call.id.clone()),
            Err(e) => Message::tool(format!("error: {e:#}"), call.id.clone()),
        }
    }

    /// Run every call in a round, in order.
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<Message> {
        let mut replies = Vec::with_capacity(calls.len());
        for call in calls {
            replies.push(self.run(call).await);
        }
        replies
    }
}
