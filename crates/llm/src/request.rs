//! Chat completion request type.

use crate::{Message, Tool, ToolChoice};
use compact_str::CompactString;
use serde::{Serialize, Serializer, ser::SerializeSeq};

/// A chat completion request.
///
/// Contains everything needed to make an LLM call: model, messages, tools,
/// and streaming hints. Serializes directly to the OpenAI-compatible wire
/// format.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model to use.
    pub model: CompactString,

    /// The conversation messages.
    pub messages: Vec<Message>,

    /// The tools available for this request.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_tools"
    )]
    pub tools: Option<Vec<Tool>>,

    /// Controls which tool is called by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Response format constraint (e.g. `{"type": "json_object"}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,

    /// Whether the response should be streamed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,

    /// Whether to return usage information in the final stream chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

/// Stream options for usage reporting
#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    /// Ask the backend to include usage in the last chunk
    pub include_usage: bool,
}

impl Request {
    /// Create a new request for the given model.
    pub fn new(model: impl Into<CompactString>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            tools: None,
            tool_choice: None,
            response_format: None,
            stream: false,
            stream_options: None,
        }
    }

    /// Set the messages for this request.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Set the tools for this request.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the tool choice for this request.
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Constrain the response to a JSON object.
    pub fn json_response(mut self) -> Self {
        self.response_format = Some(serde_json::json!({ "type": "json_object" }));
        self
    }

    /// Mark the request as streaming, optionally asking for usage.
    pub fn streaming(mut self, usage: bool) -> Self {
        self.stream = true;
        if usage {
            self.stream_options = Some(StreamOptions {
                include_usage: true,
            });
        }
        self
    }
}

/// Serialize tools in the OpenAI function-tool envelope.
fn serialize_tools<S: Serializer>(
    tools: &Option<Vec<Tool>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct WireTool<'a> {
        r#type: &'static str,
        function: &'a Tool,
    }

    let tools = tools.as_deref().unwrap_or_default();
    let mut seq = serializer.serialize_seq(Some(tools.len()))?;
    for tool in tools {
        seq.serialize_element(&WireTool {
            r#type: "function",
            function: tool,
        })?;
    }
    seq.end()
}
