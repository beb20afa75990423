//! Tests for the shared OpenAI-compatible Request type.

use mailquill_llm::{Message, Request, Tool, ToolChoice};
use schemars::json_schema;

fn reply_tool() -> Tool {
    Tool {
        name: "draft_reply".into(),
        description: "Draft a reply to the current email thread".into(),
        parameters: json_schema!({
            "type": "object",
            "properties": { "body": { "type": "string" } },
            "required": ["body"]
        }),
        strict: false,
    }
}

#[test]
fn plain_request_omits_optional_fields() {
    let request = Request::new("gpt-4o").with_messages(vec![Message::user("hi")]);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["model"], "gpt-4o");
    assert_eq!(json["messages"][0]["role"], "user");
    assert!(json.get("tools").is_none());
    assert!(json.get("tool_choice").is_none());
    assert!(json.get("stream").is_none());
    assert!(json.get("response_format").is_none());
}

#[test]
fn tools_serialize_in_function_envelope() {
    let request = Request::new("gpt-4o")
        .with_tools(vec![reply_tool()])
        .with_tool_choice(ToolChoice::Required);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["tools"][0]["type"], "function");
    assert_eq!(json["tools"][0]["function"]["name"], "draft_reply");
    assert_eq!(json["tool_choice"], "required");
}

#[test]
fn named_tool_choice_serializes_inline() {
    let request = Request::new("gpt-4o").with_tool_choice(ToolChoice::from("draft_reply"));
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["tool_choice"]["type"], "function");
    assert_eq!(json["tool_choice"]["function"]["name"], "draft_reply");
}

#[test]
fn streaming_sets_flag_and_usage_options() {
    let request = Request::new("gpt-4o").streaming(true);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["stream"], true);
    assert_eq!(json["stream_options"]["include_usage"], true);
}

#[test]
fn streaming_without_usage_omits_options() {
    let request = Request::new("gpt-4o").streaming(false);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["stream"], true);
    assert!(json.get("stream_options").is_none());
}

#[test]
fn json_response_sets_format() {
    let request = Request::new("gpt-4o").json_response();
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["response_format"]["type"], "json_object");
}
