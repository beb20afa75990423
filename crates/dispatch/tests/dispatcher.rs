//! Tests for the non-streaming dispatcher entry points.

mod fake;

use fake::*;
use llm::{Role, ToolChoice};
use mailquill_dispatch::{
    BackupModel, DispatchConfig, Dispatcher, ErrorKind, MemoryErrorLog, ObjectRequest,
    PromptInput, TextRequest, ToolRequest, ToolSet, UserAiFields, classify,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
struct Draft {
    subject: String,
}

fn config(backup_enabled: bool) -> DispatchConfig {
    DispatchConfig {
        use_backup_model: backup_enabled,
        backup: BackupModel {
            provider: "anthropic".into(),
            model: "claude-backup".into(),
        },
        default_api_key: None,
    }
}

fn text_request(prompt: &str) -> TextRequest {
    TextRequest {
        user: UserAiFields::default(),
        use_economy: false,
        system: Some("be brief".into()),
        prompt: prompt.into(),
        user_id: "u1".into(),
        label: "compose".into(),
    }
}

fn object_request() -> ObjectRequest {
    ObjectRequest {
        user: UserAiFields {
            api_key: Some("sk-user".into()),
            ..Default::default()
        },
        use_economy: false,
        input: PromptInput::prompt("draft a subject line", None),
        user_id: "u1".into(),
        label: "subject".into(),
    }
}

#[tokio::test]
async fn text_returns_content_and_forwards_usage() {
    let model = FakeModel::new();
    model.push_response(text_response("Hello there", Some(token_usage(12))));
    let resolver = FakeResolver::new(model.clone());
    let sink = RecordingSink::new();
    let dispatcher = Dispatcher::new(resolver, config(false)).with_usage_sink(sink.clone());

    let response = dispatcher.text(text_request("write a greeting")).await.unwrap();
    assert_eq!(response.content(), Some("Hello there"));

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].messages[1].content, "write a greeting");

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let (user, record) = &records[0];
    assert_eq!(user, "u1");
    assert_eq!(record.model, "fake-model");
    assert_eq!(record.label, "compose");
    assert_eq!(record.usage.total_tokens, 12);
}

#[tokio::test]
async fn text_never_falls_back_even_when_backup_enabled() {
    let model = FakeModel::new();
    model.push_error(overloaded());
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver.clone(), config(true));

    let err = dispatcher.text(text_request("hi")).await.unwrap_err();
    assert_eq!(classify(&err), ErrorKind::ServiceUnavailable);
    assert_eq!(model.requests().len(), 1);
    assert_eq!(resolver.resolutions().len(), 1);
}

#[tokio::test]
async fn recognized_failures_reach_the_error_log() {
    let model = FakeModel::new();
    model.push_error(invalid_key());
    let resolver = FakeResolver::new(model);
    let log = Arc::new(MemoryErrorLog::new());
    let dispatcher = Dispatcher::new(resolver, config(true)).with_error_log(log.clone());

    let err = dispatcher.text(text_request("hi")).await.unwrap_err();
    assert_eq!(classify(&err), ErrorKind::InvalidApiKey);

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user, "u1");
    assert_eq!(entries[0].kind, ErrorKind::InvalidApiKey);
}

#[tokio::test]
async fn unrecognized_failures_skip_the_error_log() {
    let model = FakeModel::new();
    model.push_error(llm::ApiError {
        status: 400,
        code: "".into(),
        message: "something odd".into(),
    });
    let resolver = FakeResolver::new(model);
    let log = Arc::new(MemoryErrorLog::new());
    let dispatcher = Dispatcher::new(resolver, config(false)).with_error_log(log.clone());

    let err = dispatcher.text(text_request("hi")).await.unwrap_err();
    assert_eq!(classify(&err), ErrorKind::Unknown);
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn object_validates_against_the_schema() {
    let model = FakeModel::new();
    model.push_response(text_response(r#"{"subject": "Quick update"}"#, None));
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver, config(false));

    let result = dispatcher.object::<Draft>(object_request()).await.unwrap();
    assert_eq!(result.value.subject, "Quick update");

    let request = &model.requests()[0];
    assert!(request.response_format.is_some());
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0].content.contains("JSON schema"));
}

#[tokio::test]
async fn object_accepts_fenced_json() {
    let model = FakeModel::new();
    model.push_response(text_response(
        "```json\n{\"subject\": \"Fenced\"}\n```",
        None,
    ));
    let resolver = FakeResolver::new(model);
    let dispatcher = Dispatcher::new(resolver, config(false));

    let result = dispatcher.object::<Draft>(object_request()).await.unwrap();
    assert_eq!(result.value.subject, "Fenced");
}

#[tokio::test]
async fn object_falls_back_to_the_backup_model() {
    let model = FakeModel::new();
    model.push_error(overloaded());
    model.push_response(text_response(r#"{"subject": "From backup"}"#, None));
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver.clone(), config(true));

    let result = dispatcher.object::<Draft>(object_request()).await.unwrap();
    assert_eq!(result.value.subject, "From backup");
    assert_eq!(model.requests().len(), 2);

    let resolutions = resolver.resolutions();
    assert_eq!(resolutions.len(), 2);
    assert_eq!(resolutions[1].provider.as_deref(), Some("anthropic"));
    assert_eq!(resolutions[1].model.as_deref(), Some("claude-backup"));
    // The user's own key travels with the backup call.
    assert_eq!(resolutions[1].api_key.as_deref(), Some("sk-user"));
}

#[tokio::test]
async fn backup_disabled_propagates_the_failure() {
    let model = FakeModel::new();
    model.push_error(overloaded());
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver, config(false));

    let err = dispatcher.object::<Draft>(object_request()).await.unwrap_err();
    assert_eq!(classify(&err), ErrorKind::ServiceUnavailable);
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn backup_failure_is_returned_verbatim() {
    let model = FakeModel::new();
    model.push_error(overloaded());
    model.push_error(llm::ApiError {
        status: 400,
        code: "".into(),
        message: "backup exploded".into(),
    });
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver.clone(), config(true));

    let err = dispatcher.object::<Draft>(object_request()).await.unwrap_err();
    // The backup's own error surfaces, not the original 529.
    assert!(err.to_string().contains("backup exploded"));
    assert_eq!(classify(&err), ErrorKind::Unknown);
    assert_eq!(model.requests().len(), 2);
    assert_eq!(resolver.resolutions().len(), 2);
}

#[tokio::test]
async fn backup_skips_non_availability_failures() {
    let model = FakeModel::new();
    model.push_error(invalid_key());
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver, config(true));

    dispatcher.object::<Draft>(object_request()).await.unwrap_err();
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn object_rejects_non_schema_output() {
    let model = FakeModel::new();
    model.push_response(text_response("sorry, I cannot do that", None));
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver, config(true));

    let err = dispatcher.object::<Draft>(object_request()).await.unwrap_err();
    assert!(err.to_string().contains("did not match schema"));
    // Schema mismatch is not an availability failure; no backup call.
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn tools_forces_a_call_then_answers() {
    let model = FakeModel::new();
    model.push_response(tool_response(vec![echo_call()]));
    model.push_response(text_response("done", None));
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver, config(false));
    let tools = ToolSet::new().register(Echo);

    let request = ToolRequest::new(
        UserAiFields::default(),
        PromptInput::prompt("echo hi", None),
        "u1",
    );
    let result = dispatcher.tools(request, &tools).await.unwrap();

    assert_eq!(result.invocations.len(), 1);
    assert_eq!(result.invocations[0].name, "echo");
    assert!(result.invocations[0].output.contains("\"echoed\":\"hi\""));
    assert_eq!(result.response.content(), Some("done"));

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tool_choice, Some(ToolChoice::Required));
    assert_eq!(requests[1].tool_choice, Some(ToolChoice::Auto));
    // The tool reply travels back to the model.
    assert!(result.messages.iter().any(|m| m.role == Role::Tool));
}

#[tokio::test]
async fn tools_fall_back_when_throttled() {
    let model = FakeModel::new();
    model.push_error(rate_limited());
    model.push_response(tool_response(vec![echo_call()]));
    model.push_response(text_response("done", None));
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver.clone(), config(true));
    let tools = ToolSet::new().register(Echo);

    let request = ToolRequest::new(
        UserAiFields::default(),
        PromptInput::prompt("echo hi", None),
        "u1",
    );
    let result = dispatcher.tools(request, &tools).await.unwrap();
    assert_eq!(result.invocations.len(), 1);

    let resolutions = resolver.resolutions();
    assert_eq!(resolutions.len(), 2);
    assert_eq!(resolutions[1].provider.as_deref(), Some("anthropic"));
}

#[tokio::test]
async fn tools_stop_at_the_step_limit() {
    let model = FakeModel::new();
    // The model keeps calling tools; the dispatcher must cut it off.
    for _ in 0..2 {
        model.push_response(tool_response(vec![echo_call()]));
    }
    let resolver = FakeResolver::new(model.clone());
    let dispatcher = Dispatcher::new(resolver, config(false));
    let tools = ToolSet::new().register(Echo);

    let mut request = ToolRequest::new(
        UserAiFields::default(),
        PromptInput::prompt("echo forever", None),
        "u1",
    );
    request.max_steps = 2;
    let result = dispatcher.tools(request, &tools).await.unwrap();
    assert_eq!(result.invocations.len(), 2);
    assert_eq!(model.requests().len(), 2);
}
