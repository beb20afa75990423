//! Shared fakes: a scripted model client and a recording resolver/sink.
#![allow(dead_code)]

use anyhow::Result;
use futures_core::Stream;
use futures_util::future::BoxFuture;
use llm::{
    ApiError, Choice, Delta, FinishReason, FunctionCall, Model, Request, Response, Role,
    StreamChunk, Tool, ToolCall, Usage,
};
use mailquill_dispatch::{
    ProviderOptions, Resolve, ResolveError, Resolved, ToolHandler, UsageRecord, UsageSink,
    UserAiFields,
};
use schemars::json_schema;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A model client that replays scripted responses and records requests.
#[derive(Clone, Default)]
pub struct FakeModel {
    requests: Arc<Mutex<Vec<Request>>>,
    responses: Arc<Mutex<VecDeque<Result<Response, ApiError>>>>,
    rounds: Arc<Mutex<VecDeque<Vec<Result<StreamChunk, ApiError>>>>>,
}

impl FakeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: Response) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: ApiError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn push_round(&self, chunks: Vec<Result<StreamChunk, ApiError>>) {
        self.rounds.lock().unwrap().push_back(chunks);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Model for FakeModel {
    async fn send(&self, request: &Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(error.into()),
            None => panic!("fake model: no scripted response left"),
        }
    }

    fn stream(&self, request: Request) -> impl Stream<Item = Result<StreamChunk>> + Send {
        self.requests.lock().unwrap().push(request);
        let round = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .expect("fake model: no scripted round left");
        futures_util::stream::iter(round.into_iter().map(|item| item.map_err(Into::into)))
    }
}

/// A resolver that hands out the fake model and records what it was asked.
#[derive(Clone)]
pub struct FakeResolver {
    model: FakeModel,
    resolutions: Arc<Mutex<Vec<UserAiFields>>>,
}

impl FakeResolver {
    pub fn new(model: FakeModel) -> Self {
        Self {
            model,
            resolutions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn resolutions(&self) -> Vec<UserAiFields> {
        self.resolutions.lock().unwrap().clone()
    }
}

impl Resolve for FakeResolver {
    type Client = FakeModel;

    fn resolve(
        &self,
        user: &UserAiFields,
        use_economy: bool,
    ) -> Result<Resolved<FakeModel>, ResolveError> {
        self.resolutions.lock().unwrap().push(user.clone());
        let provider = user.provider.clone().unwrap_or_else(|| "openai".into());
        let model = user.model.clone().unwrap_or_else(|| {
            if use_economy {
                "fake-mini".into()
            } else {
                "fake-model".into()
            }
        });
        Ok(Resolved {
            provider,
            model,
            client: self.model.clone(),
            options: ProviderOptions::default(),
        })
    }
}

/// A usage sink that records every forwarded record.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<(String, UsageRecord)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, UsageRecord)> {
        self.records.lock().unwrap().clone()
    }
}

impl UsageSink for RecordingSink {
    async fn record(&self, user: &str, record: UsageRecord) {
        self.records.lock().unwrap().push((user.to_owned(), record));
    }
}

/// A tool that echoes its `text` argument back.
pub struct Echo;

impl ToolHandler for Echo {
    fn spec(&self) -> Tool {
        Tool {
            name: "echo".into(),
            description: "Echo the input back".into(),
            parameters: json_schema!({
                "type": "object",
                "properties": { "text": { "type": "string" } }
            }),
            strict: false,
        }
    }

    fn call(&self, args: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move { Ok(serde_json::json!({ "echoed": args["text"] })) })
    }
}

pub fn text_response(content: &str, usage: Option<Usage>) -> Response {
    Response {
        choices: vec![Choice {
            index: 0,
            message: Delta {
                role: Some(Role::Assistant),
                content: Some(content.to_owned()),
                tool_calls: None,
            },
            finish_reason: Some(FinishReason::Stop),
        }],
        usage,
        ..Default::default()
    }
}

pub fn tool_response(calls: Vec<ToolCall>) -> Response {
    Response {
        choices: vec![Choice {
            index: 0,
            message: Delta {
                role: Some(Role::Assistant),
                content: None,
                tool_calls: Some(calls),
            },
            finish_reason: Some(FinishReason::ToolCalls),
        }],
        usage: None,
        ..Default::default()
    }
}

pub fn echo_call() -> ToolCall {
    ToolCall {
        id: "call_1".into(),
        index: 0,
        call_type: "function".into(),
        function: FunctionCall {
            name: "echo".into(),
            arguments: r#"{"text": "hi"}"#.into(),
        },
    }
}

pub fn overloaded() -> ApiError {
    ApiError {
        status: 529,
        code: "overloaded_error".into(),
        message: "Overloaded".into(),
    }
}

pub fn rate_limited() -> ApiError {
    ApiError {
        status: 429,
        code: "rate_limit_error".into(),
        message: "Too many requests".into(),
    }
}

pub fn invalid_key() -> ApiError {
    ApiError {
        status: 401,
        code: "invalid_api_key".into(),
        message: "Incorrect API key provided: sk-xxx".into(),
    }
}

pub fn token_usage(total: u32) -> Usage {
    Usage {
        prompt_tokens: total / 2,
        completion_tokens: total - total / 2,
        total_tokens: total,
    }
}
