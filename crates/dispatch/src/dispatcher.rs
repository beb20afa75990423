//! Dispatcher entry points.
//!
//! Four public operations (text, structured object, tool calling, and
//! streaming), all funneling through the resolver and the provider client.
//! The structured-object and tool-calling paths carry the backup-model
//! fallback; text and streaming do not. On any call-time failure the raw
//! error is classified and, when recognized, appended to the user-facing
//! error log before it re-surfaces to the caller.

use crate::{
    DispatchConfig, ErrorKind, ErrorLog, FinishOutcome, Resolve, Resolved, StepOutcome, ToolSet,
    UsageRecord, UsageSink, UserAiFields, WordChunks, classify,
};
use anyhow::Result;
use compact_str::CompactString;
use futures_core::Stream;
use futures_util::StreamExt;
use llm::{FinishReason, Message, Model, Request, Response, Role, ToolChoice, Usage};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Default number of model rounds for tool and streaming calls.
const DEFAULT_MAX_STEPS: u32 = 4;

/// The completion dispatcher.
///
/// Generic over the resolver seam `R`, the usage sink `U`, and the error
/// log `E`; `()` disables either collaborator. Holds no mutable state;
/// concurrent calls run independently.
#[derive(Clone)]
pub struct Dispatcher<R, U = (), E = ()> {
    resolver: R,
    config: DispatchConfig,
    usage: U,
    errors: E,
}

impl<R: Resolve> Dispatcher<R> {
    /// Create a dispatcher with no-op collaborators.
    pub fn new(resolver: R, config: DispatchConfig) -> Self {
        Self {
            resolver,
            config,
            usage: (),
            errors: (),
        }
    }
}

impl<R: Resolve, U: UsageSink, E: ErrorLog> Dispatcher<R, U, E> {
    /// Attach a usage sink.
    pub fn with_usage_sink<U2: UsageSink>(self, usage: U2) -> Dispatcher<R, U2, E> {
        Dispatcher {
            resolver: self.resolver,
            config: self.config,
            usage,
            errors: self.errors,
        }
    }

    /// Attach a user-facing error log.
    pub fn with_error_log<E2: ErrorLog>(self, errors: E2) -> Dispatcher<R, U, E2> {
        Dispatcher {
            resolver: self.resolver,
            config: self.config,
            usage: self.usage,
            errors,
        }
    }

    /// Plain text completion: prompt/system in, free text out.
    pub async fn text(&self, req: TextRequest) -> Result<Response> {
        let resolved = self.resolver.resolve(&req.user, req.use_economy)?;
        let messages = prompt_messages(req.system.as_deref(), &req.prompt);
        let request = Request::new(resolved.model.clone()).with_messages(messages);

        match resolved.client.send(&request).await {
            Ok(response) => {
                self.forward_usage(&req.user_id, &resolved, response.usage.clone(), &req.label)
                    .await;
                Ok(response)
            }
            Err(err) => Err(self.log_error(&req.user_id, err).await),
        }
    }

    /// Structured-object completion: the reply must deserialize into `T`.
    ///
    /// Wrapped by backup-model fallback: one automatic retry against the
    /// fixed backup provider/model when the failure classifies as
    /// service-unavailable or throttling.
    pub async fn object<T>(&self, req: ObjectRequest) -> Result<ObjectResult<T>>
    where
        T: DeserializeOwned + JsonSchema,
    {
        match self.object_inner::<T>(&req, &req.user).await {
            Ok(result) => Ok(result),
            Err(err) => match self.backup_fields(&err, &req.user) {
                Some(backup) => self.object_inner::<T>(&req, &backup).await,
                None => Err(err),
            },
        }
    }

    async fn object_inner<T>(&self, req: &ObjectRequest, user: &UserAiFields) -> Result<ObjectResult<T>>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let resolved = self.resolver.resolve(user, req.use_economy)?;

        let schema = schemars::SchemaGenerator::default().into_root_schema_for::<T>();
        let schema = serde_json::to_string(&schema)?;
        let mut messages = req.input.clone().into_messages();
        let instruction = format!(
            "Answer with a single JSON object matching this JSON schema, \
             with no other text:\n{schema}"
        );
        match messages.first_mut() {
            Some(first) if first.role == Role::System => {
                first.content.push_str("\n\n");
                first.content.push_str(&instruction);
            }
            _ => messages.insert(0, Message::system(instruction)),
        }

        let request = Request::new(resolved.model.clone())
            .with_messages(messages)
            .json_response();

        match resolved.client.send(&request).await {
            Ok(response) => {
                let content = response.content().unwrap_or_default();
                let value = serde_json::from_str(extract_json(content)).map_err(|e| {
                    anyhow::anyhow!("structured completion did not match schema: {e}")
                })?;
                self.forward_usage(&req.user_id, &resolved, response.usage.clone(), &req.label)
                    .await;
                Ok(ObjectResult { value, response })
            }
            Err(err) => Err(self.log_error(&req.user_id, err).await),
        }
    }

    /// Tool-calling completion: the model must invoke one of the supplied
    /// tools. Wrapped by backup-model fallback.
    pub async fn tools(&self, req: ToolRequest, tools: &ToolSet) -> Result<ToolsResult> {
        match self.tools_inner(&req, &req.user, tools).await {
            Ok(result) => Ok(result),
            Err(err) => match self.backup_fields(&err, &req.user) {
                Some(backup) => self.tools_inner(&req, &backup, tools).await,
                None => Err(err),
            },
        }
    }

    async fn tools_inner(
        &self,
        req: &ToolRequest,
        user: &UserAiFields,
        tools: &ToolSet,
    ) -> Result<ToolsResult> {
        let resolved = self.resolver.resolve(user, req.use_economy)?;
        let mut messages = req.input.clone().into_messages();
        let mut invocations = Vec::new();
        let max_steps = req.max_steps.max(1);

        // The model is forced to call a tool on the first round; later
        // rounds may answer in text.
        let mut tool_choice = ToolChoice::Required;
        let mut last_response = None;

        for step in 0..max_steps {
            let request = Request::new(resolved.model.clone())
                .with_messages(messages.clone())
                .with_tools(tools.specs())
                .with_tool_choice(tool_choice.clone());

            let response = match resolved.client.send(&request).await {
                Ok(response) => response,
                Err(err) => return Err(self.log_error(&req.user_id, err).await),
            };
            self.forward_usage(&req.user_id, &resolved, response.usage.clone(), &req.label)
                .await;

            let Some(message) = response.message() else {
                last_response = Some(response);
                break;
            };
            let calls = message.tool_calls.clone();
            messages.push(message);

            if calls.is_empty() {
                last_response = Some(response);
                break;
            }

            let replies = tools.dispatch(&calls).await;
            for (call, reply) in calls.iter().zip(&replies) {
                invocations.push(ToolInvocation {
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                    output: reply.content.clone(),
                });
            }
            messages.extend(replies);
            last_response = Some(response);
            tool_choice = ToolChoice::Auto;
            tracing::debug!(step, calls = invocations.len(), "tool round complete");
        }

        Ok(ToolsResult {
            invocations,
            response: last_response.unwrap_or_default(),
            messages,
        })
    }

    /// Streaming completion: a lazily produced, word-chunked text stream.
    ///
    /// Resolution failures surface synchronously; call-time failures are
    /// classified, logged, and yielded through the stream. Dropping the
    /// stream stops production: no further chunks and no callbacks.
    pub fn stream<'a>(
        &'a self,
        mut req: StreamRequest,
        tools: Option<&'a ToolSet>,
    ) -> Result<impl Stream<Item = Result<String>> + use<'a, R, U, E>> {
        let resolved = self.resolver.resolve(&req.user, req.use_economy)?;
        let max_steps = req.max_steps.max(1);

        Ok(async_stream::try_stream! {
            let mut messages = match req.messages.take() {
                Some(messages) => messages,
                None => prompt_messages(
                    req.system.as_deref(),
                    req.prompt.as_deref().unwrap_or_default(),
                ),
            };
            let mut full_text = String::new();
            let mut total_usage: Option<Usage> = None;
            let mut steps = 0u32;

            'rounds: for _ in 0..max_steps {
                let mut request = Request::new(resolved.model.clone())
                    .with_messages(messages.clone())
                    .streaming(true);
                if let Some(tools) = tools.filter(|t| !t.is_empty()) {
                    request = request.with_tools(tools.specs());
                }

                let mut builder = Message::builder(Role::Assistant);
                let mut chunker = WordChunks::new();
                let mut step = StepOutcome::default();
                let mut finished = false;

                let inner = resolved.client.stream(request);
                futures_util::pin_mut!(inner);
                while let Some(next) = inner.next().await {
                    let chunk = match next {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            let err = self.log_error(&req.user_id, err).await;
                            Err::<(), anyhow::Error>(err)?;
                            break;
                        }
                    };

                    if let Some(usage) = chunk.usage.clone() {
                        step.usage = Some(usage.clone());
                        total_usage = Some(merge_usage(total_usage.take(), usage));
                    }

                    if builder.accept(&chunk) {
                        let content = chunk.content().unwrap_or_default();
                        step.text.push_str(content);
                        full_text.push_str(content);
                        for word in chunker.push(content) {
                            yield word;
                        }
                    }

                    if let Some(reason) = chunk.reason() {
                        match reason {
                            FinishReason::ToolCalls => break,
                            _ => {
                                finished = true;
                                break;
                            }
                        }
                    }
                }

                if let Some(rest) = chunker.flush() {
                    yield rest;
                }

                steps += 1;
                let message = builder.build();
                let calls = message.tool_calls.clone();
                messages.push(message);

                if !calls.is_empty() {
                    if let Some(tools) = tools {
                        let replies = tools.dispatch(&calls).await;
                        step.tools_invoked =
                            calls.iter().map(|c| c.function.name.clone()).collect();
                        messages.extend(replies);
                    }
                }

                if let Some(on_step) = req.on_step.as_mut() {
                    on_step(&step);
                }

                if finished || calls.is_empty() {
                    break 'rounds;
                }
            }

            self.forward_usage(&req.user_id, &resolved, total_usage.clone(), &req.label)
                .await;
            if let Some(on_finish) = req.on_finish.take() {
                on_finish(&FinishOutcome {
                    text: full_text,
                    usage: total_usage,
                    steps,
                });
            }
        })
    }

    /// Swap to the fixed backup provider/model when the failure warrants it.
    ///
    /// Fires at most once per top-level call; the backup keeps the user's
    /// API key.
    fn backup_fields(&self, err: &anyhow::Error, user: &UserAiFields) -> Option<UserAiFields> {
        if !self.config.use_backup_model {
            return None;
        }
        match classify(err) {
            ErrorKind::ServiceUnavailable | ErrorKind::Throttled => {
                tracing::warn!(
                    provider = %self.config.backup.provider,
                    model = %self.config.backup.model,
                    "primary model unavailable, switching to backup"
                );
                Some(UserAiFields {
                    provider: Some(self.config.backup.provider.clone()),
                    model: Some(self.config.backup.model.clone()),
                    api_key: user.api_key.clone(),
                })
            }
            _ => None,
        }
    }

    /// Classify, log when recognized, and hand the error back.
    async fn log_error(&self, user_id: &str, err: anyhow::Error) -> anyhow::Error {
        let kind = classify(&err);
        tracing::error!(user = user_id, kind = kind.as_str(), "completion failed: {err:#}");
        if kind != ErrorKind::Unknown {
            self.errors.append(user_id, kind, &err.to_string()).await;
        }
        err
    }

    async fn forward_usage(
        &self,
        user_id: &str,
        resolved: &Resolved<R::Client>,
        usage: Option<Usage>,
        label: &CompactString,
    ) {
        if let Some(usage) = usage {
            self.usage
                .record(
                    user_id,
                    UsageRecord {
                        provider: resolved.provider.clone(),
                        model: resolved.model.clone(),
                        usage,
                        label: label.clone(),
                    },
                )
                .await;
        }
    }
}

/// Prompt/system text, or an explicit message sequence. The two are
/// mutually exclusive by construction.
#[derive(Debug, Clone)]
pub enum PromptInput {
    /// Plain prompt with optional system text.
    Prompt {
        /// Optional system text.
        system: Option<String>,
        /// The user prompt.
        prompt: String,
    },
    /// An explicit message sequence.
    Messages(Vec<Message>),
}

impl PromptInput {
    /// Build from a prompt and optional system text.
    pub fn prompt(prompt: impl Into<String>, system: Option<String>) -> Self {
        Self::Prompt {
            system,
            prompt: prompt.into(),
        }
    }

    /// Flatten into a message sequence.
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Prompt { system, prompt } => prompt_messages(system.as_deref(), &prompt),
            Self::Messages(messages) => messages,
        }
    }
}

/// A plain text completion request.
#[derive(Debug, Clone)]
pub struct TextRequest {
    /// The user's AI configuration.
    pub user: UserAiFields,
    /// Prefer the provider's economy tier.
    pub use_economy: bool,
    /// Optional system text.
    pub system: Option<String>,
    /// The prompt.
    pub prompt: String,
    /// User identifier for usage and error accounting.
    pub user_id: String,
    /// Caller-supplied usage label.
    pub label: CompactString,
}

/// A structured-object completion request.
#[derive(Debug, Clone)]
pub struct ObjectRequest {
    /// The user's AI configuration.
    pub user: UserAiFields,
    /// Prefer the provider's economy tier.
    pub use_economy: bool,
    /// Prompt/system or messages.
    pub input: PromptInput,
    /// User identifier for usage and error accounting.
    pub user_id: String,
    /// Caller-supplied usage label.
    pub label: CompactString,
}

/// A validated structured completion.
#[derive(Debug, Clone)]
pub struct ObjectResult<T> {
    /// The schema-validated value.
    pub value: T,
    /// The raw provider response.
    pub response: Response,
}

/// A tool-calling completion request.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// The user's AI configuration.
    pub user: UserAiFields,
    /// Prefer the provider's economy tier.
    pub use_economy: bool,
    /// Prompt/system or messages.
    pub input: PromptInput,
    /// Maximum model rounds (minimum 1).
    pub max_steps: u32,
    /// User identifier for usage and error accounting.
    pub user_id: String,
    /// Caller-supplied usage label.
    pub label: CompactString,
}

impl ToolRequest {
    /// Create a request with the default step limit.
    pub fn new(user: UserAiFields, input: PromptInput, user_id: impl Into<String>) -> Self {
        Self {
            user,
            use_economy: false,
            input,
            max_steps: DEFAULT_MAX_STEPS,
            user_id: user_id.into(),
            label: CompactString::default(),
        }
    }
}

/// One executed tool call.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Tool name.
    pub name: CompactString,
    /// Raw JSON arguments the model supplied.
    pub arguments: String,
    /// The tool's output (or error text).
    pub output: String,
}

/// The outcome of a tool-calling completion.
#[derive(Debug, Clone, Default)]
pub struct ToolsResult {
    /// Every tool invocation, in execution order.
    pub invocations: Vec<ToolInvocation>,
    /// The final provider response.
    pub response: Response,
    /// The full message trace, including tool replies.
    pub messages: Vec<Message>,
}

/// A streaming completion request.
pub struct StreamRequest {
    /// The user's AI configuration.
    pub user: UserAiFields,
    /// Prefer the provider's economy tier.
    pub use_economy: bool,
    /// Optional system text.
    pub system: Option<String>,
    /// Optional prompt (ignored when `messages` is set).
    pub prompt: Option<String>,
    /// Optional explicit message sequence.
    pub messages: Option<Vec<Message>>,
    /// Maximum model rounds (minimum 1).
    pub max_steps: u32,
    /// User identifier for usage and error accounting.
    pub user_id: String,
    /// Caller-supplied usage label.
    pub label: CompactString,
    /// Invoked after each model round.
    pub on_step: Option<Box<dyn FnMut(&StepOutcome) + Send>>,
    /// Invoked exactly once after the last chunk.
    pub on_finish: Option<Box<dyn FnOnce(&FinishOutcome) + Send>>,
}

impl StreamRequest {
    /// Create a request for a prompt with the default step limit.
    pub fn new(user: UserAiFields, prompt: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            user,
            use_economy: false,
            system: None,
            prompt: Some(prompt.into()),
            messages: None,
            max_steps: DEFAULT_MAX_STEPS,
            user_id: user_id.into(),
            label: CompactString::default(),
            on_step: None,
            on_finish: None,
        }
    }
}

/// Build the message sequence for prompt/system input.
fn prompt_messages(system: Option<&str>, prompt: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));
    messages
}

/// Strip markdown code fences some models wrap JSON replies in.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Sum usage across stream steps.
fn merge_usage(total: Option<Usage>, step: Usage) -> Usage {
    let total = total.unwrap_or_default();
    Usage {
        prompt_tokens: total.prompt_tokens + step.prompt_tokens,
        completion_tokens: total.completion_tokens + step.completion_tokens,
        total_tokens: total.total_tokens + step.total_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_input_flattens_to_messages() {
        let input = PromptInput::prompt("write a reply", Some("be brief".into()));
        let messages = input.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "write a reply");
    }

    #[test]
    fn extract_json_handles_fences() {
        assert_eq!(extract_json(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```\n{}\n```"), "{}");
    }

    #[test]
    fn merge_usage_accumulates() {
        let first = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let merged = merge_usage(Some(first), Usage {
            prompt_tokens: 3,
            completion_tokens: 2,
            total_tokens: 5,
        });
        assert_eq!(merged.total_tokens, 20);
    }
}
