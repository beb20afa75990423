//! Completion dispatcher for the mailquill assistant.
//!
//! Given a logical completion request and a user's configured AI
//! provider/model, this crate resolves the concrete model client, issues the
//! call, classifies failures, retries or swaps to a backup model, and
//! forwards usage records and user-facing error entries to collaborators.
//!
//! The public surface is [`Dispatcher`] with its four entry points (`text`,
//! `object`, `tools`, `stream`), plus the pieces it composes: the
//! [`Resolver`] table, [`classify`], and [`with_retry`].

pub use classify::{ErrorKind, classify};
pub use config::{BackupModel, DispatchConfig, ProvidersConfig};
pub use dispatcher::{
    Dispatcher, ObjectRequest, ObjectResult, PromptInput, StreamRequest, TextRequest,
    ToolInvocation, ToolRequest, ToolsResult,
};
pub use errlog::{ErrorEntry, ErrorLog, MemoryErrorLog};
pub use resolver::{
    AuthScheme, ProviderOptions, ProviderSpec, Resolve, ResolveError, Resolved, Resolver,
    UserAiFields, default_providers, endpoint,
};
pub use retry::{RetryPolicy, with_retry};
pub use stream::{FinishOutcome, StepOutcome, WordChunks};
pub use toolset::{ToolHandler, ToolSet};
pub use usage::{UsageRecord, UsageSink};

mod classify;
mod config;
mod dispatcher;
mod errlog;
mod resolver;
mod retry;
mod stream;
mod toolset;
mod usage;
