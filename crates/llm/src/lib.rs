//! Unified LLM interface types and transport.
//!
//! This crate provides the shared types used across all LLM providers:
//! `Message`, `Request`, `Response`, `StreamChunk`, `Tool`, and the `Model`
//! trait. `HttpProvider` covers any backend speaking the OpenAI-compatible
//! chat completions API; non-2xx responses surface as typed [`ApiError`]s so
//! callers can classify failures.

pub use error::{ApiError, RetryExhausted};
pub use http::HttpProvider;
pub use message::{Message, MessageBuilder, Role};
pub use provider::Model;
pub use request::Request;
pub use reqwest::{self, Client};
pub use response::{Choice, CompletionMeta, Delta, FinishReason, Response, Usage};
pub use stream::{StreamChoice, StreamChunk};
pub use tool::{FunctionCall, Tool, ToolCall, ToolChoice, ToolChoiceFunction};

mod error;
mod http;
mod message;
mod provider;
mod request;
mod response;
mod stream;
mod tool;
