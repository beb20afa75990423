//! Provider abstractions for the unified LLM interface.

use crate::{Request, Response, StreamChunk};
use anyhow::Result;
use futures_core::Stream;

/// A trait for LLM providers.
///
/// Abstracts any backend that can answer a chat completion [`Request`].
/// Constructors are inherent methods on each provider, never called
/// polymorphically.
pub trait Model: Sized + Clone {
    /// Send a chat completion request.
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;

    /// Stream a chat completion response.
    fn stream(&self, request: Request) -> impl Stream<Item = Result<StreamChunk>> + Send;
}

/// `()` as a no-op Model for tests that never reach the network.
impl Model for () {
    async fn send(&self, _request: &Request) -> Result<Response> {
        panic!("noop model: send called, not intended for real LLM calls");
    }

    #[allow(unreachable_code)]
    fn stream(&self, _request: Request) -> impl Stream<Item = Result<StreamChunk>> + Send {
        panic!("noop model: stream called, not intended for real LLM calls");
        async_stream::stream! {
            yield Err(anyhow::anyhow!("not implemented"));
        }
    }
}
