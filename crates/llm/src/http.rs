//! Shared HTTP transport for OpenAI-compatible LLM providers.
//!
//! `HttpProvider` wraps a `reqwest::Client` with pre-configured headers and
//! endpoint URL. Provides `send()` for non-streaming and a Server-Sent
//! Events stream for streaming responses. Non-2xx responses are parsed into
//! [`ApiError`]; transient failures (429/5xx) are retried a fixed number of
//! times before the last error is wrapped in [`RetryExhausted`].

use crate::{ApiError, Model, Request, Response, RetryExhausted, StreamChunk};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{
    Client, Method,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use std::time::Duration;

/// Retries after the initial attempt on 429/5xx.
const TRANSIENT_RETRIES: u32 = 2;
/// Fixed delay between transient retries.
const TRANSIENT_DELAY: Duration = Duration::from_secs(1);

/// Shared HTTP transport for OpenAI-compatible providers.
///
/// Holds a `reqwest::Client`, pre-built headers (auth + content-type),
/// and the target endpoint URL.
#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    headers: HeaderMap,
    endpoint: String,
    retries: u32,
    retry_delay: Duration,
}

impl HttpProvider {
    /// Create a provider with Bearer token authentication.
    pub fn bearer(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        let mut headers = base_headers();
        headers.insert(header::AUTHORIZATION, format!("Bearer {key}").parse()?);
        Ok(Self::with_headers(client, headers, endpoint))
    }

    /// Create a provider without authentication (e.g. a local Ollama).
    pub fn no_auth(client: Client, endpoint: &str) -> Self {
        Self::with_headers(client, base_headers(), endpoint)
    }

    /// Create a provider with a custom header for authentication.
    ///
    /// Used by providers that don't use Bearer tokens (e.g. Anthropic
    /// uses `x-api-key`).
    pub fn custom_header(
        client: Client,
        header_name: &str,
        header_value: &str,
        endpoint: &str,
    ) -> Result<Self> {
        let mut headers = base_headers();
        headers.insert(
            header_name.parse::<HeaderName>()?,
            header_value.parse::<HeaderValue>()?,
        );
        Ok(Self::with_headers(client, headers, endpoint))
    }

    fn with_headers(client: Client, headers: HeaderMap, endpoint: &str) -> Self {
        Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
            retries: TRANSIENT_RETRIES,
            retry_delay: TRANSIENT_DELAY,
        }
    }

    /// Add an extra request header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        self.headers.insert(
            name.parse::<HeaderName>()?,
            value.parse::<HeaderValue>()?,
        );
        Ok(self)
    }

    /// Override the transient-retry budget.
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Issue one request and parse the response or error body.
    async fn send_once(&self, request: &Request) -> Result<Response> {
        tracing::trace!("request: {}", serde_json::to_string(request)?);
        let response = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_body(status.as_u16(), &text).into());
        }

        tracing::trace!("response: {text}");
        serde_json::from_str(&text).map_err(Into::into)
    }
}

impl Model for HttpProvider {
    async fn send(&self, request: &Request) -> Result<Response> {
        let attempts = self.retries + 1;
        let mut last: Option<ApiError> = None;

        for attempt in 1..=attempts {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) => match err.downcast::<ApiError>() {
                    Ok(api) if api.is_transient() && attempt < attempts => {
                        tracing::warn!(
                            status = api.status,
                            attempt,
                            "transient provider error, retrying"
                        );
                        last = Some(api);
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    Ok(api) if api.is_transient() => {
                        return Err(RetryExhausted {
                            attempts,
                            source: api,
                        }
                        .into());
                    }
                    Ok(api) => return Err(api.into()),
                    Err(err) => return Err(err),
                },
            }
        }

        // Unreachable: the loop always returns. Kept for the type checker.
        Err(RetryExhausted {
            attempts,
            source: last.unwrap_or_else(|| ApiError::from_body(500, "")),
        }
        .into())
    }

    /// Stream an SSE response (OpenAI-compatible format).
    ///
    /// Parses `data: ` prefixed lines, skips the `[DONE]` sentinel, and
    /// deserializes each chunk as [`StreamChunk`]. No transient retry: a
    /// stream that has started producing cannot be transparently restarted.
    fn stream(&self, request: Request) -> impl Stream<Item = Result<StreamChunk>> + Send {
        let this = self.clone();
        try_stream! {
            let response = this
                .client
                .request(Method::POST, &this.endpoint)
                .headers(this.headers.clone())
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::from_body(status.as_u16(), &text))?;
                return;
            }

            let mut stream = response.bytes_stream();
            while let Some(next) = stream.next().await {
                let bytes = next?;
                let text = String::from_utf8_lossy(&bytes);
                tracing::trace!("chunk: {}", text);
                for data in text.split("data: ").skip(1).filter(|s| !s.starts_with("[DONE]")) {
                    let trimmed = data.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StreamChunk>(trimmed) {
                        Ok(chunk) => yield chunk,
                        Err(e) => tracing::warn!("failed to parse chunk: {e}, data: {trimmed}"),
                    }
                }
            }
        }
    }
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}
