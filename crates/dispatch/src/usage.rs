//! Usage accounting seam.
//!
//! The dispatcher forwards token usage to a [`UsageSink`] after every
//! successful call. Persistence is the embedder's concern; `()` is the
//! no-op sink.

use compact_str::CompactString;
use llm::Usage;

/// One provider call's worth of usage, attributed to a user and a label.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    /// Provider that served the call.
    pub provider: CompactString,
    /// Model that served the call.
    pub model: CompactString,
    /// Token usage reported by the provider.
    pub usage: Usage,
    /// Caller-supplied label (e.g. which feature issued the call).
    pub label: CompactString,
}

/// Receives usage records from the dispatcher.
pub trait UsageSink: Send + Sync {
    /// Record usage for a user. Failures are the sink's problem; the
    /// dispatcher never fails a call over accounting.
    fn record(&self, user: &str, record: UsageRecord) -> impl Future<Output = ()> + Send;
}

/// `()` as the no-op sink.
impl UsageSink for () {
    async fn record(&self, _user: &str, _record: UsageRecord) {}
}

/// Sinks can be shared between the dispatcher and their owner.
impl<T: UsageSink> UsageSink for std::sync::Arc<T> {
    async fn record(&self, user: &str, record: UsageRecord) {
        T::record(self, user, record).await;
    }
}
