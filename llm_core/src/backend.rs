use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::LlmError;
use crate::message::UpstreamMessage;

/// Incremental text deltas from one generation call, in delivery order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// A completion service that can stream a reply for a full conversation.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Open one streaming generation call. The returned stream owns the
    /// connection; dropping it abandons the call.
    async fn stream_generate(&self, messages: &[UpstreamMessage]) -> Result<FragmentStream, LlmError>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}
