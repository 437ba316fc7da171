use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tracing::{debug, error};

use crate::backend::CompletionBackend;
use crate::error::LlmError;
use crate::message::UpstreamMessage;

pub const DEFAULT_ERROR_TEXT: &str = "Извините, произошла ошибка при генерации ответа.";

/// One item of relayed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// A fragment of the model's reply.
    Text(String),
    /// The apology that replaces the rest of the reply after a failure.
    /// Always the last item of its stream.
    Failure(String),
}

impl StreamChunk {
    pub fn as_str(&self) -> &str {
        match self {
            StreamChunk::Text(text) | StreamChunk::Failure(text) => text,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            StreamChunk::Text(text) | StreamChunk::Failure(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StreamChunk::Failure(_))
    }
}

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Longest wait for the upstream to open, or to deliver the next fragment.
    pub idle_timeout: Duration,
    /// Text of the failure chunk.
    pub error_text: String,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
            error_text: DEFAULT_ERROR_TEXT.to_string(),
        }
    }
}

/// Relay one generation call as a stream of chunks.
///
/// Nothing happens until the stream is first polled. The stream never fails:
/// any upstream error, including an idle timeout, becomes one trailing
/// [`StreamChunk::Failure`] and the stream then ends.
pub fn relay(
    backend: Arc<dyn CompletionBackend>,
    messages: Vec<UpstreamMessage>,
    options: RelayOptions,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        let timeout_secs = options.idle_timeout.as_secs();
        let opened = match tokio::time::timeout(options.idle_timeout, backend.stream_generate(&messages)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Idle(timeout_secs)),
        };

        match opened {
            Err(e) => {
                error!("Failed to open stream to {}: {}", backend.model(), e);
                yield StreamChunk::Failure(options.error_text.clone());
            }
            Ok(mut upstream) => {
                let mut relayed = 0usize;
                loop {
                    let next = match tokio::time::timeout(options.idle_timeout, upstream.next()).await {
                        Ok(next) => next,
                        Err(_) => Some(Err(LlmError::Idle(timeout_secs))),
                    };
                    match next {
                        Some(Ok(text)) => {
                            if !text.is_empty() {
                                relayed += 1;
                                yield StreamChunk::Text(text);
                            }
                        }
                        Some(Err(e)) => {
                            error!("Stream from {} failed after {} fragment(s): {}", backend.model(), relayed, e);
                            yield StreamChunk::Failure(options.error_text.clone());
                            break;
                        }
                        None => {
                            debug!("Stream from {} completed with {} fragment(s)", backend.model(), relayed);
                            break;
                        }
                    }
                }
            }
        }
    }
}
