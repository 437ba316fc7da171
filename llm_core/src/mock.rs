use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use crate::backend::{CompletionBackend, FragmentStream};
use crate::error::LlmError;
use crate::message::UpstreamMessage;

/// A backend that replays a scripted reply, for tests.
pub struct MockBackend {
    fragments: Vec<String>,
    fail_after: Option<String>,
    fail_on_open: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<UpstreamMessage>>>,
}

impl MockBackend {
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            fail_after: None,
            fail_on_open: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Deliver `fragments`, then fail with `reason`.
    pub fn failing_after<I, S>(fragments: I, reason: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail_after: Some(reason.to_string()),
            ..Self::from_fragments(fragments)
        }
    }

    /// Refuse to open the stream at all.
    pub fn failing_on_open(reason: &str) -> Self {
        Self {
            fail_on_open: Some(reason.to_string()),
            ..Self::from_fragments(Vec::<String>::new())
        }
    }

    /// Sleep before every delivery.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Message lists this backend has been called with.
    pub fn calls(&self) -> Vec<Vec<UpstreamMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn stream_generate(&self, messages: &[UpstreamMessage]) -> Result<FragmentStream, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Some(reason) = &self.fail_on_open {
            return Err(LlmError::Upstream(reason.clone()));
        }

        let mut items: Vec<Result<String, LlmError>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(reason) = &self.fail_after {
            items.push(Err(LlmError::Upstream(reason.clone())));
        }

        let delay = self.delay;
        let stream = stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        "mock"
    }
}
