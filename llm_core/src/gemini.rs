use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{CompletionBackend, FragmentStream};
use crate::error::LlmError;
use crate::message::{InlineData, Part, UpstreamMessage};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Request body for `streamGenerateContent`
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text { text: &'a str },
    Inline { inline_data: &'a InlineData },
}

impl<'a> GenerateRequest<'a> {
    fn from_messages(messages: &'a [UpstreamMessage]) -> Self {
        let contents = messages
            .iter()
            .map(|msg| Content {
                role: msg.role.as_str(),
                parts: msg
                    .parts
                    .iter()
                    .map(|part| match part {
                        Part::Text(text) => WirePart::Text { text },
                        Part::InlineData { inline_data } => WirePart::Inline { inline_data },
                    })
                    .collect(),
            })
            .collect();
        Self { contents }
    }
}

/// One `data:` event of the SSE response
#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// Streaming client for the Gemini `generateContent` REST API.
pub struct GeminiClient {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            client,
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different host (a proxy, or a test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    async fn stream_generate(&self, messages: &[UpstreamMessage]) -> Result<FragmentStream, LlmError> {
        let body = GenerateRequest::from_messages(messages);
        debug!("Opening Gemini stream: model={}, messages={}", self.model, messages.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(sse_fragments(response.bytes_stream())))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Turn a raw SSE byte stream into text fragments.
///
/// Lines are reassembled across network chunks before UTF-8 decoding, so a
/// multi-byte character split between two reads survives intact. A network
/// chunk that carries no text (keep-alive, partial line, finish-only event)
/// yields an empty fragment, so every upstream delivery reaches the caller.
fn sse_fragments<S, B>(bytes: S) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    async_stream::try_stream! {
        futures::pin_mut!(bytes);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            buffer.extend_from_slice(chunk?.as_ref());
            let mut delivered = false;
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(text) = parse_sse_line(&line)? {
                    delivered = true;
                    yield text;
                }
            }
            if !delivered {
                yield String::new();
            }
        }

        if let Some(text) = parse_sse_line(&buffer)? {
            yield text;
        }
    }
}

/// Text carried by one SSE line, if any. Comments, event names and blank
/// keep-alive lines yield `None`.
fn parse_sse_line(line: &[u8]) -> Result<Option<String>, LlmError> {
    let line = std::str::from_utf8(line).map_err(|e| LlmError::Decode(e.to_string()))?;
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    let event: StreamEvent = serde_json::from_str(payload)?;
    if let Some(err) = event.error {
        return Err(LlmError::Upstream(match err.code {
            Some(code) => format!("{code}: {}", err.message),
            None => err.message,
        }));
    }

    let text: String = event
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}
