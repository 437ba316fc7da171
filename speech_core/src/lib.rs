pub mod azure;
pub mod mock;
mod ssml;

use async_trait::async_trait;
use base64::Engine; // for STANDARD.encode()
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

pub use azure::{AzureSpeechClient, AzureSpeechConfig};
pub use ssml::{build_ssml, sanitize_for_speech, voice_locale};

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech service timed out")]
    Timeout,

    #[error("speech service request failed: {0}")]
    Transport(reqwest::Error),

    #[error("speech service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl SpeechError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Transport(e)
        }
    }

    /// Short text safe to hand to the browser.
    pub fn public_message(&self) -> &'static str {
        match self {
            SpeechError::Timeout => "Speech service timed out",
            SpeechError::Transport(_) | SpeechError::Status { .. } => "Speech service unavailable",
        }
    }
}

/// Anything that can turn plain text into encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize_audio(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

/// Outcome of one speech request, as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechResult {
    pub audio_base64: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SpeechResult {
    pub fn audio(audio: &[u8]) -> Self {
        Self {
            audio_base64: Some(base64::engine::general_purpose::STANDARD.encode(audio)),
            success: true,
            message: None,
        }
    }

    pub fn unavailable(message: &str) -> Self {
        Self {
            audio_base64: None,
            success: false,
            message: Some(message.to_string()),
        }
    }
}

/// Sanitize `text`, synthesize it, and encode the audio.
///
/// Never fails: upstream errors are logged and reported as an unsuccessful
/// result so the caller can carry on without audio.
pub async fn forward_speech(synth: &dyn SpeechSynthesizer, text: &str) -> SpeechResult {
    let clean = sanitize_for_speech(text);
    match synth.synthesize_audio(&clean).await {
        Ok(audio) => {
            info!("Speech synthesized: {} chars -> {} bytes", clean.chars().count(), audio.len());
            SpeechResult::audio(&audio)
        }
        Err(e) => {
            error!("Speech synthesis failed: {}", e);
            SpeechResult::unavailable(e.public_message())
        }
    }
}
