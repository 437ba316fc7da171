use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::ssml::build_ssml;
use crate::{SpeechError, SpeechSynthesizer};

pub const DEFAULT_VOICE: &str = "ru-RU-DmitryNeural";
pub const OUTPUT_FORMAT: &str = "audio-16khz-32kbitrate-mono-mp3";
const USER_AGENT: &str = "KidsAI";

#[derive(Debug, Clone)]
pub struct AzureSpeechConfig {
    pub key: String,
    pub region: String,
    pub voice: String,
    pub timeout: Duration,
    /// Overrides the regional endpoint when set.
    pub endpoint: Option<String>,
}

impl AzureSpeechConfig {
    pub fn new(key: &str, region: &str) -> Self {
        Self {
            key: key.to_string(),
            region: region.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            timeout: Duration::from_secs(30),
            endpoint: None,
        }
    }

    pub fn endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            )
        })
    }
}

/// Client for the Azure Cognitive Services text-to-speech REST endpoint.
pub struct AzureSpeechClient {
    config: AzureSpeechConfig,
    client: Client,
}

impl AzureSpeechClient {
    pub fn new(config: AzureSpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SpeechError::from_reqwest)?;
        Ok(Self { config, client })
    }

    pub fn voice(&self) -> &str {
        &self.config.voice
    }
}

#[async_trait]
impl SpeechSynthesizer for AzureSpeechClient {
    async fn synthesize_audio(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let ssml = build_ssml(&self.config.voice, text);
        debug!("Requesting speech: voice={}, chars={}", self.config.voice, text.chars().count());

        let response = self
            .client
            .post(self.config.endpoint())
            .header("Ocp-Apim-Subscription-Key", &self.config.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", USER_AGENT)
            .body(ssml)
            .send()
            .await
            .map_err(SpeechError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await.map_err(SpeechError::from_reqwest)?;
        Ok(audio.to_vec())
    }
}
