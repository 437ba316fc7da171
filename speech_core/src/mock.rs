use std::sync::Mutex;

use async_trait::async_trait;

use crate::{SpeechError, SpeechSynthesizer};

type ErrorFactory = Box<dyn Fn() -> SpeechError + Send + Sync>;

/// Scripted synthesizer for tests. Records every text it is asked to speak.
pub struct MockSynthesizer {
    audio: Vec<u8>,
    error: Option<ErrorFactory>,
    requests: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn returning(audio: Vec<u8>) -> Self {
        Self {
            audio,
            error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> SpeechError + Send + Sync + 'static,
    {
        Self {
            audio: Vec::new(),
            error: Some(Box::new(error)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize_audio(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(text.to_string());
        }
        match &self.error {
            Some(make) => Err(make()),
            None => Ok(self.audio.clone()),
        }
    }
}
