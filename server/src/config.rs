// Configuration for the server, read once at startup

use std::str::FromStr;
use std::time::Duration;

use llm_core::{gemini, ContextWindow, RelayOptions};
use speech_core::AzureSpeechConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub debug: bool,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub cors_allowed_origins: Option<Vec<String>>,

    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub system_instruction: String,
    pub chat_error_message: String,
    pub llm_timeout_secs: u64,
    pub max_history_messages: Option<usize>,
    pub max_history_chars: Option<usize>,

    pub speech_key: Option<String>,
    pub speech_region: Option<String>,
    pub speech_endpoint: Option<String>,
    pub voice_name: String,
    pub speech_timeout_secs: u64,

    pub redis_url: Option<String>,
    pub session_ttl_secs: u64,
    pub session_history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            debug: false,
            request_timeout_secs: 60,
            max_body_bytes: 10 * 1024 * 1024,
            cors_allowed_origins: None,
            gemini_api_key: String::new(),
            gemini_model: gemini::DEFAULT_MODEL.to_string(),
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            system_instruction: llm_core::DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            chat_error_message: llm_core::relay::DEFAULT_ERROR_TEXT.to_string(),
            llm_timeout_secs: 120,
            max_history_messages: None,
            max_history_chars: None,
            speech_key: None,
            speech_region: None,
            speech_endpoint: None,
            voice_name: speech_core::azure::DEFAULT_VOICE.to_string(),
            speech_timeout_secs: 30,
            redis_url: None,
            session_ttl_secs: 24 * 60 * 60,
            session_history_limit: 50,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source. Unparsable numbers
    /// fall back to their defaults; empty strings count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let gemini_api_key = var("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .or_else(|| var("FRONTEND_URL"))
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Ok(Self {
            port: parsed(var("PORT")).unwrap_or(defaults.port),
            debug: var("DEBUG").map(|v| parse_flag(&v)).unwrap_or(false),
            request_timeout_secs: parsed(var("REQUEST_TIMEOUT_SECS")).unwrap_or(defaults.request_timeout_secs),
            max_body_bytes: parsed(var("MAX_BODY_BYTES")).unwrap_or(defaults.max_body_bytes),
            cors_allowed_origins,
            gemini_api_key,
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            system_instruction: var("SYSTEM_INSTRUCTION").unwrap_or(defaults.system_instruction),
            chat_error_message: var("CHAT_ERROR_MESSAGE").unwrap_or(defaults.chat_error_message),
            llm_timeout_secs: parsed(var("LLM_TIMEOUT_SECS")).unwrap_or(defaults.llm_timeout_secs),
            max_history_messages: parsed(var("MAX_HISTORY_MESSAGES")),
            max_history_chars: parsed(var("MAX_HISTORY_CHARS")),
            speech_key: var("SPEECH_KEY"),
            speech_region: var("SPEECH_REGION"),
            speech_endpoint: var("SPEECH_ENDPOINT"),
            voice_name: var("AZURE_VOICE_NAME").unwrap_or(defaults.voice_name),
            speech_timeout_secs: parsed(var("SPEECH_TIMEOUT_SECS")).unwrap_or(defaults.speech_timeout_secs),
            redis_url: var("REDIS_URL"),
            session_ttl_secs: parsed(var("SESSION_TTL_SECS")).unwrap_or(defaults.session_ttl_secs),
            session_history_limit: parsed(var("SESSION_HISTORY_LIMIT")).unwrap_or(defaults.session_history_limit),
        })
    }

    /// Default tracing filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn context_window(&self) -> ContextWindow {
        ContextWindow {
            max_messages: self.max_history_messages,
            max_chars: self.max_history_chars,
        }
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            idle_timeout: self.llm_timeout(),
            error_text: self.chat_error_message.clone(),
        }
    }

    /// Azure settings, if both key and region are present.
    pub fn speech(&self) -> Option<AzureSpeechConfig> {
        let (key, region) = (self.speech_key.as_deref()?, self.speech_region.as_deref()?);
        Some(AzureSpeechConfig {
            voice: self.voice_name.clone(),
            timeout: Duration::from_secs(self.speech_timeout_secs),
            endpoint: self.speech_endpoint.clone(),
            ..AzureSpeechConfig::new(key, region)
        })
    }
}

fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}

/// `true`, `1`, `yes` and `on` in any case.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
