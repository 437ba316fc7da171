use std::sync::Arc;

use llm_core::{CompletionBackend, GeminiClient};
use speech_core::{AzureSpeechClient, SpeechSynthesizer};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::session::{RedisSessionStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub llm: Arc<dyn CompletionBackend>,
    /// `None` when speech credentials are missing.
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    /// `None` when no store is configured or it could not be reached at startup.
    pub sessions: Option<Arc<dyn SessionStore>>,
}

impl AppState {
    /// Build every collaborator from `config`. Only the completion client is
    /// mandatory; speech and the session store degrade to `None`.
    pub async fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let llm = GeminiClient::new(&config.gemini_api_key, &config.gemini_model)?
            .with_base_url(&config.gemini_base_url);
        info!("Completion service: model={}", config.gemini_model);

        let speech: Option<Arc<dyn SpeechSynthesizer>> = match config.speech() {
            Some(speech_config) => {
                let client = AzureSpeechClient::new(speech_config)?;
                info!("Azure speech enabled: voice={}", client.voice());
                Some(Arc::new(client))
            }
            None => {
                warn!("SPEECH_KEY/SPEECH_REGION not set, speech endpoint disabled");
                None
            }
        };

        let sessions: Option<Arc<dyn SessionStore>> = match config.redis_url.as_deref() {
            Some(url) => match RedisSessionStore::connect(url, config.session_ttl_secs).await {
                Ok(store) => {
                    info!("Connected to Redis session store");
                    Some(Arc::new(store))
                }
                Err(e) => {
                    error!("Could not connect to Redis: {e}, continuing without session store");
                    None
                }
            },
            None => {
                warn!("REDIS_URL not set, conversations will not be recorded");
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            llm: Arc::new(llm),
            speech,
            sessions,
        })
    }
}
