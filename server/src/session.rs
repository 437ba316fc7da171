//! Optional per-conversation transcript.
//!
//! The client's own `history` is always what gets forwarded upstream; the
//! store only keeps a copy of finished turns keyed by the client's `userId`.

use async_trait::async_trait;
use chrono::Utc;
use llm_core::ChatMessage;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append `messages` to the end of a conversation.
    async fn append(&self, conversation_id: &str, messages: &[ChatMessage]) -> Result<(), SessionError>;

    /// The last `limit` messages of a conversation, oldest first.
    async fn history(&self, conversation_id: &str, limit: usize) -> Result<Vec<ChatMessage>, SessionError>;
}

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    #[serde(flatten)]
    message: ChatMessage,
    timestamp: i64,
}

/// Redis list per conversation, expiring `ttl_secs` after the last append.
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    key_prefix: String,
    ttl_secs: u64,
}

impl RedisSessionStore {
    /// Connect and ping, so a bad URL is noticed at startup rather than on
    /// the first chat.
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, SessionError> {
        let client = Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self {
            conn,
            key_prefix: "chat:history:".to_string(),
            ttl_secs,
        })
    }

    fn key(&self, conversation_id: &str) -> String {
        format!("{}{}", self.key_prefix, conversation_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn append(&self, conversation_id: &str, messages: &[ChatMessage]) -> Result<(), SessionError> {
        if messages.is_empty() {
            return Ok(());
        }
        let key = self.key(conversation_id);
        let timestamp = Utc::now().timestamp();
        let entries = messages
            .iter()
            .map(|message| {
                serde_json::to_string(&StoredMessage {
                    message: message.clone(),
                    timestamp,
                })
            })
            .collect::<Result<Vec<String>, _>>()?;

        let mut conn = self.conn.clone();
        append_pipeline(&key, entries, self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn history(&self, conversation_id: &str, limit: usize) -> Result<Vec<ChatMessage>, SessionError> {
        let Some((start, stop)) = tail_range(limit) else {
            return Ok(Vec::new());
        };
        let mut conn = self.conn.clone();
        let entries: Vec<String> = conn.lrange(self.key(conversation_id), start, stop).await?;

        let mut messages = Vec::with_capacity(entries.len());
        for entry in &entries {
            match serde_json::from_str::<StoredMessage>(entry) {
                Ok(stored) => messages.push(stored.message),
                Err(e) => warn!("Skipping unreadable history entry for {}: {}", conversation_id, e),
            }
        }
        Ok(messages)
    }
}

/// RPUSH the entries and refresh the TTL in one MULTI/EXEC.
fn append_pipeline(key: &str, entries: Vec<String>, ttl_secs: u64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .rpush(key, entries)
        .ignore()
        .cmd("EXPIRE")
        .arg(key)
        .arg(ttl_secs)
        .ignore();
    pipe
}

/// LRANGE bounds for the newest `limit` entries, oldest first.
fn tail_range(limit: usize) -> Option<(isize, isize)> {
    if limit == 0 {
        return None;
    }
    let start = -(limit.min(isize::MAX as usize) as isize);
    Some((start, -1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_core::{InlineData, Part, Role};

    #[test]
    fn test_stored_message_format() {
        let stored = StoredMessage {
            message: ChatMessage::new(
                Role::User,
                vec![
                    Part::text("look"),
                    Part::InlineData {
                        inline_data: InlineData { mime_type: "image/png".into(), data: "AA".into() },
                    },
                ],
            ),
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "role": "user",
                "parts": ["look", { "inline_data": { "mime_type": "image/png", "data": "AA" } }],
                "timestamp": 1_700_000_000
            })
        );

        let back: StoredMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.message, stored.message);
    }

    fn packed(pipe: &redis::Pipeline) -> String {
        String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned()
    }

    #[test]
    fn test_append_pipeline_refreshes_ttl_atomically() {
        let key = "chat:history:kid-1";
        let pipe = append_pipeline(key, vec!["a".into(), "b".into()], 86400);
        let wire = packed(&pipe);

        let multi = wire.find("MULTI").unwrap();
        let rpush = wire.find("RPUSH").unwrap();
        let expire = wire.find("EXPIRE").unwrap();
        let exec = wire.find("EXEC").unwrap();
        assert!(multi < rpush && rpush < expire && expire < exec);
        assert!(wire[expire..exec].contains("$18\r\nchat:history:kid-1\r\n$5\r\n86400\r\n"));
        assert!(wire[rpush..expire].contains("$1\r\na\r\n$1\r\nb\r\n"));
    }

    #[test]
    fn test_tail_range() {
        assert_eq!(tail_range(0), None);
        assert_eq!(tail_range(1), Some((-1, -1)));
        assert_eq!(tail_range(50), Some((-50, -1)));
        assert_eq!(tail_range(usize::MAX), Some((-isize::MAX, -1)));
    }
}
