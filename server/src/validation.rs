use llm_core::{validate_history, ChatMessage};
use serde_json::Value;

use crate::error::ApiError;

/// Maximum text length for speech requests
const MAX_TEXT_LENGTH: usize = 5000;
/// Maximum length of a client-chosen conversation key
const MAX_CONVERSATION_ID_LENGTH: usize = 128;

/// A chat body that passed every structural check.
#[derive(Debug)]
pub struct ChatRequest {
    pub history: Vec<ChatMessage>,
    pub user_id: Option<String>,
}

/// Check a `/chat` body: a non-empty object whose `history` (if any) is a
/// valid history and whose `userId` (if any) is a usable conversation key.
pub fn validate_chat_request(body: &Value) -> Result<ChatRequest, ApiError> {
    let obj = non_empty_object(body)?;

    let history = match obj.get("history") {
        None => Vec::new(),
        Some(history) => validate_history(history)?,
    };

    let user_id = match obj.get("userId") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => {
            validate_conversation_id(id)?;
            Some(id.clone())
        }
        Some(_) => {
            return Err(ApiError::InvalidInput("userId must be a string".to_string()));
        }
    };

    Ok(ChatRequest { history, user_id })
}

/// Check a `/speech` body and return its text.
pub fn validate_speech_request(body: &Value) -> Result<String, ApiError> {
    let obj = non_empty_object(body)?;

    let text = match obj.get("text") {
        Some(Value::String(text)) if !text.is_empty() => text,
        _ => return Err(ApiError::InvalidInput("text is required".to_string())),
    };
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    Ok(text.clone())
}

/// Conversation keys are 1-128 ASCII letters, digits, `-` or `_`.
pub fn validate_conversation_id(id: &str) -> Result<(), ApiError> {
    let well_formed = !id.is_empty()
        && id.len() <= MAX_CONVERSATION_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!(
            "Invalid conversation id: expected 1-{} characters of [A-Za-z0-9_-]",
            MAX_CONVERSATION_ID_LENGTH
        )))
    }
}

fn non_empty_object(body: &Value) -> Result<&serde_json::Map<String, Value>, ApiError> {
    match body {
        Value::Object(obj) if !obj.is_empty() => Ok(obj),
        Value::Object(_) | Value::Null => {
            Err(ApiError::InvalidInput("Request body cannot be empty".to_string()))
        }
        _ => Err(ApiError::InvalidInput("Request body must be a JSON object".to_string())),
    }
}
