//! Structural checks on the caller-supplied history.
//!
//! The checks run on raw JSON so a bad element gets a precise reason instead of
//! a generic deserialization error. Successful validation also resolves the
//! `parts` / `content` duality into [`ChatMessage`].

use serde_json::{Map, Value};

use crate::error::HistoryError;
use crate::message::{ChatMessage, InlineData, Part, Role};

/// Validate `history` and normalize every element.
///
/// Unknown fields on a message are ignored. An empty list is valid.
pub fn validate_history(history: &Value) -> Result<Vec<ChatMessage>, HistoryError> {
    let items = history.as_array().ok_or(HistoryError::NotAList)?;

    // Roles are checked for every element before any parts are looked at, so a
    // bad role later in the list wins over a bad part earlier on.
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let record = item.as_object().ok_or(HistoryError::MessageNotObject)?;
        let role = parse_role(record)?;
        records.push((role, record));
    }

    records
        .into_iter()
        .map(|(role, record)| Ok(ChatMessage::new(role, normalize_parts(record)?)))
        .collect()
}

fn parse_role(record: &Map<String, Value>) -> Result<Role, HistoryError> {
    match record.get("role") {
        None => Err(HistoryError::MissingRole),
        Some(Value::String(role)) if role == "user" => Ok(Role::User),
        Some(Value::String(role)) if role == "model" => Ok(Role::Model),
        Some(_) => Err(HistoryError::InvalidRole),
    }
}

fn normalize_parts(record: &Map<String, Value>) -> Result<Vec<Part>, HistoryError> {
    match record.get("parts") {
        Some(Value::Null) | None => {}
        Some(Value::Array(parts)) => return parts.iter().map(parse_part).collect(),
        Some(_) => return Err(HistoryError::InvalidParts),
    }

    match record.get("content") {
        Some(Value::Null) | None => Ok(vec![Part::text("")]),
        Some(Value::String(content)) => Ok(vec![Part::text(content.clone())]),
        Some(_) => Err(HistoryError::InvalidContent),
    }
}

fn parse_part(value: &Value) -> Result<Part, HistoryError> {
    match value {
        Value::String(text) => Ok(Part::text(text.clone())),
        Value::Object(obj) => {
            let inline = obj
                .get("inline_data")
                .and_then(Value::as_object)
                .ok_or(HistoryError::InvalidParts)?;
            let field = |name: &str| {
                inline
                    .get(name)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or(HistoryError::InvalidParts)
            };
            Ok(Part::InlineData {
                inline_data: InlineData {
                    mime_type: field("mime_type")?,
                    data: field("data")?,
                },
            })
        }
        _ => Err(HistoryError::InvalidParts),
    }
}
