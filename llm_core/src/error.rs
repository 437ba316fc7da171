use thiserror::Error;

/// Reasons a submitted history is rejected. The `Display` text is part of the
/// HTTP contract and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history must be a list")]
    NotAList,

    #[error("each message must be an object")]
    MessageNotObject,

    #[error("each message must contain a 'role' field")]
    MissingRole,

    #[error("role must be 'user' or 'model'")]
    InvalidRole,

    #[error("'parts' must be a list of text or inline data")]
    InvalidParts,

    #[error("'content' must be a string")]
    InvalidContent,
}

/// Failures talking to the completion service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream reported an error: {0}")]
    Upstream(String),

    #[error("malformed stream payload: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no data from upstream for {0} seconds")]
    Idle(u64),
}
