use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("No token found. Please login first.")]
    MissingCredential,

    #[error("Authentication failed. Please login again.")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    /// The backend refused to create something that already exists.
    #[error("conversation already exists")]
    Conflict { existing_id: Option<String> },

    #[error("{}", server_text(.status, .message))]
    Server { status: u16, message: Option<String> },

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cache error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn server_text(status: &u16, message: &Option<String>) -> String {
    match message.as_deref() {
        Some(m) if !m.is_empty() => format!("{} ({})", m, status),
        _ => format!("HTTP {}", status),
    }
}

impl ChatError {
    /// Maps a non-2xx status to an error. `body` may carry a backend `message`.
    pub fn from_status(status: u16, body: Option<&serde_json::Value>) -> Self {
        let message = body
            .and_then(|b| b.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string);
        match status {
            401 => ChatError::Unauthorized,
            404 => ChatError::NotFound,
            409 => ChatError::Conflict {
                existing_id: body
                    .and_then(|b| b.get("chatId"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
            _ => ChatError::Server { status, message },
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ChatError::Validation(msg.into())
    }
}

impl From<toml::de::Error> for ChatError {
    fn from(e: toml::de::Error) -> Self {
        ChatError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for ChatError {
    fn from(e: toml::ser::Error) -> Self {
        ChatError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_codes_map_to_taxonomy() {
        assert!(matches!(ChatError::from_status(404, None), ChatError::NotFound));
        assert!(matches!(ChatError::from_status(401, None), ChatError::Unauthorized));
        assert!(matches!(ChatError::from_status(500, None), ChatError::Server { status: 500, .. }));
        assert!(matches!(ChatError::from_status(403, None), ChatError::Server { status: 403, .. }));
    }

    #[test]
    fn conflict_carries_existing_chat() {
        let body = json!({ "chatId": "c-9" });
        match ChatError::from_status(409, Some(&body)) {
            ChatError::Conflict { existing_id } => assert_eq!(existing_id.as_deref(), Some("c-9")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_message_is_kept_for_display() {
        let body = json!({ "message": "Chat is locked" });
        let err = ChatError::from_status(422, Some(&body));
        assert_eq!(err.to_string(), "Chat is locked (422)");
        assert_eq!(ChatError::from_status(502, None).to_string(), "HTTP 502");
    }
}
