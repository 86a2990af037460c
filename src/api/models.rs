use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserSummary {
    pub fn initial(&self) -> String {
        self.fullname.chars().next().map(|c| c.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Voice,
}

impl MessageKind {
    /// Classifies an attachment by its URL extension.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.rsplit('/').next().unwrap_or(path);
        let ext = file.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
        match ext.as_str() {
            "jpeg" | "jpg" | "gif" | "png" | "webp" => MessageKind::Image,
            "mp3" | "wav" | "ogg" => MessageKind::Voice,
            _ => MessageKind::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub kind: MessageKind,
    pub url: String,
    pub name: Option<String>,
    pub size: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Message {
    pub fn author_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.id.as_str())
            .or(self.user_id.as_deref())
    }

    pub fn kind(&self) -> MessageKind {
        match &self.file_url {
            Some(url) => MessageKind::from_url(url),
            None => MessageKind::Text,
        }
    }

    pub fn attachment(&self) -> Option<Attachment> {
        let url = self.file_url.clone()?;
        Some(Attachment {
            kind: MessageKind::from_url(&url),
            url,
            name: self.file_name.clone(),
            size: self.file_size.clone(),
            duration: self.duration.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub users: Vec<Participant>,
    #[serde(default)]
    pub messages: Vec<Message>,
    // Client-only flags; they only ever reach the local cache.
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_muted: bool,
}

/// Preview of the newest message shown in the conversation list.
#[derive(Debug, Clone, PartialEq)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
}

impl Conversation {
    pub fn recency(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    pub fn other_participant(&self, current_user_id: &str) -> Option<&Participant> {
        self.users.iter().find(|p| p.user_id != current_user_id)
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.users.iter().any(|p| p.user_id == user_id)
    }

    pub fn display_name(&self, current_user_id: &str, fallback: &str) -> String {
        if self.is_group {
            return self.name.clone().unwrap_or_else(|| "Group Chat".to_string());
        }
        self.other_participant(current_user_id)
            .map(|p| p.user.fullname.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn avatar(&self, current_user_id: &str) -> Option<String> {
        if self.is_group {
            return None;
        }
        self.other_participant(current_user_id)
            .and_then(|p| p.user.profile_photo.clone())
    }

    pub fn last_message(&self, current_user_id: &str) -> LastMessage {
        match self.messages.iter().max_by_key(|m| m.created_at) {
            Some(m) => LastMessage {
                content: m.content.clone(),
                timestamp: m.created_at,
                is_from_me: m.author_id() == Some(current_user_id),
            },
            None => LastMessage {
                content: "No messages yet".to_string(),
                timestamp: self.created_at,
                is_from_me: false,
            },
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    pub participant_ids: Vec<String>,
    pub is_group: bool,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExistsCheck {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub chat_id: Option<String>,
}

/// Login response. Identity fields are optional; some deployments only return the token.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A file chosen for upload alongside a message.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub local_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingPayload {
    Text(String),
    WithFile { content: Option<String>, file: FileUpload },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation_json() -> serde_json::Value {
        json!({
            "id": "c1",
            "name": null,
            "isGroup": false,
            "adminId": null,
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-02T10:00:00Z",
            "users": [
                { "userId": "me", "chatId": "c1", "joinedAt": "2024-03-01T10:00:00Z",
                  "user": { "id": "me", "fullname": "Me Myself" } },
                { "userId": "u2", "chatId": "c1", "joinedAt": "2024-03-01T10:00:00Z",
                  "user": { "id": "u2", "fullname": "Amina Diallo", "profile_photo": "https://cdn/a.png" } }
            ],
            "messages": [
                { "id": "m2", "content": "see you", "createdAt": "2024-03-02T09:00:00Z", "userId": "u2" },
                { "id": "m1", "content": "hello", "createdAt": "2024-03-01T11:00:00Z", "userId": "me" }
            ]
        })
    }

    #[test]
    fn direct_conversation_uses_other_participant() {
        let conv: Conversation = serde_json::from_value(conversation_json()).unwrap();
        assert_eq!(conv.display_name("me", "Unknown User"), "Amina Diallo");
        assert_eq!(conv.avatar("me").as_deref(), Some("https://cdn/a.png"));
        assert!(!conv.is_pinned);

        let last = conv.last_message("me");
        assert_eq!(last.content, "see you");
        assert!(!last.is_from_me);
    }

    #[test]
    fn group_and_empty_fallbacks() {
        let mut value = conversation_json();
        value["isGroup"] = json!(true);
        value["messages"] = json!([]);
        let conv: Conversation = serde_json::from_value(value).unwrap();
        assert_eq!(conv.display_name("me", "Chat"), "Group Chat");
        assert_eq!(conv.last_message("me").content, "No messages yet");
        assert_eq!(conv.last_message("me").timestamp, conv.created_at);
    }

    #[test]
    fn attachment_kind_follows_extension() {
        assert_eq!(MessageKind::from_url("https://x/p.JPG"), MessageKind::Image);
        assert_eq!(MessageKind::from_url("https://x/note.ogg?sig=1"), MessageKind::Voice);
        assert_eq!(MessageKind::from_url("https://x/report.pdf"), MessageKind::File);
        assert_eq!(MessageKind::from_url("https://x/noext"), MessageKind::File);
    }
}
