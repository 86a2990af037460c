//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::ChatBackend;
use crate::api::models::{
    Conversation, LoginResponse, Message, NewConversation, OutgoingPayload, Participant,
    UserSummary,
};
use crate::app::AppState;
use crate::error::{ChatError, Result};
use crate::session::Session;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn user(id: &str, name: &str) -> UserSummary {
    UserSummary { id: id.into(), fullname: name.into(), ..UserSummary::default() }
}

pub fn participant(chat_id: &str, user_id: &str) -> Participant {
    Participant {
        user_id: user_id.into(),
        chat_id: chat_id.into(),
        joined_at: Some(epoch()),
        user: user(user_id, &format!("User {user_id}")),
    }
}

pub fn conversation(id: &str) -> Conversation {
    Conversation {
        id: id.into(),
        name: None,
        is_group: false,
        admin_id: None,
        created_at: epoch(),
        updated_at: None,
        users: Vec::new(),
        messages: Vec::new(),
        is_pinned: false,
        is_muted: false,
    }
}

pub fn direct(id: &str, me: &str, other: &str) -> Conversation {
    let mut c = conversation(id);
    c.users = vec![participant(id, me), participant(id, other)];
    c
}

pub fn message(id: &str, author: &str, content: &str, minutes: i64) -> Message {
    Message {
        id: id.into(),
        content: content.into(),
        created_at: epoch() + Duration::minutes(minutes),
        user: Some(user(author, &format!("User {author}"))),
        user_id: None,
        file_url: None,
        file_name: None,
        file_size: None,
        duration: None,
    }
}

pub fn signed_in() -> Session {
    Session::new(AppState {
        base_url: "https://api.test".into(),
        access_token: Some("tok".into()),
        user_id: Some("me".into()),
        user_name: Some("Me".into()),
        ..AppState::default()
    })
}

/// In-memory backend recording every call by operation name.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, (u16, Option<Value>)>>,
    pub chats: Mutex<Vec<Conversation>>,
    pub users: Mutex<Vec<UserSummary>>,
    pub existing: Mutex<Option<String>>,
    pub login_reply: Mutex<LoginResponse>,
    next_id: AtomicU64,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chats(chats: Vec<Conversation>) -> Self {
        let fake = Self::new();
        *fake.chats.lock().unwrap() = chats;
        fake
    }

    pub fn fail(&self, op: &'static str, status: u16) {
        self.failures.lock().unwrap().insert(op, (status, None));
    }

    pub fn fail_with(&self, op: &'static str, status: u16, body: Value) {
        self.failures.lock().unwrap().insert(op, (status, Some(body)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == op).count()
    }

    fn record(&self, op: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        match self.failures.lock().unwrap().get(op) {
            Some((status, body)) => Err(ChatError::from_status(*status, body.as_ref())),
            None => Ok(()),
        }
    }

    fn next(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn chat(&self, chat_id: &str) -> Result<Conversation> {
        self.chats
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
            .ok_or(ChatError::NotFound)
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse> {
        self.record("login")?;
        Ok(self.login_reply.lock().unwrap().clone())
    }

    async fn users(&self, _token: &str) -> Result<Vec<UserSummary>> {
        self.record("users")?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn conversations(&self, _token: &str) -> Result<Vec<Conversation>> {
        self.record("conversations")?;
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn conversation(&self, _token: &str, chat_id: &str) -> Result<Conversation> {
        self.record("conversation")?;
        self.chat(chat_id)
    }

    async fn create_conversation(&self, _token: &str, req: &NewConversation) -> Result<Conversation> {
        self.record("create")?;
        let id = self.next("chat");
        let mut chat = conversation(&id);
        chat.is_group = req.is_group;
        chat.name = req.name.clone();
        chat.users = std::iter::once("me")
            .chain(req.participant_ids.iter().map(String::as_str))
            .map(|u| participant(&id, u))
            .collect();
        if req.is_group {
            chat.admin_id = Some("me".into());
        }
        self.chats.lock().unwrap().push(chat.clone());
        Ok(chat)
    }

    async fn existing_conversation(&self, _token: &str, _participant_id: &str) -> Result<Option<String>> {
        self.record("exists")?;
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn delete_conversation(&self, _token: &str, chat_id: &str) -> Result<()> {
        self.record("delete")?;
        self.chats.lock().unwrap().retain(|c| c.id != chat_id);
        Ok(())
    }

    async fn add_participants(&self, _token: &str, chat_id: &str, user_ids: &[String]) -> Result<Conversation> {
        self.record("participants")?;
        let mut chats = self.chats.lock().unwrap();
        let chat = chats.iter_mut().find(|c| c.id == chat_id).ok_or(ChatError::NotFound)?;
        for id in user_ids {
            chat.users.push(participant(chat_id, id));
        }
        Ok(chat.clone())
    }

    async fn send_message(&self, _token: &str, _chat_id: &str, payload: &OutgoingPayload) -> Result<Message> {
        self.record("send")?;
        let id = self.next("srv");
        let mut msg = message(&id, "me", "", 0);
        msg.created_at = Utc::now();
        match payload {
            OutgoingPayload::Text(text) => msg.content = text.clone(),
            OutgoingPayload::WithFile { content, file } => {
                msg.content = content.clone().unwrap_or_default();
                msg.file_url = Some(format!("https://files.test/{}", file.name));
                msg.file_name = Some(file.name.clone());
            }
        }
        Ok(msg)
    }

    async fn edit_message(&self, _token: &str, _chat_id: &str, message_id: &str, content: &str) -> Result<Message> {
        self.record("edit")?;
        Ok(message(message_id, "me", content, 0))
    }

    async fn delete_message(&self, _token: &str, _chat_id: &str, _message_id: &str) -> Result<()> {
        self.record("delete_message")
    }

    async fn mark_read(&self, _token: &str, _chat_id: &str) -> Result<()> {
        self.record("read")
    }
}
