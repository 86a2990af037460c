pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::Result;
use models::{
    Conversation, LoginResponse, Message, NewConversation, OutgoingPayload, UserSummary,
};

/// Operations the chat surface needs from the backend. Every authenticated
/// call takes the bearer token explicitly so callers decide when a missing
/// credential short-circuits the request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse>;
    async fn users(&self, token: &str) -> Result<Vec<UserSummary>>;

    async fn conversations(&self, token: &str) -> Result<Vec<Conversation>>;
    async fn conversation(&self, token: &str, chat_id: &str) -> Result<Conversation>;
    async fn create_conversation(&self, token: &str, req: &NewConversation) -> Result<Conversation>;
    /// Returns the id of an existing direct conversation with `participant_id`.
    async fn existing_conversation(&self, token: &str, participant_id: &str) -> Result<Option<String>>;
    async fn delete_conversation(&self, token: &str, chat_id: &str) -> Result<()>;
    async fn add_participants(&self, token: &str, chat_id: &str, user_ids: &[String]) -> Result<Conversation>;

    async fn send_message(&self, token: &str, chat_id: &str, payload: &OutgoingPayload) -> Result<Message>;
    async fn edit_message(&self, token: &str, chat_id: &str, message_id: &str, content: &str) -> Result<Message>;
    async fn delete_message(&self, token: &str, chat_id: &str, message_id: &str) -> Result<()>;
    async fn mark_read(&self, token: &str, chat_id: &str) -> Result<()>;
}
