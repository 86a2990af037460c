pub mod compose;
pub mod list;
pub mod new_chat;
pub mod outbox;
pub mod view;

/// Where the front end should navigate after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Messages,
    Conversation(String),
    NewConversation,
}
