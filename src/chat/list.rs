use std::sync::Arc;

use log::{debug, error, warn};

use crate::api::ChatBackend;
use crate::api::models::{Conversation, LastMessage};
use crate::chat::Route;
use crate::error::Result;
use crate::notify::{Notifier, Toast};
use crate::session::Session;
use crate::storage::ConversationCache;

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Failed(String),
    Ready,
}

/// One rendered row of the sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub last_message: LastMessage,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub is_active: bool,
}

/// Pinned first, then most recently updated. Stable, so equal keys keep their order.
pub fn sort_conversations(chats: &mut [Conversation]) {
    chats.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| b.recency().cmp(&a.recency()))
    });
}

/// Demo flags layered on fetched data: the first chat pinned, the third muted.
fn mark_client_flags(chats: &mut [Conversation]) {
    for (idx, chat) in chats.iter_mut().enumerate() {
        chat.is_pinned = idx == 0;
        chat.is_muted = idx == 2;
    }
}

pub struct ConversationList {
    backend: Arc<dyn ChatBackend>,
    session: Session,
    cache: ConversationCache,
    notifier: Arc<dyn Notifier>,
    chats: Vec<Conversation>,
    state: ListState,
    pending_delete: Option<String>,
}

impl ConversationList {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        session: Session,
        cache: ConversationCache,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            session,
            cache,
            notifier,
            chats: Vec::new(),
            state: ListState::Loading,
            pending_delete: None,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.chats
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        self.backend.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Shows whatever the cache holds while the network fetch is in flight.
    pub fn prime_from_cache(&mut self) -> bool {
        match self.cache.conversations() {
            Some(chats) if !chats.is_empty() => {
                self.chats = chats;
                true
            }
            _ => false,
        }
    }

    pub async fn load(&mut self) -> Result<()> {
        self.state = ListState::Loading;
        let fetched = match self.session.token() {
            Ok(token) => self.backend.conversations(&token).await,
            Err(e) => Err(e),
        };
        self.apply_fetched(fetched)
    }

    /// Applies the result of a `GET /chats`. On failure the previous entries stay.
    pub fn apply_fetched(&mut self, fetched: Result<Vec<Conversation>>) -> Result<()> {
        match fetched {
            Ok(mut chats) => {
                debug!("loaded {} chats", chats.len());
                mark_client_flags(&mut chats);
                sort_conversations(&mut chats);
                if let Err(e) = self.cache.store_conversations(&chats) {
                    warn!("could not cache chats: {}", e);
                }
                self.chats = chats;
                self.state = ListState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("Error fetching chats: {}", e);
                let text = format!("Failed to load chats: {}", e);
                self.notifier.notify(Toast::error(text.clone()));
                self.state = ListState::Failed(text);
                Err(e)
            }
        }
    }

    fn summary(&self, chat: &Conversation, active_id: Option<&str>) -> ConversationSummary {
        let me = self.session.current_user_id();
        ConversationSummary {
            id: chat.id.clone(),
            name: chat.display_name(&me, "Unknown User"),
            avatar: chat.avatar(&me),
            last_message: chat.last_message(&me),
            is_pinned: chat.is_pinned,
            is_muted: chat.is_muted,
            is_active: active_id == Some(chat.id.as_str()),
        }
    }

    /// Case-insensitive match on the display name or the last message body.
    /// Only the returned view is filtered; the list itself is untouched.
    pub fn filter(&self, query: &str, active_id: Option<&str>) -> Vec<ConversationSummary> {
        let needle = query.to_lowercase();
        self.chats
            .iter()
            .map(|c| self.summary(c, active_id))
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.last_message.content.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn empty_label(query: &str) -> &'static str {
        if query.is_empty() { "No conversations yet" } else { "No conversations found" }
    }

    pub fn select(&mut self, chat_id: &str) -> Route {
        if let Some(chat) = self.chats.iter().find(|c| c.id == chat_id) {
            if let Err(e) = self.cache.store_selected(chat) {
                warn!("could not cache selected chat: {}", e);
            }
        }
        Route::Conversation(chat_id.to_string())
    }

    /// Pinning moves the chat to the very top. Unpinning drops it back among
    /// the unpinned chats by recency. Every other entry keeps its position.
    pub fn toggle_pin(&mut self, chat_id: &str) -> bool {
        let Some(idx) = self.chats.iter().position(|c| c.id == chat_id) else {
            return false;
        };
        let mut chat = self.chats.remove(idx);
        chat.is_pinned = !chat.is_pinned;
        let at = if chat.is_pinned {
            0
        } else {
            self.chats
                .iter()
                .position(|c| !c.is_pinned && c.recency() < chat.recency())
                .unwrap_or(self.chats.len())
        };
        self.chats.insert(at, chat);
        self.remember();
        self.notifier.notify(Toast::info("Chat updated", "Chat pin status updated successfully"));
        true
    }

    pub fn toggle_mute(&mut self, chat_id: &str) -> bool {
        let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) else {
            return false;
        };
        chat.is_muted = !chat.is_muted;
        self.remember();
        self.notifier
            .notify(Toast::info("Chat updated", "Chat notification status updated successfully"));
        true
    }

    /// Flags only exist client side, so the cached list is their only store.
    fn remember(&self) {
        if let Err(e) = self.cache.store_conversations(&self.chats) {
            warn!("could not cache chats: {}", e);
        }
    }

    pub fn request_delete(&mut self, chat_id: &str) {
        self.pending_delete = Some(chat_id.to_string());
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Deletes the conversation awaiting confirmation. When it is the one
    /// currently open the caller gets a route away from it.
    pub async fn confirm_delete(&mut self, active_id: Option<&str>) -> Result<Option<Route>> {
        let Some(chat_id) = self.pending_delete.take() else {
            return Ok(None);
        };
        let outcome = match self.session.token() {
            Ok(token) => self.backend.delete_conversation(&token, &chat_id).await,
            Err(e) => Err(e),
        };
        self.complete_delete(&chat_id, outcome, active_id)
    }

    pub fn complete_delete(
        &mut self,
        chat_id: &str,
        outcome: Result<()>,
        active_id: Option<&str>,
    ) -> Result<Option<Route>> {
        self.pending_delete = None;
        if let Err(e) = outcome {
            error!("Error deleting chat: {}", e);
            self.notifier.notify(Toast::failure("Failed to delete chat", &e));
            return Err(e);
        }
        self.chats.retain(|c| c.id != chat_id);
        if let Err(e) = self.cache.remove(chat_id) {
            warn!("could not update cached chats: {}", e);
        }
        self.notifier
            .notify(Toast::info("Chat deleted", "The chat has been deleted successfully"));
        Ok((active_id == Some(chat_id)).then_some(Route::Messages))
    }

    pub fn create_route(&self) -> Route {
        Route::NewConversation
    }
}
