use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::api::ChatBackend;
use crate::api::models::{Conversation, Message, OutgoingPayload, Participant, UserSummary};
use crate::chat::compose::Draft;
use crate::chat::outbox::{temp_id, Action, Timeline, TEMP_PREFIX};
use crate::error::{ChatError, Result};
use crate::notify::{Notifier, Toast};
use crate::session::Session;
use crate::storage::ConversationCache;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    NoSelection,
    Loading,
    NotFound,
    Unauthorized,
    Error(String),
    Ready,
}

/// Request prepared by [`ConversationView::begin_send`]; the placeholder is already on screen.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub chat_id: String,
    pub temp_id: String,
    pub token: String,
    pub payload: OutgoingPayload,
}

pub struct ConversationView {
    backend: Arc<dyn ChatBackend>,
    session: Session,
    cache: ConversationCache,
    notifier: Arc<dyn Notifier>,
    chat_id: Option<String>,
    chat: Option<Conversation>,
    timeline: Timeline,
    state: ViewState,
    draft: Draft,
    available_users: Vec<UserSummary>,
    selected_users: Vec<String>,
}

impl ConversationView {
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
            chat_id: None,
            chat: None,
            timeline: Timeline::new(),
            state: ViewState::NoSelection,
            draft: Draft::new(),
            available_users: Vec::new(),
            selected_users: Vec::new(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.chat.as_ref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.timeline.messages()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        self.backend.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn participants(&self) -> &[Participant] {
        self.chat.as_ref().map(|c| c.users.as_slice()).unwrap_or_default()
    }

    pub fn is_group(&self) -> bool {
        self.chat.as_ref().is_some_and(|c| c.is_group)
    }

    pub fn title(&self) -> String {
        self.chat
            .as_ref()
            .map(|c| c.display_name(&self.session.current_user_id(), "Chat"))
            .unwrap_or_else(|| "Chat".to_string())
    }

    pub fn subtitle(&self) -> String {
        if self.is_group() {
            format!("{} members", self.participants().len())
        } else {
            "Online".to_string()
        }
    }

    /// The other side of a direct conversation; who a call would go to.
    pub fn partner(&self) -> Option<&UserSummary> {
        let chat = self.chat.as_ref().filter(|c| !c.is_group)?;
        chat.other_participant(&self.session.current_user_id()).map(|p| &p.user)
    }

    pub fn is_admin(&self) -> bool {
        let me = self.session.current_user_id();
        self.chat
            .as_ref()
            .and_then(|c| c.admin_id.as_deref())
            .is_some_and(|admin| !me.is_empty() && admin == me)
    }

    pub fn close(&mut self) {
        self.chat_id = None;
        self.chat = None;
        self.timeline = Timeline::new();
        self.state = ViewState::NoSelection;
    }

    /// Opens `chat_id`, from the cache when possible and over the network otherwise.
    pub async fn open(&mut self, chat_id: &str) -> &ViewState {
        if self.open_cached(chat_id) {
            return &self.state;
        }
        let fetched = match self.session.token() {
            Ok(token) => {
                let backend = self.backend.clone();
                backend.conversation(&token, chat_id).await
            }
            Err(e) => Err(e),
        };
        self.apply_fetch(chat_id, fetched);
        &self.state
    }

    /// Cache-only half of [`open`](Self::open). On a miss the view is left
    /// `Loading` for `chat_id` and the caller is expected to fetch.
    pub fn open_cached(&mut self, chat_id: &str) -> bool {
        self.chat_id = Some(chat_id.to_string());
        self.state = ViewState::Loading;
        match self.cache.find(chat_id) {
            Some(chat) => {
                self.render(chat);
                true
            }
            None => false,
        }
    }

    /// Applies the reply to a fetch for `chat_id`. Replies for a conversation
    /// that is no longer open are dropped; returns whether it was applied.
    pub fn apply_fetch(&mut self, chat_id: &str, fetched: Result<Conversation>) -> bool {
        if self.chat_id.as_deref() != Some(chat_id) || self.state != ViewState::Loading {
            debug!("dropping late reply for chat {}", chat_id);
            return false;
        }
        match fetched {
            Ok(chat) => {
                if let Err(e) = self.cache.store_selected(&chat) {
                    warn!("could not cache chat {}: {}", chat.id, e);
                }
                self.render(chat);
            }
            Err(ChatError::NotFound) => {
                debug!("chat {:?} not found", self.chat_id);
                self.state = ViewState::NotFound;
            }
            Err(ChatError::Unauthorized) => {
                self.notifier.notify(Toast::failure("Failed to load chat", &ChatError::Unauthorized));
                self.state = ViewState::Unauthorized;
            }
            Err(e) => {
                error!("Error fetching chat: {}", e);
                let text = format!("Failed to load chat: {}", e);
                self.notifier.notify(Toast::error(text.clone()));
                self.state = ViewState::Error(text);
            }
        }
        true
    }

    fn render(&mut self, chat: Conversation) {
        self.timeline.apply(Action::Load(chat.messages.clone()));
        self.chat_id = Some(chat.id.clone());
        self.chat = Some(chat);
        self.state = ViewState::Ready;
    }

    fn author(&self) -> UserSummary {
        let me = self.session.current_user_id();
        self.participants()
            .iter()
            .find(|p| p.user_id == me)
            .map(|p| p.user.clone())
            .unwrap_or_else(|| self.session.current_user())
    }

    /// Puts a placeholder for the current draft on screen and hands back the
    /// request to perform. `Ok(None)` when there is nothing to send.
    pub fn begin_send(&mut self) -> Result<Option<PendingSend>> {
        let (Some(chat_id), Some(payload)) = (self.chat_id.clone(), self.draft.payload()) else {
            return Ok(None);
        };
        let token = match self.session.token() {
            Ok(t) => t,
            Err(e) => {
                self.notifier.notify(Toast::failure("Failed to send message", &e));
                return Err(e);
            }
        };
        let temp_id = temp_id();
        let placeholder = self.draft.placeholder(&temp_id, self.author());
        self.timeline.apply(Action::Enqueue(placeholder));
        self.draft.clear();
        Ok(Some(PendingSend { chat_id, temp_id, token, payload }))
    }

    fn is_open(&self, chat_id: &str) -> bool {
        self.chat_id.as_deref() == Some(chat_id)
    }

    /// Rewrites the cached copy of `chat_id` so a later open shows the change.
    fn remember(&self, chat_id: &str, f: &dyn Fn(&mut Conversation)) {
        if let Err(e) = self.cache.update_conversation(chat_id, f) {
            warn!("could not update cached chat {}: {}", chat_id, e);
        }
    }

    /// Reconciles a placeholder with the server's answer. The timeline is only
    /// touched while `chat_id` is still open; the cache is updated either way.
    pub fn complete_send(&mut self, chat_id: &str, temp_id: &str, result: Result<Message>) -> Result<()> {
        match result {
            Ok(message) => {
                self.remember(chat_id, &|c| {
                    if !c.messages.iter().any(|m| m.id == message.id) {
                        c.messages.push(message.clone());
                    }
                    c.updated_at = Some(message.created_at);
                });
                if self.is_open(chat_id) {
                    self.timeline.apply(Action::Confirm { temp_id: temp_id.to_string(), message });
                }
                Ok(())
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                if self.is_open(chat_id) {
                    self.timeline.apply(Action::Fail { temp_id: temp_id.to_string() });
                }
                self.notifier.notify(Toast::failure("Failed to send message", &e));
                Err(e)
            }
        }
    }

    pub async fn send(&mut self) -> Result<()> {
        let Some(pending) = self.begin_send()? else {
            return Ok(());
        };
        let backend = self.backend.clone();
        let result = backend
            .send_message(&pending.token, &pending.chat_id, &pending.payload)
            .await;
        self.complete_send(&pending.chat_id, &pending.temp_id, result)
    }

    /// Chat id and credential for changing a message the server already has.
    pub fn message_target(&self, message_id: &str) -> Result<(String, String)> {
        if message_id.starts_with(TEMP_PREFIX) {
            return Err(ChatError::validation("Message is still being sent"));
        }
        let chat_id = self
            .chat_id
            .clone()
            .ok_or_else(|| ChatError::validation("No conversation open"))?;
        Ok((chat_id, self.session.token()?))
    }

    pub async fn edit_message(&mut self, message_id: &str, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(ChatError::validation("Message cannot be empty"));
        }
        let (chat_id, token) = self.message_target(message_id)?;
        let backend = self.backend.clone();
        let result = backend.edit_message(&token, &chat_id, message_id, content).await;
        self.apply_edit(&chat_id, result)
    }

    pub fn apply_edit(&mut self, chat_id: &str, result: Result<Message>) -> Result<()> {
        match result {
            Ok(updated) => {
                self.remember(chat_id, &|c| {
                    if let Some(m) = c.messages.iter_mut().find(|m| m.id == updated.id) {
                        *m = updated.clone();
                    }
                });
                if self.is_open(chat_id) {
                    self.timeline.apply(Action::Replace(updated));
                }
                Ok(())
            }
            Err(e) => {
                self.notifier.notify(Toast::failure("Failed to edit message", &e));
                Err(e)
            }
        }
    }

    pub async fn delete_message(&mut self, message_id: &str) -> Result<()> {
        let (chat_id, token) = self.message_target(message_id)?;
        let backend = self.backend.clone();
        let result = backend.delete_message(&token, &chat_id, message_id).await;
        self.apply_delete(&chat_id, message_id, result)
    }

    pub fn apply_delete(&mut self, chat_id: &str, message_id: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.remember(chat_id, &|c| c.messages.retain(|m| m.id != message_id));
                if self.is_open(chat_id) {
                    self.timeline.apply(Action::Remove { id: message_id.to_string() });
                }
                Ok(())
            }
            Err(e) => {
                self.notifier.notify(Toast::failure("Failed to delete message", &e));
                Err(e)
            }
        }
    }

    /// Read receipts are best effort; failures are only logged.
    pub async fn mark_read(&self) {
        let Some(chat_id) = self.chat_id.as_deref() else { return };
        let Ok(token) = self.session.token() else { return };
        if let Err(e) = self.backend.mark_read(&token, chat_id).await {
            warn!("read receipt for {} failed: {}", chat_id, e);
        }
    }

    pub async fn load_available_users(&mut self) -> Result<()> {
        let fetched = match self.session.token() {
            Ok(token) => {
                let backend = self.backend.clone();
                backend.users(&token).await
            }
            Err(e) => Err(e),
        };
        self.apply_available_users(fetched)
    }

    pub fn apply_available_users(&mut self, fetched: Result<Vec<UserSummary>>) -> Result<()> {
        match fetched {
            Ok(users) => {
                let chat = self.chat.as_ref();
                self.available_users = users
                    .into_iter()
                    .filter(|u| !chat.is_some_and(|c| c.has_participant(&u.id)))
                    .collect();
                Ok(())
            }
            Err(e) => {
                error!("Error loading users: {}", e);
                self.notifier.notify(Toast::failure("Failed to load users", &e));
                Err(e)
            }
        }
    }

    pub fn filter_available(&self, query: &str) -> Vec<&UserSummary> {
        let needle = query.to_lowercase();
        self.available_users
            .iter()
            .filter(|u| u.fullname.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn toggle_selected_user(&mut self, user_id: &str) {
        if let Some(pos) = self.selected_users.iter().position(|u| u == user_id) {
            self.selected_users.remove(pos);
        } else {
            self.selected_users.push(user_id.to_string());
        }
    }

    pub fn selected_users(&self) -> &[String] {
        &self.selected_users
    }

    /// Validates the selection; returns chat id, credential and the ids to add.
    pub fn begin_add_participants(&self) -> Result<(String, String, Vec<String>)> {
        if self.selected_users.is_empty() {
            let e = ChatError::validation("Please select at least one user to add");
            self.notifier.notify(Toast::error(e.to_string()));
            return Err(e);
        }
        let chat_id = self
            .chat_id
            .clone()
            .ok_or_else(|| ChatError::validation("No conversation open"))?;
        match self.session.token() {
            Ok(token) => Ok((chat_id, token, self.selected_users.clone())),
            Err(e) => {
                self.notifier.notify(Toast::failure("Failed to add participants", &e));
                Err(e)
            }
        }
    }

    pub async fn add_participants(&mut self) -> Result<()> {
        let (chat_id, token, ids) = self.begin_add_participants()?;
        let backend = self.backend.clone();
        let result = backend.add_participants(&token, &chat_id, &ids).await;
        self.complete_add_participants(ids.len(), result)
    }

    pub fn complete_add_participants(&mut self, added: usize, result: Result<Conversation>) -> Result<()> {
        match result {
            Ok(mut updated) => {
                if updated.messages.is_empty() {
                    // the participants endpoint may omit history; keep what is shown
                    updated.messages = self.messages().cloned().collect();
                }
                info!("added {} participant(s) to {}", added, updated.id);
                if let Err(e) = self.cache.store_selected(&updated) {
                    warn!("could not cache chat {}: {}", updated.id, e);
                }
                self.render(updated);
                self.selected_users.clear();
                self.notifier.notify(Toast::info(
                    "Success",
                    format!("Added {} participant(s) to the chat", added),
                ));
                Ok(())
            }
            Err(e) => {
                self.notifier.notify(Toast::failure("Failed to add participants", &e));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::FileUpload;
    use crate::chat::outbox::Delivery;
    use crate::notify::ToastQueue;
    use crate::testing::{direct, message, signed_in, user, FakeBackend};

    fn view(backend: Arc<FakeBackend>, cache: ConversationCache, toasts: &ToastQueue) -> ConversationView {
        ConversationView::new(backend, signed_in(), cache, Arc::new(toasts.clone()))
    }

    fn chat_with_history(id: &str) -> Conversation {
        let mut c = direct(id, "me", "u2");
        c.messages = vec![message("m1", "u2", "hey", 0), message("m2", "me", "hi!", 1)];
        c
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let backend = Arc::new(FakeBackend::new());
        let cache = ConversationCache::in_memory();
        cache.store_conversations(&[chat_with_history("c1")]).unwrap();
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), cache, &toasts);

        assert_eq!(v.open("c1").await, &ViewState::Ready);
        assert!(backend.calls().is_empty());
        assert_eq!(v.title(), "User u2");
        assert_eq!(v.timeline().len(), 2);
    }

    #[tokio::test]
    async fn cache_miss_fetches_and_caches_selection() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let cache = ConversationCache::in_memory();
        cache.store_selected(&chat_with_history("other")).unwrap();
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), cache.clone(), &toasts);

        assert_eq!(v.open("c1").await, &ViewState::Ready);
        assert_eq!(backend.count("conversation"), 1);
        assert_eq!(cache.selected().unwrap().id, "c1");
    }

    #[tokio::test]
    async fn status_404_renders_not_found() {
        let backend = Arc::new(FakeBackend::new());
        let toasts = ToastQueue::new();
        let mut v = view(backend, ConversationCache::in_memory(), &toasts);
        assert_eq!(v.open("missing").await, &ViewState::NotFound);
        assert!(toasts.drain().is_empty());
    }

    #[tokio::test]
    async fn status_401_and_500_are_distinct() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), ConversationCache::in_memory(), &toasts);

        backend.fail("conversation", 401);
        assert_eq!(v.open("c1").await, &ViewState::Unauthorized);

        backend.fail("conversation", 500);
        assert_eq!(
            v.open("c1").await,
            &ViewState::Error("Failed to load chat: HTTP 500".into())
        );
    }

    #[tokio::test]
    async fn missing_credential_is_an_error_state() {
        let backend = Arc::new(FakeBackend::new());
        let toasts = ToastQueue::new();
        let mut v = ConversationView::new(
            backend.clone(),
            Session::new(Default::default()),
            ConversationCache::in_memory(),
            Arc::new(toasts.clone()),
        );
        let state = v.open("c1").await.clone();
        assert_eq!(
            state,
            ViewState::Error("Failed to load chat: No token found. Please login first.".into())
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn text_send_reconciles_placeholder_in_place() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), ConversationCache::in_memory(), &toasts);
        v.open("c1").await;

        v.draft_mut().set_text("on my way");
        let pending = v.begin_send().unwrap().unwrap();
        assert!(pending.temp_id.starts_with(TEMP_PREFIX));
        assert_eq!(v.timeline().len(), 3);
        assert_eq!(v.timeline().entries()[2].delivery, Delivery::Pending);
        assert_eq!(v.timeline().entries()[2].message.author_id(), Some("me"));
        assert!(v.draft().is_empty());

        let reply = backend
            .send_message(&pending.token, &pending.chat_id, &pending.payload)
            .await;
        v.complete_send(&pending.chat_id, &pending.temp_id, reply).unwrap();

        let ids: Vec<_> = v.messages().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "srv-1"]);
        assert_eq!(v.timeline().pending(), 0);
        assert_eq!(v.messages().last().unwrap().content, "on my way");
    }

    #[tokio::test]
    async fn late_reply_for_a_chat_no_longer_open_is_dropped() {
        let cache = ConversationCache::in_memory();
        cache.store_conversations(&[chat_with_history("b")]).unwrap();
        let toasts = ToastQueue::new();
        let mut v = view(Arc::new(FakeBackend::new()), cache.clone(), &toasts);

        assert!(!v.open_cached("a"));
        assert!(v.open_cached("b"));
        assert!(!v.apply_fetch("a", Err(ChatError::NotFound)));
        assert!(!v.apply_fetch("a", Err(ChatError::Unauthorized)));
        assert!(!v.apply_fetch("a", Ok(chat_with_history("a"))));

        assert_eq!(v.chat_id(), Some("b"));
        assert_eq!(v.state(), &ViewState::Ready);
        assert_eq!(v.conversation().unwrap().id, "b");
        assert!(cache.selected().is_none());
        assert!(toasts.drain().is_empty());
    }

    #[tokio::test]
    async fn reopening_shows_sent_edited_and_deleted_messages() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let cache = ConversationCache::in_memory();
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), cache, &toasts);
        v.open("c1").await;

        v.draft_mut().set_text("done my run");
        v.send().await.unwrap();
        v.edit_message("m2", "hello!").await.unwrap();
        v.delete_message("m1").await.unwrap();
        v.close();

        assert_eq!(v.open("c1").await, &ViewState::Ready);
        assert_eq!(backend.count("conversation"), 1);
        let contents: Vec<_> = v.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["hello!", "done my run"]);
    }

    #[tokio::test]
    async fn send_reply_after_switching_chats_only_reaches_the_cache() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let cache = ConversationCache::in_memory();
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), cache.clone(), &toasts);
        v.open("c1").await;
        cache
            .store_conversations(&[chat_with_history("c1"), chat_with_history("c2")])
            .unwrap();

        v.draft_mut().set_text("see you at 6");
        let pending = v.begin_send().unwrap().unwrap();
        v.open("c2").await;
        let reply = backend
            .send_message(&pending.token, &pending.chat_id, &pending.payload)
            .await;
        v.complete_send(&pending.chat_id, &pending.temp_id, reply).unwrap();

        assert_eq!(v.chat_id(), Some("c2"));
        assert_eq!(v.timeline().len(), 2);
        assert_eq!(cache.find("c1").unwrap().messages.len(), 3);
        let listed = cache.conversations().unwrap();
        assert_eq!(listed[0].messages.last().unwrap().content, "see you at 6");
        assert_eq!(listed[1].messages.len(), 2);
    }

    #[tokio::test]
    async fn failed_send_rolls_back() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        backend.fail("send", 500);
        let toasts = ToastQueue::new();
        let mut v = view(backend, ConversationCache::in_memory(), &toasts);
        v.open("c1").await;
        let before = v.timeline().len();

        v.draft_mut().set_text("lost");
        assert!(v.send().await.is_err());
        assert_eq!(v.timeline().len(), before);
        assert_eq!(
            toasts.last().unwrap().description,
            "Failed to send message: HTTP 500"
        );
    }

    #[tokio::test]
    async fn empty_draft_sends_nothing() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), ConversationCache::in_memory(), &toasts);
        v.open("c1").await;
        v.send().await.unwrap();
        assert_eq!(backend.count("send"), 0);
    }

    #[tokio::test]
    async fn file_send_uses_multipart_payload() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let toasts = ToastQueue::new();
        let mut v = view(backend, ConversationCache::in_memory(), &toasts);
        v.open("c1").await;
        v.draft_mut().attach(FileUpload {
            name: "streak.png".into(),
            mime: "image/png".into(),
            bytes: vec![1, 2, 3],
            local_url: Some("file:///tmp/streak.png".into()),
        });
        let pending = v.begin_send().unwrap().unwrap();
        assert!(matches!(pending.payload, OutgoingPayload::WithFile { content: None, .. }));
        assert_eq!(
            v.messages().last().unwrap().file_url.as_deref(),
            Some("file:///tmp/streak.png")
        );
    }

    #[tokio::test]
    async fn edit_and_delete_confirmed_messages() {
        let backend = Arc::new(FakeBackend::with_chats(vec![chat_with_history("c1")]));
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), ConversationCache::in_memory(), &toasts);
        v.open("c1").await;

        v.edit_message("m2", "hello!").await.unwrap();
        assert_eq!(v.timeline().get("m2").unwrap().message.content, "hello!");
        v.delete_message("m1").await.unwrap();
        assert_eq!(v.timeline().len(), 1);
        assert!(v.edit_message("temp-1-0", "x").await.is_err());
        assert!(v.edit_message("m2", "  ").await.is_err());
        v.mark_read().await;
        assert_eq!(backend.count("read"), 1);
    }

    #[tokio::test]
    async fn participants_flow() {
        let mut group = direct("g1", "me", "u2");
        group.is_group = true;
        group.name = Some("Runners".into());
        group.admin_id = Some("me".into());
        group.messages = vec![message("m1", "u2", "5k today", 0)];
        let backend = Arc::new(FakeBackend::with_chats(vec![group]));
        *backend.users.lock().unwrap() = vec![user("u2", "Sam"), user("u3", "Ines"), user("u4", "Ivo")];
        let toasts = ToastQueue::new();
        let mut v = view(backend.clone(), ConversationCache::in_memory(), &toasts);
        v.open("g1").await;
        assert!(v.is_admin());
        assert!(v.partner().is_none());
        assert_eq!(v.title(), "Runners");

        assert!(v.add_participants().await.is_err());
        assert_eq!(backend.count("participants"), 0);

        v.load_available_users().await.unwrap();
        let names: Vec<_> = v.filter_available("i").iter().map(|u| u.fullname.clone()).collect();
        assert_eq!(names, ["Ines", "Ivo"]);

        v.toggle_selected_user("u3");
        v.add_participants().await.unwrap();
        assert_eq!(v.participants().len(), 3);
        assert!(v.selected_users().is_empty());
        assert_eq!(v.subtitle(), "3 members");
        assert_eq!(v.timeline().len(), 1);
    }
}
