use std::sync::Arc;

use log::{error, info, warn};

use crate::api::ChatBackend;
use crate::api::models::{NewConversation, UserSummary};
use crate::chat::Route;
use crate::error::{ChatError, Result};
use crate::notify::{Notifier, Toast};
use crate::session::Session;
use crate::storage::ConversationCache;

/// Picker for starting a direct or group conversation.
///
/// Cheap to clone; the GUI submits from a clone running on the shared runtime.
#[derive(Clone)]
pub struct NewConversationFlow {
    backend: Arc<dyn ChatBackend>,
    session: Session,
    cache: ConversationCache,
    notifier: Arc<dyn Notifier>,
    users: Vec<UserSummary>,
    selected: Vec<UserSummary>,
    is_group: bool,
    group_name: String,
}

impl NewConversationFlow {
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
            users: Vec::new(),
            selected: Vec::new(),
            is_group: false,
            group_name: String::new(),
        }
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        self.backend.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn load_users(&mut self) -> Result<()> {
        let fetched = match self.session.token() {
            Ok(token) => {
                let backend = self.backend.clone();
                backend.users(&token).await
            }
            Err(e) => Err(e),
        };
        self.apply_users(fetched)
    }

    /// Keeps everyone except the signed-in user.
    pub fn apply_users(&mut self, fetched: Result<Vec<UserSummary>>) -> Result<()> {
        match fetched {
            Ok(users) => {
                let me = self.session.current_user_id();
                self.users = users.into_iter().filter(|u| u.id != me).collect();
                Ok(())
            }
            Err(e) => {
                error!("Error fetching users: {}", e);
                self.notifier.notify(Toast::failure("Failed to load users", &e));
                Err(e)
            }
        }
    }

    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    /// Case-insensitive match on name or email.
    pub fn filter(&self, query: &str) -> Vec<&UserSummary> {
        let needle = query.to_lowercase();
        self.users
            .iter()
            .filter(|u| {
                u.fullname.to_lowercase().contains(&needle)
                    || u.email.as_deref().is_some_and(|e| e.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn selected(&self) -> &[UserSummary] {
        &self.selected
    }

    pub fn is_selected(&self, user_id: &str) -> bool {
        self.selected.iter().any(|u| u.id == user_id)
    }

    pub fn toggle_user(&mut self, user: &UserSummary) {
        if self.is_selected(&user.id) {
            self.remove_user(&user.id);
        } else {
            self.selected.push(user.clone());
        }
    }

    pub fn remove_user(&mut self, user_id: &str) {
        self.selected.retain(|u| u.id != user_id);
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn set_group(&mut self, is_group: bool) {
        self.is_group = is_group;
    }

    pub fn set_group_name(&mut self, name: impl Into<String>) {
        self.group_name = name.into();
    }

    fn validate(&self) -> Result<()> {
        if self.selected.is_empty() {
            return Err(ChatError::validation("Please select at least one user"));
        }
        if self.is_group && self.group_name.trim().is_empty() {
            return Err(ChatError::validation("Please enter a group name"));
        }
        Ok(())
    }

    fn redirect(&self, chat_id: String) -> Route {
        self.notifier
            .notify(Toast::info("Chat exists", "Redirecting to existing conversation"));
        Route::Conversation(chat_id)
    }

    /// Creates the conversation, or finds the direct one that already exists.
    pub async fn submit(&self) -> Result<Route> {
        if let Err(e) = self.validate() {
            self.notifier.notify(Toast::error(e.to_string()));
            return Err(e);
        }
        match self.create().await {
            Ok(route) => Ok(route),
            Err(e) => {
                error!("Error creating chat: {}", e);
                self.notifier.notify(Toast::failure("Failed to create chat", &e));
                Err(e)
            }
        }
    }

    async fn create(&self) -> Result<Route> {
        let token = self.session.token()?;
        let direct_with = match self.selected.as_slice() {
            [only] if !self.is_group => Some(only.id.as_str()),
            _ => None,
        };

        if let Some(user_id) = direct_with {
            if let Some(existing) = self.cache.find_direct_with(user_id) {
                return Ok(self.redirect(existing));
            }
            match self.backend.existing_conversation(&token, user_id).await {
                Ok(Some(existing)) => return Ok(self.redirect(existing)),
                Ok(None) => {}
                Err(e) => warn!("Error checking existing chat: {}", e),
            }
        }

        let request = NewConversation {
            participant_ids: self.selected.iter().map(|u| u.id.clone()).collect(),
            is_group: self.is_group,
            name: self.is_group.then(|| self.group_name.trim().to_string()),
        };
        let chat = match self.backend.create_conversation(&token, &request).await {
            Ok(chat) => chat,
            Err(ChatError::Conflict { existing_id: Some(existing) }) => {
                return Ok(self.redirect(existing));
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.cache.prepend(&chat) {
            warn!("could not add chat {} to cache: {}", chat.id, e);
        }
        if let Err(e) = self.cache.store_selected(&chat) {
            warn!("could not cache chat {}: {}", chat.id, e);
        }
        info!("created chat {}", chat.id);
        self.notifier.notify(Toast::info(
            "Success",
            if self.is_group { "Group chat created successfully" } else { "Chat created successfully" },
        ));
        Ok(Route::Conversation(chat.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastQueue;
    use crate::testing::{direct, signed_in, user, FakeBackend};
    use serde_json::json;

    fn flow(backend: Arc<FakeBackend>, cache: ConversationCache, toasts: &ToastQueue) -> NewConversationFlow {
        NewConversationFlow::new(backend, signed_in(), cache, Arc::new(toasts.clone()))
    }

    fn people() -> Vec<UserSummary> {
        let mut ana = user("u2", "Ana Lima");
        ana.email = Some("ana@run.club".into());
        vec![user("me", "Me"), ana, user("u3", "Bruno")]
    }

    #[tokio::test]
    async fn users_exclude_self_and_filter_on_email() {
        let backend = Arc::new(FakeBackend::new());
        *backend.users.lock().unwrap() = people();
        let toasts = ToastQueue::new();
        let mut f = flow(backend, ConversationCache::in_memory(), &toasts);
        f.load_users().await.unwrap();
        assert_eq!(f.users().len(), 2);
        assert_eq!(f.filter("RUN.CLUB").len(), 1);
        assert_eq!(f.filter("bru")[0].id, "u3");
        assert_eq!(f.filter("").len(), 2);
    }

    #[tokio::test]
    async fn validation_happens_before_any_request() {
        let backend = Arc::new(FakeBackend::new());
        let toasts = ToastQueue::new();
        let mut f = flow(backend.clone(), ConversationCache::in_memory(), &toasts);

        assert!(matches!(f.submit().await, Err(ChatError::Validation(_))));
        assert_eq!(toasts.last().unwrap().description, "Please select at least one user");

        f.toggle_user(&user("u2", "Ana"));
        f.toggle_user(&user("u3", "Bruno"));
        f.set_group(true);
        f.set_group_name("   ");
        assert!(f.submit().await.is_err());
        assert_eq!(toasts.last().unwrap().description, "Please enter a group name");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn cached_direct_chat_short_circuits() {
        let backend = Arc::new(FakeBackend::new());
        let cache = ConversationCache::in_memory();
        cache.store_conversations(&[direct("c7", "me", "u2")]).unwrap();
        let toasts = ToastQueue::new();
        let mut f = flow(backend.clone(), cache, &toasts);
        f.toggle_user(&user("u2", "Ana"));

        assert_eq!(f.submit().await.unwrap(), Route::Conversation("c7".into()));
        assert!(backend.calls().is_empty());
        assert_eq!(toasts.last().unwrap().title, "Chat exists");
    }

    #[tokio::test]
    async fn server_side_existence_check() {
        let backend = Arc::new(FakeBackend::new());
        *backend.existing.lock().unwrap() = Some("c9".into());
        let toasts = ToastQueue::new();
        let mut f = flow(backend.clone(), ConversationCache::in_memory(), &toasts);
        f.toggle_user(&user("u2", "Ana"));
        assert_eq!(f.submit().await.unwrap(), Route::Conversation("c9".into()));
        assert_eq!(backend.count("create"), 0);
    }

    #[tokio::test]
    async fn failing_check_is_ignored() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail("exists", 500);
        let toasts = ToastQueue::new();
        let mut f = flow(backend.clone(), ConversationCache::in_memory(), &toasts);
        f.toggle_user(&user("u2", "Ana"));
        assert_eq!(f.submit().await.unwrap(), Route::Conversation("chat-1".into()));
        assert_eq!(backend.calls(), ["exists", "create"]);
    }

    #[tokio::test]
    async fn conflict_redirects_to_existing() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_with("create", 409, json!({ "chatId": "c3" }));
        let toasts = ToastQueue::new();
        let mut f = flow(backend, ConversationCache::in_memory(), &toasts);
        f.toggle_user(&user("u2", "Ana"));
        f.toggle_user(&user("u3", "Bruno"));
        f.set_group(true);
        f.set_group_name("Morning run");
        assert_eq!(f.submit().await.unwrap(), Route::Conversation("c3".into()));
    }

    #[tokio::test]
    async fn created_group_lands_in_cache() {
        let backend = Arc::new(FakeBackend::new());
        let cache = ConversationCache::in_memory();
        cache.store_conversations(&[direct("c1", "me", "u9")]).unwrap();
        let toasts = ToastQueue::new();
        let mut f = flow(backend.clone(), cache.clone(), &toasts);
        f.toggle_user(&user("u2", "Ana"));
        f.toggle_user(&user("u3", "Bruno"));
        f.toggle_user(&user("u3", "Bruno"));
        f.set_group(true);
        f.set_group_name(" Morning run ");

        let route = f.submit().await.unwrap();
        assert_eq!(route, Route::Conversation("chat-1".into()));
        assert_eq!(backend.count("exists"), 0, "groups skip the existence check");

        let cached: Vec<_> = cache.conversations().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(cached, ["chat-1", "c1"]);
        let selected = cache.selected().unwrap();
        assert_eq!(selected.name.as_deref(), Some("Morning run"));
        assert_eq!(selected.users.len(), 2);
        assert_eq!(toasts.last().unwrap().description, "Group chat created successfully");
    }

    #[tokio::test]
    async fn create_failure_is_reported() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail("create", 500);
        let toasts = ToastQueue::new();
        let mut f = flow(backend, ConversationCache::in_memory(), &toasts);
        f.toggle_user(&user("u2", "Ana"));
        assert!(f.submit().await.is_err());
        assert_eq!(toasts.last().unwrap().description, "Failed to create chat: HTTP 500");
    }
}
