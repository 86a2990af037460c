use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};

use crate::api::ChatBackend;
use crate::api::models::UserSummary;
use crate::app::AppState;
use crate::error::{ChatError, Result};
use crate::storage::ConversationCache;

/// Shared handle on the signed-in identity and bearer credential.
#[derive(Clone)]
pub struct Session {
    state: Arc<RwLock<AppState>>,
    persist: bool,
}

impl Session {
    /// Session held in memory only.
    pub fn new(state: AppState) -> Self {
        Self { state: Arc::new(RwLock::new(state)), persist: false }
    }

    /// Session whose changes are written back to the config file.
    pub fn persistent(state: AppState) -> Self {
        Self { state: Arc::new(RwLock::new(state)), persist: true }
    }

    fn read(&self) -> RwLockReadGuard<'_, AppState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> AppState {
        self.read().clone()
    }

    pub fn token(&self) -> Result<String> {
        self.read()
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ChatError::MissingCredential)
    }

    pub fn current_user_id(&self) -> String {
        self.read().user_id.clone().unwrap_or_default()
    }

    pub fn current_user(&self) -> UserSummary {
        let state = self.read();
        UserSummary {
            id: state.user_id.clone().unwrap_or_default(),
            fullname: state.user_name.clone().unwrap_or_else(|| "You".to_string()),
            profile_photo: state.user_avatar.clone(),
            ..UserSummary::default()
        }
    }

    pub async fn login(&self, backend: &dyn ChatBackend, email: &str, password: &str) -> Result<()> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ChatError::validation("Please enter your email and password."));
        }
        let reply = backend.login(email.trim(), password).await?;
        let token = reply
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChatError::validation("No token received. Please try again."))?;

        let mut state = self.write();
        state.access_token = Some(token);
        if let Some(user) = reply.user {
            state.user_id = Some(user.id);
            if !user.fullname.is_empty() {
                state.user_name = Some(user.fullname);
            }
            state.user_avatar = user.profile_photo;
        } else if let Some(id) = reply.user_id {
            state.user_id = Some(id);
        }
        info!("signed in as {}", state.user_id.as_deref().unwrap_or("<unknown>"));
        if self.persist {
            state.save()?;
        }
        Ok(())
    }

    pub fn logout(&self, cache: &ConversationCache) -> Result<()> {
        {
            let mut state = self.write();
            state.clear_session();
            if self.persist {
                state.save()?;
            }
        }
        if let Err(e) = cache.invalidate_all() {
            warn!("could not clear conversation cache: {}", e);
        }
        Ok(())
    }
}
