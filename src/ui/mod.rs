pub mod chat_view;
pub mod login;
pub mod main_window;
pub mod new_chat;
pub mod sidebar;

use std::future::Future;
use std::sync::Arc;

use log::{error, warn};

use crate::api::ChatBackend;
use crate::api::client::ApiClient;
use crate::app::AppState;
use crate::error::Result;
use crate::notify::{ToastLevel, ToastQueue};
use crate::session::Session;
use crate::storage::{ConversationCache, MemoryCache, SqliteCache};

/// Everything the windows share. Toasts raised by the core land in `toasts`
/// and are moved onto the overlay from the main loop.
#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn ChatBackend>,
    pub session: Session,
    pub cache: ConversationCache,
    pub toasts: ToastQueue,
}

impl Services {
    pub fn connect(state: AppState) -> Result<Self> {
        let backend = ApiClient::new(&state.base_url)?;
        let store: Arc<dyn crate::storage::ChatCache> = match SqliteCache::open_default() {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!("falling back to in-memory cache: {}", e);
                Arc::new(MemoryCache::new())
            }
        };
        let cache = ConversationCache::new(store, state.cache_max_age());
        Ok(Self {
            backend: Arc::new(backend),
            session: Session::persistent(state),
            cache,
            toasts: ToastQueue::new(),
        })
    }

    pub fn notifier(&self) -> Arc<ToastQueue> {
        Arc::new(self.toasts.clone())
    }

    pub fn flush_toasts(&self, overlay: &adw::ToastOverlay) {
        for toast in self.toasts.drain() {
            let text = match toast.level {
                ToastLevel::Default => format!("{}: {}", toast.title, toast.description),
                ToastLevel::Destructive => toast.description,
            };
            let t = adw::Toast::new(&text);
            if toast.level == ToastLevel::Destructive {
                t.set_priority(adw::ToastPriority::High);
            }
            overlay.add_toast(t);
        }
    }
}

/// Runs `fut` on the shared runtime and hands its output to `done` on the GLib main loop.
pub fn spawn_then<T, Fut, F>(fut: Fut, done: F)
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    F: FnOnce(T) + 'static,
{
    let handle = crate::utils::run_async(fut);
    glib::spawn_future_local(async move {
        match handle.await {
            Ok(value) => done(value),
            Err(e) => error!("background task failed: {}", e),
        }
    });
}
