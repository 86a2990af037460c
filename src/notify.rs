use std::sync::{Arc, Mutex};

use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Default,
    Destructive,
}

/// A transient notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub level: ToastLevel,
}

impl Toast {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), level: ToastLevel::Default }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            title: "Error".into(),
            description: description.into(),
            level: ToastLevel::Destructive,
        }
    }

    /// "`action`: `err`", e.g. "Failed to load chats: HTTP 500".
    pub fn failure(action: &str, err: &ChatError) -> Self {
        Self::error(format!("{}: {}", action, err))
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Collects toasts so a front end (or a test) can drain them.
#[derive(Default, Clone)]
pub struct ToastQueue {
    inner: Arc<Mutex<Vec<Toast>>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn last(&self) -> Option<Toast> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, toast: Toast) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).push(toast);
    }
}
