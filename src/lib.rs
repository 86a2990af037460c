//! Chat client for the habit tracker's social features: conversation list,
//! conversation view with optimistic sending, a simulated call overlay, and a
//! local conversation cache.
//!
//! Everything outside `ui` is toolkit independent. The GTK shell is behind the
//! `gui` feature.

pub mod api;
pub mod app;
pub mod call;
pub mod chat;
pub mod error;
pub mod notify;
pub mod session;
pub mod storage;
pub mod utils;

#[cfg(feature = "gui")]
pub mod ui;

#[cfg(test)]
mod testing;

pub use api::ChatBackend;
pub use api::client::ApiClient;
pub use error::{ChatError, Result};
pub use session::Session;
pub use storage::ConversationCache;
