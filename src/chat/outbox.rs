//! Optimistic message timeline.
//!
//! Sending appends a placeholder in `Pending` state; the server reply either
//! confirms it (the placeholder is swapped in place for the server message)
//! or fails it (the placeholder is dropped). Transitions are pure so they can
//! be exercised without any UI.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::api::models::Message;

pub const TEMP_PREFIX: &str = "temp-";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn temp_id() -> String {
    format!(
        "{}{}-{}",
        TEMP_PREFIX,
        Utc::now().timestamp_millis(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub message: Message,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Load(Vec<Message>),
    Enqueue(Message),
    Confirm { temp_id: String, message: Message },
    Fail { temp_id: String },
    Replace(Message),
    Remove { id: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<Entry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| e.delivery == Delivery::Pending).count()
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.message.id == id)
    }

    /// Applies one transition. Returns false when it referred to an unknown entry.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Load(mut messages) => {
                messages.sort_by_key(|m| m.created_at);
                self.entries = messages
                    .into_iter()
                    .map(|message| Entry { message, delivery: Delivery::Confirmed })
                    .collect();
                true
            }
            Action::Enqueue(message) => {
                self.entries.push(Entry { message, delivery: Delivery::Pending });
                true
            }
            Action::Confirm { temp_id, message } => match self.position(&temp_id) {
                Some(idx) => {
                    self.entries[idx] = Entry { message, delivery: Delivery::Confirmed };
                    true
                }
                None => false,
            },
            Action::Fail { temp_id } => match self.position(&temp_id) {
                Some(idx) => {
                    self.entries.remove(idx);
                    true
                }
                None => false,
            },
            Action::Replace(message) => match self.position(&message.id) {
                Some(idx) => {
                    self.entries[idx].message = message;
                    true
                }
                None => false,
            },
            Action::Remove { id } => match self.position(&id) {
                Some(idx) => {
                    self.entries.remove(idx);
                    true
                }
                None => false,
            },
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.message.id == id)
    }
}
