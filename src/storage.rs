use crate::api::models::Conversation;
use crate::error::{ChatError, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ConversationList,
    SelectedConversation,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::ConversationList => "cachedChats",
            CacheKey::SelectedConversation => "selectedChat",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: String,
    pub stored_at: DateTime<Utc>,
    /// Bumped on every write to the key.
    pub revision: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.stored_at).to_std() {
            Ok(age) => age <= max_age,
            // stored "in the future" by a skewed clock; treat as fresh
            Err(_) => true,
        }
    }
}

pub type UpdateFn<'a> = &'a mut dyn FnMut(Option<&str>) -> Result<Option<String>>;

/// Key/value store backing the conversation cache.
///
/// `update` is an atomic read-modify-write: the closure sees the current value
/// and returns the replacement, or `None` to leave the entry alone. Returns the
/// new revision when something was written.
pub trait ChatCache: Send + Sync {
    fn get(&self, key: CacheKey) -> Result<Option<CacheEntry>>;
    fn set(&self, key: CacheKey, value: &str) -> Result<i64>;
    fn invalidate(&self, key: CacheKey) -> Result<()>;
    fn update(&self, key: CacheKey, f: UpdateFn<'_>) -> Result<Option<i64>>;
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(map: &mut HashMap<CacheKey, CacheEntry>, key: CacheKey, value: String) -> i64 {
        let revision = map.get(&key).map(|e| e.revision + 1).unwrap_or(1);
        map.insert(key, CacheEntry { value, stored_at: Utc::now(), revision });
        revision
    }
}

impl ChatCache for MemoryCache {
    fn get(&self, key: CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries().get(&key).cloned())
    }

    fn set(&self, key: CacheKey, value: &str) -> Result<i64> {
        Ok(Self::write(&mut self.entries(), key, value.to_string()))
    }

    fn invalidate(&self, key: CacheKey) -> Result<()> {
        self.entries().remove(&key);
        Ok(())
    }

    fn update(&self, key: CacheKey, f: UpdateFn<'_>) -> Result<Option<i64>> {
        let mut map = self.entries();
        let current = map.get(&key).map(|e| e.value.clone());
        match f(current.as_deref())? {
            Some(next) => Ok(Some(Self::write(&mut map, key, next))),
            None => Ok(None),
        }
    }
}

/// On-disk cache. Every instance opens its own connection per call, so two
/// instances over the same file behave like two independent windows.
pub struct SqliteCache {
    path: PathBuf,
}

fn db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "HabitChat")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl SqliteCache {
    pub fn open_default() -> Result<Self> {
        let path = db_path().ok_or_else(|| ChatError::Config("no data dir".into()))?;
        Self::open(path)
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self { path: path.into() };
        ensure_dir(&cache.path)?;
        let conn = cache.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                revision INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(cache)
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn read(conn: &Connection, key: CacheKey) -> Result<Option<CacheEntry>> {
        let entry = conn
            .query_row(
                "SELECT value, stored_at, revision FROM cache_entries WHERE key = ?1",
                params![key.as_str()],
                |row| {
                    Ok(CacheEntry {
                        value: row.get(0)?,
                        stored_at: row.get(1)?,
                        revision: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn write(conn: &Connection, key: CacheKey, value: &str) -> Result<i64> {
        let current: Option<i64> = conn
            .query_row(
                "SELECT revision FROM cache_entries WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let revision = current.map(|r| r + 1).unwrap_or(1);
        conn.execute(
            r#"
            INSERT INTO cache_entries (key, value, stored_at, revision)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value=excluded.value,
                stored_at=excluded.stored_at,
                revision=excluded.revision
            "#,
            params![key.as_str(), value, Utc::now(), revision],
        )?;
        Ok(revision)
    }
}

impl ChatCache for SqliteCache {
    fn get(&self, key: CacheKey) -> Result<Option<CacheEntry>> {
        Self::read(&self.conn()?, key)
    }

    fn set(&self, key: CacheKey, value: &str) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let revision = Self::write(&tx, key, value)?;
        tx.commit()?;
        Ok(revision)
    }

    fn invalidate(&self, key: CacheKey) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key.as_str()])?;
        Ok(())
    }

    fn update(&self, key: CacheKey, f: UpdateFn<'_>) -> Result<Option<i64>> {
        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front so concurrent writers serialize.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = Self::read(&tx, key)?.map(|e| e.value);
        let revision = match f(current.as_deref())? {
            Some(next) => Some(Self::write(&tx, key, &next)?),
            None => None,
        };
        tx.commit()?;
        Ok(revision)
    }
}

/// Typed view over a [`ChatCache`] holding the conversation list and the
/// last selected conversation. Entries older than `max_age` read as misses.
#[derive(Clone)]
pub struct ConversationCache {
    store: Arc<dyn ChatCache>,
    max_age: Duration,
}

impl ConversationCache {
    pub fn new(store: Arc<dyn ChatCache>, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), Duration::from_secs(15 * 60))
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn read<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let entry = match self.store.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("cache read {} failed: {}", key.as_str(), e);
                return None;
            }
        };
        if !entry.is_fresh(Utc::now(), self.max_age) {
            debug!("cache entry {} is stale", key.as_str());
            return None;
        }
        match serde_json::from_str(&entry.value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("cache entry {} is corrupt: {}", key.as_str(), e);
                None
            }
        }
    }

    pub fn conversations(&self) -> Option<Vec<Conversation>> {
        self.read(CacheKey::ConversationList)
    }

    pub fn store_conversations(&self, chats: &[Conversation]) -> Result<()> {
        self.store
            .set(CacheKey::ConversationList, &serde_json::to_string(chats)?)?;
        Ok(())
    }

    pub fn selected(&self) -> Option<Conversation> {
        self.read(CacheKey::SelectedConversation)
    }

    pub fn store_selected(&self, chat: &Conversation) -> Result<()> {
        self.store
            .set(CacheKey::SelectedConversation, &serde_json::to_string(chat)?)?;
        Ok(())
    }

    /// Looks in the selected slot first, then in the cached list.
    pub fn find(&self, chat_id: &str) -> Option<Conversation> {
        if let Some(selected) = self.selected().filter(|c| c.id == chat_id) {
            debug!("Using cached chat data");
            return Some(selected);
        }
        let found = self.conversations()?.into_iter().find(|c| c.id == chat_id);
        if found.is_some() {
            debug!("Using cached chat from list");
        }
        found
    }

    /// Existing two-party direct conversation that includes `user_id`.
    pub fn find_direct_with(&self, user_id: &str) -> Option<String> {
        self.conversations()?
            .into_iter()
            .find(|c| !c.is_group && c.users.len() == 2 && c.has_participant(user_id))
            .map(|c| c.id)
    }

    pub fn remove(&self, chat_id: &str) -> Result<()> {
        self.store.update(CacheKey::ConversationList, &mut |current| {
            let Some(raw) = current else { return Ok(None) };
            let mut chats: Vec<Conversation> = serde_json::from_str(raw)?;
            let before = chats.len();
            chats.retain(|c| c.id != chat_id);
            if chats.len() == before {
                return Ok(None);
            }
            Ok(Some(serde_json::to_string(&chats)?))
        })?;
        if self.store.get(CacheKey::SelectedConversation)?.is_some_and(|e| {
            serde_json::from_str::<Conversation>(&e.value).is_ok_and(|c| c.id == chat_id)
        }) {
            self.store.invalidate(CacheKey::SelectedConversation)?;
        }
        Ok(())
    }

    /// Puts `chat` at the head of the cached list. Does nothing when no list is cached yet.
    pub fn prepend(&self, chat: &Conversation) -> Result<()> {
        self.store.update(CacheKey::ConversationList, &mut |current| {
            let Some(raw) = current else { return Ok(None) };
            let mut chats: Vec<Conversation> = serde_json::from_str(raw)?;
            chats.retain(|c| c.id != chat.id);
            chats.insert(0, chat.clone());
            Ok(Some(serde_json::to_string(&chats)?))
        })?;
        Ok(())
    }

    /// Rewrites `chat_id` in place, in the selected slot and in the cached list.
    /// Keys that do not hold the conversation are left untouched.
    pub fn update_conversation(&self, chat_id: &str, f: &dyn Fn(&mut Conversation)) -> Result<()> {
        self.store.update(CacheKey::SelectedConversation, &mut |current| {
            let Some(raw) = current else { return Ok(None) };
            let mut chat: Conversation = serde_json::from_str(raw)?;
            if chat.id != chat_id {
                return Ok(None);
            }
            f(&mut chat);
            Ok(Some(serde_json::to_string(&chat)?))
        })?;
        self.store.update(CacheKey::ConversationList, &mut |current| {
            let Some(raw) = current else { return Ok(None) };
            let mut chats: Vec<Conversation> = serde_json::from_str(raw)?;
            let Some(chat) = chats.iter_mut().find(|c| c.id == chat_id) else {
                return Ok(None);
            };
            f(chat);
            Ok(Some(serde_json::to_string(&chats)?))
        })?;
        Ok(())
    }

    pub fn invalidate_all(&self) -> Result<()> {
        self.store.invalidate(CacheKey::ConversationList)?;
        self.store.invalidate(CacheKey::SelectedConversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{conversation, direct};

    #[test]
    fn staleness_is_measured_from_store_time() {
        let entry = CacheEntry {
            value: "[]".into(),
            stored_at: Utc::now() - chrono::Duration::seconds(120),
            revision: 1,
        };
        assert!(entry.is_fresh(Utc::now(), Duration::from_secs(300)));
        assert!(!entry.is_fresh(Utc::now(), Duration::from_secs(60)));
    }

    #[test]
    fn stale_entries_read_as_misses() {
        let cache = ConversationCache::new(Arc::new(MemoryCache::new()), Duration::ZERO);
        cache.store_conversations(&[conversation("c1")]).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.conversations().is_none());
        assert!(cache.find("c1").is_none());
    }

    #[test]
    fn find_prefers_selected_then_list() {
        let cache = ConversationCache::in_memory();
        let mut listed = conversation("c1");
        listed.name = Some("from list".into());
        cache.store_conversations(&[listed, conversation("c2")]).unwrap();
        let mut selected = conversation("c1");
        selected.name = Some("selected".into());
        cache.store_selected(&selected).unwrap();

        assert_eq!(cache.find("c1").unwrap().name.as_deref(), Some("selected"));
        assert_eq!(cache.find("c2").unwrap().id, "c2");
        assert!(cache.find("nope").is_none());
    }

    #[test]
    fn remove_drops_list_entry_and_matching_selection() {
        let cache = ConversationCache::in_memory();
        cache.store_conversations(&[conversation("c1"), conversation("c2")]).unwrap();
        cache.store_selected(&conversation("c1")).unwrap();
        cache.remove("c1").unwrap();

        let ids: Vec<_> = cache.conversations().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["c2"]);
        assert!(cache.selected().is_none());
    }

    #[test]
    fn prepend_requires_existing_list() {
        let cache = ConversationCache::in_memory();
        cache.prepend(&conversation("new")).unwrap();
        assert!(cache.conversations().is_none());

        cache.store_conversations(&[conversation("c1")]).unwrap();
        cache.prepend(&conversation("new")).unwrap();
        let ids: Vec<_> = cache.conversations().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["new", "c1"]);
    }

    #[test]
    fn update_conversation_rewrites_both_keys() {
        let cache = ConversationCache::in_memory();
        cache.store_conversations(&[conversation("c1"), conversation("c2")]).unwrap();
        cache.store_selected(&conversation("c2")).unwrap();

        cache
            .update_conversation("c2", &|c| c.name = Some("Evening walks".into()))
            .unwrap();
        assert_eq!(cache.selected().unwrap().name.as_deref(), Some("Evening walks"));
        let listed = cache.conversations().unwrap();
        assert_eq!(listed[1].name.as_deref(), Some("Evening walks"));
        assert!(listed[0].name.is_none());

        let revision = cache.store.get(CacheKey::SelectedConversation).unwrap().unwrap().revision;
        cache.update_conversation("c1", &|c| c.name = Some("x".into())).unwrap();
        assert_eq!(
            cache.store.get(CacheKey::SelectedConversation).unwrap().unwrap().revision,
            revision
        );
    }

    #[test]
    fn direct_lookup_ignores_groups() {
        let cache = ConversationCache::in_memory();
        let mut group = direct("g1", "me", "u2");
        group.is_group = true;
        cache
            .store_conversations(&[group, direct("d1", "me", "u3"), direct("d2", "me", "u2")])
            .unwrap();
        assert_eq!(cache.find_direct_with("u2").as_deref(), Some("d2"));
        assert!(cache.find_direct_with("u9").is_none());
    }

    #[test]
    fn sqlite_revisions_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCache::open(dir.path().join("cache.sqlite")).unwrap();
        assert_eq!(store.set(CacheKey::SelectedConversation, "{}").unwrap(), 1);
        assert_eq!(store.set(CacheKey::SelectedConversation, "{}").unwrap(), 2);
        assert_eq!(store.get(CacheKey::SelectedConversation).unwrap().unwrap().revision, 2);
        store.invalidate(CacheKey::SelectedConversation).unwrap();
        assert!(store.get(CacheKey::SelectedConversation).unwrap().is_none());
    }

    #[test]
    fn concurrent_windows_do_not_clobber_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let seed = ConversationCache::new(
            Arc::new(SqliteCache::open(&path).unwrap()),
            Duration::from_secs(60),
        );
        seed.store_conversations(&[]).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let window = ConversationCache::new(
                        Arc::new(SqliteCache::open(&path).unwrap()),
                        Duration::from_secs(60),
                    );
                    for j in 0..5 {
                        window.prepend(&conversation(&format!("w{i}-{j}"))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(seed.conversations().unwrap().len(), 20);
    }
}
