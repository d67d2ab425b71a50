//! crates/edwin_core/src/storage.rs
//!
//! The typed repository over the key-value store. Every key name and every
//! serialization format used by the client lives here.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use crate::domain::{AutoSyncPreference, MaterialId, QuizDescriptor, SyncRecord, UserIdentity};
use crate::ports::{KeyValueStore, PortError, PortResult};

/// Storage key names, shared with the browser build of the client.
pub mod keys {
    pub const USER_TOKEN: &str = "edwin_user_token";
    pub const USER_NAME: &str = "edwin_user_name";
    pub const AUTO_SYNC_ENABLED: &str = "edwin_auto_sync_enabled";
    pub const SYNC_HISTORY: &str = "edwin_sync_history";
    pub const QUIZ_TOPICS: &str = "edwin_quiz_topics";
    pub const CANVAS_TOKEN: &str = "edwin_canvas_token";

    pub fn quiz_completed(quiz_id: i64) -> String {
        format!("edwin_quiz_{}", quiz_id)
    }
}

#[derive(Clone)]
pub struct EdwinStorage {
    store: Arc<dyn KeyValueStore>,
}

impl EdwinStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    //-------------------------------------------------------------------------------------
    // Identity
    //-------------------------------------------------------------------------------------

    /// The stored token, with the stored name if one was saved alongside it.
    pub fn identity(&self) -> PortResult<Option<UserIdentity>> {
        let Some(token) = self.store.get(keys::USER_TOKEN)? else {
            return Ok(None);
        };
        let display_name = self.store.get(keys::USER_NAME)?.unwrap_or_default();
        Ok(Some(UserIdentity {
            token,
            display_name,
        }))
    }

    pub fn set_identity(&self, identity: &UserIdentity) -> PortResult<()> {
        self.store.set(keys::USER_TOKEN, &identity.token)?;
        self.store.set(keys::USER_NAME, &identity.display_name)
    }

    //-------------------------------------------------------------------------------------
    // Auto-sync
    //-------------------------------------------------------------------------------------

    pub fn auto_sync_preference(&self) -> PortResult<AutoSyncPreference> {
        let raw = self.store.get(keys::AUTO_SYNC_ENABLED)?;
        Ok(AutoSyncPreference::from_stored(raw.as_deref()))
    }

    pub fn set_auto_sync_enabled(&self, enabled: bool) -> PortResult<()> {
        self.store
            .set(keys::AUTO_SYNC_ENABLED, if enabled { "true" } else { "false" })
    }

    pub fn sync_record(&self) -> PortResult<SyncRecord> {
        Ok(self.read_json(keys::SYNC_HISTORY)?.unwrap_or_default())
    }

    pub fn set_sync_record(&self, record: &SyncRecord) -> PortResult<()> {
        self.write_json(keys::SYNC_HISTORY, record)
    }

    /// Records a successful sync of `url` and returns the updated record.
    pub fn mark_synced(&self, url: &str, at: DateTime<Utc>) -> PortResult<SyncRecord> {
        self.update_json(keys::SYNC_HISTORY, |record: &mut SyncRecord| {
            record.mark_synced(url, at);
            record.clone()
        })
    }

    pub fn clear_sync_record(&self) -> PortResult<()> {
        self.store.remove(keys::SYNC_HISTORY)
    }

    //-------------------------------------------------------------------------------------
    // Quizzes
    //-------------------------------------------------------------------------------------

    pub fn quiz_topics(&self) -> PortResult<Vec<QuizDescriptor>> {
        Ok(self.read_json(keys::QUIZ_TOPICS)?.unwrap_or_default())
    }

    pub fn set_quiz_topics(&self, topics: &[QuizDescriptor]) -> PortResult<()> {
        self.write_json(keys::QUIZ_TOPICS, topics)
    }

    /// Drops every descriptor generated from `material_id`; returns how many went.
    pub fn remove_quiz_topics_for(&self, material_id: &MaterialId) -> PortResult<usize> {
        self.update_json(keys::QUIZ_TOPICS, |topics: &mut Vec<QuizDescriptor>| {
            let before = topics.len();
            topics.retain(|t| t.material_id.as_ref() != Some(material_id));
            before - topics.len()
        })
    }

    /// Appends the descriptor `build` makes for `material_id`, unless the
    /// material already has one. Returns the material's descriptor and whether
    /// it is new.
    ///
    /// The new id is `preferred_id` raised past every id already in the
    /// catalogue, so completion flags never collide.
    pub fn add_quiz_topic(
        &self,
        material_id: &MaterialId,
        preferred_id: i64,
        build: impl FnOnce(i64) -> QuizDescriptor,
    ) -> PortResult<(QuizDescriptor, bool)> {
        self.update_json(keys::QUIZ_TOPICS, |topics: &mut Vec<QuizDescriptor>| {
            if let Some(existing) = topics.iter().find(|t| t.material_id.as_ref() == Some(material_id)) {
                return (existing.clone(), false);
            }
            let id = topics
                .iter()
                .map(|t| t.id.saturating_add(1))
                .fold(preferred_id, i64::max);
            let descriptor = build(id);
            topics.push(descriptor.clone());
            (descriptor, true)
        })
    }

    pub fn clear_quiz_topics(&self) -> PortResult<()> {
        self.store.remove(keys::QUIZ_TOPICS)
    }

    pub fn is_quiz_completed(&self, quiz_id: i64) -> PortResult<bool> {
        Ok(self.store.get(&keys::quiz_completed(quiz_id))?.as_deref() == Some("true"))
    }

    pub fn mark_quiz_completed(&self, quiz_id: i64) -> PortResult<()> {
        self.store.set(&keys::quiz_completed(quiz_id), "true")
    }

    //-------------------------------------------------------------------------------------
    // Canvas credential
    //-------------------------------------------------------------------------------------

    // Stored in clear text, exactly like the browser build.
    pub fn canvas_token(&self) -> PortResult<Option<String>> {
        self.store.get(keys::CANVAS_TOKEN)
    }

    pub fn set_canvas_token(&self, token: &str) -> PortResult<()> {
        self.store.set(keys::CANVAS_TOKEN, token)
    }

    //-------------------------------------------------------------------------------------
    // JSON helpers
    //-------------------------------------------------------------------------------------

    /// A value that no longer parses is reported and treated as absent, so a
    /// corrupted entry cannot wedge the client.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        let raw = self.store.get(key)?;
        Ok(parse_stored(key, raw.as_deref()))
    }

    /// Edits the JSON value of `key` in one locked cycle of the store. An
    /// absent or unreadable value is edited from its default; an edit that
    /// changes nothing writes nothing.
    fn update_json<T, R>(&self, key: &str, edit: impl FnOnce(&mut T) -> R) -> PortResult<R>
    where
        T: Serialize + DeserializeOwned + Default + Clone + PartialEq,
    {
        let mut edit = Some(edit);
        let mut outcome = None;
        let mut encode_error = None;

        self.store.update(key, &mut |raw: Option<&str>| {
            let edit = edit.take()?;
            let mut value: T = parse_stored(key, raw).unwrap_or_default();
            let before = value.clone();
            outcome = Some(edit(&mut value));
            if value == before {
                return None;
            }
            match serde_json::to_string(&value) {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    encode_error = Some(e);
                    None
                }
            }
        })?;

        if let Some(e) = encode_error {
            return Err(PortError::Storage(e.to_string()));
        }
        outcome.ok_or_else(|| PortError::Storage(format!("update of {} was not applied", key)))
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> PortResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| PortError::Storage(e.to_string()))?;
        self.store.set(key, &raw)
    }
}

fn parse_stored<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Option<T> {
    match serde_json::from_str(raw?) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Discarding unreadable stored value");
            None
        }
    }
}

//=========================================================================================
// In-Memory Store
//=========================================================================================

/// A process-local store, used for ephemeral sessions and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = apply(entries.get(key).map(String::as_str)) {
            entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}
